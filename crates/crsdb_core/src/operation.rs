//! Coordinate operations: conversions, transformations and concatenations of
//! both.

use std::sync::Arc;

use crsdb_error::{Result, factory_err};

use crate::crs::Crs;
use crate::extent::Extent;
use crate::grid::{GridCatalog, GridDescription};
use crate::ident::{ObjectId, ObjectProperties, ObjectUsage};
use crate::unit::Measure;

/// Maximum number of parameters of a single operation.
pub const N_MAX_PARAMS: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct OperationMethod {
    pub props: ObjectProperties,
}

impl OperationMethod {
    pub fn new(id: ObjectId, name: impl Into<String>) -> Self {
        OperationMethod {
            props: ObjectProperties::identified(id, name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Measure(Measure),
    Filename(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationParameter {
    pub props: ObjectProperties,
    pub value: ParameterValue,
}

fn check_param_count(name: &str, params: &[OperationParameter]) -> Result<()> {
    if params.len() > N_MAX_PARAMS {
        return Err(factory_err!(
            "operation '{name}' has {} parameters, at most {N_MAX_PARAMS} are supported",
            params.len()
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub props: ObjectProperties,
    pub method: Arc<OperationMethod>,
    pub parameters: Vec<OperationParameter>,
    pub source: Option<Crs>,
    pub target: Option<Crs>,
    pub inverted: bool,
}

impl Conversion {
    /// New conversion, not bound to any CRS.
    pub fn try_new(
        props: ObjectProperties,
        method: Arc<OperationMethod>,
        parameters: Vec<OperationParameter>,
    ) -> Result<Self> {
        check_param_count(&props.name, &parameters)?;
        Ok(Conversion {
            props,
            method,
            parameters,
            source: None,
            target: None,
            inverted: false,
        })
    }

    pub fn is_bound(&self) -> bool {
        self.source.is_some() && self.target.is_some()
    }

    pub fn bound_to(&self, source: Crs, target: Crs) -> Conversion {
        Conversion {
            source: Some(source),
            target: Some(target),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    pub props: ObjectProperties,
    pub method: Arc<OperationMethod>,
    pub parameters: Vec<OperationParameter>,
    pub source: Crs,
    pub target: Crs,
    pub interpolation: Option<Crs>,
    /// Accuracy in metres, `None` when unknown.
    pub accuracy: Option<f64>,
    pub version: Option<String>,
    pub inverted: bool,
}

impl Transformation {
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        props: ObjectProperties,
        method: Arc<OperationMethod>,
        parameters: Vec<OperationParameter>,
        source: Crs,
        target: Crs,
        interpolation: Option<Crs>,
        accuracy: Option<f64>,
        version: Option<String>,
    ) -> Result<Self> {
        check_param_count(&props.name, &parameters)?;
        Ok(Transformation {
            props,
            method,
            parameters,
            source,
            target,
            interpolation,
            accuracy,
            version,
            inverted: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcatenatedOperation {
    pub props: ObjectProperties,
    pub steps: Vec<CoordinateOperation>,
    pub accuracy: Option<f64>,
    pub inverted: bool,
}

/// Name, extent and accuracy derived from a list of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationMetadata {
    /// Step names joined with " + ".
    pub name: String,
    /// Intersection of the step extents, `None` when they are disjoint.
    pub extent: Option<Extent>,
    /// Sum of the step accuracies, `None` if any is unknown.
    pub accuracy: Option<f64>,
}

pub fn compute_metadata(steps: &[CoordinateOperation]) -> OperationMetadata {
    let name = steps
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join(" + ");

    let mut extent = Some(Extent::unknown());
    for step in steps {
        if let (Some(acc), Some(step_extent)) = (&extent, step.extent()) {
            extent = acc.intersection(step_extent);
        }
    }

    let accuracy = steps
        .iter()
        .map(|s| s.accuracy())
        .try_fold(0.0, |sum, acc| acc.map(|a| sum + a));

    OperationMetadata {
        name,
        extent,
        accuracy,
    }
}

fn step_crs(step: &CoordinateOperation, index: usize) -> Result<(&Crs, &Crs)> {
    match (step.source_crs(), step.target_crs()) {
        (Some(s), Some(t)) => Ok((s, t)),
        _ => Err(factory_err!(
            "step {index} '{}' is not bound to source and target crs",
            step.name()
        )),
    }
}

impl ConcatenatedOperation {
    /// Concatenation of bound steps whose endpoints chain.
    pub fn try_new(
        props: ObjectProperties,
        steps: Vec<CoordinateOperation>,
        accuracy: Option<f64>,
    ) -> Result<Self> {
        if steps.len() < 2 {
            return Err(factory_err!(
                "concatenated operation '{}' needs at least 2 steps",
                props.name
            ));
        }
        for (i, pair) in steps.windows(2).enumerate() {
            let (_, prev_target) = step_crs(&pair[0], i)?;
            let (next_source, _) = step_crs(&pair[1], i + 1)?;
            if !prev_target.is_equivalent_to(next_source) {
                return Err(factory_err!(
                    "in concatenated operation '{}', target of step {i} ({}) does not match source of step {} ({})",
                    props.name,
                    prev_target.name(),
                    i + 1,
                    next_source.name()
                ));
            }
        }
        Ok(ConcatenatedOperation {
            props,
            steps,
            accuracy,
            inverted: false,
        })
    }

    /// Anonymous concatenation whose name, extent and accuracy are derived
    /// from the steps. Nested concatenations are flattened.
    pub fn from_steps(steps: Vec<CoordinateOperation>) -> Result<Self> {
        let mut flat = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                CoordinateOperation::Concatenated(c) => flat.extend(c.effective_steps()),
                other => flat.push(other),
            }
        }

        let meta = compute_metadata(&flat);
        let extent = meta
            .extent
            .ok_or_else(|| factory_err!("steps of '{}' have disjoint extents", meta.name))?;
        let usages = if extent.is_unknown() {
            Vec::new()
        } else {
            vec![ObjectUsage {
                scope: None,
                extent: Arc::new(extent),
            }]
        };
        Self::try_new(
            ObjectProperties::named(meta.name).with_usages(usages),
            flat,
            meta.accuracy,
        )
    }

    /// Steps in execution order, taking the inverted flag into account.
    pub fn effective_steps(&self) -> Vec<CoordinateOperation> {
        if self.inverted {
            self.steps.iter().rev().map(|s| s.inverse()).collect()
        } else {
            self.steps.clone()
        }
    }
}

/// Puts catalog steps in the direction that chains from `source` to `target`.
///
/// Steps whose source does not match the previous target but whose target
/// does are inverted. Unbound conversions are bound to their neighbours,
/// inverted when they go from a projected CRS to its base.
pub fn fix_steps_direction(
    source: &Crs,
    target: &Crs,
    steps: Vec<CoordinateOperation>,
) -> Result<Vec<CoordinateOperation>> {
    let n = steps.len();
    let mut fixed: Vec<CoordinateOperation> = Vec::with_capacity(n);

    for i in 0..n {
        let prev_target = match fixed.last() {
            Some(prev) => prev
                .target_crs()
                .cloned()
                .ok_or_else(|| factory_err!("step {} has no target crs", i - 1))?,
            None => source.clone(),
        };

        let step = &steps[i];
        let next = match step {
            CoordinateOperation::Conversion(conv) if !conv.is_bound() => {
                let next_crs = if i + 1 == n {
                    target.clone()
                } else {
                    neighbour_endpoint(&prev_target, &steps[i + 1])?
                };
                bind_conversion(conv, prev_target, next_crs)
            }
            _ => {
                let (s, t) = step_crs(step, i)?;
                if s.is_equivalent_to(&prev_target) {
                    step.clone()
                } else if t.is_equivalent_to(&prev_target) {
                    step.inverse()
                } else {
                    return Err(factory_err!(
                        "step {i} '{}' does not chain with {}",
                        step.name(),
                        prev_target.name()
                    ));
                }
            }
        };
        fixed.push(next);
    }

    Ok(fixed)
}

fn derives_from(projected: &Crs, base: &Crs) -> bool {
    match projected {
        Crs::Projected(p) => Crs::Geodetic(p.base.clone()).is_equivalent_to(base),
        _ => false,
    }
}

/// Endpoint of `next` an unbound conversion starting at `from` should target.
fn neighbour_endpoint(from: &Crs, next: &CoordinateOperation) -> Result<Crs> {
    let (s, t) = match (next.source_crs(), next.target_crs()) {
        (Some(s), Some(t)) => (s, t),
        _ => {
            return Err(factory_err!(
                "cannot bind conversion next to unbound step '{}'",
                next.name()
            ));
        }
    };
    for candidate in [s, t] {
        if derives_from(candidate, from) || derives_from(from, candidate) {
            return Ok(candidate.clone());
        }
    }
    Ok(s.clone())
}

fn bind_conversion(conv: &Arc<Conversion>, from: Crs, to: Crs) -> CoordinateOperation {
    if derives_from(&from, &to) {
        // Projected to base: bind forward, then invert.
        CoordinateOperation::Conversion(Arc::new(conv.bound_to(to, from))).inverse()
    } else {
        CoordinateOperation::Conversion(Arc::new(conv.bound_to(from, to)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateOperation {
    Conversion(Arc<Conversion>),
    Transformation(Arc<Transformation>),
    Concatenated(Arc<ConcatenatedOperation>),
}

impl CoordinateOperation {
    pub fn props(&self) -> &ObjectProperties {
        match self {
            CoordinateOperation::Conversion(c) => &c.props,
            CoordinateOperation::Transformation(t) => &t.props,
            CoordinateOperation::Concatenated(c) => &c.props,
        }
    }

    pub fn id(&self) -> Option<&ObjectId> {
        self.props().id.as_ref()
    }

    pub fn is_inverted(&self) -> bool {
        match self {
            CoordinateOperation::Conversion(c) => c.inverted,
            CoordinateOperation::Transformation(t) => t.inverted,
            CoordinateOperation::Concatenated(c) => c.inverted,
        }
    }

    /// Name, prefixed with "Inverse of " for inverted operations.
    pub fn name(&self) -> String {
        if self.is_inverted() {
            format!("Inverse of {}", self.props().name)
        } else {
            self.props().name.clone()
        }
    }

    pub fn source_crs(&self) -> Option<&Crs> {
        match self {
            CoordinateOperation::Conversion(c) => c.source.as_ref(),
            CoordinateOperation::Transformation(t) => Some(&t.source),
            CoordinateOperation::Concatenated(c) => {
                if c.inverted {
                    c.steps.last().and_then(|s| s.target_crs())
                } else {
                    c.steps.first().and_then(|s| s.source_crs())
                }
            }
        }
    }

    pub fn target_crs(&self) -> Option<&Crs> {
        match self {
            CoordinateOperation::Conversion(c) => c.target.as_ref(),
            CoordinateOperation::Transformation(t) => Some(&t.target),
            CoordinateOperation::Concatenated(c) => {
                if c.inverted {
                    c.steps.first().and_then(|s| s.source_crs())
                } else {
                    c.steps.last().and_then(|s| s.target_crs())
                }
            }
        }
    }

    /// Accuracy in metres. Conversions are exact.
    pub fn accuracy(&self) -> Option<f64> {
        match self {
            CoordinateOperation::Conversion(_) => Some(0.0),
            CoordinateOperation::Transformation(t) => t.accuracy,
            CoordinateOperation::Concatenated(c) => c.accuracy,
        }
    }

    pub fn extent(&self) -> Option<&Extent> {
        self.props().domain_extent().map(|e| e.as_ref())
    }

    pub fn pseudo_area(&self) -> f64 {
        self.extent().map(|e| e.pseudo_area()).unwrap_or(0.0)
    }

    pub fn inverse(&self) -> CoordinateOperation {
        match self {
            CoordinateOperation::Conversion(c) => {
                CoordinateOperation::Conversion(Arc::new(Conversion {
                    source: c.target.clone(),
                    target: c.source.clone(),
                    inverted: !c.inverted,
                    ..(**c).clone()
                }))
            }
            CoordinateOperation::Transformation(t) => {
                CoordinateOperation::Transformation(Arc::new(Transformation {
                    source: t.target.clone(),
                    target: t.source.clone(),
                    inverted: !t.inverted,
                    ..(**t).clone()
                }))
            }
            CoordinateOperation::Concatenated(c) => {
                CoordinateOperation::Concatenated(Arc::new(ConcatenatedOperation {
                    inverted: !c.inverted,
                    ..(**c).clone()
                }))
            }
        }
    }

    /// Names of the grid files the operation reads.
    pub fn grid_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_grid_names(&mut names);
        names
    }

    fn collect_grid_names(&self, out: &mut Vec<String>) {
        match self {
            CoordinateOperation::Conversion(_) => (),
            CoordinateOperation::Transformation(t) => {
                for param in &t.parameters {
                    if let ParameterValue::Filename(f) = &param.value {
                        if !out.contains(f) {
                            out.push(f.clone());
                        }
                    }
                }
            }
            CoordinateOperation::Concatenated(c) => {
                for step in &c.steps {
                    step.collect_grid_names(out);
                }
            }
        }
    }

    pub fn grids_needed(
        &self,
        catalog: &dyn GridCatalog,
        consider_known_grids_as_available: bool,
    ) -> Result<Vec<GridDescription>> {
        self.grid_names()
            .iter()
            .map(|name| catalog.grid_description(name, consider_known_grids_as_available))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::GeographicBoundingBox;
    use crate::testutil;

    #[test]
    fn metadata_sums_known_accuracies() {
        let a = testutil::transformation("1", "A", &testutil::geog2d("4230"), &testutil::geog2d("4326"), Some(5.0));
        let b = testutil::transformation("2", "B", &testutil::geog2d("4326"), &testutil::geog2d("4258"), Some(1.5));
        let meta = compute_metadata(&[a.clone(), b.clone()]);
        assert_eq!("A + B", meta.name);
        assert_eq!(Some(6.5), meta.accuracy);

        let unknown = testutil::transformation("3", "C", &testutil::geog2d("4258"), &testutil::geog2d("4314"), None);
        let meta = compute_metadata(&[a, b, unknown]);
        assert_eq!(None, meta.accuracy);
    }

    #[test]
    fn metadata_intersects_extents() {
        let a = testutil::with_extent(
            testutil::transformation("1", "A", &testutil::geog2d("4230"), &testutil::geog2d("4326"), Some(1.0)),
            GeographicBoundingBox::new(0.0, 0.0, 10.0, 10.0),
        );
        let b = testutil::with_extent(
            testutil::transformation("2", "B", &testutil::geog2d("4326"), &testutil::geog2d("4258"), Some(1.0)),
            GeographicBoundingBox::new(5.0, 5.0, 20.0, 20.0),
        );
        let meta = compute_metadata(&[a.clone(), b]);
        assert_eq!(
            Some(GeographicBoundingBox::new(5.0, 5.0, 10.0, 10.0)),
            meta.extent.and_then(|e| e.bbox)
        );

        let far = testutil::with_extent(
            testutil::transformation("3", "C", &testutil::geog2d("4326"), &testutil::geog2d("4258"), Some(1.0)),
            GeographicBoundingBox::new(50.0, 50.0, 60.0, 60.0),
        );
        assert_eq!(None, compute_metadata(&[a, far]).extent);
    }

    #[test]
    fn concatenation_must_chain() {
        let a = testutil::transformation("1", "A", &testutil::geog2d("4230"), &testutil::geog2d("4326"), Some(1.0));
        let b = testutil::transformation("2", "B", &testutil::geog2d("4258"), &testutil::geog2d("4314"), Some(1.0));
        let err = ConcatenatedOperation::from_steps(vec![a, b]).unwrap_err();
        assert!(err.to_string().contains("does not match"), "{err}");
    }

    #[test]
    fn fix_direction_inverts_reversed_step() {
        let src = testutil::geog2d("4269");
        let mid = testutil::geog2d("4326");
        let tgt = testutil::geog2d("4267");
        let first = testutil::transformation("1188", "NAD83 to WGS 84", &src, &mid, Some(4.0));
        let second = testutil::transformation("1173", "NAD27 to WGS 84", &tgt, &mid, Some(4.0));

        let steps = fix_steps_direction(&src, &tgt, vec![first, second]).unwrap();
        assert!(!steps[0].is_inverted());
        assert!(steps[1].is_inverted());
        assert_eq!("Inverse of NAD27 to WGS 84", steps[1].name());
        assert_eq!(Some(&tgt), steps[1].target_crs());

        let concat = ConcatenatedOperation::from_steps(steps).unwrap();
        assert_eq!(Some(8.0), concat.accuracy);
    }

    #[test]
    fn inverted_concatenation_swaps_endpoints() {
        let a = testutil::transformation("1", "A", &testutil::geog2d("4230"), &testutil::geog2d("4326"), Some(1.0));
        let b = testutil::transformation("2", "B", &testutil::geog2d("4326"), &testutil::geog2d("4258"), Some(1.0));
        let op = CoordinateOperation::Concatenated(Arc::new(
            ConcatenatedOperation::from_steps(vec![a, b]).unwrap(),
        ));
        let inv = op.inverse();
        assert_eq!(op.target_crs(), inv.source_crs());
        assert_eq!(op.source_crs(), inv.target_crs());
        assert_eq!("Inverse of A + B", inv.name());
    }

    #[test]
    fn grid_names_deduplicated() {
        let t = testutil::grid_transformation("15948", &testutil::geog2d("4314"), &testutil::geog2d("4258"), "BETA2007.gsb");
        let op = CoordinateOperation::Concatenated(Arc::new(
            ConcatenatedOperation::from_steps(vec![t.clone(), t.inverse()]).unwrap(),
        ));
        assert_eq!(vec!["BETA2007.gsb".to_string()], op.grid_names());
    }

    #[test]
    fn too_many_parameters() {
        let param = OperationParameter {
            props: ObjectProperties::named("p"),
            value: ParameterValue::Filename("x".to_string()),
        };
        let err = Conversion::try_new(
            ObjectProperties::named("c"),
            Arc::new(OperationMethod::new(ObjectId::new("EPSG", "1"), "m")),
            vec![param; N_MAX_PARAMS + 1],
        )
        .unwrap_err();
        assert!(err.to_string().contains("at most 7"));
    }
}
