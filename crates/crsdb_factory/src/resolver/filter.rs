//! Supersession, extent and grid filters, and the final ranking.

use std::cmp::Ordering;

use tracing::debug;

use crsdb_core::operation::CoordinateOperation;
use crsdb_error::Result;
use crsdb_sqlite::Param;

use super::{OperationSearchOptions, skip_candidate};
use crate::factory::AuthorityFactory;

/// An operation with what ranking needs to know about it.
#[derive(Debug, Clone)]
struct Ranked {
    op: CoordinateOperation,
    grids_available: bool,
    has_grids: bool,
}

fn compare(a: &Ranked, b: &Ranked) -> Ordering {
    b.op.pseudo_area()
        .total_cmp(&a.op.pseudo_area())
        .then_with(|| {
            let a_known = a.op.accuracy().is_some();
            let b_known = b.op.accuracy().is_some();
            b_known.cmp(&a_known)
        })
        .then_with(|| match (a.op.accuracy(), b.op.accuracy()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => Ordering::Equal,
        })
        .then_with(|| b.grids_available.cmp(&a.grids_available))
        .then_with(|| a.has_grids.cmp(&b.has_grids))
        .then_with(|| a.op.name().cmp(&b.op.name()))
}

impl AuthorityFactory<'_> {
    /// Whether every grid `op` needs is available.
    fn grids_available(&self, op: &CoordinateOperation, consider_known: bool) -> Result<bool> {
        Ok(op
            .grids_needed(self.context(), consider_known)?
            .iter()
            .all(|g| g.available))
    }

    /// Drops operations whose same-endpoint replacement is also a candidate
    /// and needs no unavailable grid.
    pub(super) fn discard_superseded(
        &self,
        ops: Vec<CoordinateOperation>,
        options: &OperationSearchOptions,
    ) -> Result<Vec<CoordinateOperation>> {
        let mut kept = Vec::with_capacity(ops.len());
        for op in &ops {
            let Some(id) = op.id() else {
                kept.push(op.clone());
                continue;
            };
            let rows = self.run(
                "SELECT replacement_auth_name, replacement_code FROM supersession \
                 WHERE superseded_auth_name = ?1 AND superseded_code = ?2 \
                 AND same_source_target_crs = 1",
                &[Param::from(&id.authority), Param::from(&id.code)],
            )?;

            let mut superseded = false;
            for row in rows {
                let (auth, code) = (row.get_string(0)?, row.get_string(1)?);
                let replacement = ops.iter().find(|other| {
                    other
                        .id()
                        .is_some_and(|rid| rid.authority == auth && rid.code == code)
                });
                let Some(replacement) = replacement else {
                    continue;
                };
                if self.grids_available(replacement, options.consider_known_grids_as_available)? {
                    debug!(%id, replacement = %replacement.name(), "discarding superseded operation");
                    superseded = true;
                    break;
                }
            }
            if !superseded {
                kept.push(op.clone());
            }
        }
        Ok(kept)
    }

    /// Keeps operations intersecting the filter extents. When none does,
    /// everything is kept.
    pub(super) fn filter_by_extents_with_fallback(
        &self,
        ops: Vec<CoordinateOperation>,
        options: &OperationSearchOptions,
    ) -> Vec<CoordinateOperation> {
        if !options.has_filter_extents() {
            return ops;
        }
        let matching: Vec<_> = ops
            .iter()
            .filter(|op| options.accepts_extent(op.extent()))
            .cloned()
            .collect();
        if matching.is_empty() { ops } else { matching }
    }

    /// Drops operations with missing grids if asked to, then sorts: larger
    /// area first, known accuracy first, better accuracy first, available
    /// grids first, operations without grids first, then by name.
    pub(super) fn rank_and_filter_grids(
        &self,
        ops: Vec<CoordinateOperation>,
        options: &OperationSearchOptions,
    ) -> Result<Vec<CoordinateOperation>> {
        let mut ranked = Vec::with_capacity(ops.len());
        for op in ops {
            let grids = match op.grids_needed(self.context(), options.consider_known_grids_as_available) {
                Ok(grids) => grids,
                Err(e) => {
                    skip_candidate(&op.name(), e)?;
                    continue;
                }
            };
            let grids_available = grids.iter().all(|g| g.available);
            if options.discard_if_missing_grid && !grids_available {
                debug!(op = %op.name(), "discarding operation with missing grid");
                continue;
            }
            ranked.push(Ranked {
                has_grids: !grids.is_empty(),
                grids_available,
                op,
            });
        }
        ranked.sort_by(compare);
        Ok(ranked.into_iter().map(|r| r.op).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crsdb_core::crs::{Crs, GeodeticCrs, GeodeticKind};
    use crsdb_core::cs::{Axis, AxisDirection, CoordinateSystem, CsKind};
    use crsdb_core::datum::{
        Ellipsoid, EllipsoidShape, GeodeticDatum, GeodeticReferenceFrame, PrimeMeridian,
    };
    use crsdb_core::extent::{Extent, GeographicBoundingBox};
    use crsdb_core::ident::{ObjectId, ObjectProperties, ObjectUsage};
    use crsdb_core::operation::{OperationMethod, Transformation};
    use crsdb_core::unit::{Measure, UnitOfMeasure};

    fn geog2d(code: &str) -> Crs {
        let axis = |name: &str, direction| Axis {
            name: name.to_string(),
            abbreviation: String::new(),
            direction,
            unit: UnitOfMeasure::degree(),
            meridian: None,
        };
        let cs = CoordinateSystem::try_new(
            None,
            CsKind::Ellipsoidal,
            vec![
                axis("Latitude", AxisDirection::North),
                axis("Longitude", AxisDirection::East),
            ],
        )
        .unwrap();
        let frame = GeodeticReferenceFrame {
            props: ObjectProperties::named(format!("datum of {code}")),
            ellipsoid: Arc::new(Ellipsoid {
                props: ObjectProperties::named("GRS 1980"),
                semi_major_axis: Measure::new(6378137.0, UnitOfMeasure::metre()),
                shape: EllipsoidShape::InverseFlattening(298.257222101),
                celestial_body: "Earth".to_string(),
            }),
            prime_meridian: Arc::new(PrimeMeridian::greenwich()),
            anchor: None,
            publication_date: None,
            frame_reference_epoch: None,
        };
        Crs::Geodetic(Arc::new(
            GeodeticCrs::try_new(
                ObjectProperties::identified(ObjectId::new("EPSG", code), code),
                GeodeticKind::Geographic2D,
                GeodeticDatum::Frame(Arc::new(frame)),
                Arc::new(cs),
            )
            .unwrap(),
        ))
    }

    fn ranked(name: &str, accuracy: Option<f64>, bbox: GeographicBoundingBox, grids: Option<bool>) -> Ranked {
        let props = ObjectProperties::named(name).with_usages(vec![ObjectUsage {
            scope: None,
            extent: Arc::new(Extent::from_bbox(bbox)),
        }]);
        let t = Transformation::try_new(
            props,
            Arc::new(OperationMethod::new(ObjectId::new("EPSG", "9603"), "Geocentric translations")),
            Vec::new(),
            geog2d("4230"),
            geog2d("4326"),
            None,
            accuracy,
            None,
        )
        .unwrap();
        Ranked {
            op: CoordinateOperation::Transformation(Arc::new(t)),
            grids_available: grids.unwrap_or(true),
            has_grids: grids.is_some(),
        }
    }

    #[test]
    fn ranking_order() {
        let small = GeographicBoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let large = GeographicBoundingBox::new(0.0, 0.0, 40.0, 40.0);

        let mut ops = vec![
            ranked("unknown accuracy", None, large, None),
            ranked("missing grid", Some(0.1), large, Some(false)),
            ranked("small area", Some(1.0), small, None),
            ranked("large area coarse", Some(5.0), large, None),
            ranked("large area fine", Some(2.0), large, None),
            ranked("large area fine grid", Some(2.0), large, Some(true)),
            ranked("large area fine missing grid", Some(2.0), large, Some(false)),
        ];
        ops.sort_by(compare);

        let names: Vec<_> = ops.iter().map(|r| r.op.name()).collect();
        assert_eq!(
            vec![
                "missing grid",
                "large area fine",
                "large area fine grid",
                "large area fine missing grid",
                "large area coarse",
                "unknown accuracy",
                "small area",
            ],
            names
        );
    }
}
