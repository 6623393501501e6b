use std::sync::Arc;

use chrono::NaiveDate;
use crsdb_error::{Result, factory_err};

use crate::ident::ObjectProperties;
use crate::name::canonicalize_name;
use crate::unit::{Measure, UnitOfMeasure};

#[derive(Debug, Clone, PartialEq)]
pub enum EllipsoidShape {
    Sphere,
    InverseFlattening(f64),
    SemiMinorAxis(Measure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ellipsoid {
    pub props: ObjectProperties,
    pub semi_major_axis: Measure,
    pub shape: EllipsoidShape,
    pub celestial_body: String,
}

impl Ellipsoid {
    pub fn is_sphere(&self) -> bool {
        matches!(self.shape, EllipsoidShape::Sphere)
    }

    /// Inverse flattening, 0 for a sphere.
    pub fn inverse_flattening(&self) -> f64 {
        match &self.shape {
            EllipsoidShape::Sphere => 0.0,
            EllipsoidShape::InverseFlattening(rf) => *rf,
            EllipsoidShape::SemiMinorAxis(b) => {
                let a = self.semi_major_axis.to_si();
                let b = b.to_si();
                if a == b { 0.0 } else { a / (a - b) }
            }
        }
    }

    pub fn is_equivalent_to(&self, other: &Ellipsoid) -> bool {
        (self.semi_major_axis.to_si() - other.semi_major_axis.to_si()).abs() < 1e-4
            && (self.inverse_flattening() - other.inverse_flattening()).abs() < 1e-9
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimeMeridian {
    pub props: ObjectProperties,
    pub longitude: Measure,
}

impl PrimeMeridian {
    pub fn is_equivalent_to(&self, other: &PrimeMeridian) -> bool {
        (self.longitude.to_si() - other.longitude.to_si()).abs() < 1e-12
    }

    pub fn greenwich() -> PrimeMeridian {
        PrimeMeridian {
            props: ObjectProperties::identified(
                crate::ident::ObjectId::new("EPSG", "8901"),
                "Greenwich",
            ),
            longitude: Measure::new(0.0, UnitOfMeasure::degree()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeodeticReferenceFrame {
    pub props: ObjectProperties,
    pub ellipsoid: Arc<Ellipsoid>,
    pub prime_meridian: Arc<PrimeMeridian>,
    pub anchor: Option<String>,
    pub publication_date: Option<NaiveDate>,
    /// Set for dynamic frames.
    pub frame_reference_epoch: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerticalReferenceFrame {
    pub props: ObjectProperties,
    pub anchor: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub frame_reference_epoch: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleMembers {
    Geodetic(Vec<Arc<GeodeticReferenceFrame>>),
    Vertical(Vec<Arc<VerticalReferenceFrame>>),
}

impl EnsembleMembers {
    pub fn len(&self) -> usize {
        match self {
            EnsembleMembers::Geodetic(v) => v.len(),
            EnsembleMembers::Vertical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatumEnsemble {
    pub props: ObjectProperties,
    pub members: EnsembleMembers,
    /// Positional accuracy in metres.
    pub accuracy: f64,
}

impl DatumEnsemble {
    pub fn try_new(props: ObjectProperties, members: EnsembleMembers, accuracy: f64) -> Result<Self> {
        if members.len() < 2 {
            return Err(factory_err!(
                "datum ensemble '{}' must have at least 2 members, got {}",
                props.name,
                members.len()
            ));
        }
        Ok(DatumEnsemble {
            props,
            members,
            accuracy,
        })
    }

    fn flattened_props(&self) -> ObjectProperties {
        let mut props = self.props.clone();
        if let Some(stripped) = props.name.strip_suffix(" ensemble") {
            props.name = stripped.to_string();
        }
        props
    }

    /// Single frame standing in for a geodetic ensemble: first member's
    /// ellipsoid and prime meridian, ensemble identity, name without the
    /// " ensemble" suffix.
    pub fn as_geodetic_frame(&self) -> Result<GeodeticReferenceFrame> {
        match &self.members {
            EnsembleMembers::Geodetic(members) => {
                let first = members
                    .first()
                    .ok_or_else(|| factory_err!("empty datum ensemble '{}'", self.props.name))?;
                Ok(GeodeticReferenceFrame {
                    props: self.flattened_props(),
                    ellipsoid: first.ellipsoid.clone(),
                    prime_meridian: first.prime_meridian.clone(),
                    anchor: None,
                    publication_date: None,
                    frame_reference_epoch: None,
                })
            }
            EnsembleMembers::Vertical(_) => Err(factory_err!(
                "datum ensemble '{}' is not geodetic",
                self.props.name
            )),
        }
    }

    pub fn as_vertical_frame(&self) -> Result<VerticalReferenceFrame> {
        match &self.members {
            EnsembleMembers::Vertical(_) => Ok(VerticalReferenceFrame {
                props: self.flattened_props(),
                anchor: None,
                publication_date: None,
                frame_reference_epoch: None,
            }),
            EnsembleMembers::Geodetic(_) => Err(factory_err!(
                "datum ensemble '{}' is not vertical",
                self.props.name
            )),
        }
    }
}

/// Datum of a geodetic CRS.
#[derive(Debug, Clone, PartialEq)]
pub enum GeodeticDatum {
    Frame(Arc<GeodeticReferenceFrame>),
    Ensemble(Arc<DatumEnsemble>),
}

impl GeodeticDatum {
    pub fn props(&self) -> &ObjectProperties {
        match self {
            GeodeticDatum::Frame(f) => &f.props,
            GeodeticDatum::Ensemble(e) => &e.props,
        }
    }

    pub fn ellipsoid(&self) -> Option<&Arc<Ellipsoid>> {
        match self {
            GeodeticDatum::Frame(f) => Some(&f.ellipsoid),
            GeodeticDatum::Ensemble(e) => match &e.members {
                EnsembleMembers::Geodetic(m) => m.first().map(|f| &f.ellipsoid),
                EnsembleMembers::Vertical(_) => None,
            },
        }
    }

    pub fn publication_date(&self) -> Option<NaiveDate> {
        match self {
            GeodeticDatum::Frame(f) => f.publication_date,
            GeodeticDatum::Ensemble(_) => None,
        }
    }

    /// Same identity, or same canonical name and ellipsoid.
    pub fn is_equivalent_to(&self, other: &GeodeticDatum) -> bool {
        if self.props().same_id(other.props()) {
            return true;
        }
        if canonicalize_name(&self.props().name) != canonicalize_name(&other.props().name) {
            return false;
        }
        match (self.ellipsoid(), other.ellipsoid()) {
            (Some(a), Some(b)) => a.is_equivalent_to(b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerticalDatum {
    Frame(Arc<VerticalReferenceFrame>),
    Ensemble(Arc<DatumEnsemble>),
}

impl VerticalDatum {
    pub fn props(&self) -> &ObjectProperties {
        match self {
            VerticalDatum::Frame(f) => &f.props,
            VerticalDatum::Ensemble(e) => &e.props,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::ObjectId;

    fn frame(code: &str, name: &str) -> Arc<GeodeticReferenceFrame> {
        Arc::new(GeodeticReferenceFrame {
            props: ObjectProperties::identified(ObjectId::new("EPSG", code), name),
            ellipsoid: Arc::new(Ellipsoid {
                props: ObjectProperties::identified(ObjectId::new("EPSG", "7030"), "WGS 84"),
                semi_major_axis: Measure::new(6378137.0, UnitOfMeasure::metre()),
                shape: EllipsoidShape::InverseFlattening(298.257223563),
                celestial_body: "Earth".to_string(),
            }),
            prime_meridian: Arc::new(PrimeMeridian::greenwich()),
            anchor: None,
            publication_date: None,
            frame_reference_epoch: None,
        })
    }

    #[test]
    fn ensemble_flattening() {
        let ensemble = DatumEnsemble::try_new(
            ObjectProperties::identified(
                ObjectId::new("EPSG", "6326"),
                "World Geodetic System 1984 ensemble",
            ),
            EnsembleMembers::Geodetic(vec![
                frame("1166", "World Geodetic System 1984 (Transit)"),
                frame("1152", "World Geodetic System 1984 (G730)"),
            ]),
            2.0,
        )
        .unwrap();

        let flat = ensemble.as_geodetic_frame().unwrap();
        assert_eq!("World Geodetic System 1984", flat.props.name);
        assert_eq!(Some(ObjectId::new("EPSG", "6326")), flat.props.id);
        assert_eq!(298.257223563, flat.ellipsoid.inverse_flattening());
        assert!(ensemble.as_vertical_frame().is_err());
    }

    #[test]
    fn ensemble_needs_two_members() {
        let err = DatumEnsemble::try_new(
            ObjectProperties::named("lonely ensemble"),
            EnsembleMembers::Geodetic(vec![frame("1", "a")]),
            1.0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least 2 members"));
    }

    #[test]
    fn semi_minor_axis_flattening() {
        let clarke = Ellipsoid {
            props: ObjectProperties::named("Clarke 1866"),
            semi_major_axis: Measure::new(6378206.4, UnitOfMeasure::metre()),
            shape: EllipsoidShape::SemiMinorAxis(Measure::new(6356583.8, UnitOfMeasure::metre())),
            celestial_body: "Earth".to_string(),
        };
        assert!((clarke.inverse_flattening() - 294.978698).abs() < 1e-5);
    }
}
