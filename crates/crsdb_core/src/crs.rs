use std::sync::Arc;

use crsdb_error::{Result, factory_err};

use crate::cs::{CoordinateSystem, CsKind};
use crate::datum::{GeodeticDatum, VerticalDatum};
use crate::ident::{ObjectId, ObjectProperties};
use crate::name::canonicalize_name;
use crate::operation::Conversion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeodeticKind {
    Geographic2D,
    Geographic3D,
    Geocentric,
}

impl GeodeticKind {
    pub fn from_catalog_type(s: &str) -> Option<Self> {
        Some(match s {
            "geographic 2D" => GeodeticKind::Geographic2D,
            "geographic 3D" => GeodeticKind::Geographic3D,
            "geocentric" => GeodeticKind::Geocentric,
            _ => return None,
        })
    }

    pub fn as_catalog_type(&self) -> &'static str {
        match self {
            GeodeticKind::Geographic2D => "geographic 2D",
            GeodeticKind::Geographic3D => "geographic 3D",
            GeodeticKind::Geocentric => "geocentric",
        }
    }

    pub fn is_geographic(&self) -> bool {
        !matches!(self, GeodeticKind::Geocentric)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeodeticCrs {
    pub props: ObjectProperties,
    pub kind: GeodeticKind,
    pub datum: GeodeticDatum,
    pub cs: Arc<CoordinateSystem>,
}

impl GeodeticCrs {
    pub fn try_new(
        props: ObjectProperties,
        kind: GeodeticKind,
        datum: GeodeticDatum,
        cs: Arc<CoordinateSystem>,
    ) -> Result<Self> {
        let ok = match kind {
            GeodeticKind::Geographic2D => cs.kind == CsKind::Ellipsoidal && cs.dimension() == 2,
            GeodeticKind::Geographic3D => cs.kind == CsKind::Ellipsoidal && cs.dimension() == 3,
            GeodeticKind::Geocentric => cs.kind == CsKind::Cartesian && cs.dimension() == 3,
        };
        if !ok {
            return Err(factory_err!(
                "{} crs '{}' cannot use a {}D {} coordinate system",
                kind.as_catalog_type(),
                props.name,
                cs.dimension(),
                cs.kind.as_catalog_type()
            ));
        }
        Ok(GeodeticCrs {
            props,
            kind,
            datum,
            cs,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerticalCrs {
    pub props: ObjectProperties,
    pub datum: VerticalDatum,
    pub cs: Arc<CoordinateSystem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedCrs {
    pub props: ObjectProperties,
    pub base: Arc<GeodeticCrs>,
    /// Deriving conversion, not bound to base and projected CRS.
    pub conversion: Arc<Conversion>,
    pub cs: Arc<CoordinateSystem>,
}

impl ProjectedCrs {
    pub fn try_new(
        props: ObjectProperties,
        base: Arc<GeodeticCrs>,
        conversion: Arc<Conversion>,
        cs: Arc<CoordinateSystem>,
    ) -> Result<Self> {
        if cs.kind != CsKind::Cartesian {
            return Err(factory_err!(
                "projected crs '{}' requires a Cartesian coordinate system",
                props.name
            ));
        }
        Ok(ProjectedCrs {
            props,
            base,
            conversion,
            cs,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompoundCrs {
    pub props: ObjectProperties,
    pub components: Vec<Crs>,
}

impl CompoundCrs {
    pub fn try_new(props: ObjectProperties, components: Vec<Crs>) -> Result<Self> {
        if components.len() != 2 {
            return Err(factory_err!(
                "compound crs '{}' must have exactly 2 components, got {}",
                props.name,
                components.len()
            ));
        }
        Ok(CompoundCrs { props, components })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Crs {
    Geodetic(Arc<GeodeticCrs>),
    Projected(Arc<ProjectedCrs>),
    Vertical(Arc<VerticalCrs>),
    Compound(Arc<CompoundCrs>),
}

impl Crs {
    pub fn props(&self) -> &ObjectProperties {
        match self {
            Crs::Geodetic(c) => &c.props,
            Crs::Projected(c) => &c.props,
            Crs::Vertical(c) => &c.props,
            Crs::Compound(c) => &c.props,
        }
    }

    pub fn id(&self) -> Option<&ObjectId> {
        self.props().id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.props().name
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Crs::Geodetic(_) => "geodetic crs",
            Crs::Projected(_) => "projected crs",
            Crs::Vertical(_) => "vertical crs",
            Crs::Compound(_) => "compound crs",
        }
    }

    /// Copy of this CRS carrying different properties.
    pub fn with_properties(&self, props: ObjectProperties) -> Crs {
        match self {
            Crs::Geodetic(c) => Crs::Geodetic(Arc::new(GeodeticCrs {
                props,
                ..(**c).clone()
            })),
            Crs::Projected(c) => Crs::Projected(Arc::new(ProjectedCrs {
                props,
                ..(**c).clone()
            })),
            Crs::Vertical(c) => Crs::Vertical(Arc::new(VerticalCrs {
                props,
                ..(**c).clone()
            })),
            Crs::Compound(c) => Crs::Compound(Arc::new(CompoundCrs {
                props,
                ..(**c).clone()
            })),
        }
    }

    pub fn as_geodetic(&self) -> Option<&Arc<GeodeticCrs>> {
        match self {
            Crs::Geodetic(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Geodetic(c) if c.kind.is_geographic())
    }

    /// Datum of a geodetic CRS or of the base of a projected CRS.
    pub fn geodetic_datum(&self) -> Option<&GeodeticDatum> {
        match self {
            Crs::Geodetic(c) => Some(&c.datum),
            Crs::Projected(c) => Some(&c.base.datum),
            _ => None,
        }
    }

    /// Same identifier when both are identified.
    pub fn is_same_object(&self, other: &Crs) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Same identifier, or interchangeable definitions.
    pub fn is_equivalent_to(&self, other: &Crs) -> bool {
        if self.props().same_id(other.props()) {
            return true;
        }
        match (self, other) {
            (Crs::Geodetic(a), Crs::Geodetic(b)) => {
                a.kind == b.kind && a.datum.is_equivalent_to(&b.datum) && a.cs.has_same_axes(&b.cs)
            }
            (Crs::Projected(a), Crs::Projected(b)) => {
                Crs::Geodetic(a.base.clone()).is_equivalent_to(&Crs::Geodetic(b.base.clone()))
                    && a.conversion.method.props.same_id(&b.conversion.method.props)
                    && a.conversion.parameters == b.conversion.parameters
                    && a.cs.has_same_axes(&b.cs)
            }
            (Crs::Vertical(a), Crs::Vertical(b)) => {
                canonicalize_name(&a.datum.props().name) == canonicalize_name(&b.datum.props().name)
                    && a.cs.has_same_axes(&b.cs)
            }
            (Crs::Compound(a), Crs::Compound(b)) => a
                .components
                .iter()
                .zip(&b.components)
                .all(|(x, y)| x.is_equivalent_to(y)),
            _ => false,
        }
    }
}
