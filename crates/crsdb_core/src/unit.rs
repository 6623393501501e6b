use std::sync::{Arc, LazyLock};

use crate::ident::{ObjectId, ObjectProperties};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Linear,
    Angular,
    Scale,
    Time,
    Parametric,
}

impl UnitKind {
    /// Parses the `type` column of the unit table.
    pub fn from_catalog_type(s: &str) -> Option<Self> {
        Some(match s {
            "length" => UnitKind::Linear,
            "angle" => UnitKind::Angular,
            "scale" => UnitKind::Scale,
            "time" => UnitKind::Time,
            "parametric" => UnitKind::Parametric,
            _ => return None,
        })
    }

    pub fn as_catalog_type(&self) -> &'static str {
        match self {
            UnitKind::Linear => "length",
            UnitKind::Angular => "angle",
            UnitKind::Scale => "scale",
            UnitKind::Time => "time",
            UnitKind::Parametric => "parametric",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitOfMeasure {
    pub props: ObjectProperties,
    pub kind: UnitKind,
    /// Factor to the SI unit of the kind (metre, radian, unity, second).
    pub conversion_factor: f64,
}

static METRE: LazyLock<Arc<UnitOfMeasure>> = LazyLock::new(|| {
    Arc::new(UnitOfMeasure {
        props: ObjectProperties::identified(ObjectId::new("EPSG", "9001"), "metre"),
        kind: UnitKind::Linear,
        conversion_factor: 1.0,
    })
});

static DEGREE: LazyLock<Arc<UnitOfMeasure>> = LazyLock::new(|| {
    Arc::new(UnitOfMeasure {
        props: ObjectProperties::identified(ObjectId::new("EPSG", "9122"), "degree"),
        kind: UnitKind::Angular,
        conversion_factor: std::f64::consts::PI / 180.0,
    })
});

impl UnitOfMeasure {
    pub fn metre() -> Arc<UnitOfMeasure> {
        METRE.clone()
    }

    pub fn degree() -> Arc<UnitOfMeasure> {
        DEGREE.clone()
    }

    pub fn name(&self) -> &str {
        &self.props.name
    }

    /// Same kind and conversion factor, identity ignored.
    pub fn is_equivalent_to(&self, other: &UnitOfMeasure) -> bool {
        self.kind == other.kind
            && (self.conversion_factor - other.conversion_factor).abs()
                <= 1e-10 * self.conversion_factor.abs()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub value: f64,
    pub unit: Arc<UnitOfMeasure>,
}

impl Measure {
    pub fn new(value: f64, unit: Arc<UnitOfMeasure>) -> Self {
        Measure { value, unit }
    }

    pub fn to_si(&self) -> f64 {
        self.value * self.unit.conversion_factor
    }
}
