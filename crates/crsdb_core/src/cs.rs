use std::sync::Arc;

use crsdb_error::{Result, factory_err};

use crate::ident::ObjectId;
use crate::unit::{Measure, UnitOfMeasure};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AxisDirection {
    North,
    South,
    East,
    West,
    Up,
    Down,
    GeocentricX,
    GeocentricY,
    GeocentricZ,
    Other(String),
}

impl AxisDirection {
    pub fn from_catalog(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "north" => AxisDirection::North,
            "south" => AxisDirection::South,
            "east" => AxisDirection::East,
            "west" => AxisDirection::West,
            "up" => AxisDirection::Up,
            "down" => AxisDirection::Down,
            "geocentricx" => AxisDirection::GeocentricX,
            "geocentricy" => AxisDirection::GeocentricY,
            "geocentricz" => AxisDirection::GeocentricZ,
            _ => AxisDirection::Other(s.to_string()),
        }
    }

    pub fn as_catalog(&self) -> &str {
        match self {
            AxisDirection::North => "north",
            AxisDirection::South => "south",
            AxisDirection::East => "east",
            AxisDirection::West => "west",
            AxisDirection::Up => "up",
            AxisDirection::Down => "down",
            AxisDirection::GeocentricX => "geocentricX",
            AxisDirection::GeocentricY => "geocentricY",
            AxisDirection::GeocentricZ => "geocentricZ",
            AxisDirection::Other(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub abbreviation: String,
    pub direction: AxisDirection,
    pub unit: Arc<UnitOfMeasure>,
    /// Meridian for polar axes, e.g. "North along 90°E".
    pub meridian: Option<Measure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsKind {
    Ellipsoidal,
    Cartesian,
    Vertical,
    Ordinal,
    Spherical,
}

impl CsKind {
    pub fn from_catalog_type(s: &str) -> Option<Self> {
        Some(match s {
            "ellipsoidal" => CsKind::Ellipsoidal,
            "Cartesian" => CsKind::Cartesian,
            "vertical" => CsKind::Vertical,
            "ordinal" => CsKind::Ordinal,
            "spherical" => CsKind::Spherical,
            _ => return None,
        })
    }

    pub fn as_catalog_type(&self) -> &'static str {
        match self {
            CsKind::Ellipsoidal => "ellipsoidal",
            CsKind::Cartesian => "Cartesian",
            CsKind::Vertical => "vertical",
            CsKind::Ordinal => "ordinal",
            CsKind::Spherical => "spherical",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSystem {
    pub id: Option<ObjectId>,
    pub kind: CsKind,
    pub axes: Vec<Axis>,
}

impl CoordinateSystem {
    pub fn try_new(id: Option<ObjectId>, kind: CsKind, axes: Vec<Axis>) -> Result<Self> {
        let valid = match kind {
            CsKind::Ellipsoidal | CsKind::Cartesian | CsKind::Spherical => {
                axes.len() == 2 || axes.len() == 3
            }
            CsKind::Vertical => axes.len() == 1,
            CsKind::Ordinal => !axes.is_empty(),
        };
        if !valid {
            return Err(factory_err!(
                "{} coordinate system cannot have {} axes",
                kind.as_catalog_type(),
                axes.len()
            ));
        }
        Ok(CoordinateSystem { id, kind, axes })
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    /// Same axis directions and equivalent units, identity ignored.
    pub fn has_same_axes(&self, other: &CoordinateSystem) -> bool {
        self.kind == other.kind
            && self.axes.len() == other.axes.len()
            && self
                .axes
                .iter()
                .zip(&other.axes)
                .all(|(a, b)| a.direction == b.direction && a.unit.is_equivalent_to(&b.unit))
    }

    /// Same axes as `other` once the first two are swapped.
    pub fn has_swapped_horizontal_axes(&self, other: &CoordinateSystem) -> bool {
        if self.kind != other.kind || self.axes.len() != other.axes.len() || self.axes.len() < 2 {
            return false;
        }
        self.axes[0].direction == other.axes[1].direction
            && self.axes[1].direction == other.axes[0].direction
            && self.axes[0].direction != self.axes[1].direction
            && self.axes[2..]
                .iter()
                .zip(&other.axes[2..])
                .all(|(a, b)| a.direction == b.direction)
    }
}
