//! Conversions between geodetic CRS sharing a datum.
//!
//! Datum-based pivot searches splice these between legs whose endpoints are
//! different CRS of the same datum (e.g. a 3D leg followed by a 2D leg).

use std::fmt;
use std::sync::Arc;

use crsdb_error::{Result, factory_err};

use crate::crs::{Crs, GeodeticCrs, GeodeticKind};
use crate::extent::Extent;
use crate::ident::{ObjectId, ObjectProperties, ObjectUsage};
use crate::operation::{Conversion, CoordinateOperation, OperationMethod};

/// Builds the adjustments needed to go between CRS of the same datum.
pub trait OperationComposer: fmt::Debug {
    /// Operations from `source` to `target`. Empty when the two are
    /// interchangeable.
    fn same_datum_operations(&self, source: &Crs, target: &Crs) -> Result<Vec<CoordinateOperation>>;
}

/// Default composer handling dimension changes, geographic/geocentric
/// conversions and horizontal axis order reversal.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeodeticConversions;

const GEOG3D_TO_2D: (&str, &str) = ("9659", "Geographic3D to 2D conversion");
const GEOG_GEOCENTRIC: (&str, &str) = ("9602", "Geographic/geocentric conversions");
const AXIS_ORDER_2D: (&str, &str) = ("9843", "Axis Order Reversal (2D)");
const AXIS_ORDER_3D: (&str, &str) = ("9844", "Axis Order Reversal (Geographic3D horizontal)");

fn tag(crs: &GeodeticCrs) -> &'static str {
    match crs.kind {
        GeodeticKind::Geographic2D => "geog2D",
        GeodeticKind::Geographic3D => "geog3D",
        GeodeticKind::Geocentric => "geocentric",
    }
}

fn conversion(
    method: (&str, &str),
    name: String,
    source: &Crs,
    target: &Crs,
) -> Result<CoordinateOperation> {
    let props = ObjectProperties::named(name).with_usages(vec![ObjectUsage {
        scope: None,
        extent: Arc::new(Extent::world()),
    }]);
    let conv = Conversion::try_new(
        props,
        Arc::new(OperationMethod::new(ObjectId::new("EPSG", method.0), method.1)),
        Vec::new(),
    )?;
    Ok(CoordinateOperation::Conversion(Arc::new(
        conv.bound_to(source.clone(), target.clone()),
    )))
}

fn named_conversion(
    method: (&str, &str),
    source: (&Crs, &GeodeticCrs),
    target: (&Crs, &GeodeticCrs),
) -> Result<CoordinateOperation> {
    let name = format!(
        "Conversion from {} ({}) to {} ({})",
        source.1.props.name,
        tag(source.1),
        target.1.props.name,
        tag(target.1)
    );
    conversion(method, name, source.0, target.0)
}

impl OperationComposer for GeodeticConversions {
    fn same_datum_operations(&self, source: &Crs, target: &Crs) -> Result<Vec<CoordinateOperation>> {
        let (Some(s), Some(t)) = (source.as_geodetic(), target.as_geodetic()) else {
            return Err(factory_err!(
                "cannot adjust between non-geodetic crs '{}' and '{}'",
                source.name(),
                target.name()
            ));
        };
        if source.is_equivalent_to(target) {
            return Ok(Vec::new());
        }
        if !s.datum.is_equivalent_to(&t.datum) {
            return Err(factory_err!(
                "'{}' and '{}' do not share a datum",
                source.name(),
                target.name()
            ));
        }

        use GeodeticKind::*;
        let op = match (s.kind, t.kind) {
            (Geographic3D, Geographic2D) => {
                named_conversion(GEOG3D_TO_2D, (source, s), (target, t))?
            }
            (Geographic2D, Geographic3D) => {
                named_conversion(GEOG3D_TO_2D, (target, t), (source, s))?.inverse()
            }
            (Geographic2D | Geographic3D, Geocentric) => {
                named_conversion(GEOG_GEOCENTRIC, (source, s), (target, t))?
            }
            (Geocentric, Geographic2D | Geographic3D) => {
                named_conversion(GEOG_GEOCENTRIC, (target, t), (source, s))?.inverse()
            }
            (a, b) if a == b && s.cs.has_swapped_horizontal_axes(&t.cs) => {
                let (method, name) = if a == Geographic2D {
                    (AXIS_ORDER_2D, "axis order change (2D)")
                } else {
                    (AXIS_ORDER_3D, "axis order change (geographic3D horizontal)")
                };
                conversion(method, name.to_string(), source, target)?
            }
            _ => {
                return Err(factory_err!(
                    "no conversion between '{}' and '{}'",
                    source.name(),
                    target.name()
                ));
            }
        };
        Ok(vec![op])
    }
}
