//! Builders for unit tests.

use std::sync::Arc;

use crate::crs::{Crs, GeodeticCrs, GeodeticKind};
use crate::cs::{Axis, AxisDirection, CoordinateSystem, CsKind};
use crate::datum::{Ellipsoid, EllipsoidShape, GeodeticDatum, GeodeticReferenceFrame, PrimeMeridian};
use crate::extent::{Extent, GeographicBoundingBox};
use crate::ident::{ObjectId, ObjectProperties, ObjectUsage};
use crate::operation::{
    CoordinateOperation, OperationMethod, OperationParameter, ParameterValue, Transformation,
};
use crate::unit::{Measure, UnitOfMeasure};

fn axis(name: &str, direction: AxisDirection, unit: Arc<UnitOfMeasure>) -> Axis {
    Axis {
        name: name.to_string(),
        abbreviation: String::new(),
        direction,
        unit,
        meridian: None,
    }
}

pub fn geodetic(code: &str, kind: GeodeticKind, datum_code: &str) -> Crs {
    let deg = UnitOfMeasure::degree();
    let m = UnitOfMeasure::metre();
    let (cs_kind, axes) = match kind {
        GeodeticKind::Geographic2D => (
            CsKind::Ellipsoidal,
            vec![
                axis("Latitude", AxisDirection::North, deg.clone()),
                axis("Longitude", AxisDirection::East, deg),
            ],
        ),
        GeodeticKind::Geographic3D => (
            CsKind::Ellipsoidal,
            vec![
                axis("Latitude", AxisDirection::North, deg.clone()),
                axis("Longitude", AxisDirection::East, deg),
                axis("Ellipsoidal height", AxisDirection::Up, m),
            ],
        ),
        GeodeticKind::Geocentric => (
            CsKind::Cartesian,
            vec![
                axis("X", AxisDirection::GeocentricX, m.clone()),
                axis("Y", AxisDirection::GeocentricY, m.clone()),
                axis("Z", AxisDirection::GeocentricZ, m),
            ],
        ),
    };
    let cs = CoordinateSystem::try_new(None, cs_kind, axes).unwrap();

    let datum = GeodeticDatum::Frame(Arc::new(GeodeticReferenceFrame {
        props: ObjectProperties::identified(
            ObjectId::new("EPSG", datum_code),
            format!("Datum {datum_code}"),
        ),
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
    }));

    Crs::Geodetic(Arc::new(
        GeodeticCrs::try_new(
            ObjectProperties::identified(ObjectId::new("EPSG", code), format!("CRS {code}")),
            kind,
            datum,
            Arc::new(cs),
        )
        .unwrap(),
    ))
}

/// Geographic 2D CRS with a datum of its own.
pub fn geog2d(code: &str) -> Crs {
    geodetic(code, GeodeticKind::Geographic2D, &format!("d{code}"))
}

pub fn transformation(
    code: &str,
    name: &str,
    source: &Crs,
    target: &Crs,
    accuracy: Option<f64>,
) -> CoordinateOperation {
    CoordinateOperation::Transformation(Arc::new(
        Transformation::try_new(
            ObjectProperties::identified(ObjectId::new("EPSG", code), name),
            Arc::new(OperationMethod::new(
                ObjectId::new("EPSG", "9603"),
                "Geocentric translations (geog2D domain)",
            )),
            Vec::new(),
            source.clone(),
            target.clone(),
            None,
            accuracy,
            None,
        )
        .unwrap(),
    ))
}

pub fn grid_transformation(code: &str, source: &Crs, target: &Crs, grid: &str) -> CoordinateOperation {
    CoordinateOperation::Transformation(Arc::new(
        Transformation::try_new(
            ObjectProperties::identified(ObjectId::new("EPSG", code), format!("grid {code}")),
            Arc::new(OperationMethod::new(ObjectId::new("EPSG", "9615"), "NTv2")),
            vec![OperationParameter {
                props: ObjectProperties::identified(
                    ObjectId::new("EPSG", "8656"),
                    "Latitude and longitude difference file",
                ),
                value: ParameterValue::Filename(grid.to_string()),
            }],
            source.clone(),
            target.clone(),
            None,
            Some(1.0),
            None,
        )
        .unwrap(),
    ))
}

pub fn with_extent(op: CoordinateOperation, bbox: GeographicBoundingBox) -> CoordinateOperation {
    let usages = vec![ObjectUsage {
        scope: None,
        extent: Arc::new(Extent::from_bbox(bbox)),
    }];
    match op {
        CoordinateOperation::Transformation(t) => {
            let mut t = (*t).clone();
            t.props.usages = usages;
            CoordinateOperation::Transformation(Arc::new(t))
        }
        CoordinateOperation::Conversion(c) => {
            let mut c = (*c).clone();
            c.props.usages = usages;
            CoordinateOperation::Conversion(Arc::new(c))
        }
        CoordinateOperation::Concatenated(c) => {
            let mut c = (*c).clone();
            c.props.usages = usages;
            CoordinateOperation::Concatenated(Arc::new(c))
        }
    }
}
