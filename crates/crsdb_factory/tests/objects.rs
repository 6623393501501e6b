mod common;

use std::sync::Arc;

use crsdb_core::crs::{Crs, GeodeticKind};
use crsdb_core::cs::AxisDirection;
use crsdb_core::datum::{EllipsoidShape, EnsembleMembers, GeodeticDatum};
use crsdb_core::operation::{CoordinateOperation, ParameterValue};
use crsdb_core::unit::UnitKind;
use crsdb_error::FactoryError;
use crsdb_factory::{AuthorityFactory, FactoryObject, ObjectType};

use common::{fixture, fixture_with, named_parser};

#[test]
fn units_and_extents() {
    let fx = fixture();
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");

    let degree = epsg.create_unit_of_measure("9122").unwrap();
    assert_eq!("degree", degree.name());
    assert_eq!(UnitKind::Angular, degree.kind);
    assert!((degree.conversion_factor - std::f64::consts::PI / 180.0).abs() < 1e-15);

    let germany = epsg.create_extent("3339").unwrap();
    assert_eq!(Some("Germany - onshore."), germany.description.as_deref());
    let bbox = germany.bbox.unwrap();
    assert_eq!(47.27, bbox.south);
    assert_eq!(5.87, bbox.west);
    assert_eq!(55.09, bbox.north);
    assert_eq!(15.04, bbox.east);
}

#[test]
fn ellipsoid_shapes() {
    struct TestCase {
        code: &'static str,
        sphere: bool,
        inverse_flattening: f64,
    }

    let fx = fixture();
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");

    let test_cases = [
        TestCase {
            code: "7030",
            sphere: false,
            inverse_flattening: 298.257223563,
        },
        TestCase {
            code: "7059",
            sphere: true,
            inverse_flattening: 0.0,
        },
        TestCase {
            code: "7008",
            sphere: false,
            inverse_flattening: 6378206.4 / (6378206.4 - 6356583.8),
        },
    ];

    for test_case in test_cases {
        let ellipsoid = epsg.create_ellipsoid(test_case.code).unwrap();
        assert_eq!(test_case.sphere, ellipsoid.is_sphere(), "{}", test_case.code);
        assert!(
            (test_case.inverse_flattening - ellipsoid.inverse_flattening()).abs() < 1e-9,
            "{}",
            test_case.code
        );
        assert_eq!("Earth", ellipsoid.celestial_body);
    }

    let clarke = epsg.create_ellipsoid("7008").unwrap();
    assert!(matches!(clarke.shape, EllipsoidShape::SemiMinorAxis(_)));
}

#[test]
fn datum_ensemble_and_flattened_frame() {
    let fx = fixture();
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");

    let datum = epsg.create_geodetic_datum_or_ensemble("6326").unwrap();
    let GeodeticDatum::Ensemble(ensemble) = &datum else {
        panic!("expected an ensemble, got {datum:?}");
    };
    assert_eq!(2.0, ensemble.accuracy);
    let EnsembleMembers::Geodetic(members) = &ensemble.members else {
        panic!("expected geodetic members");
    };
    let names: Vec<_> = members.iter().map(|m| m.props.name.as_str()).collect();
    assert_eq!(
        vec![
            "World Geodetic System 1984 (Transit)",
            "World Geodetic System 1984 (G730)"
        ],
        names
    );

    let frame = epsg.create_geodetic_datum("6326").unwrap();
    assert_eq!("World Geodetic System 1984", frame.props.name);
    assert_eq!("WGS 84", frame.ellipsoid.props.name);

    assert!(epsg.create_datum_ensemble("6326").is_ok());
    assert!(epsg.create_datum_ensemble("6258").is_err());

    let etrs89 = epsg.create_geodetic_datum("6258").unwrap();
    assert_eq!(
        Some(chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()),
        etrs89.publication_date
    );
    let ed50 = epsg.create_geodetic_datum("6230").unwrap();
    assert_eq!(Some("Fundamentalpunkt: Potsdam"), ed50.anchor.as_deref());
}

#[test]
fn polar_axes_carry_meridians() {
    let fx = fixture();
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");

    let cs = epsg.create_coordinate_system("1044").unwrap();
    assert_eq!(2, cs.dimension());
    let axes: Vec<_> = cs
        .axes
        .iter()
        .map(|a| (a.direction.clone(), a.meridian.as_ref().map(|m| m.value)))
        .collect();
    assert_eq!(
        vec![
            (AxisDirection::South, Some(90.0)),
            (AxisDirection::South, Some(180.0)),
        ],
        axes
    );

    let ellipsoidal = epsg.create_coordinate_system("6423").unwrap();
    assert_eq!(AxisDirection::Up, ellipsoidal.axes[2].direction);
    assert_eq!("metre", ellipsoidal.axes[2].unit.name());
}

#[test]
fn crs_of_every_kind() {
    let fx = fixture();
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");

    let wgs84 = epsg.create_geographic_crs("4326").unwrap();
    assert_eq!(GeodeticKind::Geographic2D, wgs84.kind);
    assert_eq!(
        Some("World."),
        wgs84.props.domain_extent().and_then(|e| e.description.as_deref())
    );
    assert!(epsg.create_geographic_crs("4978").is_err());

    let projected = epsg.create_projected_crs("32631").unwrap();
    assert_eq!("WGS 84", projected.base.props.name);
    assert_eq!("Transverse Mercator", projected.conversion.method.props.name);
    let values: Vec<_> = projected
        .conversion
        .parameters
        .iter()
        .map(|p| match &p.value {
            ParameterValue::Measure(m) => m.value,
            ParameterValue::Filename(_) => f64::NAN,
        })
        .collect();
    assert_eq!(vec![0.0, 3.0, 0.9996, 500000.0, 0.0], values);

    let vertical = epsg.create_vertical_crs("5773").unwrap();
    assert_eq!("EGM96 geoid", vertical.datum.props().name);

    let compound = epsg.create_compound_crs("9707").unwrap();
    let names: Vec<_> = compound.components.iter().map(|c| c.name()).collect();
    assert_eq!(vec!["WGS 84", "EGM96 height"], names);

    let any = epsg.create_coordinate_reference_system("5773").unwrap();
    assert!(matches!(any, Crs::Vertical(_)));
}

#[test]
fn repeated_creation_hits_the_cache() {
    let fx = fixture();
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");

    let a = epsg.create_ellipsoid("7022").unwrap();
    let b = epsg.create_ellipsoid("7022").unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    let (Crs::Geodetic(a), Crs::Geodetic(b)) = (
        epsg.create_coordinate_reference_system("4230").unwrap(),
        epsg.create_coordinate_reference_system("4230").unwrap(),
    ) else {
        panic!("expected geodetic crs");
    };
    assert!(Arc::ptr_eq(&a, &b));

    fx.ctx.clear_caches();
    let c = epsg.create_ellipsoid("7022").unwrap();
    assert!(!Arc::ptr_eq(a.datum.ellipsoid().unwrap(), &c));
}

#[test]
fn cached_crs_of_one_kind_not_returned_for_another() {
    type Lookup = fn(&AuthorityFactory<'_>, &str) -> crsdb_error::Result<()>;

    struct TestCase {
        warm: &'static str,
        lookup: Lookup,
        kind: &'static str,
    }

    let geodetic: Lookup = |f, code| f.create_geodetic_crs(code).map(|_| ());
    let projected: Lookup = |f, code| f.create_projected_crs(code).map(|_| ());
    let vertical: Lookup = |f, code| f.create_vertical_crs(code).map(|_| ());
    let compound: Lookup = |f, code| f.create_compound_crs(code).map(|_| ());

    let test_cases = vec![
        TestCase { warm: "4326", lookup: projected, kind: "projected" },
        TestCase { warm: "4326", lookup: vertical, kind: "vertical" },
        TestCase { warm: "3857", lookup: geodetic, kind: "geodetic" },
        TestCase { warm: "5773", lookup: compound, kind: "compound" },
        TestCase { warm: "9707", lookup: vertical, kind: "vertical" },
        TestCase { warm: "9707", lookup: geodetic, kind: "geodetic" },
    ];

    for test_case in test_cases {
        let fx = fixture();
        let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");

        let cold = (test_case.lookup)(&epsg, test_case.warm).unwrap_err();
        assert!(cold.is_no_such_code(), "{} as {}: {cold}", test_case.warm, test_case.kind);

        epsg.create_coordinate_reference_system(test_case.warm).unwrap();
        let warm = (test_case.lookup)(&epsg, test_case.warm).unwrap_err();
        assert!(warm.is_no_such_code(), "{} as {}: {warm}", test_case.warm, test_case.kind);
    }
}

#[test]
fn operations_from_each_table() {
    let fx = fixture();
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");
    let xtest = AuthorityFactory::new(&fx.ctx, "XTEST");

    let helmert = epsg.create_coordinate_operation("1613", false).unwrap();
    let CoordinateOperation::Transformation(t) = &helmert else {
        panic!("expected a transformation");
    };
    assert_eq!(7, t.parameters.len());
    assert_eq!(Some(2.0), helmert.accuracy());

    let grid = epsg.create_coordinate_operation("1241", true).unwrap();
    assert_eq!(vec!["conus.las", "conus.los"], grid.grid_names());

    let catalog_name = epsg.create_coordinate_operation("15948", false).unwrap();
    assert_eq!(vec!["BETA2007.gsb"], catalog_name.grid_names());
    let distributed_name = epsg.create_coordinate_operation("15948", true).unwrap();
    assert_eq!(vec!["de_adv_BETA2007.tif"], distributed_name.grid_names());

    let other = xtest.create_coordinate_operation("2003", false).unwrap();
    let CoordinateOperation::Transformation(t) = &other else {
        panic!("expected a transformation");
    };
    assert_eq!(2, t.parameters.len());

    let conversion = epsg.create_conversion("3856").unwrap();
    assert!(!conversion.is_bound());
    assert_eq!(4, conversion.parameters.len());
}

#[test]
fn concatenated_operations() {
    let fx = fixture();
    let xtest = AuthorityFactory::new(&fx.ctx, "XTEST");

    let op = xtest.create_coordinate_operation("3001", false).unwrap();
    let CoordinateOperation::Concatenated(concat) = &op else {
        panic!("expected a concatenated operation");
    };
    assert_eq!(2, concat.steps.len());
    assert_eq!(Some(2.5), op.accuracy());

    let op = xtest.create_coordinate_operation("3002", false).unwrap();
    let CoordinateOperation::Concatenated(concat) = &op else {
        panic!("expected a concatenated operation");
    };
    assert!(!concat.steps[0].is_inverted());
    assert!(concat.steps[1].is_inverted());
    assert_eq!(Some(12.0), op.accuracy());

    let op = xtest.create_coordinate_operation("3003", false).unwrap();
    let CoordinateOperation::Concatenated(concat) = &op else {
        panic!("expected a concatenated operation");
    };
    assert!(concat.steps.iter().all(|s| s.is_inverted()));
    assert_eq!(Some("WGS 84"), op.source_crs().map(|c| c.name()));
    assert_eq!(Some("ED50"), op.target_crs().map(|c| c.name()));
}

#[test]
fn lookup_errors() {
    let fx = fixture();
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");
    let xtest = AuthorityFactory::new(&fx.ctx, "XTEST");

    let err = epsg.create_coordinate_reference_system("999999").unwrap_err();
    assert!(err.is_no_such_code(), "{err}");

    let err = xtest.create_coordinate_reference_system("1006").unwrap_err();
    assert!(!err.is_no_such_code(), "{err}");
    assert!(matches!(err, FactoryError::Factory(_)), "{err}");

    let err = epsg.create_object("1024").unwrap_err();
    assert!(err.to_string().contains("ambiguous"), "{err}");

    let FactoryObject::Unit(unit) = epsg.create_object("9001").unwrap() else {
        panic!("expected a unit");
    };
    assert_eq!("metre", unit.name());
}

#[test]
fn text_definitions_resolve_by_name() {
    let fx = fixture();
    let xtest = AuthorityFactory::new(&fx.ctx, "XTEST").with_text_parser(named_parser());

    let crs = xtest.create_coordinate_reference_system("1005").unwrap();
    assert_eq!("XTEST alias", crs.name());
    assert!(crs.is_geographic());
    assert_eq!(Some("XTEST"), crs.id().map(|id| id.authority.as_str()));

    let projected = xtest.create_projected_crs("5001").unwrap();
    assert_eq!("XTEST projected", projected.props.name);
    assert_eq!("UTM zone 31N", projected.conversion.props.name);

    assert!(xtest.create_projected_crs("1005").unwrap_err().is_no_such_code());
}

#[test]
fn self_referencing_text_definition_hits_depth_limit() {
    let fx = fixture();
    let xtest = AuthorityFactory::new(&fx.ctx, "XTEST").with_text_parser(named_parser());

    let err = xtest.create_coordinate_reference_system("1004").unwrap_err();
    assert!(matches!(err, FactoryError::RecursionLimit { .. }), "{err}");
    assert!(err.is_fatal());
}

#[test]
fn text_definition_referencing_a_code() {
    let fx = fixture();
    let xtest = AuthorityFactory::new(&fx.ctx, "XTEST").with_text_parser(named_parser());

    let crs = xtest.create_geodetic_crs("1009").unwrap();
    assert_eq!("XTEST ref", crs.name());
    assert!(crs.is_geographic());

    let err = xtest.create_geodetic_crs("1008").unwrap_err();
    assert!(matches!(err, FactoryError::RecursionLimit { .. }), "{err}");
    assert!(err.is_fatal());
}

#[test]
fn text_definition_without_parser_fails() {
    let fx = fixture();
    let xtest = AuthorityFactory::new(&fx.ctx, "XTEST");
    let err = xtest.create_coordinate_reference_system("1005").unwrap_err();
    assert!(err.to_string().contains("parser"), "{err}");
}

#[test]
fn older_layout_degrades() {
    let fx = fixture_with("0", Vec::new());
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");
    let xtest = AuthorityFactory::new(&fx.ctx, "XTEST").with_text_parser(named_parser());

    let etrs89 = epsg.create_geodetic_datum("6258").unwrap();
    assert_eq!(None, etrs89.publication_date);

    // Text definitions are ignored, leaving an incomplete row.
    assert!(xtest.create_coordinate_reference_system("1005").is_err());

    assert!(fx.ctx.start_insert_statements_session().is_err());
}

#[test]
fn listings() {
    let fx = fixture();
    let epsg = AuthorityFactory::new(&fx.ctx, "EPSG");
    let xtest = AuthorityFactory::new(&fx.ctx, "XTEST");
    let any = AuthorityFactory::new(&fx.ctx, "");

    let codes = epsg.get_authority_codes(ObjectType::GeographicCrs, false).unwrap();
    assert_eq!(
        vec!["4230", "4258", "4267", "4269", "4314", "4326", "4937", "4979"],
        codes
    );
    let codes = epsg.get_authority_codes(ObjectType::GeographicCrs, true).unwrap();
    assert!(codes.contains(&"4801".to_string()));

    let codes = xtest.get_authority_codes(ObjectType::ConcatenatedOperation, false).unwrap();
    assert_eq!(vec!["3001", "3002", "3003"], codes);

    assert_eq!("WGS 84 / Pseudo-Mercator", epsg.get_description_text("3857").unwrap());
    assert!(epsg.get_description_text("999999").unwrap_err().is_no_such_code());

    let infos = epsg.get_crs_info_list().unwrap();
    let mercator = infos.iter().find(|i| i.code == "3857").unwrap();
    assert_eq!(
        Some("Popular Visualisation Pseudo Mercator"),
        mercator.projection_method_name.as_deref()
    );
    assert_eq!(Some("Earth"), mercator.celestial_body_name.as_deref());
    assert_eq!(Some("World"), mercator.area_name.as_deref());
    let ed50 = infos.iter().find(|i| i.code == "4230").unwrap();
    assert_eq!("geographic 2D", ed50.crs_type);

    let units = epsg.get_unit_list().unwrap();
    let foot = units.iter().find(|u| u.code == "9002").unwrap();
    assert!(foot.deprecated);
    assert_eq!(Some("ft"), foot.proj_short_name.as_deref());

    let bodies = any.get_celestial_body_list().unwrap();
    assert_eq!(1, bodies.len());
    assert_eq!("Earth", bodies[0].name);

    let authorities = any.get_authorities().unwrap();
    assert!(authorities.contains(&"EPSG".to_string()));
    assert!(authorities.contains(&"XTEST".to_string()));
}
