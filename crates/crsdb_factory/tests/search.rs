mod common;

use crsdb_core::datum::GeodeticDatum;
use crsdb_factory::{AuthorityFactory, FactoryObject, ObjectType};

use common::fixture;

fn ids(objects: &[FactoryObject]) -> Vec<String> {
    objects
        .iter()
        .map(|o| o.id().map(|id| id.to_string()).unwrap_or_default())
        .collect()
}

#[test]
fn objects_from_name() {
    struct TestCase {
        name: &'static str,
        authority: &'static str,
        query: &'static str,
        types: Vec<ObjectType>,
        approximate: bool,
        limit: usize,
        expected: Vec<&'static str>,
    }

    let fx = fixture();

    let test_cases = vec![
        TestCase {
            name: "exact, geographic only",
            authority: "EPSG",
            query: "WGS 84",
            types: vec![ObjectType::GeographicCrs],
            approximate: false,
            limit: 0,
            expected: vec!["EPSG:4326", "EPSG:4979"],
        },
        TestCase {
            name: "exact ignores case",
            authority: "EPSG",
            query: "dhdn",
            types: vec![ObjectType::GeodeticCrs],
            approximate: false,
            limit: 0,
            expected: vec!["EPSG:4314"],
        },
        TestCase {
            name: "alias of a crs",
            authority: "EPSG",
            query: "WGS84",
            types: vec![ObjectType::Crs],
            approximate: false,
            limit: 0,
            expected: vec!["EPSG:4326"],
        },
        TestCase {
            name: "alias of a datum",
            authority: "EPSG",
            query: "WGS84",
            types: vec![ObjectType::Datum],
            approximate: false,
            limit: 0,
            expected: vec!["EPSG:6326"],
        },
        TestCase {
            name: "approximate, deprecated last",
            authority: "EPSG",
            query: "ED50",
            types: vec![ObjectType::GeodeticCrs],
            approximate: true,
            limit: 0,
            expected: vec!["EPSG:4230", "EPSG:4801"],
        },
        TestCase {
            name: "limit truncates",
            authority: "EPSG",
            query: "WGS 84",
            types: vec![ObjectType::GeographicCrs],
            approximate: false,
            limit: 1,
            expected: vec!["EPSG:4326"],
        },
        TestCase {
            name: "authority restricts",
            authority: "XTEST",
            query: "WGS 84",
            types: vec![ObjectType::Crs],
            approximate: false,
            limit: 0,
            expected: vec![],
        },
        TestCase {
            name: "no match",
            authority: "",
            query: "Atlantis 1900",
            types: vec![],
            approximate: true,
            limit: 0,
            expected: vec![],
        },
    ];

    for test_case in test_cases {
        let factory = AuthorityFactory::new(&fx.ctx, test_case.authority);
        let objects = factory
            .create_objects_from_name(
                test_case.query,
                &test_case.types,
                test_case.approximate,
                test_case.limit,
            )
            .unwrap();
        assert_eq!(test_case.expected, ids(&objects), "{}", test_case.name);
    }
}

#[test]
fn datum_found_by_alias_is_the_ensemble() {
    let fx = fixture();
    let factory = AuthorityFactory::new(&fx.ctx, "EPSG");

    let objects = factory
        .create_objects_from_name("WGS84", &[ObjectType::Datum], false, 0)
        .unwrap();
    let [FactoryObject::GeodeticDatum(GeodeticDatum::Ensemble(ensemble))] = objects.as_slice()
    else {
        panic!("expected one ensemble, got {objects:?}");
    };
    assert_eq!("World Geodetic System 1984 ensemble", ensemble.props.name);
}

#[test]
fn approximate_datum_names_refresh_after_insert() {
    let fx = fixture();
    let factory = AuthorityFactory::new(&fx.ctx, "");

    let before = factory
        .create_objects_from_name("Hauptdreiecksnetz", &[ObjectType::Datum], true, 0)
        .unwrap();
    assert_eq!(vec!["EPSG:6314"], ids(&before));

    fx.ctx.start_insert_statements_session().unwrap();
    let datum = factory.create_geodetic_datum("6314").unwrap();
    let mut props = datum.props.clone();
    props.id = None;
    props.name = "Hauptdreiecksnetz Copy".to_string();
    let copy = GeodeticDatum::Frame(std::sync::Arc::new(
        crsdb_core::datum::GeodeticReferenceFrame {
            props,
            ..(*datum).clone()
        },
    ));
    factory
        .get_insert_statements_for(
            &FactoryObject::GeodeticDatum(copy),
            "HOBU",
            "D1",
            false,
            &["EPSG".to_string()],
        )
        .unwrap();

    let after = factory
        .create_objects_from_name("Hauptdreiecksnetz", &[ObjectType::Datum], true, 0)
        .unwrap();
    assert_eq!(vec!["EPSG:6314", "HOBU:D1"], ids(&after));
    fx.ctx.stop_insert_statements_session().unwrap();
}
