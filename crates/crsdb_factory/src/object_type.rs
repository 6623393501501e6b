/// Kind of object for listings and name searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    PrimeMeridian,
    Ellipsoid,
    Datum,
    GeodeticReferenceFrame,
    VerticalReferenceFrame,
    DatumEnsemble,
    Crs,
    GeodeticCrs,
    GeographicCrs,
    Geographic2DCrs,
    Geographic3DCrs,
    GeocentricCrs,
    ProjectedCrs,
    VerticalCrs,
    CompoundCrs,
    CoordinateOperation,
    Conversion,
    Transformation,
    ConcatenatedOperation,
    Unit,
    Extent,
    CoordinateSystem,
}

/// Rows of `object_view` matching a type: a table and, optionally, the
/// accepted values of the view's `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFilter {
    pub table: &'static str,
    pub types: Option<&'static [&'static str]>,
}

const fn any(table: &'static str) -> TableFilter {
    TableFilter { table, types: None }
}

const fn typed(table: &'static str, types: &'static [&'static str]) -> TableFilter {
    TableFilter {
        table,
        types: Some(types),
    }
}

const GEOGRAPHIC: &[&str] = &["geographic 2D", "geographic 3D"];

impl ObjectType {
    /// Types searched by name when the caller gives none.
    pub const DEFAULT_NAME_SEARCH: &'static [ObjectType] = &[
        ObjectType::PrimeMeridian,
        ObjectType::Ellipsoid,
        ObjectType::Datum,
        ObjectType::Crs,
        ObjectType::CoordinateOperation,
    ];

    pub fn filters(&self) -> Vec<TableFilter> {
        match self {
            ObjectType::PrimeMeridian => vec![any("prime_meridian")],
            ObjectType::Ellipsoid => vec![any("ellipsoid")],
            ObjectType::Datum => vec![any("geodetic_datum"), any("vertical_datum")],
            ObjectType::GeodeticReferenceFrame => vec![typed("geodetic_datum", &["datum"])],
            ObjectType::VerticalReferenceFrame => vec![typed("vertical_datum", &["datum"])],
            ObjectType::DatumEnsemble => vec![
                typed("geodetic_datum", &["ensemble"]),
                typed("vertical_datum", &["ensemble"]),
            ],
            ObjectType::Crs => vec![
                any("geodetic_crs"),
                any("projected_crs"),
                any("vertical_crs"),
                any("compound_crs"),
            ],
            ObjectType::GeodeticCrs => vec![any("geodetic_crs")],
            ObjectType::GeographicCrs => vec![typed("geodetic_crs", GEOGRAPHIC)],
            ObjectType::Geographic2DCrs => vec![typed("geodetic_crs", &["geographic 2D"])],
            ObjectType::Geographic3DCrs => vec![typed("geodetic_crs", &["geographic 3D"])],
            ObjectType::GeocentricCrs => vec![typed("geodetic_crs", &["geocentric"])],
            ObjectType::ProjectedCrs => vec![any("projected_crs")],
            ObjectType::VerticalCrs => vec![any("vertical_crs")],
            ObjectType::CompoundCrs => vec![any("compound_crs")],
            ObjectType::CoordinateOperation => vec![
                any("conversion"),
                any("helmert_transformation"),
                any("grid_transformation"),
                any("other_transformation"),
                any("concatenated_operation"),
            ],
            ObjectType::Conversion => vec![any("conversion")],
            ObjectType::Transformation => vec![
                any("helmert_transformation"),
                any("grid_transformation"),
                any("other_transformation"),
            ],
            ObjectType::ConcatenatedOperation => vec![any("concatenated_operation")],
            ObjectType::Unit => vec![any("unit_of_measure")],
            ObjectType::Extent => vec![any("extent")],
            ObjectType::CoordinateSystem => vec![any("coordinate_system")],
        }
    }
}

/// `(table_name = 'a' AND type IN (...)) OR ...` over `object_view` columns
/// prefixed with `alias`. Only static table and type names are inlined.
pub(crate) fn filter_condition(types: &[ObjectType], alias: &str) -> String {
    let mut terms = Vec::new();
    for ty in types {
        for filter in ty.filters() {
            let term = match filter.types {
                None => format!("{alias}.table_name = '{}'", filter.table),
                Some(types) => format!(
                    "({alias}.table_name = '{}' AND {alias}.type IN ({}))",
                    filter.table,
                    types
                        .iter()
                        .map(|t| format!("'{t}'"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            };
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    if terms.is_empty() {
        return "1 = 0".to_string();
    }
    format!("({})", terms.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions() {
        struct TestCase {
            types: &'static [ObjectType],
            expected: &'static str,
        }

        let test_cases = [
            TestCase {
                types: &[ObjectType::Ellipsoid],
                expected: "(o.table_name = 'ellipsoid')",
            },
            TestCase {
                types: &[ObjectType::Geographic2DCrs],
                expected: "((o.table_name = 'geodetic_crs' AND o.type IN ('geographic 2D')))",
            },
            TestCase {
                types: &[ObjectType::Datum, ObjectType::GeodeticReferenceFrame],
                expected: "(o.table_name = 'geodetic_datum' OR o.table_name = 'vertical_datum' \
                           OR (o.table_name = 'geodetic_datum' AND o.type IN ('datum')))",
            },
            TestCase {
                types: &[],
                expected: "1 = 0",
            },
        ];

        for case in test_cases {
            assert_eq!(case.expected, filter_condition(case.types, "o"), "{:?}", case.types);
        }
    }
}
