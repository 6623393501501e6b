//! Lookup of objects by name, and by code across all object kinds.

use std::collections::HashSet;

use tracing::debug;

use crsdb_core::ident::ObjectId;
use crsdb_core::name::canonicalize_name;
use crsdb_error::{FactoryError, Qualified, Result, factory_err};
use crsdb_sqlite::exec::SqlBuilder;

use crate::factory::{AuthorityFactory, FactoryObject, ResolveDepth};
use crate::object_type::{ObjectType, filter_condition};

const DATUM_TABLES: [&str; 2] = ["geodetic_datum", "vertical_datum"];

/// A row matching a name search, before the object is built.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameMatch {
    table: String,
    id: ObjectId,
    deprecated: bool,
    partial: bool,
    type_rank: usize,
}

/// Position of `table` among the tables the requested types cover.
fn type_rank(types: &[ObjectType], table: &str) -> usize {
    types
        .iter()
        .flat_map(|t| t.filters())
        .position(|f| f.table == table)
        .unwrap_or(usize::MAX)
}

impl AuthorityFactory<'_> {
    /// Objects whose name (or alias) matches `name`.
    ///
    /// Exact matching ignores case. Approximate matching compares
    /// canonicalized names and accepts any name containing the query.
    /// Non-deprecated objects come first, then exact matches, then by type
    /// order of `types`. A `limit` of 0 returns everything.
    pub fn create_objects_from_name(
        &self,
        name: &str,
        types: &[ObjectType],
        approximate: bool,
        limit: usize,
    ) -> Result<Vec<FactoryObject>> {
        self.objects_from_name_at(name, types, approximate, limit, ResolveDepth::ROOT)
    }

    pub(crate) fn objects_from_name_at(
        &self,
        name: &str,
        types: &[ObjectType],
        approximate: bool,
        limit: usize,
        depth: ResolveDepth,
    ) -> Result<Vec<FactoryObject>> {
        let types = if types.is_empty() {
            ObjectType::DEFAULT_NAME_SEARCH
        } else {
            types
        };

        let mut matches = if approximate {
            self.approximate_matches(name, types)?
        } else {
            self.exact_matches(name, types)?
        };
        matches.sort_by(|a, b| {
            (a.deprecated, a.partial, a.type_rank, &a.id.authority, &a.id.code).cmp(&(
                b.deprecated,
                b.partial,
                b.type_rank,
                &b.id.authority,
                &b.id.code,
            ))
        });
        let mut seen = HashSet::new();
        matches.retain(|m| seen.insert((m.table.clone(), m.id.clone())));

        let mut objects = Vec::new();
        for m in matches {
            if limit > 0 && objects.len() >= limit {
                break;
            }
            match self
                .with_authority(&m.id.authority)
                .create_object_of(&m.table, &m.id.code, depth)
            {
                Ok(obj) => objects.push(obj),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!(id = %m.id, error = %e, "skipping name match"),
            }
        }
        Ok(objects)
    }

    fn exact_matches(&self, name: &str, types: &[ObjectType]) -> Result<Vec<NameMatch>> {
        let mut builder = SqlBuilder::new("");
        let name_param = builder.bind(name);
        let auth_param = (!self.is_any_authority()).then(|| builder.bind(self.authority()));
        let cond = filter_condition(types, "o");
        let auth_cond = auth_param
            .map(|p| format!(" AND o.auth_name = {p}"))
            .unwrap_or_default();

        builder.push(&format!(
            "SELECT o.table_name, o.auth_name, o.code, o.deprecated FROM object_view o \
             WHERE {cond}{auth_cond} AND lower(o.name) = lower({name_param}) \
             UNION SELECT o.table_name, o.auth_name, o.code, o.deprecated FROM alias_name a \
             JOIN object_view o ON o.table_name = a.table_name AND o.auth_name = a.auth_name \
             AND o.code = a.code \
             WHERE {cond}{auth_cond} AND lower(a.alt_name) = lower({name_param})"
        ));

        self.run(builder.sql(), builder.params())?
            .iter()
            .map(|row| {
                let table = row.get_string(0)?;
                Ok(NameMatch {
                    type_rank: type_rank(types, &table),
                    table,
                    id: ObjectId::new(row.get_string(1)?, row.get_string(2)?),
                    deprecated: row.get_bool(3)?,
                    partial: false,
                })
            })
            .collect()
    }

    fn approximate_matches(&self, name: &str, types: &[ObjectType]) -> Result<Vec<NameMatch>> {
        let query = canonicalize_name(name);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        // Datums (aliases included) matched through the memoized canonical
        // names, value is whether the match is exact.
        let mut datum_hits: Vec<(String, ObjectId, bool)> = Vec::new();
        for (canonical, entries) in self.context().canonical_datum_names()?.iter() {
            if !canonical.contains(&query) {
                continue;
            }
            let exact = *canonical == query;
            for (table, id) in entries {
                datum_hits.push((table.clone(), id.clone(), exact));
            }
        }
        let datum_hit = |table: &str, id: &ObjectId| -> Option<bool> {
            let mut hit = None;
            for (t, i, exact) in &datum_hits {
                if t == table && i == id {
                    hit = Some(hit.unwrap_or(false) || *exact);
                }
            }
            hit
        };

        let mut builder = SqlBuilder::new("");
        let auth_cond = if self.is_any_authority() {
            String::new()
        } else {
            format!(" AND o.auth_name = {}", builder.bind(self.authority()))
        };
        let cond = filter_condition(types, "o");
        builder.push(&format!(
            "SELECT o.table_name, o.auth_name, o.code, o.deprecated, o.name FROM object_view o \
             WHERE {cond}{auth_cond} AND o.name IS NOT NULL \
             UNION ALL SELECT o.table_name, o.auth_name, o.code, o.deprecated, a.alt_name \
             FROM alias_name a JOIN object_view o ON o.table_name = a.table_name \
             AND o.auth_name = a.auth_name AND o.code = a.code \
             WHERE {cond}{auth_cond}"
        ));

        let mut matches = Vec::new();
        for row in self.run(builder.sql(), builder.params())? {
            let table = row.get_string(0)?;
            let id = ObjectId::new(row.get_string(1)?, row.get_string(2)?);
            let exact = if DATUM_TABLES.contains(&table.as_str()) {
                datum_hit(&table, &id)
            } else {
                let candidate = canonicalize_name(&row.get_string(4)?);
                candidate.contains(&query).then_some(candidate == query)
            };
            let Some(exact) = exact else {
                continue;
            };
            matches.push(NameMatch {
                type_rank: type_rank(types, &table),
                table,
                id,
                deprecated: row.get_bool(3)?,
                partial: !exact,
            });
        }
        Ok(matches)
    }

    /// Object with this code, whatever its kind. Fails when the code is used
    /// by objects of several kinds.
    pub fn create_object(&self, code: &str) -> Result<FactoryObject> {
        let rows = self.run(
            "SELECT DISTINCT table_name FROM object_view WHERE auth_name = ?1 AND code = ?2 \
             ORDER BY table_name",
            &self.key_params(code),
        )?;
        let tables = rows
            .iter()
            .map(|row| row.get_string(0))
            .collect::<Result<Vec<_>>>()?;
        match tables.as_slice() {
            [] => Err(FactoryError::no_such_code("object", self.authority(), code)),
            [table] => self.create_object_of(table, code, ResolveDepth::ROOT),
            _ => Err(factory_err!(
                "{} is ambiguous: it is found in tables {}",
                Qualified(self.authority(), code),
                tables.join(", ")
            )),
        }
    }

    pub(crate) fn create_object_of(
        &self,
        table: &str,
        code: &str,
        depth: ResolveDepth,
    ) -> Result<FactoryObject> {
        Ok(match table {
            "unit_of_measure" => FactoryObject::Unit(self.create_unit_of_measure(code)?),
            "extent" => FactoryObject::Extent(self.create_extent(code)?),
            "prime_meridian" => FactoryObject::PrimeMeridian(self.create_prime_meridian(code)?),
            "ellipsoid" => FactoryObject::Ellipsoid(self.create_ellipsoid(code)?),
            "geodetic_datum" => {
                FactoryObject::GeodeticDatum(self.create_geodetic_datum_or_ensemble(code)?)
            }
            "vertical_datum" => {
                FactoryObject::VerticalDatum(self.create_vertical_datum_or_ensemble(code)?)
            }
            "coordinate_system" => {
                FactoryObject::CoordinateSystem(self.create_coordinate_system(code)?)
            }
            "geodetic_crs" | "projected_crs" | "vertical_crs" | "compound_crs" => {
                FactoryObject::Crs(self.crs_from_table(table, code, depth)?)
            }
            "conversion"
            | "helmert_transformation"
            | "grid_transformation"
            | "other_transformation"
            | "concatenated_operation" => {
                FactoryObject::Operation(self.operation_from_table(table, code, true)?)
            }
            other => {
                return Err(factory_err!(
                    "objects of table '{other}' cannot be built ({})",
                    Qualified(self.authority(), code)
                ));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_requested_types() {
        let types = [ObjectType::GeodeticCrs, ObjectType::Datum];
        assert_eq!(0, type_rank(&types, "geodetic_crs"));
        assert_eq!(1, type_rank(&types, "geodetic_datum"));
        assert_eq!(2, type_rank(&types, "vertical_datum"));
        assert_eq!(usize::MAX, type_rank(&types, "ellipsoid"));
    }
}
