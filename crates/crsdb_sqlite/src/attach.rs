//! Attachment of auxiliary catalogs.
//!
//! The primary catalog is attached as `db_0` and auxiliary catalogs as
//! `db_1`, `db_2`, ... on an in-memory connection. Each known table becomes a
//! temporary view over the union of that table in every attached catalog, and
//! the primary catalog's views are recreated as temporary views on top.

use rusqlite::Connection;
use tracing::{debug, warn};

use crsdb_error::{Result, factory_err};

use crate::exec;
use crate::param::Param;

/// Tables unioned across attached catalogs.
pub const KNOWN_TABLES: &[&str] = &[
    "celestial_body",
    "unit_of_measure",
    "extent",
    "scope",
    "usage",
    "ellipsoid",
    "prime_meridian",
    "geodetic_datum",
    "geodetic_datum_ensemble_member",
    "vertical_datum",
    "vertical_datum_ensemble_member",
    "coordinate_system",
    "axis",
    "geodetic_crs",
    "vertical_crs",
    "conversion",
    "projected_crs",
    "compound_crs",
    "helmert_transformation",
    "grid_transformation",
    "other_transformation",
    "concatenated_operation",
    "concatenated_operation_step",
    "supersession",
    "alias_name",
    "grid_packages",
    "grid_alternatives",
    "geoid_model",
];

pub fn is_known_table(name: &str) -> bool {
    KNOWN_TABLES.contains(&name)
}

pub fn schema_name(idx: usize) -> String {
    format!("db_{idx}")
}

/// Attaches `files` (paths or `file:` URIs) in order.
pub fn attach_all(conn: &Connection, files: &[String]) -> Result<()> {
    for (idx, file) in files.iter().enumerate() {
        let schema = schema_name(idx);
        debug!(%file, %schema, "attaching catalog");
        exec::run(
            conn,
            &format!("ATTACH DATABASE ?1 AS {schema}"),
            &[Param::from(file)],
            false,
        )?;
    }
    Ok(())
}

fn table_columns(conn: &Connection, schema: &str, table: &str) -> Result<Vec<String>> {
    let rows = exec::run(
        conn,
        "SELECT name FROM pragma_table_info(?1, ?2) ORDER BY cid",
        &[Param::from(table), Param::from(schema)],
        false,
    )?;
    rows.iter().map(|r| r.get_string(0)).collect()
}

/// Creates the union views over `count` attached catalogs.
pub fn create_union_views(conn: &Connection, count: usize) -> Result<()> {
    for table in KNOWN_TABLES {
        let mut present: Vec<(String, Vec<String>)> = Vec::new();
        for idx in 0..count {
            let schema = schema_name(idx);
            let cols = table_columns(conn, &schema, table)?;
            if !cols.is_empty() {
                present.push((schema, cols));
            }
        }

        let Some((_, columns)) = present.first() else {
            warn!(%table, "table missing from every attached catalog");
            continue;
        };
        let columns = columns.clone();

        let mut selects = Vec::with_capacity(present.len());
        for (schema, cols) in &present {
            let mut exprs = Vec::with_capacity(columns.len());
            for col in &columns {
                if !exec::is_valid_identifier(col) {
                    return Err(factory_err!("invalid column name '{col}' in table {table}"));
                }
                if cols.contains(col) {
                    exprs.push(col.clone());
                } else {
                    exprs.push(format!("NULL AS {col}"));
                }
            }
            selects.push(format!("SELECT {} FROM {schema}.{table}", exprs.join(", ")));
        }

        let sql = format!("CREATE TEMP VIEW {table} AS {}", selects.join(" UNION ALL "));
        exec::execute_batch(conn, &sql)?;
    }
    Ok(())
}

/// Recreates the views of the primary catalog as temporary views.
pub fn recreate_views(conn: &Connection) -> Result<()> {
    let rows = exec::run(
        conn,
        "SELECT sql FROM db_0.sqlite_master WHERE type = 'view' AND sql IS NOT NULL ORDER BY rowid",
        &[],
        false,
    )?;
    for row in rows {
        let sql = row.get_string(0)?;
        let Some(rest) = strip_prefix_ignore_case(&sql, "CREATE VIEW") else {
            return Err(factory_err!("unexpected view definition: {sql}"));
        };
        exec::execute_batch(conn, &format!("CREATE TEMP VIEW{rest}"))?;
    }
    Ok(())
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(dir: &tempfile::TempDir, name: &str, sql: &str) -> String {
        let path = dir.path().join(name);
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(sql).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn union_over_catalogs() {
        let dir = tempfile::tempdir().unwrap();
        let main = catalog(
            &dir,
            "main.db",
            "CREATE TABLE scope(auth_name TEXT, code TEXT, scope TEXT, deprecated INTEGER);
             INSERT INTO scope VALUES('EPSG', '1024', 'Not known.', 0);
             CREATE VIEW scope_names AS SELECT scope FROM scope;",
        );
        let aux = catalog(
            &dir,
            "aux.db",
            "CREATE TABLE scope(auth_name TEXT, code TEXT, scope TEXT);
             INSERT INTO scope VALUES('OTHER', '1', 'Testing.');",
        );

        let conn = Connection::open_in_memory().unwrap();
        attach_all(&conn, &[main, aux]).unwrap();
        create_union_views(&conn, 2).unwrap();
        recreate_views(&conn).unwrap();

        let rows = exec::run(
            &conn,
            "SELECT auth_name, deprecated FROM scope ORDER BY auth_name",
            &[],
            false,
        )
        .unwrap();
        assert_eq!(2, rows.len());
        assert_eq!("EPSG", rows[0].get_string(0).unwrap());
        // Column missing from the auxiliary catalog reads as NULL.
        assert!(rows[1].is_null(1));

        let rows = exec::run(&conn, "SELECT scope FROM scope_names", &[], false).unwrap();
        assert_eq!(2, rows.len());
    }

    #[test]
    fn prefix_stripping() {
        assert_eq!(Some(" v AS SELECT 1"), strip_prefix_ignore_case("create view v AS SELECT 1", "CREATE VIEW"));
        assert_eq!(None, strip_prefix_ignore_case("CREATE TABLE t(a)", "CREATE VIEW"));
    }
}
