use std::fmt::Write as _;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::trace;

use crsdb_error::{FactoryError, Result};

use crate::param::{Param, Row};

fn sql_error(sql: &str, err: rusqlite::Error) -> FactoryError {
    FactoryError::Sql {
        sql: sql.to_string(),
        message: err.to_string(),
    }
}

/// Runs `sql` with positional parameters and collects every row.
///
/// Statements are prepared once per SQL text through the connection's
/// statement cache.
pub fn run(
    conn: &Connection,
    sql: &str,
    params: &[Param],
    max_float_precision: bool,
) -> Result<Vec<Row>> {
    trace!(%sql, ?params, "running statement");

    let mut stmt = conn.prepare_cached(sql).map_err(|e| sql_error(sql, e))?;
    let num_cols = stmt.column_count();

    let data = stmt
        .query(params_from_iter(params.iter()))
        .map_err(|e| sql_error(sql, e))?
        .mapped(|r| {
            (0..num_cols)
                .map(|idx| {
                    let v = r.get_ref(idx)?;
                    Ok(Value::from(v))
                })
                .collect::<Result<Vec<_>, rusqlite::Error>>()
        })
        .collect::<Result<Vec<_>, rusqlite::Error>>()
        .map_err(|e| sql_error(sql, e))?;

    Ok(data
        .into_iter()
        .map(|values| Row::new(values, max_float_precision))
        .collect())
}

/// Runs statements without parameters or results.
pub fn execute_batch(conn: &Connection, sql: &str) -> Result<()> {
    trace!(%sql, "executing batch");
    conn.execute_batch(sql).map_err(|e| sql_error(sql, e))
}

/// Builds SQL text alongside its numbered parameters.
#[derive(Debug, Default, Clone)]
pub struct SqlBuilder {
    sql: String,
    params: Vec<Param>,
}

impl SqlBuilder {
    pub fn new(sql: impl Into<String>) -> Self {
        SqlBuilder {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Registers a parameter and returns its placeholder (`?N`), which may
    /// be used several times.
    pub fn bind(&mut self, param: impl Into<Param>) -> String {
        self.params.push(param.into());
        format!("?{}", self.params.len())
    }

    pub fn push(&mut self, s: &str) -> &mut Self {
        self.sql.push_str(s);
        self
    }

    /// Appends a bound parameter's placeholder.
    pub fn push_param(&mut self, param: impl Into<Param>) -> &mut Self {
        let placeholder = self.bind(param);
        self.sql.push_str(&placeholder);
        self
    }

    /// Appends `(?1, ?2, ...)` binding every value.
    pub fn push_list<P: Into<Param>>(&mut self, values: impl IntoIterator<Item = P>) -> &mut Self {
        self.sql.push('(');
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_param(v);
        }
        self.sql.push(')');
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn finish(self) -> (String, Vec<Param>) {
        (self.sql, self.params)
    }
}

impl std::fmt::Write for SqlBuilder {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.sql.push_str(s);
        Ok(())
    }
}

/// Checks that `name` is a plain lowercase identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Comma separated column list, every column checked.
pub fn column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> Result<String> {
    let mut out = String::new();
    for (i, col) in columns.into_iter().enumerate() {
        if !is_valid_identifier(col) {
            return Err(crsdb_error::factory_err!("invalid column name '{col}'"));
        }
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{col}");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::fmt::Write;

    use super::*;

    #[test]
    fn run_with_params() {
        let conn = Connection::open_in_memory().unwrap();
        execute_batch(
            &conn,
            "CREATE TABLE t(a TEXT, b INTEGER, c REAL); INSERT INTO t VALUES('x', 1, 1.5), ('y', 2, NULL);",
        )
        .unwrap();

        let rows = run(&conn, "SELECT a, c FROM t WHERE b >= ?1 ORDER BY b", &[Param::Integer(2)], false).unwrap();
        assert_eq!(1, rows.len());
        assert_eq!("y", rows[0].get_string(0).unwrap());
        assert!(rows[0].is_null(1));

        // Cached statement reused with other values.
        let rows = run(&conn, "SELECT a, c FROM t WHERE b >= ?1 ORDER BY b", &[Param::Integer(0)], false).unwrap();
        assert_eq!(2, rows.len());
    }

    #[test]
    fn sql_errors_carry_statement() {
        let conn = Connection::open_in_memory().unwrap();
        let err = run(&conn, "SELECT * FROM missing", &[], false).unwrap_err();
        match err {
            FactoryError::Sql { sql, message } => {
                assert_eq!("SELECT * FROM missing", sql);
                assert!(message.contains("no such table"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn builder_numbers_params() {
        let mut b = SqlBuilder::new("SELECT 1 WHERE ");
        let p = b.bind("EPSG");
        write!(b, "{p} = {p} AND x IN ").unwrap();
        b.push_list(["a", "b"]);
        let (sql, params) = b.finish();
        assert_eq!("SELECT 1 WHERE ?1 = ?1 AND x IN (?2, ?3)", sql);
        assert_eq!(3, params.len());
    }

    #[test]
    fn identifiers() {
        assert!(is_valid_identifier("geodetic_crs"));
        assert!(is_valid_identifier("param1_uom_code"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("a; DROP TABLE x"));
        assert!(column_list(["a", "b"]).is_ok());
        assert!(column_list(["a", "b c"]).is_err());
    }
}
