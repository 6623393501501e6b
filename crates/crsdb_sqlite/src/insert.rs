use std::fmt;

use crsdb_error::{Result, factory_err};

use crate::attach::is_known_table;
use crate::param::{Param, format_double};

/// Row insertion rendered as SQL text, for catalog authoring.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    table: String,
    values: Vec<Param>,
}

impl InsertStatement {
    pub fn try_new(table: &str, values: Vec<Param>) -> Result<Self> {
        if !is_known_table(table) {
            return Err(factory_err!("cannot insert into unknown table '{table}'"));
        }
        Ok(InsertStatement {
            table: table.to_string(),
            values,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn values(&self) -> &[Param] {
        &self.values
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Param) -> fmt::Result {
    match value {
        Param::Null => write!(f, "NULL"),
        Param::Integer(i) => write!(f, "{i}"),
        Param::Real(v) => write!(f, "{}", format_double(*v, true)),
        Param::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
    }
}

impl fmt::Display for InsertStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INSERT INTO {} VALUES(", self.table)?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write_value(f, v)?;
        }
        write!(f, ");")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_values() {
        let stmt = InsertStatement::try_new(
            "ellipsoid",
            vec![
                Param::from("HOBU"),
                Param::from("XY"),
                Param::from("Bob's ellipsoid"),
                Param::Null,
                Param::from(6378137.5),
                Param::from(0_i64),
            ],
        )
        .unwrap();
        assert_eq!(
            "INSERT INTO ellipsoid VALUES('HOBU','XY','Bob''s ellipsoid',NULL,6378137.5,0);",
            stmt.to_string()
        );
    }

    #[test]
    fn unknown_table_rejected() {
        assert!(InsertStatement::try_new("sqlite_master", Vec::new()).is_err());
    }
}
