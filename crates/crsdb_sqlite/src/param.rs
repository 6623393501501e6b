use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};

use crsdb_error::{Result, factory_err};

/// Positional statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl ToSql for Param {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Param::Null => ToSqlOutput::Owned(Value::Null),
            Param::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Param::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Param::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
        })
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<&String> for Param {
    fn from(value: &String) -> Self {
        Param::Text(value.clone())
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Integer(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Real(value)
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Integer(value as i64)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Param::Null,
        }
    }
}

/// Formats a double for text output.
///
/// With `max_precision` the shortest representation that round trips is
/// used, otherwise the value is rounded to 15 significant digits.
pub fn format_double(value: f64, max_precision: bool) -> String {
    if max_precision || !value.is_finite() {
        return value.to_string();
    }
    let rounded = format!("{value:.14e}");
    match rounded.parse::<f64>() {
        Ok(v) => v.to_string(),
        Err(_) => value.to_string(),
    }
}

/// One result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    max_float_precision: bool,
}

impl Row {
    pub fn new(values: Vec<Value>, max_float_precision: bool) -> Self {
        Row {
            values,
            max_float_precision,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn value(&self, idx: usize) -> Result<&Value> {
        self.values
            .get(idx)
            .ok_or_else(|| factory_err!("column {idx} out of range, row has {}", self.values.len()))
    }

    pub fn is_null(&self, idx: usize) -> bool {
        matches!(self.values.get(idx), None | Some(Value::Null))
    }

    pub fn get_opt_string(&self, idx: usize) -> Result<Option<String>> {
        Ok(match self.value(idx)? {
            Value::Null => None,
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) => Some(format_double(*f, self.max_float_precision)),
            Value::Blob(_) => return Err(factory_err!("unexpected blob in column {idx}")),
        })
    }

    pub fn get_string(&self, idx: usize) -> Result<String> {
        self.get_opt_string(idx)?
            .ok_or_else(|| factory_err!("unexpected NULL in column {idx}"))
    }

    /// Text column, empty string for NULL.
    pub fn get_string_or_empty(&self, idx: usize) -> Result<String> {
        Ok(self.get_opt_string(idx)?.unwrap_or_default())
    }

    pub fn get_opt_f64(&self, idx: usize) -> Result<Option<f64>> {
        Ok(match self.value(idx)? {
            Value::Null => None,
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(s) => Some(
                s.trim()
                    .parse()
                    .map_err(|_| factory_err!("cannot parse '{s}' in column {idx} as a number"))?,
            ),
            Value::Blob(_) => return Err(factory_err!("unexpected blob in column {idx}")),
        })
    }

    pub fn get_f64(&self, idx: usize) -> Result<f64> {
        self.get_opt_f64(idx)?
            .ok_or_else(|| factory_err!("unexpected NULL in column {idx}"))
    }

    pub fn get_opt_i64(&self, idx: usize) -> Result<Option<i64>> {
        Ok(match self.value(idx)? {
            Value::Null => None,
            Value::Integer(i) => Some(*i),
            Value::Real(f) => Some(*f as i64),
            Value::Text(s) => Some(
                s.trim()
                    .parse()
                    .map_err(|_| factory_err!("cannot parse '{s}' in column {idx} as an integer"))?,
            ),
            Value::Blob(_) => return Err(factory_err!("unexpected blob in column {idx}")),
        })
    }

    pub fn get_i64(&self, idx: usize) -> Result<i64> {
        self.get_opt_i64(idx)?
            .ok_or_else(|| factory_err!("unexpected NULL in column {idx}"))
    }

    /// Non-zero integer. NULL is false.
    pub fn get_bool(&self, idx: usize) -> Result<bool> {
        Ok(self.get_opt_i64(idx)?.unwrap_or(0) != 0)
    }
}
