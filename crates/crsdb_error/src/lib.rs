//! Errors shared by every crsdb crate.
//!
//! Absent codes are recoverable (`NoSuchAuthorityCode`), everything wrong with
//! catalog content is a `Factory` error, and exceeding the name-resolution
//! depth is fatal: candidate loops that otherwise swallow errors must let it
//! through (see [`FactoryError::is_fatal`]).

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("{message}")]
    NoSuchAuthorityCode {
        authority: String,
        code: String,
        message: String,
    },

    #[error("{0}")]
    Factory(String),

    #[error("sqlite error on {sql}: {message}")]
    Sql { sql: String, message: String },

    #[error("maximum recursion depth reached ({depth}) while resolving objects by name")]
    RecursionLimit { depth: u8 },

    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = FactoryError> = std::result::Result<T, E>;

impl FactoryError {
    /// Error for a code that does not exist in the catalog.
    pub fn no_such_code(
        kind: &str,
        authority: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let authority = authority.into();
        let code = code.into();
        let message = format!("{kind} not found: {authority}:{code}");
        FactoryError::NoSuchAuthorityCode {
            authority,
            code,
            message,
        }
    }

    pub fn is_no_such_code(&self) -> bool {
        matches!(self, FactoryError::NoSuchAuthorityCode { .. })
    }

    /// Errors that must abort a whole search rather than a single candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FactoryError::RecursionLimit { .. })
    }
}

/// Wraps an error raised while building a referenced object.
///
/// A missing referenced object makes the requesting object malformed, so
/// `NoSuchAuthorityCode` is turned into a `Factory` error here. Fatal errors
/// are returned untouched.
pub fn build_factory_error(
    kind: &str,
    authority: &str,
    code: &str,
    err: FactoryError,
) -> FactoryError {
    if err.is_fatal() {
        return err;
    }
    FactoryError::Factory(format!("cannot build {kind} {authority}:{code}: {err}"))
}

/// Extension for attaching the object being built to an error.
pub trait ResultExt<T> {
    fn building(self, kind: &str, authority: &str, code: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn building(self, kind: &str, authority: &str, code: &str) -> Result<T> {
        self.map_err(|e| build_factory_error(kind, authority, code, e))
    }
}

/// Formats into a `FactoryError::Factory`.
#[macro_export]
macro_rules! factory_err {
    ($($arg:tt)*) => {
        $crate::FactoryError::Factory(std::format!($($arg)*))
    };
}

/// Shorthand for an `ObjectId`-like display in error messages.
pub struct Qualified<'a>(pub &'a str, pub &'a str);

impl fmt::Display for Qualified<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reference_becomes_factory_error() {
        let inner = FactoryError::no_such_code("ellipsoid", "EPSG", "7030");
        assert!(inner.is_no_such_code());

        let err = build_factory_error("geodetic datum", "EPSG", "6326", inner);
        assert!(!err.is_no_such_code());
        assert_eq!(
            "cannot build geodetic datum EPSG:6326: ellipsoid not found: EPSG:7030",
            err.to_string()
        );
    }

    #[test]
    fn fatal_errors_pass_through() {
        let err = build_factory_error(
            "geodetic crs",
            "EPSG",
            "4326",
            FactoryError::RecursionLimit { depth: 2 },
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn macro_formats() {
        let err = factory_err!("ambiguous code {}", Qualified("EPSG", "1"));
        assert_eq!("ambiguous code EPSG:1", err.to_string());
    }
}
