//! Catalog layout versions.
//!
//! The major version must match exactly. A catalog with an older minor
//! version still opens; operations that need a newer feature check it with
//! [`LayoutVersion::require`].

use std::path::Path;

use rusqlite::Connection;
use tracing::warn;

use crsdb_error::{Result, factory_err};

use crate::exec;
use crate::param::Param;

pub const LAYOUT_VERSION_MAJOR: i64 = 1;
pub const LAYOUT_VERSION_MINOR: i64 = 2;

const KEY_MAJOR: &str = "DATABASE.LAYOUT.VERSION.MAJOR";
const KEY_MINOR: &str = "DATABASE.LAYOUT.VERSION.MINOR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LayoutVersion {
    pub major: i64,
    pub minor: i64,
}

/// Features added after the first minor version of the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutFeature {
    /// `publication_date` on datum tables.
    DatumPublicationDates,
    /// `text_definition` on CRS tables.
    TextDefinitions,
    /// Insert statement generation.
    Authoring,
}

impl LayoutFeature {
    fn min_minor(&self) -> i64 {
        match self {
            LayoutFeature::DatumPublicationDates => 1,
            LayoutFeature::TextDefinitions => 2,
            LayoutFeature::Authoring => 2,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            LayoutFeature::DatumPublicationDates => "datum publication dates",
            LayoutFeature::TextDefinitions => "text definitions",
            LayoutFeature::Authoring => "insert statement generation",
        }
    }
}

impl LayoutVersion {
    pub const CURRENT: LayoutVersion = LayoutVersion {
        major: LAYOUT_VERSION_MAJOR,
        minor: LAYOUT_VERSION_MINOR,
    };

    pub fn supports(&self, feature: LayoutFeature) -> bool {
        self.minor >= feature.min_minor()
    }

    pub fn require(&self, feature: LayoutFeature) -> Result<()> {
        if !self.supports(feature) {
            return Err(factory_err!(
                "{} requires catalog layout {}.{} or later, catalog is {}.{}",
                feature.description(),
                LAYOUT_VERSION_MAJOR,
                feature.min_minor(),
                self.major,
                self.minor
            ));
        }
        Ok(())
    }
}

/// Reads the layout version of an attached schema. `None` if the schema has
/// no metadata table or no version keys.
pub fn read_layout_version(conn: &Connection, schema: &str) -> Result<Option<LayoutVersion>> {
    if !exec::is_valid_identifier(schema) {
        return Err(factory_err!("invalid schema name '{schema}'"));
    }

    let has_metadata = exec::run(
        conn,
        &format!("SELECT 1 FROM {schema}.sqlite_master WHERE type = 'table' AND name = 'metadata'"),
        &[],
        false,
    )?;
    if has_metadata.is_empty() {
        return Ok(None);
    }

    let rows = exec::run(
        conn,
        &format!("SELECT key, value FROM {schema}.metadata WHERE key IN (?1, ?2)"),
        &[Param::from(KEY_MAJOR), Param::from(KEY_MINOR)],
        false,
    )?;

    let mut major = None;
    let mut minor = None;
    for row in rows {
        let key = row.get_string(0)?;
        let value = row.get_i64(1)?;
        if key == KEY_MAJOR {
            major = Some(value);
        } else {
            minor = Some(value);
        }
    }

    match (major, minor) {
        (Some(major), Some(minor)) => Ok(Some(LayoutVersion { major, minor })),
        (None, None) => Ok(None),
        _ => Err(factory_err!("catalog metadata has an incomplete layout version")),
    }
}

/// Validates the layout of the primary catalog.
pub fn check_main_layout(version: Option<LayoutVersion>, path: &Path) -> Result<LayoutVersion> {
    let version = version.ok_or_else(|| {
        factory_err!(
            "{} lacks {KEY_MAJOR} / {KEY_MINOR} metadata. It comes from another catalog generation",
            path.display()
        )
    })?;

    if version.major != LAYOUT_VERSION_MAJOR {
        return Err(factory_err!(
            "{} has {KEY_MAJOR} = {} whereas {LAYOUT_VERSION_MAJOR} is expected. It comes from another catalog generation",
            path.display(),
            version.major
        ));
    }
    if version.minor < LAYOUT_VERSION_MINOR {
        warn!(
            path = %path.display(),
            minor = version.minor,
            expected = LAYOUT_VERSION_MINOR,
            "catalog layout is older than expected, some features are unavailable"
        );
    }
    Ok(version)
}

/// Validates an auxiliary catalog against the primary one. Auxiliary
/// catalogs without metadata are accepted.
pub fn check_auxiliary_layout(
    main: LayoutVersion,
    aux: Option<LayoutVersion>,
    path: &Path,
) -> Result<()> {
    let Some(aux) = aux else {
        return Ok(());
    };
    if aux.major != main.major {
        return Err(factory_err!(
            "auxiliary catalog {} has layout major version {} whereas the primary catalog has {}",
            path.display(),
            aux.major,
            main.major
        ));
    }
    if aux.minor != main.minor {
        warn!(
            path = %path.display(),
            aux_minor = aux.minor,
            main_minor = main.minor,
            "auxiliary catalog layout minor version differs from the primary catalog"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_metadata(entries: &[(&str, &str)]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE metadata(key TEXT NOT NULL PRIMARY KEY, value TEXT NOT NULL)")
            .unwrap();
        for (k, v) in entries {
            conn.execute("INSERT INTO metadata VALUES(?1, ?2)", [k, v]).unwrap();
        }
        conn
    }

    #[test]
    fn reads_version() {
        let conn = conn_with_metadata(&[(KEY_MAJOR, "1"), (KEY_MINOR, "2")]);
        let v = read_layout_version(&conn, "main").unwrap();
        assert_eq!(Some(LayoutVersion::CURRENT), v);
    }

    #[test]
    fn missing_metadata() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(None, read_layout_version(&conn, "main").unwrap());
        assert!(check_main_layout(None, Path::new("x.db")).is_err());
        check_auxiliary_layout(LayoutVersion::CURRENT, None, Path::new("aux.db")).unwrap();
    }

    #[test]
    fn major_mismatch() {
        let err = check_main_layout(
            Some(LayoutVersion { major: 2, minor: 0 }),
            Path::new("proj.db"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("whereas 1 is expected"), "{err}");

        let err = check_auxiliary_layout(
            LayoutVersion::CURRENT,
            Some(LayoutVersion { major: 2, minor: 2 }),
            Path::new("aux.db"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("layout major version 2"), "{err}");
    }

    #[test]
    fn older_minor_degrades() {
        let v = check_main_layout(
            Some(LayoutVersion { major: 1, minor: 0 }),
            Path::new("old.db"),
        )
        .unwrap();
        assert!(!v.supports(LayoutFeature::DatumPublicationDates));
        assert!(v.require(LayoutFeature::Authoring).is_err());
        assert!(LayoutVersion::CURRENT.require(LayoutFeature::Authoring).is_ok());
    }
}
