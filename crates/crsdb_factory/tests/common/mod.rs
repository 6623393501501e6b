#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crsdb_core::crs::Crs;
use crsdb_error::{FactoryError, Result};
use crsdb_factory::{FactoryObject, ObjectType, ParseContext, TextDefinitionParser};
use crsdb_sqlite::DatabaseContext;
use crsdb_sqlite::config::ContextConfig;
use tempfile::TempDir;

const CATALOG_DATA: &str = include_str!("../../testdata/catalog.sql");

/// Context on a scratch copy of the test catalog. The directory lives as
/// long as the fixture.
pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
    pub ctx: DatabaseContext,
}

/// Writes the test catalog with the given layout minor version.
pub fn write_catalog(dir: &Path, minor: &str) -> PathBuf {
    let path = dir.join("proj.db");
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute_batch(crsdb_sqlite::CATALOG_SCHEMA_SQL).unwrap();
    conn.execute_batch(CATALOG_DATA).unwrap();
    conn.execute(
        "INSERT INTO metadata VALUES('DATABASE.LAYOUT.VERSION.MAJOR', '1'), \
         ('DATABASE.LAYOUT.VERSION.MINOR', ?1)",
        [minor],
    )
    .unwrap();
    path
}

pub fn fixture_with(minor: &str, search_paths: Vec<PathBuf>) -> Fixture {
    logutil::init_test();
    let dir = tempfile::tempdir().unwrap();
    let path = write_catalog(dir.path(), minor);
    let ctx = DatabaseContext::open(ContextConfig {
        database_path: Some(path.clone()),
        search_paths,
        ..Default::default()
    })
    .unwrap();
    Fixture { dir, path, ctx }
}

pub fn fixture() -> Fixture {
    fixture_with("2", Vec::new())
}

/// Parses `NAMED:<crs name>` definitions by looking the name up, and
/// `REF:<authority>:<code>` definitions by creating the referenced CRS.
#[derive(Debug)]
pub struct NamedCrsParser;

impl TextDefinitionParser for NamedCrsParser {
    fn parse(&self, text: &str, ctx: &ParseContext<'_>) -> Result<Crs> {
        if let Some((authority, code)) = text
            .strip_prefix("REF:")
            .and_then(|reference| reference.split_once(':'))
        {
            return ctx.create_crs(authority, code);
        }
        let name = text
            .strip_prefix("NAMED:")
            .ok_or_else(|| FactoryError::Factory(format!("unsupported definition '{text}'")))?;
        ctx.lookup_by_name(name, &[ObjectType::Crs])?
            .into_iter()
            .find_map(FactoryObject::into_crs)
            .ok_or_else(|| FactoryError::Factory(format!("no crs named '{name}'")))
    }
}

pub fn named_parser() -> Arc<dyn TextDefinitionParser> {
    Arc::new(NamedCrsParser)
}

pub fn codes(ops: &[crsdb_core::operation::CoordinateOperation]) -> Vec<String> {
    ops.iter()
        .map(|op| op.id().map(|id| id.code.clone()).unwrap_or_default())
        .collect()
}
