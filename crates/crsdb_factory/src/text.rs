//! Boundary to the parser of CRS stored as text definitions.

use std::fmt;

use crsdb_core::crs::Crs;
use crsdb_error::Result;

use crate::factory::{AuthorityFactory, FactoryObject, ResolveDepth};
use crate::object_type::ObjectType;

/// Parses text definitions (WKT, PROJ strings) stored in the catalog.
///
/// Implementations may look up named objects through the [`ParseContext`],
/// which guards against definitions referring to each other.
pub trait TextDefinitionParser: fmt::Debug {
    fn parse(&self, text: &str, ctx: &ParseContext<'_>) -> Result<Crs>;
}

/// What a parser may use while parsing one definition.
#[derive(Debug)]
pub struct ParseContext<'a> {
    factory: AuthorityFactory<'a>,
    depth: ResolveDepth,
}

impl<'a> ParseContext<'a> {
    pub(crate) fn new(factory: AuthorityFactory<'a>, depth: ResolveDepth) -> Self {
        ParseContext { factory, depth }
    }

    pub fn depth(&self) -> ResolveDepth {
        self.depth
    }

    /// CRS identified by `authority` and `code`, one level deeper.
    pub fn create_crs(&self, authority: &str, code: &str) -> Result<Crs> {
        let depth = self.depth.deeper()?;
        self.factory.with_authority(authority).crs_at(code, depth)
    }

    /// Objects whose name exactly matches `name`, one level deeper.
    pub fn lookup_by_name(&self, name: &str, types: &[ObjectType]) -> Result<Vec<FactoryObject>> {
        let depth = self.depth.deeper()?;
        self.factory
            .objects_from_name_at(name, types, false, 0, depth)
    }
}
