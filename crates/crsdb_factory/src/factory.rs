use std::sync::Arc;

use crsdb_core::compose::{GeodeticConversions, OperationComposer};
use crsdb_core::crs::Crs;
use crsdb_core::cs::CoordinateSystem;
use crsdb_core::datum::{DatumEnsemble, Ellipsoid, GeodeticDatum, PrimeMeridian, VerticalDatum};
use crsdb_core::extent::Extent;
use crsdb_core::ident::{ObjectId, ObjectProperties, ObjectUsage};
use crsdb_core::operation::CoordinateOperation;
use crsdb_core::unit::UnitOfMeasure;
use crsdb_error::{FactoryError, Qualified, Result, factory_err};
use crsdb_sqlite::{DatabaseContext, Param, Row};

use crate::text::TextDefinitionParser;

/// Pluggable pieces the factory delegates to.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Parser for CRS stored as text definitions.
    pub text_parser: Option<Arc<dyn TextDefinitionParser>>,
    /// Adjustments between CRS of the same datum.
    pub composer: Arc<dyn OperationComposer>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Collaborators {
            text_parser: None,
            composer: Arc::new(GeodeticConversions),
        }
    }
}

/// Nesting level of name lookups issued while parsing text definitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolveDepth(u8);

impl ResolveDepth {
    pub const MAX: u8 = 2;
    pub const ROOT: ResolveDepth = ResolveDepth(0);

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Next level, failing once [`ResolveDepth::MAX`] would be exceeded.
    pub fn deeper(self) -> Result<ResolveDepth> {
        if self.0 >= Self::MAX {
            return Err(FactoryError::RecursionLimit { depth: Self::MAX });
        }
        Ok(ResolveDepth(self.0 + 1))
    }
}

/// Any object the factory can build from a code.
#[derive(Debug, Clone, PartialEq)]
pub enum FactoryObject {
    Unit(Arc<UnitOfMeasure>),
    Extent(Arc<Extent>),
    Ellipsoid(Arc<Ellipsoid>),
    PrimeMeridian(Arc<PrimeMeridian>),
    GeodeticDatum(GeodeticDatum),
    VerticalDatum(VerticalDatum),
    DatumEnsemble(Arc<DatumEnsemble>),
    CoordinateSystem(Arc<CoordinateSystem>),
    Crs(Crs),
    Operation(CoordinateOperation),
}

impl FactoryObject {
    pub fn id(&self) -> Option<&ObjectId> {
        match self {
            FactoryObject::Unit(u) => u.props.id.as_ref(),
            FactoryObject::Extent(e) => e.id.as_ref(),
            FactoryObject::Ellipsoid(e) => e.props.id.as_ref(),
            FactoryObject::PrimeMeridian(p) => p.props.id.as_ref(),
            FactoryObject::GeodeticDatum(d) => d.props().id.as_ref(),
            FactoryObject::VerticalDatum(d) => d.props().id.as_ref(),
            FactoryObject::DatumEnsemble(e) => e.props.id.as_ref(),
            FactoryObject::CoordinateSystem(cs) => cs.id.as_ref(),
            FactoryObject::Crs(crs) => crs.id(),
            FactoryObject::Operation(op) => op.id(),
        }
    }

    /// Name of the object. Extents use their description and coordinate
    /// systems have none.
    pub fn name(&self) -> &str {
        match self {
            FactoryObject::Unit(u) => &u.props.name,
            FactoryObject::Extent(e) => e.description.as_deref().unwrap_or(""),
            FactoryObject::Ellipsoid(e) => &e.props.name,
            FactoryObject::PrimeMeridian(p) => &p.props.name,
            FactoryObject::GeodeticDatum(d) => &d.props().name,
            FactoryObject::VerticalDatum(d) => &d.props().name,
            FactoryObject::DatumEnsemble(e) => &e.props.name,
            FactoryObject::CoordinateSystem(_) => "",
            FactoryObject::Crs(crs) => crs.name(),
            FactoryObject::Operation(op) => &op.props().name,
        }
    }

    pub fn into_crs(self) -> Option<Crs> {
        match self {
            FactoryObject::Crs(crs) => Some(crs),
            _ => None,
        }
    }

    pub fn into_operation(self) -> Option<CoordinateOperation> {
        match self {
            FactoryObject::Operation(op) => Some(op),
            _ => None,
        }
    }
}

/// Builds catalog objects of one authority.
///
/// An empty authority is only meaningful for searches (listings, name
/// lookups and operation searches), where it means "any authority".
#[derive(Debug, Clone)]
pub struct AuthorityFactory<'a> {
    context: &'a DatabaseContext,
    authority: String,
    collaborators: Collaborators,
}

impl<'a> AuthorityFactory<'a> {
    pub fn new(context: &'a DatabaseContext, authority: impl Into<String>) -> Self {
        AuthorityFactory {
            context,
            authority: authority.into(),
            collaborators: Collaborators::default(),
        }
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn with_text_parser(mut self, parser: Arc<dyn TextDefinitionParser>) -> Self {
        self.collaborators.text_parser = Some(parser);
        self
    }

    pub fn context(&self) -> &'a DatabaseContext {
        self.context
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Same context and collaborators, another authority.
    pub fn with_authority(&self, authority: &str) -> AuthorityFactory<'a> {
        AuthorityFactory {
            context: self.context,
            authority: authority.to_string(),
            collaborators: self.collaborators.clone(),
        }
    }

    pub(crate) fn is_any_authority(&self) -> bool {
        self.authority.is_empty()
    }

    pub(crate) fn run(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>> {
        self.context.run(sql, params)
    }

    pub(crate) fn id(&self, code: &str) -> ObjectId {
        ObjectId::new(&self.authority, code)
    }

    /// `?1`/`?2` parameters for an (authority, code) lookup.
    pub(crate) fn key_params(&self, code: &str) -> [Param; 2] {
        [Param::from(&self.authority), Param::from(code)]
    }

    /// Usages recorded for `table`/`code` under this authority.
    pub(crate) fn usages(&self, table: &str, code: &str) -> Result<Vec<ObjectUsage>> {
        let rows = self.run(
            "SELECT u.extent_auth_name, u.extent_code, s.scope FROM usage u \
             LEFT JOIN scope s ON s.auth_name = u.scope_auth_name AND s.code = u.scope_code \
             WHERE u.object_table_name = ?1 AND u.object_auth_name = ?2 AND u.object_code = ?3 \
             ORDER BY u.auth_name, u.code",
            &[Param::from(table), Param::from(&self.authority), Param::from(code)],
        )?;

        let mut usages = Vec::with_capacity(rows.len());
        for row in rows {
            let extent = self
                .with_authority(&row.get_string(0)?)
                .create_extent(&row.get_string(1)?)?;
            usages.push(ObjectUsage {
                scope: row.get_opt_string(2)?,
                extent,
            });
        }
        Ok(usages)
    }

    /// Identity, name, remarks, deprecation and usages of a catalog row.
    pub(crate) fn properties(
        &self,
        table: &str,
        code: &str,
        name: String,
        remarks: Option<String>,
        deprecated: bool,
    ) -> Result<ObjectProperties> {
        Ok(ObjectProperties {
            id: Some(self.id(code)),
            name,
            remarks,
            deprecated,
            usages: self.usages(table, code)?,
        })
    }
}

/// The single row a lookup by (authority, code) must return.
pub(crate) fn one_row(rows: Vec<Row>, kind: &str, authority: &str, code: &str) -> Result<Row> {
    let mut iter = rows.into_iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(FactoryError::no_such_code(kind, authority, code)),
        (Some(row), None) => Ok(row),
        (Some(_), Some(_)) => Err(factory_err!(
            "{kind} {} is ambiguous: several rows match",
            Qualified(authority, code)
        )),
    }
}

/// Properties for an optionally identified sub-object such as a method or a
/// parameter.
pub(crate) fn optional_identity(
    authority: Option<String>,
    code: Option<String>,
    name: String,
) -> ObjectProperties {
    match (authority, code) {
        (Some(authority), Some(code)) => {
            ObjectProperties::identified(ObjectId::new(authority, code), name)
        }
        _ => ObjectProperties::named(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_limit() {
        let depth = ResolveDepth::ROOT.deeper().unwrap().deeper().unwrap();
        assert_eq!(2, depth.get());
        let err = depth.deeper().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn optional_identity_requires_both_parts() {
        let props = optional_identity(Some("EPSG".to_string()), None, "X".to_string());
        assert_eq!(None, props.id);
        let props = optional_identity(
            Some("EPSG".to_string()),
            Some("8801".to_string()),
            "Latitude of natural origin".to_string(),
        );
        assert_eq!(Some(ObjectId::new("EPSG", "8801")), props.id);
    }
}
