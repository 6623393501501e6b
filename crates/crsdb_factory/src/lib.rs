//! Builds domain objects from catalog rows and searches the catalog.
//!
//! [`AuthorityFactory`] is the entry point: one `create_*` method per object
//! kind, listings, name search, coordinate operation search and authoring of
//! insert statements. Built objects are cached on the [`DatabaseContext`]
//! shared by every factory.
//!
//! [`DatabaseContext`]: crsdb_sqlite::DatabaseContext

mod authoring;
mod crs;
mod factory;
mod listing;
mod name_search;
mod object_type;
mod objects;
mod operations;
mod resolver;
mod text;

pub use factory::{AuthorityFactory, Collaborators, FactoryObject, ResolveDepth};
pub use listing::{CelestialBodyInfo, CrsInfo, UnitInfo};
pub use object_type::{ObjectType, TableFilter};
pub use resolver::{IntermediateOptions, OperationSearchOptions};
pub use text::{ParseContext, TextDefinitionParser};
