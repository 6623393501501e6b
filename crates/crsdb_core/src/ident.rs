use std::fmt;
use std::sync::Arc;

use crate::extent::Extent;

/// Catalog identity of an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub authority: String,
    pub code: String,
}

impl ObjectId {
    pub fn new(authority: impl Into<String>, code: impl Into<String>) -> Self {
        ObjectId {
            authority: authority.into(),
            code: code.into(),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.authority, self.code)
    }
}

/// Scope and extent where an object is valid.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectUsage {
    pub scope: Option<String>,
    pub extent: Arc<Extent>,
}

/// Properties common to all identified objects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectProperties {
    pub id: Option<ObjectId>,
    pub name: String,
    pub remarks: Option<String>,
    pub deprecated: bool,
    pub usages: Vec<ObjectUsage>,
}

impl ObjectProperties {
    pub fn named(name: impl Into<String>) -> Self {
        ObjectProperties {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn identified(id: ObjectId, name: impl Into<String>) -> Self {
        ObjectProperties {
            id: Some(id),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_usages(mut self, usages: Vec<ObjectUsage>) -> Self {
        self.usages = usages;
        self
    }

    pub fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// First extent of the usages, if any.
    pub fn domain_extent(&self) -> Option<&Arc<Extent>> {
        self.usages.first().map(|u| &u.extent)
    }

    /// True if both objects carry the same identifier.
    pub fn same_id(&self, other: &ObjectProperties) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
