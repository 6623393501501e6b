use crsdb_error::Result;

/// What is known about a grid file referenced by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GridDescription {
    pub short_name: String,
    /// Path of the file when found locally.
    pub full_name: Option<String>,
    pub package_name: Option<String>,
    pub url: Option<String>,
    pub direct_download: bool,
    pub open_license: bool,
    pub available: bool,
}

/// Source of grid availability information.
pub trait GridCatalog {
    /// Describes the grid `name`. With `consider_known_as_available`, grids
    /// the catalog knows a direct download URL for count as available.
    fn grid_description(&self, name: &str, consider_known_as_available: bool)
    -> Result<GridDescription>;
}
