use std::path::{Path, PathBuf};

use tracing::debug;

use crsdb_error::{Result, factory_err};

pub const DEFAULT_CATALOG_FILE: &str = "proj.db";

/// Ordered directories where catalogs and grid files are looked up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        SearchPath { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// First existing file named `name`. Absolute paths are checked as is.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        let found = self
            .dirs
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file());
        debug!(%name, found = ?found, "searched for file");
        found
    }

    pub fn find_catalog(&self) -> Result<PathBuf> {
        self.find(DEFAULT_CATALOG_FILE).ok_or_else(|| {
            factory_err!(
                "cannot find {DEFAULT_CATALOG_FILE} in search path {:?}",
                self.dirs
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("grid.tif"), b"").unwrap();
        std::fs::write(second.path().join(DEFAULT_CATALOG_FILE), b"").unwrap();
        std::fs::write(first.path().join(DEFAULT_CATALOG_FILE), b"").unwrap();

        let search = SearchPath::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(Some(second.path().join("grid.tif")), search.find("grid.tif"));
        assert_eq!(first.path().join(DEFAULT_CATALOG_FILE), search.find_catalog().unwrap());
        assert_eq!(None, search.find("missing.tif"));
    }

    #[test]
    fn missing_catalog() {
        let search = SearchPath::default();
        assert!(search.find_catalog().is_err());
    }
}
