use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::LazyLock;

use crsdb_error::{Result, factory_err};

use crate::cache::DEFAULT_CACHE_CAPACITY;

/// Environment variable listing auxiliary catalogs.
pub const ENV_AUX_DB: &str = "PROJ_AUX_DB";
/// Environment variable listing the resource search path.
pub const ENV_DATA: &str = "PROJ_DATA";

pub const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 64;

/// Configuration of a database context.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextConfig {
    /// Primary catalog. Looked up as `proj.db` on the search path if unset.
    pub database_path: Option<PathBuf>,
    pub auxiliary_database_paths: Vec<PathBuf>,
    /// Directories searched for the catalog and grid files.
    pub search_paths: Vec<PathBuf>,
    /// Capacity of each object cache.
    pub cache_capacity: usize,
    pub statement_cache_capacity: usize,
    /// Format doubles with full round-trip precision.
    pub max_float_precision: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            database_path: None,
            auxiliary_database_paths: Vec::new(),
            search_paths: Vec::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
            max_float_precision: false,
        }
    }
}

impl ContextConfig {
    /// Default configuration completed from `PROJ_DATA` and `PROJ_AUX_DB`.
    pub fn from_env() -> Result<Self> {
        Self::from_env_vars(|key| std::env::var_os(key))
    }

    pub fn from_env_vars(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let mut conf = ContextConfig::default();
        for name in GET_SET_FUNCTIONS.keys() {
            conf.set_from_env(name, &lookup)?;
        }
        Ok(conf)
    }

    /// Sets `name` from its environment variable, if it has one and it is
    /// set. Returns whether the setting changed.
    pub fn set_from_env(
        &mut self,
        name: &str,
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Result<bool> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| factory_err!("missing setting for '{name}'"))?;
        let Some(value) = func.env_var.and_then(|var| lookup(var)) else {
            return Ok(false);
        };
        (func.set)(&value.to_string_lossy(), self)?;
        Ok(true)
    }

    pub fn set_from_str(&mut self, name: &str, value: &str) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| factory_err!("missing setting for '{name}'"))?;
        (func.set)(value, self)
    }

    pub fn get_as_string(&self, name: &str) -> Result<String> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| factory_err!("missing setting for '{name}'"))?;
        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = ContextConfig::default();
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| factory_err!("missing setting for '{name}'"))?;
        let value = (func.get)(&def_conf);
        (func.set)(&value, self)
    }

    /// Names and descriptions of all settings.
    pub fn settings() -> Vec<(&'static str, &'static str)> {
        let mut settings: Vec<_> = GET_SET_FUNCTIONS
            .iter()
            .map(|(name, func)| (*name, func.description))
            .collect();
        settings.sort();
        settings
    }
}

struct SettingFunctions {
    description: &'static str,
    env_var: Option<&'static str>,
    set: fn(value: &str, conf: &mut ContextConfig) -> Result<()>,
    get: fn(conf: &ContextConfig) -> String,
}

impl SettingFunctions {
    const fn new<S: ContextSetting>() -> Self {
        SettingFunctions {
            description: S::DESCRIPTION,
            env_var: S::ENV_VAR,
            set: S::set_from_str as _,
            get: S::get_as_string as _,
        }
    }
}

fn insert_setting<S: ContextSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<DatabasePath>(&mut map);
    insert_setting::<AuxiliaryDatabasePaths>(&mut map);
    insert_setting::<SearchPaths>(&mut map);
    insert_setting::<CacheCapacity>(&mut map);
    insert_setting::<StatementCacheCapacity>(&mut map);
    insert_setting::<MaxFloatPrecision>(&mut map);

    map
});

pub trait ContextSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    /// Environment variable the setting is read from, if any.
    const ENV_VAR: Option<&'static str> = None;

    fn set_from_str(value: &str, conf: &mut ContextConfig) -> Result<()>;
    fn get_as_string(conf: &ContextConfig) -> String;
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" => Ok(false),
        _ => Err(factory_err!("cannot parse '{value}' as a boolean")),
    }
}

fn parse_capacity(name: &str, value: &str) -> Result<usize> {
    let val: usize = value
        .trim()
        .parse()
        .map_err(|_| factory_err!("cannot parse '{value}' as a capacity for {name}"))?;
    if val == 0 {
        return Err(factory_err!("{name} cannot be zero"));
    }
    Ok(val)
}

fn join_paths(paths: &[PathBuf]) -> String {
    std::env::join_paths(paths)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn split_paths(value: &str) -> Vec<PathBuf> {
    std::env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

pub struct DatabasePath;

impl ContextSetting for DatabasePath {
    const NAME: &'static str = "database_path";
    const DESCRIPTION: &'static str = "Path of the primary catalog, empty to search for proj.db";

    fn set_from_str(value: &str, conf: &mut ContextConfig) -> Result<()> {
        conf.database_path = if value.is_empty() {
            None
        } else {
            Some(PathBuf::from(value))
        };
        Ok(())
    }

    fn get_as_string(conf: &ContextConfig) -> String {
        conf.database_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

pub struct AuxiliaryDatabasePaths;

impl ContextSetting for AuxiliaryDatabasePaths {
    const NAME: &'static str = "auxiliary_database_paths";
    const DESCRIPTION: &'static str = "Auxiliary catalogs, as a platform path list";
    const ENV_VAR: Option<&'static str> = Some(ENV_AUX_DB);

    fn set_from_str(value: &str, conf: &mut ContextConfig) -> Result<()> {
        conf.auxiliary_database_paths = split_paths(value);
        Ok(())
    }

    fn get_as_string(conf: &ContextConfig) -> String {
        join_paths(&conf.auxiliary_database_paths)
    }
}

pub struct SearchPaths;

impl ContextSetting for SearchPaths {
    const NAME: &'static str = "search_paths";
    const DESCRIPTION: &'static str = "Directories searched for the catalog and grids";
    const ENV_VAR: Option<&'static str> = Some(ENV_DATA);

    fn set_from_str(value: &str, conf: &mut ContextConfig) -> Result<()> {
        conf.search_paths = split_paths(value);
        Ok(())
    }

    fn get_as_string(conf: &ContextConfig) -> String {
        join_paths(&conf.search_paths)
    }
}

pub struct CacheCapacity;

impl ContextSetting for CacheCapacity {
    const NAME: &'static str = "cache_capacity";
    const DESCRIPTION: &'static str = "Number of entries kept in each object cache";

    fn set_from_str(value: &str, conf: &mut ContextConfig) -> Result<()> {
        conf.cache_capacity = parse_capacity(Self::NAME, value)?;
        Ok(())
    }

    fn get_as_string(conf: &ContextConfig) -> String {
        conf.cache_capacity.to_string()
    }
}

pub struct StatementCacheCapacity;

impl ContextSetting for StatementCacheCapacity {
    const NAME: &'static str = "statement_cache_capacity";
    const DESCRIPTION: &'static str = "Number of prepared statements kept per connection";

    fn set_from_str(value: &str, conf: &mut ContextConfig) -> Result<()> {
        conf.statement_cache_capacity = parse_capacity(Self::NAME, value)?;
        Ok(())
    }

    fn get_as_string(conf: &ContextConfig) -> String {
        conf.statement_cache_capacity.to_string()
    }
}

pub struct MaxFloatPrecision;

impl ContextSetting for MaxFloatPrecision {
    const NAME: &'static str = "max_float_precision";
    const DESCRIPTION: &'static str = "Format doubles with full round-trip precision";

    fn set_from_str(value: &str, conf: &mut ContextConfig) -> Result<()> {
        conf.max_float_precision = parse_bool(value)?;
        Ok(())
    }

    fn get_as_string(conf: &ContextConfig) -> String {
        conf.max_float_precision.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_reset() {
        let mut conf = ContextConfig::default();
        conf.set_from_str("cache_capacity", "16").unwrap();
        assert_eq!(16, conf.cache_capacity);
        assert_eq!("16", conf.get_as_string("cache_capacity").unwrap());

        conf.reset("cache_capacity").unwrap();
        assert_eq!(DEFAULT_CACHE_CAPACITY, conf.cache_capacity);

        conf.set_from_str("max_float_precision", "on").unwrap();
        assert!(conf.max_float_precision);
    }

    #[test]
    fn invalid_values() {
        let mut conf = ContextConfig::default();
        assert!(conf.set_from_str("cache_capacity", "0").is_err());
        assert!(conf.set_from_str("max_float_precision", "maybe").is_err());
        assert!(conf.set_from_str("no_such_setting", "1").is_err());
    }

    #[test]
    fn from_environment() {
        let aux = std::env::join_paths(["/tmp/a.db", "/tmp/b.db"]).unwrap();
        let conf = ContextConfig::from_env_vars(|key| match key {
            ENV_AUX_DB => Some(aux.clone()),
            ENV_DATA => Some(OsString::from("/usr/share/proj")),
            _ => None,
        })
        .unwrap();
        assert_eq!(
            vec![PathBuf::from("/tmp/a.db"), PathBuf::from("/tmp/b.db")],
            conf.auxiliary_database_paths
        );
        assert_eq!(vec![PathBuf::from("/usr/share/proj")], conf.search_paths);
        assert_eq!(None, conf.database_path);
        assert_eq!(DEFAULT_CACHE_CAPACITY, conf.cache_capacity);
    }

    #[test]
    fn only_settings_with_a_variable_read_the_environment() {
        struct TestCase {
            name: &'static str,
            changed: bool,
        }

        let test_cases = [
            TestCase { name: "search_paths", changed: true },
            TestCase { name: "auxiliary_database_paths", changed: true },
            TestCase { name: "cache_capacity", changed: false },
            TestCase { name: "database_path", changed: false },
        ];

        for test_case in test_cases {
            let mut conf = ContextConfig::default();
            let changed = conf
                .set_from_env(test_case.name, |_| Some(OsString::from("/tmp/x")))
                .unwrap();
            assert_eq!(test_case.changed, changed, "{}", test_case.name);
            let value = conf.get_as_string(test_case.name).unwrap();
            assert_eq!(test_case.changed, value == "/tmp/x", "{}", test_case.name);
        }

        let mut conf = ContextConfig::default();
        assert!(conf.set_from_env("no_such_setting", |_| None).is_err());
    }

    #[test]
    fn all_settings_listed() {
        let names: Vec<_> = ContextConfig::settings().into_iter().map(|(n, _)| n).collect();
        assert_eq!(6, names.len());
        assert!(names.contains(&"search_paths"));
    }
}
