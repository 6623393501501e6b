//! Database context: connection handle, caches and insert session.
//!
//! A context is used from one thread at a time (it is `!Sync`). Read-only
//! handles on a catalog file are shared process wide when no auxiliary
//! catalog is attached.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crsdb_core::grid::{GridCatalog, GridDescription};
use crsdb_core::ident::ObjectId;
use crsdb_core::name::canonicalize_name;
use crsdb_error::{FactoryError, Result, factory_err};

use crate::attach;
use crate::cache::ObjectCaches;
use crate::config::{AuxiliaryDatabasePaths, ContextConfig, ContextSetting};
use crate::exec;
use crate::functions;
use crate::insert::InsertStatement;
use crate::layout::{self, LayoutFeature, LayoutVersion};
use crate::param::{Param, Row};
use crate::search_path::SearchPath;

/// Open connection plus what was validated when opening it.
#[derive(Debug)]
pub struct SqliteHandle {
    conn: Mutex<Connection>,
    layout: LayoutVersion,
    /// Schema holding the primary catalog: `main`, or `db_0` when attached.
    main_schema: &'static str,
}

/// Shared handles by canonical path and statement cache capacity.
static HANDLE_CACHE: LazyLock<Mutex<HashMap<(PathBuf, usize), Weak<SqliteHandle>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static SESSION_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn open_error(path: &Path, err: rusqlite::Error) -> FactoryError {
    factory_err!("cannot open {}: {err}", path.display())
}

fn prepare_connection(conn: &Connection, statement_cache_capacity: usize) -> Result<()> {
    functions::register(conn).map_err(|e| factory_err!("cannot register sql functions: {e}"))?;
    conn.set_prepared_statement_cache_capacity(statement_cache_capacity);
    Ok(())
}

/// `file:` URI opening `path` read-only.
fn read_only_uri(path: &Path) -> String {
    let mut uri = String::from("file:");
    for c in path.to_string_lossy().chars() {
        match c {
            '%' => uri.push_str("%25"),
            '?' => uri.push_str("%3f"),
            '#' => uri.push_str("%23"),
            '\\' => uri.push('/'),
            c => uri.push(c),
        }
    }
    uri.push_str("?mode=ro");
    uri
}

impl SqliteHandle {
    /// Shared read-only handle on a single catalog.
    fn open_shared(path: &Path, statement_cache_capacity: usize) -> Result<Arc<SqliteHandle>> {
        let canonical = std::fs::canonicalize(path).map_err(|source| FactoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let key = (canonical, statement_cache_capacity);
        let mut cache = HANDLE_CACHE.lock();
        if let Some(handle) = cache.get(&key).and_then(|w| w.upgrade()) {
            debug!(path = %key.0.display(), "reusing catalog handle");
            return Ok(handle);
        }
        cache.retain(|_, w| w.strong_count() > 0);

        let canonical = &key.0;
        let conn = Connection::open_with_flags(
            canonical,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| open_error(canonical, e))?;
        prepare_connection(&conn, statement_cache_capacity)?;

        let version = layout::read_layout_version(&conn, "main")?;
        let layout = layout::check_main_layout(version, canonical)?;

        let handle = Arc::new(SqliteHandle {
            conn: Mutex::new(conn),
            layout,
            main_schema: "main",
        });
        cache.insert(key, Arc::downgrade(&handle));
        Ok(handle)
    }

    /// Private handle attaching the primary catalog, auxiliary catalogs and
    /// optionally the insert session database.
    fn open_attached(
        main: &Path,
        aux: &[PathBuf],
        session_uri: Option<&str>,
        statement_cache_capacity: usize,
    ) -> Result<Arc<SqliteHandle>> {
        let conn = Connection::open_with_flags(
            ":memory:",
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| open_error(main, e))?;
        prepare_connection(&conn, statement_cache_capacity)?;

        for path in std::iter::once(main).chain(aux.iter().map(|p| p.as_path())) {
            if !path.is_file() {
                return Err(FactoryError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such catalog"),
                });
            }
        }

        let mut files: Vec<String> = std::iter::once(main)
            .chain(aux.iter().map(|p| p.as_path()))
            .map(read_only_uri)
            .collect();
        if let Some(uri) = session_uri {
            files.push(uri.to_string());
        }
        attach::attach_all(&conn, &files)?;

        let version = layout::read_layout_version(&conn, &attach::schema_name(0))?;
        let layout = layout::check_main_layout(version, main)?;
        for (idx, path) in aux.iter().enumerate() {
            let version = layout::read_layout_version(&conn, &attach::schema_name(idx + 1))?;
            layout::check_auxiliary_layout(layout, version, path)?;
        }

        attach::create_union_views(&conn, files.len())?;
        attach::recreate_views(&conn)?;

        Ok(Arc::new(SqliteHandle {
            conn: Mutex::new(conn),
            layout,
            main_schema: "db_0",
        }))
    }
}

#[derive(Debug)]
struct InsertSession {
    uri: String,
    /// Keeps the shared in-memory database alive and receives inserts.
    conn: Connection,
}

/// Catalog entries sharing a canonical name.
pub type CanonicalNameMap = HashMap<String, Vec<(String, ObjectId)>>;

#[derive(Debug)]
pub struct DatabaseContext {
    config: ContextConfig,
    search_path: SearchPath,
    main_path: PathBuf,
    handle: RefCell<Arc<SqliteHandle>>,
    caches: ObjectCaches,
    canonical_datum_names: RefCell<Option<Arc<CanonicalNameMap>>>,
    session: RefCell<Option<InsertSession>>,
}

impl DatabaseContext {
    pub fn open(config: ContextConfig) -> Result<Self> {
        Self::open_with_env(config, |key| std::env::var_os(key))
    }

    /// Opens with `PROJ_AUX_DB` read through `lookup` when no auxiliary
    /// catalog is configured.
    pub fn open_with_env(
        mut config: ContextConfig,
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self> {
        if config.auxiliary_database_paths.is_empty()
            && config.set_from_env(AuxiliaryDatabasePaths::NAME, lookup)?
        {
            debug!(paths = ?config.auxiliary_database_paths, "auxiliary catalogs from environment");
        }

        let search_path = SearchPath::new(config.search_paths.clone());
        let main_path = match &config.database_path {
            Some(p) => p.clone(),
            None => search_path.find_catalog()?,
        };

        let handle = Self::open_handle(&config, &main_path, None)?;
        info!(
            path = %main_path.display(),
            auxiliary = config.auxiliary_database_paths.len(),
            layout_minor = handle.layout.minor,
            "opened catalog"
        );

        Ok(DatabaseContext {
            caches: ObjectCaches::new(config.cache_capacity),
            config,
            search_path,
            main_path,
            handle: RefCell::new(handle),
            canonical_datum_names: RefCell::new(None),
            session: RefCell::new(None),
        })
    }

    /// Context on a single catalog file with default settings.
    pub fn open_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(ContextConfig {
            database_path: Some(path.into()),
            ..Default::default()
        })
    }

    fn open_handle(
        config: &ContextConfig,
        main_path: &Path,
        session_uri: Option<&str>,
    ) -> Result<Arc<SqliteHandle>> {
        if config.auxiliary_database_paths.is_empty() && session_uri.is_none() {
            SqliteHandle::open_shared(main_path, config.statement_cache_capacity)
        } else {
            SqliteHandle::open_attached(
                main_path,
                &config.auxiliary_database_paths,
                session_uri,
                config.statement_cache_capacity,
            )
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn path(&self) -> &Path {
        &self.main_path
    }

    pub fn layout_version(&self) -> LayoutVersion {
        self.handle.borrow().layout
    }

    pub fn supports(&self, feature: LayoutFeature) -> bool {
        self.layout_version().supports(feature)
    }

    pub fn caches(&self) -> &ObjectCaches {
        &self.caches
    }

    pub fn clear_caches(&self) {
        self.caches.clear();
        self.canonical_datum_names.replace(None);
    }

    /// Runs a statement against the catalog.
    pub fn run(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>> {
        let handle = self.handle.borrow().clone();
        let conn = handle.conn.lock();
        exec::run(&conn, sql, params, self.config.max_float_precision)
    }

    /// Canonicalized names of geodetic and vertical datums, aliases included.
    pub fn canonical_datum_names(&self) -> Result<Arc<CanonicalNameMap>> {
        if let Some(map) = self.canonical_datum_names.borrow().as_ref() {
            return Ok(map.clone());
        }

        let rows = self.run(
            "SELECT 'geodetic_datum', auth_name, code, name FROM geodetic_datum \
             UNION ALL SELECT 'vertical_datum', auth_name, code, name FROM vertical_datum \
             UNION ALL SELECT table_name, auth_name, code, alt_name FROM alias_name \
             WHERE table_name IN ('geodetic_datum', 'vertical_datum')",
            &[],
        )?;
        let mut map = CanonicalNameMap::new();
        for row in rows {
            let table = row.get_string(0)?;
            let id = ObjectId::new(row.get_string(1)?, row.get_string(2)?);
            let name = canonicalize_name(&row.get_string(3)?);
            let entries = map.entry(name).or_default();
            if !entries.iter().any(|(t, i)| t == &table && i == &id) {
                entries.push((table, id));
            }
        }

        let map = Arc::new(map);
        self.canonical_datum_names.replace(Some(map.clone()));
        Ok(map)
    }

    /// Grid availability, looked up in `grid_alternatives` and on the
    /// search path.
    pub fn look_for_grid_info(
        &self,
        name: &str,
        consider_known_grids_as_available: bool,
    ) -> Result<GridDescription> {
        let key = (name.to_string(), consider_known_grids_as_available);
        if let Some(desc) = self.caches.grid_infos.get(&key) {
            return Ok(desc);
        }

        let rows = self.run(
            "SELECT ga.proj_grid_name, ga.package_name, COALESCE(ga.url, gp.url), \
             COALESCE(ga.direct_download, gp.direct_download), \
             COALESCE(ga.open_license, gp.open_license) \
             FROM grid_alternatives ga \
             LEFT JOIN grid_packages gp ON ga.package_name = gp.package_name \
             WHERE ga.proj_grid_name = ?1 OR ga.old_proj_grid_name = ?1 OR ga.original_grid_name = ?1",
            &[Param::from(name)],
        )?;

        let mut desc = GridDescription {
            short_name: name.to_string(),
            ..Default::default()
        };
        let mut local_name = name.to_string();
        if let Some(row) = rows.first() {
            local_name = row.get_string(0)?;
            desc.package_name = row.get_opt_string(1)?;
            desc.url = row.get_opt_string(2)?;
            desc.direct_download = row.get_bool(3)?;
            desc.open_license = row.get_bool(4)?;
        }

        let found = self
            .search_path
            .find(&local_name)
            .or_else(|| self.search_path.find(name));
        desc.available = found.is_some();
        desc.full_name = found.map(|p| p.to_string_lossy().into_owned());
        if !desc.available
            && consider_known_grids_as_available
            && desc.direct_download
            && desc.url.is_some()
        {
            desc.available = true;
        }

        debug!(%name, available = desc.available, "grid info");
        self.caches.grid_infos.insert(key, desc.clone());
        Ok(desc)
    }

    /// `CREATE` statements of the primary catalog's tables and indexes.
    pub fn database_structure(&self) -> Result<Vec<String>> {
        let schema = self.handle.borrow().main_schema;
        let rows = self.run(
            &format!(
                "SELECT sql FROM {schema}.sqlite_master WHERE type IN ('table', 'index') \
                 AND sql IS NOT NULL AND name NOT LIKE 'sqlite_%' ORDER BY rowid"
            ),
            &[],
        )?;
        rows.iter().map(|r| r.get_string(0)).collect()
    }

    pub fn has_insert_session(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// Attaches an empty in-memory database with the catalog's structure.
    /// Statements executed with [`DatabaseContext::execute_insert`] land in
    /// it and become visible to every lookup.
    pub fn start_insert_statements_session(&self) -> Result<()> {
        if self.has_insert_session() {
            return Err(factory_err!("an insert statements session is already active"));
        }
        self.layout_version().require(LayoutFeature::Authoring)?;

        let structure = self.database_structure()?;
        let uri = format!(
            "file:crsdb_insert_{}_{}?mode=memory&cache=shared",
            std::process::id(),
            SESSION_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        let conn = Connection::open_with_flags(
            &uri,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| factory_err!("cannot create insert session database: {e}"))?;
        for sql in &structure {
            exec::execute_batch(&conn, sql)?;
        }

        let handle = Self::open_handle(&self.config, &self.main_path, Some(&uri))?;
        self.handle.replace(handle);
        self.session.replace(Some(InsertSession { uri, conn }));
        debug!("insert statements session started");
        Ok(())
    }

    /// Executes an insert statement in the active session.
    pub fn execute_insert(&self, stmt: &InsertStatement) -> Result<()> {
        let session = self.session.borrow();
        let session = session
            .as_ref()
            .ok_or_else(|| factory_err!("no insert statements session is active"))?;
        exec::execute_batch(&session.conn, &stmt.to_string())?;
        self.caches.crs_to_crs_operations.clear();
        self.canonical_datum_names.replace(None);
        Ok(())
    }

    /// Detaches the session database and clears every cache.
    pub fn stop_insert_statements_session(&self) -> Result<()> {
        if !self.has_insert_session() {
            return Err(factory_err!("no insert statements session is active"));
        }
        let handle = Self::open_handle(&self.config, &self.main_path, None)?;
        self.handle.replace(handle);
        if let Some(session) = self.session.replace(None) {
            debug!(uri = %session.uri, "insert statements session stopped");
        }
        self.clear_caches();
        Ok(())
    }
}

impl GridCatalog for DatabaseContext {
    fn grid_description(
        &self,
        name: &str,
        consider_known_as_available: bool,
    ) -> Result<GridDescription> {
        self.look_for_grid_info(name, consider_known_as_available)
    }
}
