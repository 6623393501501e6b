use std::cell::RefCell;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;

use crsdb_core::crs::Crs;
use crsdb_core::cs::CoordinateSystem;
use crsdb_core::datum::{DatumEnsemble, Ellipsoid, GeodeticDatum, PrimeMeridian, VerticalDatum};
use crsdb_core::extent::Extent;
use crsdb_core::grid::GridDescription;
use crsdb_core::ident::ObjectId;
use crsdb_core::operation::CoordinateOperation;
use crsdb_core::unit::UnitOfMeasure;

pub const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Fixed capacity least-recently-used map.
///
/// Values are cloned out; store `Arc`s or cheap enums of them.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: RefCell<IndexMap<K, V>>,
}

impl<K: Hash + Eq, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        LruCache {
            capacity: capacity.max(1),
            entries: RefCell::new(IndexMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.borrow_mut();
        let idx = entries.get_index_of(key)?;
        let last = entries.len() - 1;
        entries.move_index(idx, last);
        entries.get_index(last).map(|(_, v)| v.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.borrow_mut();
        let (idx, _) = entries.insert_full(key, value);
        let last = entries.len() - 1;
        entries.move_index(idx, last);
        while entries.len() > self.capacity {
            entries.shift_remove_index(0);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Per-kind caches of built objects.
#[derive(Debug)]
pub struct ObjectCaches {
    pub units: LruCache<ObjectId, Arc<UnitOfMeasure>>,
    /// Keyed by catalog table and id: a code may name CRS of different kinds.
    pub crs: LruCache<(&'static str, ObjectId), Crs>,
    pub ellipsoids: LruCache<ObjectId, Arc<Ellipsoid>>,
    pub geodetic_datums: LruCache<ObjectId, GeodeticDatum>,
    pub vertical_datums: LruCache<ObjectId, VerticalDatum>,
    pub datum_ensembles: LruCache<ObjectId, Arc<DatumEnsemble>>,
    pub prime_meridians: LruCache<ObjectId, Arc<PrimeMeridian>>,
    pub coordinate_systems: LruCache<ObjectId, Arc<CoordinateSystem>>,
    pub extents: LruCache<ObjectId, Arc<Extent>>,
    pub crs_to_crs_operations: LruCache<String, Vec<CoordinateOperation>>,
    pub grid_infos: LruCache<(String, bool), GridDescription>,
}

impl ObjectCaches {
    pub fn new(capacity: usize) -> Self {
        ObjectCaches {
            units: LruCache::new(capacity),
            crs: LruCache::new(capacity),
            ellipsoids: LruCache::new(capacity),
            geodetic_datums: LruCache::new(capacity),
            vertical_datums: LruCache::new(capacity),
            datum_ensembles: LruCache::new(capacity),
            prime_meridians: LruCache::new(capacity),
            coordinate_systems: LruCache::new(capacity),
            extents: LruCache::new(capacity),
            crs_to_crs_operations: LruCache::new(capacity),
            grid_infos: LruCache::new(capacity),
        }
    }

    pub fn clear(&self) {
        self.units.clear();
        self.crs.clear();
        self.ellipsoids.clear();
        self.geodetic_datums.clear();
        self.vertical_datums.clear();
        self.datum_ensembles.clear();
        self.prime_meridians.clear();
        self.coordinate_systems.clear();
        self.extents.clear();
        self.crs_to_crs_operations.clear();
        self.grid_infos.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let cache: LruCache<&str, i32> = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);

        // Touch "a" so "b" is the oldest.
        assert_eq!(Some(1), cache.get(&"a"));
        cache.insert("c", 3);

        assert_eq!(2, cache.len());
        assert_eq!(None, cache.get(&"b"));
        assert_eq!(Some(1), cache.get(&"a"));
        assert_eq!(Some(3), cache.get(&"c"));
    }

    #[test]
    fn reinsert_updates_value() {
        let cache: LruCache<&str, i32> = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("a", 5);
        assert_eq!(1, cache.len());
        assert_eq!(Some(5), cache.get(&"a"));

        cache.clear();
        assert!(cache.is_empty());
    }
}
