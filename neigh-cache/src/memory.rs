//! In-process engine: every table is a fixed-capacity LRU map.
//!
//! Used wherever the kernel is not available. It keeps counters of every
//! engine operation so callers can check how tables were driven.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lru::LruCache;
use neigh_cache_common::Value;
use parking_lot::Mutex;

use crate::codec::NeighKey;
use crate::engine::{Table, TableEngine, TableError, TableHandle, TableSpec};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EngineStats {
    pub tables_built: usize,
    pub creates: usize,
    pub opens: usize,
    pub closes: usize,
    pub deletes: usize,
}

#[derive(Clone, Default)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    stores: Mutex<HashMap<&'static str, Arc<Mutex<Store>>>>,
    tables_built: AtomicUsize,
    creates: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    deletes: AtomicUsize,
}

struct Store {
    spec: TableSpec,
    entries: LruCache<NeighKey, Value>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> EngineStats {
        let s = &self.shared;
        EngineStats {
            tables_built: s.tables_built.load(Ordering::SeqCst),
            creates: s.creates.load(Ordering::SeqCst),
            opens: s.opens.load(Ordering::SeqCst),
            closes: s.closes.load(Ordering::SeqCst),
            deletes: s.deletes.load(Ordering::SeqCst),
        }
    }

    /// Whether a table with this name exists, i.e. was created.
    pub fn exists(&self, name: &str) -> bool {
        self.shared.stores.lock().contains_key(name)
    }

    /// Registers a table that was created outside this process, such as one
    /// left behind by a previous agent with a different shape.
    pub fn adopt(&self, spec: TableSpec) -> Result<(), TableError> {
        let store = Store::new(spec)?;
        self.shared
            .stores
            .lock()
            .insert(spec.name, Arc::new(Mutex::new(store)));
        Ok(())
    }
}

impl TableEngine for MemoryEngine {
    type Table = MemoryTable;

    fn new_table(&self, spec: TableSpec) -> MemoryTable {
        self.shared.tables_built.fetch_add(1, Ordering::SeqCst);
        MemoryTable {
            spec,
            shared: self.shared.clone(),
        }
    }
}

impl Store {
    fn new(spec: TableSpec) -> Result<Self, TableError> {
        let capacity = NonZeroUsize::new(spec.max_entries as usize).ok_or_else(|| {
            TableError::engine(spec.name, "create", "max_entries must be greater than zero")
        })?;
        Ok(Self {
            spec,
            entries: LruCache::new(capacity),
        })
    }
}

pub struct MemoryTable {
    spec: TableSpec,
    shared: Arc<Shared>,
}

impl Table for MemoryTable {
    type Handle = MemoryHandle;

    fn spec(&self) -> &TableSpec {
        &self.spec
    }

    fn create(&self) -> Result<(), TableError> {
        self.shared.creates.fetch_add(1, Ordering::SeqCst);
        let mut stores = self.shared.stores.lock();
        if let Some(existing) = stores.get(self.spec.name) {
            return self.spec.check_compatible(&existing.lock().spec);
        }
        let store = Store::new(self.spec)?;
        stores.insert(self.spec.name, Arc::new(Mutex::new(store)));
        Ok(())
    }

    fn open(&self) -> Result<MemoryHandle, TableError> {
        let store = self
            .shared
            .stores
            .lock()
            .get(self.spec.name)
            .cloned()
            .ok_or(TableError::Missing {
                name: self.spec.name,
            })?;
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryHandle {
            spec: self.spec,
            store,
            shared: self.shared.clone(),
        })
    }
}

pub struct MemoryHandle {
    spec: TableSpec,
    store: Arc<Mutex<Store>>,
    shared: Arc<Shared>,
}

impl TableHandle for MemoryHandle {
    fn lookup(&self, key: &NeighKey) -> Result<Option<Value>, TableError> {
        self.spec.check_key(key)?;
        Ok(self.store.lock().entries.get(key).copied())
    }

    fn update(&mut self, key: &NeighKey, value: &Value) -> Result<(), TableError> {
        self.spec.check_key(key)?;
        self.store.lock().entries.put(*key, Value::new(value.mac()));
        Ok(())
    }

    fn delete(&mut self, key: &NeighKey) -> Result<(), TableError> {
        self.spec.check_key(key)?;
        self.shared.deletes.fetch_add(1, Ordering::SeqCst);
        match self.store.lock().entries.pop(key) {
            Some(_) => Ok(()),
            None => Err(TableError::KeyNotFound {
                name: self.spec.name,
            }),
        }
    }

    fn entries(&self) -> Result<Vec<(NeighKey, Value)>, TableError> {
        let store = self.store.lock();
        Ok(store.entries.iter().map(|(k, v)| (*k, *v)).collect())
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }
}
