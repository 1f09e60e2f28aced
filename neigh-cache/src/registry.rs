use once_cell::sync::OnceCell;
use tracing::debug;

use crate::codec::Family;
use crate::engine::{TableEngine, TableSpec};

/// The IPv4 and IPv6 neighbor tables.
#[derive(Debug)]
pub struct NeighTables<T> {
    pub v4: T,
    pub v6: T,
}

impl<T> NeighTables<T> {
    pub fn get(&self, family: Family) -> &T {
        match family {
            Family::Ipv4 => &self.v4,
            Family::Ipv6 => &self.v6,
        }
    }
}

/// Owns the table pair for one engine.
///
/// The pair is built on first access, exactly once: concurrent first callers
/// block until the single construction finishes and then all see the same
/// tables. Building a table object does not create it in the engine.
pub struct TableRegistry<E: TableEngine> {
    engine: E,
    max_entries: u32,
    tables: OnceCell<NeighTables<E::Table>>,
}

impl<E: TableEngine> TableRegistry<E> {
    pub fn new(engine: E, max_entries: u32) -> Self {
        Self {
            engine,
            max_entries,
            tables: OnceCell::new(),
        }
    }

    pub fn tables(&self) -> &NeighTables<E::Table> {
        self.tables.get_or_init(|| {
            debug!(max_entries = self.max_entries, "building neighbor tables");
            NeighTables {
                v4: self
                    .engine
                    .new_table(TableSpec::neigh(Family::Ipv4, self.max_entries)),
                v6: self
                    .engine
                    .new_table(TableSpec::neigh(Family::Ipv6, self.max_entries)),
            }
        })
    }

    pub fn table(&self, family: Family) -> &E::Table {
        self.tables().get(family)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::engine::Table;
    use crate::memory::MemoryEngine;

    #[test]
    fn tables_are_built_lazily() {
        let engine = MemoryEngine::new();
        let registry = TableRegistry::new(engine.clone(), 128);
        assert_eq!(engine.stats().tables_built, 0);

        let tables = registry.tables();
        assert_eq!(engine.stats().tables_built, 2);
        assert_eq!(tables.v4.spec().name, "cilium_nodeport_neigh4");
        assert_eq!(tables.v6.spec().name, "cilium_nodeport_neigh6");
        assert_eq!(tables.v4.spec().max_entries, 128);
        assert_eq!(tables.v6.spec().max_entries, 128);

        // Building is inert.
        assert_eq!(engine.stats().creates, 0);
        assert_eq!(engine.stats().opens, 0);
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        const CALLERS: usize = 32;

        let engine = MemoryEngine::new();
        let registry = TableRegistry::new(engine.clone(), 128);
        let barrier = Barrier::new(CALLERS);

        let seen: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..CALLERS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        registry.tables() as *const _ as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(engine.stats().tables_built, 2);
        assert!(seen.iter().all(|addr| *addr == seen[0]));
    }

    #[test]
    fn table_selects_by_family() {
        let registry = TableRegistry::new(MemoryEngine::new(), 16);
        assert_eq!(registry.table(Family::Ipv4).spec().family, Family::Ipv4);
        assert_eq!(registry.table(Family::Ipv6).spec().family, Family::Ipv6);
        assert!(std::ptr::eq(registry.table(Family::Ipv4), &registry.tables().v4));
    }
}
