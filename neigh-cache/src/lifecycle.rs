use anyhow::{Context, Result};
use tracing::info;

use crate::engine::{Table, TableEngine};
use crate::registry::TableRegistry;

/// Creates the neighbor tables for the enabled address families.
///
/// Meant to run once at startup. IPv4 is created first; if it fails the error
/// is returned and IPv6 is not attempted. A disabled family is left
/// un-created.
pub fn init_tables<E: TableEngine>(
    registry: &TableRegistry<E>,
    enable_ipv4: bool,
    enable_ipv6: bool,
) -> Result<()> {
    let tables = registry.tables();

    for (enabled, table) in [(enable_ipv4, &tables.v4), (enable_ipv6, &tables.v6)] {
        if !enabled {
            continue;
        }
        let spec = table.spec();
        table
            .create()
            .with_context(|| format!("failed to create neighbor map {}", spec.name))?;
        info!(
            table = spec.name,
            max_entries = spec.max_entries,
            "neighbor map ready"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Family;
    use crate::engine::{TableError, TableSpec};
    use crate::memory::MemoryEngine;

    #[test]
    fn creates_only_enabled_families() {
        let engine = MemoryEngine::new();
        let registry = TableRegistry::new(engine.clone(), 64);

        init_tables(&registry, true, false).unwrap();

        assert!(engine.exists("cilium_nodeport_neigh4"));
        assert!(!engine.exists("cilium_nodeport_neigh6"));
        assert_eq!(engine.stats().creates, 1);
    }

    #[test]
    fn nothing_enabled_creates_nothing() {
        let engine = MemoryEngine::new();
        let registry = TableRegistry::new(engine.clone(), 64);

        init_tables(&registry, false, false).unwrap();

        assert_eq!(engine.stats().creates, 0);
        // The table objects still exist, inert.
        assert_eq!(engine.stats().tables_built, 2);
    }

    #[test]
    fn repeated_initialization_succeeds() {
        let engine = MemoryEngine::new();
        let registry = TableRegistry::new(engine.clone(), 64);

        init_tables(&registry, true, true).unwrap();
        init_tables(&registry, true, true).unwrap();
        init_tables(&registry, false, true).unwrap();

        assert_eq!(engine.stats().creates, 5);
        assert_eq!(engine.stats().tables_built, 2);
    }

    #[test]
    fn ipv4_failure_skips_ipv6() {
        let engine = MemoryEngine::new();
        let wanted = TableSpec::neigh(Family::Ipv4, 64);
        engine
            .adopt(TableSpec {
                key_size: 16,
                ..wanted
            })
            .unwrap();
        let registry = TableRegistry::new(engine.clone(), 64);

        let err = init_tables(&registry, true, true).unwrap_err();

        assert!(
            err.to_string()
                .contains("failed to create neighbor map cilium_nodeport_neigh4")
        );
        assert!(matches!(
            err.downcast_ref::<TableError>(),
            Some(TableError::Incompatible { .. })
        ));
        assert!(!engine.exists("cilium_nodeport_neigh6"));
    }

    #[test]
    fn ipv6_failure_is_reported() {
        let registry = TableRegistry::new(MemoryEngine::new(), 0);

        let err = init_tables(&registry, false, true).unwrap_err();
        assert!(err.to_string().contains("cilium_nodeport_neigh6"));
    }
}
