use std::net::IpAddr;

use tracing::{debug, trace};

use crate::codec::{Family, NeighKey, raw_octets};
use crate::engine::{Table, TableEngine, TableError, TableHandle};
use crate::registry::TableRegistry;

/// Removes the cached neighbor entry for `ip`.
///
/// The table is picked by address length: 4 bytes is IPv4, anything else
/// IPv6. Nothing is reported back. A table that cannot be opened means there
/// is nothing to retire, and a failed delete leaves an entry the LRU will age
/// out on its own. The handle is closed before returning.
pub fn retire<E: TableEngine>(registry: &TableRegistry<E>, ip: &[u8]) {
    let table = registry.table(Family::of(ip));
    let name = table.spec().name;

    let mut handle = match table.open() {
        Ok(handle) => handle,
        Err(err) => {
            debug!(table = name, error = %err, "cannot open neighbor map, skipping retire");
            return;
        }
    };

    let key = NeighKey::from_raw(ip);
    match handle.delete(&key) {
        Ok(()) => debug!(table = name, ip = %key, "retired neighbor entry"),
        Err(TableError::KeyNotFound { .. }) => trace!(table = name, ip = %key, "no cached neighbor"),
        Err(err) => debug!(table = name, ip = %key, error = %err, "failed to retire neighbor entry"),
    }

    handle.close();
}

pub fn retire_addr<E: TableEngine>(registry: &TableRegistry<E>, ip: IpAddr) {
    retire(registry, &raw_octets(ip));
}
