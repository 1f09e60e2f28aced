//! Nodeport neighbor cache: the IPv4 and IPv6 LRU maps through which the tc
//! datapath resolves a destination IP to the next hop's MAC address.
//!
//! The agent creates the maps at startup ([`init_tables`]) and evicts stale
//! entries on demand ([`retire`]). Entries are only ever inserted by the
//! datapath side.

pub mod codec;
pub mod config;
pub mod dump;
pub mod engine;
pub mod lifecycle;
pub mod memory;
pub mod pinned;
pub mod registry;
pub mod retire;

pub use codec::{Family, NeighKey};
pub use engine::{Table, TableEngine, TableError, TableHandle, TableSpec};
pub use lifecycle::init_tables;
pub use neigh_cache_common::{Key4, Key6, MAP4_NAME, MAP6_NAME, Value};
pub use registry::{NeighTables, TableRegistry};
pub use retire::{retire, retire_addr};
