//! The seam between the neighbor cache and whatever owns the kernel tables.
//!
//! An engine hands out inert [`Table`] objects. A table can be created in the
//! backing store and opened; an open [`TableHandle`] is closed when dropped.

use std::error::Error as StdError;
use std::mem::size_of;

use neigh_cache_common::{Key4, Key6, MAP4_NAME, MAP6_NAME, Value};

use crate::codec::{Family, NeighKey};

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("table `{name}` does not exist")]
    Missing { name: &'static str },
    #[error("table `{name}` already exists with an incompatible shape: {reason}")]
    Incompatible { name: &'static str, reason: String },
    #[error("{key_family} key used on {table_family} table `{name}`")]
    FamilyMismatch {
        name: &'static str,
        table_family: Family,
        key_family: Family,
    },
    #[error("key not present in table `{name}`")]
    KeyNotFound { name: &'static str },
    #[error("tables are not supported on this platform")]
    Unsupported,
    #[error("`{op}` on table `{name}` failed")]
    Engine {
        name: &'static str,
        op: &'static str,
        #[source]
        source: BoxError,
    },
}

impl TableError {
    pub fn engine(name: &'static str, op: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Engine {
            name,
            op,
            source: source.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableKind {
    LruHash,
}

/// Shape of a neighbor table as the engine must create it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableSpec {
    pub name: &'static str,
    pub family: Family,
    pub kind: TableKind,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub flags: u32,
}

impl TableSpec {
    pub fn neigh(family: Family, max_entries: u32) -> Self {
        let (name, key_size) = match family {
            Family::Ipv4 => (MAP4_NAME, size_of::<Key4>()),
            Family::Ipv6 => (MAP6_NAME, size_of::<Key6>()),
        };
        Self {
            name,
            family,
            kind: TableKind::LruHash,
            key_size: key_size as u32,
            value_size: size_of::<Value>() as u32,
            max_entries,
            flags: 0,
        }
    }

    /// Compares the parts of the shape an existing table must share with this
    /// one. Capacity is not part of it.
    pub fn check_compatible(&self, other: &TableSpec) -> Result<(), TableError> {
        let reason = if self.kind != other.kind {
            format!("kind {:?}, expected {:?}", other.kind, self.kind)
        } else if self.key_size != other.key_size {
            format!("key size {}, expected {}", other.key_size, self.key_size)
        } else if self.value_size != other.value_size {
            format!(
                "value size {}, expected {}",
                other.value_size, self.value_size
            )
        } else {
            return Ok(());
        };
        Err(TableError::Incompatible {
            name: self.name,
            reason,
        })
    }

    pub(crate) fn check_key(&self, key: &NeighKey) -> Result<(), TableError> {
        if key.family() == self.family {
            Ok(())
        } else {
            Err(TableError::FamilyMismatch {
                name: self.name,
                table_family: self.family,
                key_family: key.family(),
            })
        }
    }
}

/// Factory for table objects. Building a table must not touch the backing
/// store; that happens in [`Table::create`] and [`Table::open`].
pub trait TableEngine: Send + Sync {
    type Table: Table;

    fn new_table(&self, spec: TableSpec) -> Self::Table;
}

pub trait Table: Send + Sync {
    type Handle: TableHandle;

    fn spec(&self) -> &TableSpec;

    /// Creates the table in the backing store unless a compatible one exists.
    fn create(&self) -> Result<(), TableError>;

    fn open(&self) -> Result<Self::Handle, TableError>;
}

/// An open table. Dropping the handle closes it.
pub trait TableHandle {
    fn lookup(&self, key: &NeighKey) -> Result<Option<Value>, TableError>;

    fn update(&mut self, key: &NeighKey, value: &Value) -> Result<(), TableError>;

    fn delete(&mut self, key: &NeighKey) -> Result<(), TableError>;

    fn entries(&self) -> Result<Vec<(NeighKey, Value)>, TableError>;

    fn close(self)
    where
        Self: Sized,
    {
        drop(self);
    }
}
