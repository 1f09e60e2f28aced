use std::path::PathBuf;

use neigh_cache_common::Value;

use super::ObjectSource;
use crate::codec::NeighKey;
use crate::engine::{Table, TableEngine, TableError, TableHandle, TableSpec};

pub struct PinnedEngine {}

impl PinnedEngine {
    pub fn new(_: impl Into<PathBuf>, _: Option<ObjectSource>) -> Self {
        Self {}
    }
}

impl TableEngine for PinnedEngine {
    type Table = PinnedTable;

    fn new_table(&self, spec: TableSpec) -> PinnedTable {
        PinnedTable { spec }
    }
}

pub struct PinnedTable {
    spec: TableSpec,
}

impl Table for PinnedTable {
    type Handle = PinnedHandle;

    fn spec(&self) -> &TableSpec {
        &self.spec
    }

    fn create(&self) -> Result<(), TableError> {
        Err(TableError::Unsupported)
    }

    fn open(&self) -> Result<PinnedHandle, TableError> {
        Err(TableError::Unsupported)
    }
}

// Never constructed: `open` always fails on this platform.
pub enum PinnedHandle {}

impl TableHandle for PinnedHandle {
    fn lookup(&self, _: &NeighKey) -> Result<Option<Value>, TableError> {
        match *self {}
    }

    fn update(&mut self, _: &NeighKey, _: &Value) -> Result<(), TableError> {
        match *self {}
    }

    fn delete(&mut self, _: &NeighKey) -> Result<(), TableError> {
        match *self {}
    }

    fn entries(&self) -> Result<Vec<(NeighKey, Value)>, TableError> {
        match *self {}
    }
}
