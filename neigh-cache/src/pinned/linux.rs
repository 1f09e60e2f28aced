use std::fs;
use std::io;
use std::path::PathBuf;

use aya::maps::{HashMap, Map, MapData, MapError};
use aya::pin::PinError;
use aya::{Ebpf, EbpfLoader, Pod};
use neigh_cache_common::{Key4, Key6, Value};
use tracing::{debug, info};

use super::{ObjectSource, pin_path};
use crate::codec::{Family, NeighKey};
use crate::engine::{Table, TableEngine, TableError, TableHandle, TableSpec};

#[cfg(feature = "embed")]
static EBPF_BYTES: &[u8] = aya::include_bytes_aligned!(concat!(env!("OUT_DIR"), "/neigh-cache"));

pub struct PinnedEngine {
    bpf_root: PathBuf,
    object: Option<ObjectSource>,
}

impl PinnedEngine {
    pub fn new(bpf_root: impl Into<PathBuf>, object: Option<ObjectSource>) -> Self {
        Self {
            bpf_root: bpf_root.into(),
            object,
        }
    }
}

impl TableEngine for PinnedEngine {
    type Table = PinnedTable;

    fn new_table(&self, spec: TableSpec) -> PinnedTable {
        PinnedTable {
            pin: pin_path(&self.bpf_root, spec.name),
            object: self.object.clone(),
            spec,
        }
    }
}

pub struct PinnedTable {
    spec: TableSpec,
    pin: PathBuf,
    object: Option<ObjectSource>,
}

impl PinnedTable {
    fn open_map(&self) -> Result<Map, TableError> {
        let name = self.spec.name;
        let data = MapData::from_pin(&self.pin).map_err(|err| open_error(name, err))?;
        Map::from_map_data(data).map_err(|err| TableError::engine(name, "open", err))
    }

    /// Accepts a map that is already pinned if the datapath could use it.
    fn check_existing(&self) -> Result<(), TableError> {
        let name = self.spec.name;
        let map = self.open_map()?;
        if !matches!(map, Map::LruHashMap(_)) {
            return Err(TableError::Incompatible {
                name,
                reason: "pinned map is not an LRU hash map".to_string(),
            });
        }
        let sized = match self.spec.family {
            Family::Ipv4 => HashMap::<_, Key4, Value>::try_from(&map).map(drop),
            Family::Ipv6 => HashMap::<_, Key6, Value>::try_from(&map).map(drop),
        };
        sized.map_err(|err| TableError::Incompatible {
            name,
            reason: err.to_string(),
        })?;
        info!(table = name, pin = %self.pin.display(), "neighbor map already pinned");
        Ok(())
    }

    fn load_object(&self) -> Result<Ebpf, TableError> {
        let name = self.spec.name;
        let source = self
            .object
            .as_ref()
            .ok_or_else(|| TableError::engine(name, "create", "no datapath object configured"))?;

        let mut loader = EbpfLoader::new();
        #[allow(deprecated)]
        {
            loader.set_max_entries(name, self.spec.max_entries);
        }

        match source {
            ObjectSource::File(path) => loader
                .load_file(path)
                .map_err(|err| TableError::engine(name, "load", err)),
            ObjectSource::Embedded => load_embedded(&mut loader, name),
        }
    }
}

#[cfg(feature = "embed")]
fn load_embedded(loader: &mut EbpfLoader<'_>, name: &'static str) -> Result<Ebpf, TableError> {
    loader
        .load(EBPF_BYTES)
        .map_err(|err| TableError::engine(name, "load", err))
}

#[cfg(not(feature = "embed"))]
fn load_embedded(_: &mut EbpfLoader<'_>, name: &'static str) -> Result<Ebpf, TableError> {
    Err(TableError::engine(
        name,
        "load",
        "built without an embedded datapath object",
    ))
}

impl Table for PinnedTable {
    type Handle = PinnedHandle;

    fn spec(&self) -> &TableSpec {
        &self.spec
    }

    fn create(&self) -> Result<(), TableError> {
        let name = self.spec.name;
        if self.pin.exists() {
            return self.check_existing();
        }

        let mut bpf = self.load_object()?;
        if let Some(parent) = self.pin.parent() {
            fs::create_dir_all(parent).map_err(|err| TableError::engine(name, "create", err))?;
        }
        let map = bpf.map_mut(name).ok_or_else(|| {
            TableError::engine(name, "create", format!("map {name} not in datapath object"))
        })?;

        match map.pin(&self.pin) {
            Ok(()) => {
                info!(
                    table = name,
                    pin = %self.pin.display(),
                    max_entries = self.spec.max_entries,
                    "created neighbor map"
                );
                Ok(())
            }
            // Lost a race with another creator; theirs must still fit.
            Err(PinError::SyscallError(err)) if err.io_error.kind() == io::ErrorKind::AlreadyExists => {
                self.check_existing()
            }
            Err(err) => Err(TableError::engine(name, "pin", err)),
        }
    }

    fn open(&self) -> Result<PinnedHandle, TableError> {
        let map = self.open_map()?;
        debug!(table = self.spec.name, "opened neighbor map");
        Ok(PinnedHandle {
            spec: self.spec,
            map,
        })
    }
}

/// Open pinned map. The file descriptor is released on drop.
pub struct PinnedHandle {
    spec: TableSpec,
    map: Map,
}

fn syscall_error_kind(err: &MapError) -> Option<io::ErrorKind> {
    match err {
        MapError::SyscallError(err) => Some(err.io_error.kind()),
        _ => None,
    }
}

/// A pin that is not there means the table was never created.
fn open_error(name: &'static str, err: MapError) -> TableError {
    match syscall_error_kind(&err) {
        Some(io::ErrorKind::NotFound) => TableError::Missing { name },
        _ => TableError::engine(name, "open", err),
    }
}

/// The kernel reports a missing key on delete as ENOENT.
fn delete_error(name: &'static str, err: MapError) -> TableError {
    match err {
        MapError::KeyNotFound => TableError::KeyNotFound { name },
        err if syscall_error_kind(&err) == Some(io::ErrorKind::NotFound) => {
            TableError::KeyNotFound { name }
        }
        err => TableError::engine(name, "delete", err),
    }
}

fn typed<'a, K: Pod>(
    map: &'a Map,
    name: &'static str,
) -> Result<HashMap<&'a MapData, K, Value>, TableError> {
    HashMap::<_, K, Value>::try_from(map).map_err(|err| TableError::engine(name, "convert", err))
}

fn typed_mut<'a, K: Pod>(
    map: &'a mut Map,
    name: &'static str,
) -> Result<HashMap<&'a mut MapData, K, Value>, TableError> {
    HashMap::<_, K, Value>::try_from(map).map_err(|err| TableError::engine(name, "convert", err))
}

fn collect_entries<K: Pod>(
    map: &Map,
    name: &'static str,
    wrap: fn(K) -> NeighKey,
) -> Result<Vec<(NeighKey, Value)>, TableError> {
    let typed = typed::<K>(map, name)?;
    let mut entries = Vec::new();
    for item in typed.iter() {
        let (key, value) = item.map_err(|err| TableError::engine(name, "iterate", err))?;
        entries.push((wrap(key), value));
    }
    Ok(entries)
}

impl TableHandle for PinnedHandle {
    fn lookup(&self, key: &NeighKey) -> Result<Option<Value>, TableError> {
        let name = self.spec.name;
        self.spec.check_key(key)?;
        let found = match key {
            NeighKey::V4(key) => typed::<Key4>(&self.map, name)?.get(key, 0),
            NeighKey::V6(key) => typed::<Key6>(&self.map, name)?.get(key, 0),
        };
        match found {
            Ok(value) => Ok(Some(value)),
            Err(MapError::KeyNotFound) => Ok(None),
            Err(err) => Err(TableError::engine(name, "lookup", err)),
        }
    }

    fn update(&mut self, key: &NeighKey, value: &Value) -> Result<(), TableError> {
        let name = self.spec.name;
        self.spec.check_key(key)?;
        let value = Value::new(value.mac());
        let res = match key {
            NeighKey::V4(key) => typed_mut::<Key4>(&mut self.map, name)?.insert(key, value, 0),
            NeighKey::V6(key) => typed_mut::<Key6>(&mut self.map, name)?.insert(key, value, 0),
        };
        res.map_err(|err| TableError::engine(name, "update", err))
    }

    fn delete(&mut self, key: &NeighKey) -> Result<(), TableError> {
        let name = self.spec.name;
        self.spec.check_key(key)?;
        let res = match key {
            NeighKey::V4(key) => typed_mut::<Key4>(&mut self.map, name)?.remove(key),
            NeighKey::V6(key) => typed_mut::<Key6>(&mut self.map, name)?.remove(key),
        };
        res.map_err(|err| delete_error(name, err))
    }

    fn entries(&self) -> Result<Vec<(NeighKey, Value)>, TableError> {
        match self.spec.family {
            Family::Ipv4 => collect_entries::<Key4>(&self.map, self.spec.name, NeighKey::V4),
            Family::Ipv6 => collect_entries::<Key6>(&self.map, self.spec.name, NeighKey::V6),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::path::Path;

    use neigh_cache_common::MAP4_NAME;

    use super::*;

    #[test]
    fn missing_key_on_delete_is_not_found() {
        assert!(matches!(
            delete_error(MAP4_NAME, MapError::KeyNotFound),
            TableError::KeyNotFound { name: MAP4_NAME }
        ));
    }

    #[test]
    fn other_delete_failures_stay_engine_errors() {
        let err = delete_error(
            MAP4_NAME,
            MapError::InvalidKeySize {
                size: 16,
                expected: 4,
            },
        );
        assert!(matches!(err, TableError::Engine { op: "delete", .. }));
    }

    #[test]
    fn open_failures_other_than_a_missing_pin_stay_engine_errors() {
        let err = open_error(MAP4_NAME, MapError::KeyNotFound);
        assert!(matches!(err, TableError::Engine { op: "open", .. }));
        assert_eq!(syscall_error_kind(&MapError::KeyNotFound), None);
    }

    #[test]
    fn opening_an_absent_pin_is_missing() {
        let engine = PinnedEngine::new("/nonexistent/neigh-cache-bpffs", None);
        let table = engine.new_table(TableSpec::neigh(Family::Ipv4, 64));
        assert!(matches!(
            table.open(),
            Err(TableError::Missing { name: MAP4_NAME })
        ));
    }

    /// Scratch directory on bpffs, removed with everything pinned in it.
    struct BpfRoot(PathBuf);

    impl BpfRoot {
        fn new(test: &str) -> Self {
            let root = Path::new("/sys/fs/bpf")
                .join(format!("neigh-cache-test-{}-{test}", std::process::id()));
            fs::create_dir_all(&root).unwrap();
            Self(root)
        }
    }

    impl Drop for BpfRoot {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn datapath_object() -> Option<ObjectSource> {
        match std::env::var_os("NEIGH_CACHE_TEST_OBJECT") {
            Some(path) => Some(ObjectSource::File(path.into())),
            None => ObjectSource::resolve(None),
        }
    }

    #[test]
    #[ignore = "needs CAP_BPF, a mounted bpffs and a datapath object"]
    fn creating_a_pinned_table_twice_succeeds() {
        let Some(object) = datapath_object() else {
            return;
        };
        let root = BpfRoot::new("create-twice");
        let engine = PinnedEngine::new(&root.0, Some(object));
        let table = engine.new_table(TableSpec::neigh(Family::Ipv4, 64));

        table.create().unwrap();
        assert!(root.0.join(MAP4_NAME).exists());
        table.create().unwrap();
    }

    #[test]
    #[ignore = "needs CAP_BPF, a mounted bpffs and a datapath object"]
    fn existing_pin_with_another_shape_is_rejected() {
        let Some(object) = datapath_object() else {
            return;
        };
        let root = BpfRoot::new("incompatible");
        let engine = PinnedEngine::new(&root.0, Some(object));
        engine
            .new_table(TableSpec::neigh(Family::Ipv4, 64))
            .create()
            .unwrap();

        // Same pin, but expecting 16-byte keys.
        let wrong = engine.new_table(TableSpec {
            family: Family::Ipv6,
            ..TableSpec::neigh(Family::Ipv4, 64)
        });
        assert!(matches!(
            wrong.create(),
            Err(TableError::Incompatible { name: MAP4_NAME, .. })
        ));
    }

    #[test]
    #[ignore = "needs CAP_BPF, a mounted bpffs and a datapath object"]
    fn pinned_handle_reads_writes_and_deletes() {
        let Some(object) = datapath_object() else {
            return;
        };
        let root = BpfRoot::new("handle");
        let engine = PinnedEngine::new(&root.0, Some(object));
        let table = engine.new_table(TableSpec::neigh(Family::Ipv4, 64));
        table.create().unwrap();

        let key = NeighKey::from(std::net::IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
        let value = Value::new([0x02, 0, 0, 0, 0, 0x05]);
        let mut handle = table.open().unwrap();

        assert!(matches!(
            handle.delete(&key),
            Err(TableError::KeyNotFound { name: MAP4_NAME })
        ));

        handle.update(&key, &value).unwrap();
        assert_eq!(handle.lookup(&key).unwrap(), Some(value));
        assert_eq!(handle.entries().unwrap(), vec![(key, value)]);

        handle.delete(&key).unwrap();
        assert_eq!(handle.lookup(&key).unwrap(), None);
        handle.close();
    }
}
