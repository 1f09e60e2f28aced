//! Engine over maps pinned in bpffs, as shared with the tc datapath.

#[cfg(target_os = "linux")]
#[path = "pinned/linux.rs"]
mod platform;
#[cfg(not(target_os = "linux"))]
#[path = "pinned/stub.rs"]
mod platform;

use std::path::{Path, PathBuf};

pub use platform::{PinnedEngine, PinnedHandle, PinnedTable};

/// Where the datapath object that declares the maps comes from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ObjectSource {
    /// ELF object on disk.
    File(PathBuf),
    /// Object compiled into this binary (feature `embed`).
    Embedded,
}

impl ObjectSource {
    /// Uses `path` when given, otherwise the embedded object if there is one.
    pub fn resolve(path: Option<&Path>) -> Option<Self> {
        match path {
            Some(path) => Some(ObjectSource::File(path.to_path_buf())),
            None if cfg!(feature = "embed") => Some(ObjectSource::Embedded),
            None => None,
        }
    }
}

pub fn pin_path(bpf_root: &Path, name: &str) -> PathBuf {
    bpf_root.join(name)
}
