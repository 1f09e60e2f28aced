use std::path::PathBuf;

use anyhow::{Result, ensure};
use clap::Args;

pub const DEFAULT_BPF_ROOT: &str = "/sys/fs/bpf/tc/globals";
pub const DEFAULT_NEIGH_MAP_ENTRIES: u32 = neigh_cache_common::NEIGH_MAP_DEFAULT_ENTRIES;

/// Settings shared by every subcommand.
#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// bpffs directory holding the pinned neighbor maps
    #[arg(long, env = "NEIGH_CACHE_BPF_ROOT", value_name = "DIR", default_value = DEFAULT_BPF_ROOT)]
    pub bpf_root: PathBuf,
    /// Maximum entries of each neighbor map, applied to IPv4 and IPv6 alike
    #[arg(
        long = "bpf-neigh-global-max",
        env = "NEIGH_CACHE_GLOBAL_MAX",
        value_name = "ENTRIES",
        default_value_t = DEFAULT_NEIGH_MAP_ENTRIES
    )]
    pub max_entries: u32,
    /// Manage the IPv4 neighbor map
    #[arg(
        long,
        env = "NEIGH_CACHE_ENABLE_IPV4",
        value_name = "BOOL",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enable_ipv4: bool,
    /// Manage the IPv6 neighbor map
    #[arg(
        long,
        env = "NEIGH_CACHE_ENABLE_IPV6",
        value_name = "BOOL",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub enable_ipv6: bool,
    /// Datapath object declaring the maps; defaults to the embedded one
    #[arg(long, env = "NEIGH_CACHE_DATAPATH_OBJECT", value_name = "PATH")]
    pub datapath_object: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bpf_root: PathBuf::from(DEFAULT_BPF_ROOT),
            max_entries: DEFAULT_NEIGH_MAP_ENTRIES,
            enable_ipv4: true,
            enable_ipv6: false,
            datapath_object: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_entries > 0,
            "neighbor map size must be greater than zero"
        );
        Ok(())
    }

    /// Startup checks: creating the maps only makes sense for some family.
    pub fn validate_init(&self) -> Result<()> {
        self.validate()?;
        ensure!(
            self.enable_ipv4 || self.enable_ipv6,
            "at least one of IPv4 and IPv6 must be enabled"
        );
        Ok(())
    }
}
