#![cfg_attr(not(test), no_std)]

//! Neighbor cache entries shared between userspace and the eBPF datapath.
//!
//! Every record is `#[repr(C)]` and built only from byte arrays, so the structs
//! have alignment 1, no implicit padding and the exact size the kernel map was
//! created with. Addresses are stored in network byte order, exactly as they
//! appear on the wire.

use core::fmt;
use core::net::{Ipv4Addr, Ipv6Addr};

/// Pinned name of the IPv4 neighbor map.
pub const MAP4_NAME: &str = "cilium_nodeport_neigh4";
/// Pinned name of the IPv6 neighbor map.
pub const MAP6_NAME: &str = "cilium_nodeport_neigh6";

/// Capacity compiled into the datapath object. Userspace overrides it with the
/// configured global maximum before the maps are created.
pub const NEIGH_MAP_DEFAULT_ENTRIES: u32 = 524_288;

/// IPv4 neighbor key: the raw destination address.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Key4 {
    pub ipv4: [u8; 4],
}

/// IPv6 neighbor key: the raw destination address.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Key6 {
    pub ipv6: [u8; 16],
}

/// Resolved link-layer address. Shared by both address families.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Value {
    pub macaddr: [u8; 6],
    pub pad: [u8; 2],
}

impl Key4 {
    pub const SIZE: usize = 4;

    pub const fn new(ipv4: [u8; 4]) -> Self {
        Self { ipv4 }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Self::new(bytes.try_into().ok()?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.ipv4
    }

    pub fn addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ipv4)
    }
}

impl Key6 {
    pub const SIZE: usize = 16;

    pub const fn new(ipv6: [u8; 16]) -> Self {
        Self { ipv6 }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Self::new(bytes.try_into().ok()?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.ipv6
    }

    pub fn addr(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.ipv6)
    }
}

impl Value {
    pub const SIZE: usize = 8;

    pub const fn new(macaddr: [u8; 6]) -> Self {
        Self {
            macaddr,
            pad: [0; 2],
        }
    }

    pub fn mac(&self) -> [u8; 6] {
        self.macaddr
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..6].copy_from_slice(&self.macaddr);
        out
    }

    /// Unpacks a map value. The padding bytes are dropped, whatever they hold.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut macaddr = [0u8; 6];
        macaddr.copy_from_slice(&bytes[..6]);
        Self::new(macaddr)
    }
}

impl From<Ipv4Addr> for Key4 {
    fn from(addr: Ipv4Addr) -> Self {
        Self::new(addr.octets())
    }
}

impl From<Ipv6Addr> for Key6 {
    fn from(addr: Ipv6Addr) -> Self {
        Self::new(addr.octets())
    }
}

impl fmt::Display for Key4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr(), f)
    }
}

impl fmt::Display for Key6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr(), f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.macaddr;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

// aya's typed map APIs need `Pod`; the eBPF side never enables `user`.
#[cfg(all(feature = "user", target_os = "linux"))]
mod user_impls {
    extern crate aya;

    use super::{Key4, Key6, Value};
    use aya::Pod;

    unsafe impl Pod for Key4 {}
    unsafe impl Pod for Key6 {}
    unsafe impl Pod for Value {}
}
