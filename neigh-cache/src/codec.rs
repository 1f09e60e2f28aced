//! Address family dispatch over the neighbor map layouts.

use std::fmt;
use std::net::IpAddr;

use neigh_cache_common::{Key4, Key6};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    /// Family of a raw address, decided by length alone: 4 bytes is IPv4,
    /// everything else goes to the IPv6 table.
    pub fn of(ip: &[u8]) -> Self {
        if ip.len() == Key4::SIZE {
            Family::Ipv4
        } else {
            Family::Ipv6
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Ipv4 => f.write_str("IPv4"),
            Family::Ipv6 => f.write_str("IPv6"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NeighKey {
    V4(Key4),
    V6(Key6),
}

impl NeighKey {
    /// Builds the key for a raw address.
    ///
    /// The address is expected to be 4 or 16 bytes already; other lengths are
    /// not rejected. They land in the IPv6 table as the all-zero [`Key6`],
    /// since they have no 16-byte form.
    pub fn from_raw(ip: &[u8]) -> Self {
        match Family::of(ip) {
            Family::Ipv4 => NeighKey::V4(Key4::new([ip[0], ip[1], ip[2], ip[3]])),
            Family::Ipv6 => NeighKey::V6(Key6::from_bytes(ip).unwrap_or_default()),
        }
    }

    pub fn family(&self) -> Family {
        match self {
            NeighKey::V4(_) => Family::Ipv4,
            NeighKey::V6(_) => Family::Ipv6,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            NeighKey::V4(key) => key.as_bytes(),
            NeighKey::V6(key) => key.as_bytes(),
        }
    }

    pub fn addr(&self) -> IpAddr {
        match self {
            NeighKey::V4(key) => IpAddr::V4(key.addr()),
            NeighKey::V6(key) => IpAddr::V6(key.addr()),
        }
    }
}

impl From<IpAddr> for NeighKey {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(addr) => NeighKey::V4(addr.into()),
            IpAddr::V6(addr) => NeighKey::V6(addr.into()),
        }
    }
}

impl From<Key4> for NeighKey {
    fn from(key: Key4) -> Self {
        NeighKey::V4(key)
    }
}

impl From<Key6> for NeighKey {
    fn from(key: Key6) -> Self {
        NeighKey::V6(key)
    }
}

impl fmt::Display for NeighKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeighKey::V4(key) => fmt::Display::fmt(key, f),
            NeighKey::V6(key) => fmt::Display::fmt(key, f),
        }
    }
}

/// Raw bytes of an address as the datapath sees them.
pub fn raw_octets(addr: IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(addr) => addr.octets().to_vec(),
        IpAddr::V6(addr) => addr.octets().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn four_bytes_build_an_ipv4_key() {
        let key = NeighKey::from_raw(&[10, 0, 0, 5]);
        assert_eq!(key, NeighKey::V4(Key4::new([10, 0, 0, 5])));
        assert_eq!(key.as_bytes(), &[10, 0, 0, 5]);
        assert_eq!(key.to_string(), "10.0.0.5");
    }

    #[test]
    fn sixteen_bytes_build_an_ipv6_key() {
        let raw = Ipv6Addr::LOCALHOST.octets();
        let key = NeighKey::from_raw(&raw);
        assert_eq!(key.family(), Family::Ipv6);
        assert_eq!(key.as_bytes(), &raw);
        assert_eq!(key.to_string(), "::1");
    }

    #[test]
    fn ipv4_mapped_sixteen_bytes_stay_ipv6() {
        let mapped = Ipv4Addr::new(10, 0, 0, 5).to_ipv6_mapped().octets();
        assert_eq!(NeighKey::from_raw(&mapped).family(), Family::Ipv6);
    }

    #[test]
    fn odd_lengths_map_to_the_zero_ipv6_key() {
        let zero = NeighKey::V6(Key6::default());
        assert_eq!(NeighKey::from_raw(&[]), zero);
        assert_eq!(NeighKey::from_raw(&[1, 2, 3]), zero);
        assert_eq!(NeighKey::from_raw(&[0xff; 5]), zero);
        assert_eq!(NeighKey::from_raw(&[0xff; 20]), zero);
        assert_eq!(zero.to_string(), "::");
    }

    #[test]
    fn typed_addresses_match_raw_dispatch() {
        let v4: IpAddr = "192.168.1.20".parse().unwrap();
        let v6: IpAddr = "fd00::20".parse().unwrap();
        assert_eq!(NeighKey::from(v4), NeighKey::from_raw(&raw_octets(v4)));
        assert_eq!(NeighKey::from(v6), NeighKey::from_raw(&raw_octets(v6)));
        assert_eq!(NeighKey::from(v4).addr(), v4);
        assert_eq!(NeighKey::from(v6).addr(), v6);
    }

    proptest! {
        #[test]
        fn family_is_ipv4_iff_four_bytes(ip in proptest::collection::vec(any::<u8>(), 0..32)) {
            let key = NeighKey::from_raw(&ip);
            prop_assert_eq!(Family::of(&ip) == Family::Ipv4, ip.len() == 4);
            prop_assert_eq!(key.family(), Family::of(&ip));
            if ip.len() != 4 && ip.len() != 16 {
                prop_assert_eq!(key, NeighKey::V6(Key6::default()));
            }
        }

        #[test]
        fn well_formed_addresses_keep_their_bytes(v4 in any::<[u8; 4]>(), v6 in any::<[u8; 16]>()) {
            let key4 = NeighKey::from_raw(&v4);
            let key6 = NeighKey::from_raw(&v6);
            prop_assert_eq!(key4.as_bytes(), &v4[..]);
            prop_assert_eq!(key6.as_bytes(), &v6[..]);
        }
    }
}
