#![no_std]
#![no_main]

use aya_ebpf::bindings::TC_ACT_OK;
use aya_ebpf::macros::{classifier, map};
use aya_ebpf::maps::LruHashMap;
use aya_ebpf::programs::TcContext;
use neigh_cache_common::{Key4, Key6, NEIGH_MAP_DEFAULT_ENTRIES, Value};

const ETH_HDR_SIZE: usize = 14;
const ETH_PROTO_OFFSET: usize = 12;
const IPV4_DST_OFFSET: usize = ETH_HDR_SIZE + 16;
const IPV6_DST_OFFSET: usize = ETH_HDR_SIZE + 24;
const ETH_P_IPV4: u16 = 0x0800;
const ETH_P_IPV6: u16 = 0x86DD;

// Userspace overrides max_entries before the maps are created. Entries are
// inserted by the datapath's neighbor resolution path; the agent only creates
// the maps and deletes entries, and this object only reads them.
#[map(name = "cilium_nodeport_neigh4")]
static NODEPORT_NEIGH4: LruHashMap<Key4, Value> =
    LruHashMap::<Key4, Value>::with_max_entries(NEIGH_MAP_DEFAULT_ENTRIES, 0);

#[map(name = "cilium_nodeport_neigh6")]
static NODEPORT_NEIGH6: LruHashMap<Key6, Value> =
    LruHashMap::<Key6, Value>::with_max_entries(NEIGH_MAP_DEFAULT_ENTRIES, 0);

/// Rewrites the Ethernet destination of forwarded nodeport traffic with the
/// cached neighbor address. Packets without a cached neighbor pass untouched.
#[classifier]
pub fn nodeport_neigh_resolve(mut ctx: TcContext) -> i32 {
    let _ = try_resolve(&mut ctx);
    TC_ACT_OK
}

fn try_resolve(ctx: &mut TcContext) -> Result<(), ()> {
    let h_proto = u16::from_be(ctx.load::<u16>(ETH_PROTO_OFFSET).map_err(|_| ())?);

    let value = match h_proto {
        ETH_P_IPV4 => {
            let dst: [u8; 4] = ctx.load(IPV4_DST_OFFSET).map_err(|_| ())?;
            lookup4(&Key4::new(dst))
        }
        ETH_P_IPV6 => {
            let dst: [u8; 16] = ctx.load(IPV6_DST_OFFSET).map_err(|_| ())?;
            lookup6(&Key6::new(dst))
        }
        _ => None,
    };

    match value {
        Some(value) => ctx.store(0, &value.macaddr, 0).map_err(|_| ()),
        None => Ok(()),
    }
}

fn lookup4(key: &Key4) -> Option<Value> {
    unsafe { NODEPORT_NEIGH4.get(key) }.copied()
}

fn lookup6(key: &Key6) -> Option<Value> {
    unsafe { NODEPORT_NEIGH6.get(key) }.copied()
}

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}
