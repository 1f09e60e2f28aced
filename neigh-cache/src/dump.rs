use std::fmt::Write as _;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::codec::Family;
use crate::engine::{Table, TableEngine, TableError, TableHandle};
use crate::registry::TableRegistry;

/// One rendered neighbor entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DumpEntry {
    pub family: &'static str,
    pub ip: String,
    pub mac: String,
}

/// Reads every entry of the given families' maps.
///
/// A family whose map does not exist contributes no entries. Entries come out
/// sorted by address so repeated dumps are comparable.
pub fn collect<E: TableEngine>(
    registry: &TableRegistry<E>,
    families: &[Family],
) -> Result<Vec<DumpEntry>> {
    let mut out = Vec::new();
    for &family in families {
        let table = registry.table(family);
        let name = table.spec().name;
        let handle = match table.open() {
            Ok(handle) => handle,
            Err(TableError::Missing { .. }) => continue,
            Err(err) => return Err(err).with_context(|| format!("failed to open {name}")),
        };
        let mut entries = handle
            .entries()
            .with_context(|| format!("failed to read {name}"))?;
        handle.close();

        entries.sort_by_key(|(key, _)| key.addr());
        out.extend(entries.into_iter().map(|(key, value)| DumpEntry {
            family: family_label(family),
            ip: key.to_string(),
            mac: value.to_string(),
        }));
    }
    Ok(out)
}

pub fn to_json(entries: &[DumpEntry]) -> Result<JsonValue> {
    serde_json::to_value(entries).context("failed to serialize neighbor entries")
}

pub fn to_text(entries: &[DumpEntry]) -> String {
    let mut text = String::new();
    for entry in entries {
        let _ = writeln!(text, "{} -> {}", entry.ip, entry.mac);
    }
    text
}

fn family_label(family: Family) -> &'static str {
    match family {
        Family::Ipv4 => "ipv4",
        Family::Ipv6 => "ipv6",
    }
}
