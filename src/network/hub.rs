use std::{collections::BTreeSet, fs::File, io::Read, path::Path};

use anyhow::Context;
use serde::Deserialize;

use crate::network::stop::{RouteId, StopId};

const BUILTIN_HUBS: &str = include_str!("../../data/transfer_hubs.csv");

/// A station where riders can change between the lines listed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferHub {
    pub id: StopId,
    pub name: String,
    pub lines: BTreeSet<RouteId>,
}

#[derive(Deserialize)]
struct HubRecord {
    hub_id: StopId,
    name: String,
    lines: String,
}

impl From<HubRecord> for TransferHub {
    fn from(record: HubRecord) -> Self {
        Self {
            id: record.hub_id,
            name: record.name,
            lines: record.lines.split_whitespace().map(RouteId::new).collect(),
        }
    }
}

fn read_hubs<R: Read>(rdr: R) -> anyhow::Result<Vec<TransferHub>> {
    let mut hubs = vec![];
    for (i, record) in csv::Reader::from_reader(rdr).deserialize::<HubRecord>().enumerate() {
        let record = record.with_context(|| format!("Bad transfer hub row {}", i + 1))?;
        hubs.push(record.into());
    }

    Ok(hubs)
}

/// The hub table shipped with the binary.
pub fn builtin_hubs() -> anyhow::Result<Vec<TransferHub>> {
    read_hubs(BUILTIN_HUBS.as_bytes())
}

/// Reads a replacement hub table with columns `hub_id,name,lines`.
pub fn read_hub_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<TransferHub>> {
    let f = File::open(&path)
        .with_context(|| format!("Failed to open hub table {}", path.as_ref().display()))?;
    read_hubs(f)
}
