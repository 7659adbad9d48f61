//! Per-partition index encoders.
//!
//! ```text
//! hash_index:     (value, [id], [f32 weight])*              ascending by value
//! range_index:    [id], [value], [f32 cumulative weight]    stable sort by value
//! neighbor_index: (id, range_index)*                        ascending by source id
//! ```

use std::collections::BTreeMap;

use super::builder::IndexEntry;
use super::value::{IndexValue, ValueType};
use crate::codec::{encode_list, Encode};
use crate::error::Result;

/// Group entries by value; each group lists ids then weights.
pub fn encode_hash(entries: &[IndexEntry], id_type: ValueType, buf: &mut Vec<u8>) -> Result<()> {
    let mut groups: BTreeMap<&IndexValue, Vec<&IndexEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(&entry.value).or_default().push(entry);
    }
    for (value, group) in groups {
        value.encode(buf);
        encode_ids(group.iter().map(|e| e.id), group.len(), id_type, buf)?;
        let weights: Vec<f32> = group.iter().map(|e| e.weight).collect();
        encode_list(&weights, buf);
    }
    Ok(())
}

/// Sort entries by value (stable) and write ids, values and cumulative weights.
pub fn encode_range(entries: &[IndexEntry], id_type: ValueType, buf: &mut Vec<u8>) -> Result<()> {
    let mut sorted: Vec<&IndexEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.value.cmp(&b.value));

    encode_ids(sorted.iter().map(|e| e.id), sorted.len(), id_type, buf)?;

    (sorted.len() as u32).encode(buf);
    for entry in &sorted {
        entry.value.encode(buf);
    }

    let mut total = 0f64;
    let cumulative: Vec<f32> = sorted
        .iter()
        .map(|e| {
            total += f64::from(e.weight);
            total as f32
        })
        .collect();
    encode_list(&cumulative, buf);
    Ok(())
}

/// For each source id in ascending order: the id, then its range data.
pub fn encode_neighbor(
    neighbors: &BTreeMap<u64, Vec<IndexEntry>>,
    id_type: ValueType,
    buf: &mut Vec<u8>,
) -> Result<()> {
    for (&src, entries) in neighbors {
        id_type.id_value(src)?.encode(buf);
        encode_range(entries, id_type, buf)?;
    }
    Ok(())
}

fn encode_ids(
    ids: impl Iterator<Item = u64>,
    count: usize,
    id_type: ValueType,
    buf: &mut Vec<u8>,
) -> Result<()> {
    (count as u32).encode(buf);
    for id in ids {
        id_type.id_value(id)?.encode(buf);
    }
    Ok(())
}
