use crate::core::error::{LoadError, Result};
use crate::core::lookup::LookupEntry;
use crate::core::model::{ColumnValues, MISSING_FRAME_COUNT};
use crate::core::source::ReadData;

use super::EntryMaps;

fn gather<T: Copy>(arr: &[T], map: &[usize]) -> Result<Vec<T>> {
    map.iter()
        .map(|&p| {
            arr.get(p).copied().ok_or(LoadError::PulseIndexOutOfRange {
                index: p,
                len: arr.len(),
            })
        })
        .collect()
}

/// Inter-pulse distance. Derived from pulse-space start frames and
/// widths when pulse data is present (exact); otherwise the base-space
/// PreBaseFrames channel is the same quantity as recorded by the
/// basecaller.
pub(super) fn window(
    entry: &LookupEntry,
    data: &ReadData<'_>,
    maps: &EntryMaps,
) -> Result<ColumnValues> {
    let aligned_len = entry.aligned_len();
    let mut w = vec![MISSING_FRAME_COUNT; aligned_len + 1];
    let pulse = match (&maps.base_to_pulse, data.pls_start_frame, data.pls_width_in_frames) {
        (Some(map), Some(start), Some(width)) => Some((map, start, width)),
        _ => None,
    };
    if let Some((map, start, width)) = pulse {
        if map.len() < entry.query_end {
            return Err(LoadError::FieldTooShort {
                field: "PulseIndex",
                len: map.len(),
                needed: entry.query_end,
            });
        }
        // The whole read's pulses are needed: the distance at the first
        // aligned base reaches back to the base before the query window.
        let sf = gather(start, map)?;
        let wf = gather(width, map)?;
        for (i, &col) in maps.base_to_aln.iter().enumerate() {
            let q = entry.query_start + i;
            w[col] = if q == 0 {
                // Undefined for the first base of a read.
                0
            } else {
                sf[q].wrapping_sub(sf[q - 1]).wrapping_sub(u32::from(wf[q - 1])) as u16
            };
        }
    } else {
        let pre = data
            .pre_base_frames
            .ok_or(LoadError::MissingField("PreBaseFrames"))?;
        if pre.len() < entry.query_end {
            return Err(LoadError::FieldTooShort {
                field: "PreBaseFrames",
                len: pre.len(),
                needed: entry.query_end,
            });
        }
        for (i, &col) in maps.base_to_aln.iter().enumerate() {
            w[col] = pre[entry.query_start + i];
        }
    }
    w[aligned_len] = 0;
    Ok(ColumnValues::Frames(w))
}
