use crate::core::error::{LoadError, Result};
use crate::core::lookup::LookupEntry;
use crate::core::model::{ColumnValues, MISSING_FRAME_COUNT};
use crate::core::source::ReadData;

use super::EntryMaps;

/// Integrated signal of each base's pulse: mean signal times width in
/// frames, in the archive's 16-bit column type.
pub(super) fn window(
    entry: &LookupEntry,
    data: &ReadData<'_>,
    maps: &EntryMaps,
) -> Result<ColumnValues> {
    let map = maps
        .base_to_pulse
        .as_deref()
        .ok_or(LoadError::MissingField("MeanSignal"))?;
    let mean = data
        .mean_signal
        .ok_or(LoadError::MissingField("MeanSignal"))?;
    let width = data
        .pls_width_in_frames
        .ok_or(LoadError::MissingField("WidthInFrames"))?;
    if map.len() < entry.query_end {
        return Err(LoadError::FieldTooShort {
            field: "PulseIndex",
            len: map.len(),
            needed: entry.query_end,
        });
    }
    let aligned_len = entry.aligned_len();
    let mut w = vec![MISSING_FRAME_COUNT; aligned_len + 1];
    for (i, &col) in maps.base_to_aln.iter().enumerate() {
        let p = map[entry.query_start + i];
        let m = mean.get(p).ok_or(LoadError::PulseIndexOutOfRange {
            index: p,
            len: mean.len(),
        })?;
        let y = width.get(p).ok_or(LoadError::PulseIndexOutOfRange {
            index: p,
            len: width.len(),
        })?;
        w[col] = m.wrapping_mul(*y);
    }
    w[aligned_len] = 0;
    Ok(ColumnValues::Frames(w))
}
