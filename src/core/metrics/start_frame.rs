use crate::core::error::{LoadError, Result};
use crate::core::lookup::LookupEntry;
use crate::core::model::{ColumnValues, MISSING_PULSE_POSITION};
use crate::core::source::ReadData;

use super::{EntryMaps, StartFramePath};

/// Start frame of every base of a read, derived from base space.
///
/// With `x = PreBaseFrames` and `y = WidthInFrames`,
/// `sf[0] = x[0]` and `sf[i] = sf[i-1] + x[i] + y[i-1]`. The 16-bit
/// source counters are widened to 32 bits before the running sum; the
/// raw PreBaseFrames field may itself have wrapped, which is why the
/// pulse-derived path is preferred when available.
pub fn start_frame_from_base(pre_base_frames: &[u16], width_in_frames: &[u16]) -> Vec<u32> {
    let n = pre_base_frames.len();
    let mut sf: Vec<u32> = pre_base_frames.iter().map(|&x| u32::from(x)).collect();
    for i in 1..n {
        sf[i] = sf[i].wrapping_add(u32::from(width_in_frames[i - 1]));
    }
    for i in 1..n {
        sf[i] = sf[i].wrapping_add(sf[i - 1]);
    }
    sf
}

/// Start frame of every base, read exactly from pulse space through the
/// base-to-pulse map.
fn start_frame_from_pulse(start_frame: &[u32], map: &[usize]) -> Result<Vec<u32>> {
    map.iter()
        .map(|&p| {
            start_frame
                .get(p)
                .copied()
                .ok_or(LoadError::PulseIndexOutOfRange {
                    index: p,
                    len: start_frame.len(),
                })
        })
        .collect()
}

fn read_start_frames(
    path: StartFramePath,
    data: &ReadData<'_>,
    maps: &EntryMaps,
) -> Result<Vec<u32>> {
    let pulse = match (&maps.base_to_pulse, data.pls_start_frame) {
        (Some(map), Some(start)) => Some((map, start)),
        _ => None,
    };
    let base = match (data.pre_base_frames, data.bas_width_in_frames) {
        (Some(pre), Some(width)) => Some((pre, width)),
        _ => None,
    };
    match path {
        StartFramePath::PulseOnly => {
            let (map, start) = pulse.ok_or(LoadError::MissingField("StartFrame"))?;
            start_frame_from_pulse(start, map)
        }
        StartFramePath::BaseOnly => {
            let (pre, width) = base.ok_or(LoadError::MissingField("PreBaseFrames"))?;
            Ok(start_frame_from_base(pre, width))
        }
        StartFramePath::Prefer => {
            if let Some((map, start)) = pulse {
                start_frame_from_pulse(start, map)
            } else {
                let (pre, width) = base.ok_or(LoadError::MissingField("StartFrame"))?;
                Ok(start_frame_from_base(pre, width))
            }
        }
    }
}

pub(super) fn window(
    path: StartFramePath,
    entry: &LookupEntry,
    data: &ReadData<'_>,
    maps: &EntryMaps,
) -> Result<ColumnValues> {
    let sf = read_start_frames(path, data, maps)?;
    if sf.len() < entry.query_end {
        return Err(LoadError::FieldTooShort {
            field: "StartFrame",
            len: sf.len(),
            needed: entry.query_end,
        });
    }
    let aligned_len = entry.aligned_len();
    let mut w = vec![MISSING_PULSE_POSITION; aligned_len + 1];
    for (i, &col) in maps.base_to_aln.iter().enumerate() {
        w[col] = sf[entry.query_start + i];
    }
    w[aligned_len] = 0;
    Ok(ColumnValues::Pulses(w))
}
