use crate::core::error::{LoadError, Result};
use crate::core::lookup::LookupEntry;
use crate::core::model::{
    ColumnValues, MAX_QUALITY_VALUE, MISSING_FRAME_COUNT, MISSING_PULSE_POSITION,
    MISSING_QUALITY_VALUE, MISSING_TAG,
};
use crate::core::source::{PulseField, ReadData, SourceField};

use super::EntryMaps;

fn check_len(name: &'static str, len: usize, needed: usize) -> Result<()> {
    if len < needed {
        return Err(LoadError::FieldTooShort { field: name, len, needed });
    }
    Ok(())
}

fn pulse_at<T: Copy>(arr: &[T], index: usize) -> Result<T> {
    arr.get(index)
        .copied()
        .ok_or(LoadError::PulseIndexOutOfRange {
            index,
            len: arr.len(),
        })
}

/// Quality channels are clamped to the archive's maximum before
/// projection.
pub(super) fn quality_window(
    entry: &LookupEntry,
    src: &[u8],
    maps: &EntryMaps,
) -> Result<ColumnValues> {
    check_len("quality channel", src.len(), entry.query_end)?;
    let aligned_len = entry.aligned_len();
    let mut w = vec![MISSING_QUALITY_VALUE; aligned_len + 1];
    for (i, &col) in maps.base_to_aln.iter().enumerate() {
        w[col] = src[entry.query_start + i].min(MAX_QUALITY_VALUE);
    }
    w[aligned_len] = 0;
    Ok(ColumnValues::Qv(w))
}

pub(super) fn tag_window(entry: &LookupEntry, src: &[u8], maps: &EntryMaps) -> Result<ColumnValues> {
    check_len("tag channel", src.len(), entry.query_end)?;
    let aligned_len = entry.aligned_len();
    let mut w = vec![MISSING_TAG; aligned_len + 1];
    for (i, &col) in maps.base_to_aln.iter().enumerate() {
        w[col] = src[entry.query_start + i];
    }
    w[aligned_len] = 0;
    Ok(ColumnValues::Tag(w))
}

pub(super) fn frames_window(
    entry: &LookupEntry,
    data: &ReadData<'_>,
    maps: &EntryMaps,
) -> Result<ColumnValues> {
    let src = data
        .pre_base_frames
        .ok_or(LoadError::MissingField("PreBaseFrames"))?;
    check_len("PreBaseFrames", src.len(), entry.query_end)?;
    let aligned_len = entry.aligned_len();
    let mut w = vec![MISSING_FRAME_COUNT; aligned_len + 1];
    for (i, &col) in maps.base_to_aln.iter().enumerate() {
        w[col] = src[entry.query_start + i];
    }
    w[aligned_len] = 0;
    Ok(ColumnValues::Frames(w))
}

pub(super) fn pulse_index_window(
    entry: &LookupEntry,
    data: &ReadData<'_>,
    maps: &EntryMaps,
) -> Result<ColumnValues> {
    let src = data.pulse_index.ok_or(LoadError::MissingField("PulseIndex"))?;
    check_len("PulseIndex", src.len(), entry.query_end)?;
    let aligned_len = entry.aligned_len();
    let mut w = vec![MISSING_PULSE_POSITION; aligned_len + 1];
    for (i, &col) in maps.base_to_aln.iter().enumerate() {
        w[col] = src[entry.query_start + i];
    }
    w[aligned_len] = 0;
    Ok(ColumnValues::Pulses(w))
}

/// Pulse width: read through the base-to-pulse map when pulse data is
/// present, else from the width recorded in base space.
pub(super) fn width_window(
    entry: &LookupEntry,
    data: &ReadData<'_>,
    maps: &EntryMaps,
) -> Result<ColumnValues> {
    let aligned_len = entry.aligned_len();
    let mut w = vec![MISSING_FRAME_COUNT; aligned_len + 1];
    match (&maps.base_to_pulse, data.pls_width_in_frames) {
        (Some(map), Some(widths)) => {
            check_len("PulseIndex", map.len(), entry.query_end)?;
            for (i, &col) in maps.base_to_aln.iter().enumerate() {
                w[col] = pulse_at(widths, map[entry.query_start + i])?;
            }
        }
        _ => {
            let widths = data
                .bas_width_in_frames
                .ok_or(LoadError::MissingField("WidthInFrames"))?;
            check_len("WidthInFrames", widths.len(), entry.query_end)?;
            for (i, &col) in maps.base_to_aln.iter().enumerate() {
                w[col] = widths[entry.query_start + i];
            }
        }
    }
    w[aligned_len] = 0;
    Ok(ColumnValues::Frames(w))
}

/// pkmid and ClassifierQV: pulse-space signals projected as floats.
pub(super) fn signal_window(
    entry: &LookupEntry,
    field: PulseField,
    data: &ReadData<'_>,
    maps: &EntryMaps,
) -> Result<ColumnValues> {
    let name = SourceField::Pulse(field).name();
    let map = maps
        .base_to_pulse
        .as_deref()
        .ok_or(LoadError::MissingField(name))?;
    check_len("PulseIndex", map.len(), entry.query_end)?;
    let aligned_len = entry.aligned_len();
    let mut w = vec![f32::NAN; aligned_len + 1];
    match field {
        PulseField::MidSignal => {
            let signal = data.mid_signal.ok_or(LoadError::MissingField(name))?;
            for (i, &col) in maps.base_to_aln.iter().enumerate() {
                w[col] = f32::from(pulse_at(signal, map[entry.query_start + i])?);
            }
        }
        PulseField::ClassifierQV => {
            let signal = data.classifier_qv.ok_or(LoadError::MissingField(name))?;
            for (i, &col) in maps.base_to_aln.iter().enumerate() {
                w[col] = pulse_at(signal, map[entry.query_start + i])?;
            }
        }
        _ => return Err(LoadError::MissingField(name)),
    }
    w[aligned_len] = 0.0;
    Ok(ColumnValues::Float(w))
}
