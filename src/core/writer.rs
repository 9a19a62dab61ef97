use std::ops::Range;

use crate::core::alnmap;
use crate::core::archive::CompareArchive;
use crate::core::cache::FieldCache;
use crate::core::error::{LoadError, Result};
use crate::core::lookup::LookupEntry;
use crate::core::metrics::{self, EntryMaps, Metric};
use crate::core::source::MovieSource;

/// Column-major loading: one metric at a time across every alignment of
/// the movie, with required fields cached movie-wide and reused between
/// neighboring metrics.
///
/// `groups` are the contiguous `(ref-group, read-group)` runs from
/// [`crate::core::lookup::group_entries`]; visiting run by run keeps
/// writes local to one destination buffer at a time.
pub fn load_by_metric(
    archive: &mut dyn CompareArchive,
    source: &dyn MovieSource,
    entries: &[LookupEntry],
    groups: &[Range<usize>],
    metrics_to_load: &[Metric],
) -> Result<()> {
    let mut cache = FieldCache::new();
    for (k, &metric) in metrics_to_load.iter().enumerate() {
        if metric == Metric::WhenStarted {
            continue;
        }
        cache.prepare(metric, source)?;
        for range in groups {
            for entry in &entries[range.clone()] {
                let Some(span) = entry.read else { continue };
                let pulse_origin = source
                    .pulse_starts()
                    .map(|starts| starts[span.index] as usize)
                    .unwrap_or(0);
                let data = cache.read_data(&span, pulse_origin)?;
                let maps = EntryMaps::build(entry, &data, metric)?;
                let window = metrics::compute_window(metric, entry, &data, &maps)?;
                archive.write_columns(
                    entry.ref_group_index,
                    entry.read_group_index,
                    metric,
                    entry.offset_begin,
                    &window,
                )?;
            }
        }
        let next = metrics_to_load[k + 1..]
            .iter()
            .find(|&&m| m != Metric::WhenStarted)
            .copied();
        cache.evict_for_next(next);
    }
    Ok(())
}

/// Row-major loading: every metric of one alignment before moving to
/// the next, reading each source read individually. Uses little memory
/// at the cost of per-read reads; the internal start-frame metrics are
/// not available on this path.
pub fn load_by_read(
    archive: &mut dyn CompareArchive,
    source: &dyn MovieSource,
    entries: &[LookupEntry],
    metrics_to_load: &[Metric],
) -> Result<()> {
    for &metric in metrics_to_load {
        if matches!(metric, Metric::StartFrameBase | Metric::StartFramePulse) {
            return Err(LoadError::ByReadRestricted(metric.name()));
        }
    }
    for entry in entries {
        let Some(span) = entry.read else { continue };
        let record = source.read_record(span.index)?;
        let bases = record
            .bases
            .as_deref()
            .ok_or(LoadError::MissingField("Basecall"))?;
        let read_sequence =
            bases
                .get(entry.query_start..entry.query_end)
                .ok_or(LoadError::FieldTooShort {
                    field: "Basecall",
                    len: bases.len(),
                    needed: entry.query_end,
                })?;
        let ungapped = alnmap::remove_gaps(&entry.aligned_sequence);
        if ungapped != read_sequence {
            return Err(LoadError::SequenceMismatch {
                hole_number: entry.hole_number,
                read_index: span.index,
                query_start: entry.query_start,
                query_end: entry.query_end,
            });
        }
        let data = record.data();
        for &metric in metrics_to_load {
            if metric == Metric::WhenStarted {
                continue;
            }
            let maps = EntryMaps::build(entry, &data, metric)?;
            let window = metrics::compute_window(metric, entry, &data, &maps)?;
            archive.write_columns(
                entry.ref_group_index,
                entry.read_group_index,
                metric,
                entry.offset_begin,
                &window,
            )?;
        }
    }
    Ok(())
}
