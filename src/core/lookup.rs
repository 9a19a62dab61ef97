use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::core::alnmap;
use crate::core::archive::CompareArchive;
use crate::core::error::{LoadError, Result};
use crate::core::source::{MovieSource, ReadSpan};

/// Everything needed to project metrics for one alignment of the
/// current movie. Built once per movie and immutable afterwards.
#[derive(Clone, Debug)]
pub struct LookupEntry {
    /// Position of this alignment within the movie's processing order.
    pub movie_aln_index: usize,
    /// Index into the archive's alignment table.
    pub alignment_index: usize,
    pub ref_group_index: usize,
    pub read_group_index: usize,
    pub hole_number: u32,
    pub offset_begin: usize,
    pub offset_end: usize,
    pub query_start: usize,
    pub query_end: usize,
    /// The originating read, or `None` when the hole belongs to a
    /// different part of a split movie.
    pub read: Option<ReadSpan>,
    /// Gapped query columns `[offset_begin, offset_end)` cached from
    /// the archive.
    pub aligned_sequence: Vec<u8>,
}

impl LookupEntry {
    /// True when this alignment's hole is not covered by the current
    /// movie part; another part will load it.
    pub fn skip(&self) -> bool {
        self.read.is_none()
    }

    pub fn aligned_len(&self) -> usize {
        self.offset_end - self.offset_begin
    }

    pub fn ungapped_len(&self) -> usize {
        self.query_end - self.query_start
    }
}

/// Builds one lookup entry per alignment in `order` (indices into the
/// archive's alignment table, sorted by alignment id).
pub fn build_lookup_tables(
    archive: &dyn CompareArchive,
    source: &dyn MovieSource,
    order: &[usize],
) -> Result<Vec<LookupEntry>> {
    let holes: HashSet<u32> = source.hole_numbers().iter().copied().collect();
    let read_of_hole: HashMap<u32, usize> = source
        .hole_numbers()
        .iter()
        .enumerate()
        .map(|(i, &h)| (h, i))
        .collect();
    let read_starts = source.read_starts();

    let mut entries = Vec::with_capacity(order.len());
    for (movie_aln_index, &alignment_index) in order.iter().enumerate() {
        let record = &archive.alignments()[alignment_index];

        let ref_group_index = archive.ref_group_index(record.ref_group_id).ok_or(
            LoadError::UnknownRefGroup {
                alignment: alignment_index,
                ref_group_id: record.ref_group_id,
            },
        )?;
        let read_group_name = archive.read_group_name(record.aln_group_id).ok_or(
            LoadError::UnknownAlnGroup {
                alignment: alignment_index,
                aln_group_id: record.aln_group_id,
            },
        )?;
        let read_group_index = archive
            .read_group_index(ref_group_index, read_group_name)
            .ok_or_else(|| LoadError::UnknownReadGroup {
                alignment: alignment_index,
                name: read_group_name.to_string(),
            })?;

        let aligned_sequence = archive.aligned_query(
            ref_group_index,
            read_group_index,
            record.offset_begin,
            record.offset_end,
        )?;

        let read = if holes.contains(&record.hole_number) {
            let index =
                read_of_hole
                    .get(&record.hole_number)
                    .copied()
                    .ok_or(LoadError::HoleNotInMovie {
                        hole_number: record.hole_number,
                    })?;
            let start = read_starts[index] as usize;
            let len = read_starts[index + 1] as usize - start;
            Some(ReadSpan { index, start, len })
        } else {
            None
        };

        entries.push(LookupEntry {
            movie_aln_index,
            alignment_index,
            ref_group_index,
            read_group_index,
            hole_number: record.hole_number,
            offset_begin: record.offset_begin,
            offset_end: record.offset_end,
            query_start: record.query_start,
            query_end: record.query_end,
            read,
            aligned_sequence,
        });
    }
    Ok(entries)
}

/// Checks that the archive and the movie describe the same data: for
/// every non-skipped entry, the gap-removed aligned query must equal
/// the read's basecalls over the query range. A mismatch means the
/// movie/archive pair is inconsistent and is always fatal.
pub fn verify_basecalls(entries: &[LookupEntry], basecalls: &[u8]) -> Result<()> {
    for entry in entries {
        let Some(span) = entry.read else { continue };
        let lo = span.start + entry.query_start;
        let hi = span.start + entry.query_end;
        let read_sequence = basecalls.get(lo..hi).ok_or(LoadError::FieldTooShort {
            field: "Basecall",
            len: basecalls.len(),
            needed: hi,
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
    }
    Ok(())
}

/// Partitions the entries into contiguous runs sharing
/// `(ref_group_index, read_group_index)`. The archive's alignment
/// indexing keeps groups contiguous; a pair coming back after another
/// group means the archive is inconsistent.
pub fn group_entries(entries: &[LookupEntry]) -> Result<Vec<Range<usize>>> {
    let mut runs: Vec<Range<usize>> = Vec::new();
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    let mut current: Option<((usize, usize), usize)> = None;

    for (i, entry) in entries.iter().enumerate() {
        let key = (entry.ref_group_index, entry.read_group_index);
        match current {
            Some((cur, _)) if cur == key => {}
            Some((cur, first)) => {
                runs.push(first..i);
                if !seen.insert(cur) {
                    return Err(LoadError::UngroupedAlignments);
                }
                current = Some((key, i));
            }
            None => current = Some((key, i)),
        }
    }
    if let Some((cur, first)) = current {
        runs.push(first..entries.len());
        if !seen.insert(cur) {
            return Err(LoadError::UngroupedAlignments);
        }
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::{AlignmentRecord, MemArchive};
    use crate::core::model::ReadType;
    use crate::core::source::MemMovie;

    fn fixture() -> (MemArchive, MemMovie) {
        let mut archive = MemArchive::new(ReadType::Standard);
        archive.add_movie(1, "m1");
        let rg = archive.add_ref_group(10);
        archive.add_read_group(rg, 100, "m1/grp", 16);
        archive
            .add_alignment(
                AlignmentRecord {
                    alignment_id: 1,
                    movie_id: 1,
                    ref_group_id: 10,
                    aln_group_id: 100,
                    hole_number: 7,
                    offset_begin: 0,
                    offset_end: 5,
                    query_start: 0,
                    query_end: 4,
                },
                b"AC-GT",
            )
            .unwrap();
        archive
            .add_alignment(
                AlignmentRecord {
                    alignment_id: 2,
                    movie_id: 1,
                    ref_group_id: 10,
                    aln_group_id: 100,
                    hole_number: 9,
                    offset_begin: 6,
                    offset_end: 8,
                    query_start: 0,
                    query_end: 2,
                },
                b"TG",
            )
            .unwrap();

        let mut movie = MemMovie::new("m1", 75.0);
        movie.hole_numbers = vec![7, 9];
        movie.read_starts = vec![0, 4, 6];
        movie.basecall = Some(b"ACGTTG".to_vec());
        (archive, movie)
    }

    #[test]
    fn entries_resolve_reads_and_offsets() {
        let (archive, movie) = fixture();
        let entries = build_lookup_tables(&archive, &movie, &[0, 1]).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].aligned_sequence, b"AC-GT");
        assert_eq!(
            entries[0].read,
            Some(ReadSpan {
                index: 0,
                start: 0,
                len: 4
            })
        );
        assert_eq!(
            entries[1].read,
            Some(ReadSpan {
                index: 1,
                start: 4,
                len: 2
            })
        );
        verify_basecalls(&entries, movie.basecall.as_deref().unwrap()).unwrap();
    }

    #[test]
    fn foreign_hole_is_skipped_not_fatal() {
        let (archive, mut movie) = fixture();
        // This part of the movie only covers hole 7.
        movie.hole_numbers = vec![7];
        movie.read_starts = vec![0, 4];
        movie.basecall = Some(b"ACGT".to_vec());
        let entries = build_lookup_tables(&archive, &movie, &[0, 1]).unwrap();
        assert!(!entries[0].skip());
        assert!(entries[1].skip());
        verify_basecalls(&entries, movie.basecall.as_deref().unwrap()).unwrap();
    }

    #[test]
    fn basecall_mismatch_is_fatal() {
        let (archive, mut movie) = fixture();
        movie.basecall = Some(b"ACGTTT".to_vec());
        let entries = build_lookup_tables(&archive, &movie, &[0, 1]).unwrap();
        let err = verify_basecalls(&entries, movie.basecall.as_deref().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::SequenceMismatch { hole_number: 9, .. }
        ));
    }

    #[test]
    fn runs_partition_by_group_pair() {
        let (archive, movie) = fixture();
        let entries = build_lookup_tables(&archive, &movie, &[0, 1]).unwrap();
        let runs = group_entries(&entries).unwrap();
        assert_eq!(runs, vec![0..2]);
    }

    #[test]
    fn repeated_group_pair_is_rejected() {
        let (archive, movie) = fixture();
        let mut entries = build_lookup_tables(&archive, &movie, &[0, 1]).unwrap();
        let mut odd = entries[0].clone();
        odd.read_group_index = 1;
        entries.insert(1, odd);
        let err = group_entries(&entries).unwrap_err();
        assert!(matches!(err, LoadError::UngroupedAlignments));
    }
}
