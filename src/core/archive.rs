use std::collections::{BTreeMap, HashMap};

use crate::core::error::{LoadError, Result};
use crate::core::metrics::Metric;
use crate::core::model::{ColumnValues, ReadType};

/// One alignment row of the archive's index (read-only here).
#[derive(Clone, Debug)]
pub struct AlignmentRecord {
    pub alignment_id: u32,
    pub movie_id: u32,
    pub ref_group_id: u32,
    pub aln_group_id: u32,
    pub hole_number: u32,
    /// Column range `[offset_begin, offset_end)` this alignment occupies
    /// in its group's concatenated column buffer.
    pub offset_begin: usize,
    pub offset_end: usize,
    /// Base-space query range `[query_start, query_end)` into the read.
    pub query_start: usize,
    pub query_end: usize,
}

#[derive(Clone, Debug)]
pub struct MovieInfo {
    pub id: u32,
    pub name: String,
    pub frame_rate: Option<f32>,
    pub when_started: Option<String>,
}

/// Compare archive: alignment index plus per-group column storage,
/// written at arbitrary offsets.
pub trait CompareArchive {
    fn read_type(&self) -> ReadType;

    fn movies(&self) -> &[MovieInfo];

    fn alignments(&self) -> &[AlignmentRecord];

    fn ref_group_index(&self, ref_group_id: u32) -> Option<usize>;

    fn read_group_name(&self, aln_group_id: u32) -> Option<&str>;

    fn read_group_index(&self, ref_group_index: usize, name: &str) -> Option<usize>;

    /// Total column length of one `(ref-group, read-group)` group.
    fn column_len(&self, ref_group_index: usize, read_group_index: usize) -> usize;

    /// The gapped query characters occupying columns `[begin, end)`.
    fn aligned_query(
        &self,
        ref_group_index: usize,
        read_group_index: usize,
        begin: usize,
        end: usize,
    ) -> Result<Vec<u8>>;

    /// Write `values` into a group's column buffer for `metric`,
    /// starting at column `offset`. The buffer is created on first
    /// write, filled with the metric's sentinel.
    fn write_columns(
        &mut self,
        ref_group_index: usize,
        read_group_index: usize,
        metric: Metric,
        offset: usize,
        values: &ColumnValues,
    ) -> Result<()>;

    fn store_frame_rate(&mut self, movie_id: u32, frame_rate: f32);

    fn store_when_started(&mut self, movie_id: u32, value: &str);
}

/// One read group: the alignments of one movie part against one
/// reference, with their concatenated gapped query columns and the
/// metric buffers loaded so far.
#[derive(Clone, Debug)]
pub struct ReadGroup {
    pub aln_group_id: u32,
    pub name: String,
    pub columns: Vec<u8>,
    pub metrics: BTreeMap<Metric, ColumnValues>,
}

#[derive(Clone, Debug)]
pub struct RefGroup {
    pub id: u32,
    pub read_groups: Vec<ReadGroup>,
}

/// In-memory compare archive, the reference implementation of the
/// contract and the backing of the on-disk codec.
#[derive(Clone, Debug)]
pub struct MemArchive {
    read_type: ReadType,
    movies: Vec<MovieInfo>,
    ref_groups: Vec<RefGroup>,
    alignments: Vec<AlignmentRecord>,
    ref_index: HashMap<u32, usize>,
    aln_group_names: HashMap<u32, String>,
}

impl MemArchive {
    pub fn new(read_type: ReadType) -> MemArchive {
        MemArchive {
            read_type,
            movies: Vec::new(),
            ref_groups: Vec::new(),
            alignments: Vec::new(),
            ref_index: HashMap::new(),
            aln_group_names: HashMap::new(),
        }
    }

    pub fn add_movie(&mut self, id: u32, name: &str) {
        self.movies.push(MovieInfo {
            id,
            name: name.to_string(),
            frame_rate: None,
            when_started: None,
        });
    }

    pub fn add_ref_group(&mut self, id: u32) -> usize {
        let index = self.ref_groups.len();
        self.ref_groups.push(RefGroup {
            id,
            read_groups: Vec::new(),
        });
        self.ref_index.insert(id, index);
        index
    }

    /// Adds an empty read group with `column_len` unwritten columns.
    pub fn add_read_group(
        &mut self,
        ref_group_index: usize,
        aln_group_id: u32,
        name: &str,
        column_len: usize,
    ) -> usize {
        let group = &mut self.ref_groups[ref_group_index];
        let index = group.read_groups.len();
        group.read_groups.push(ReadGroup {
            aln_group_id,
            name: name.to_string(),
            columns: vec![0; column_len],
            metrics: BTreeMap::new(),
        });
        self.aln_group_names.insert(aln_group_id, name.to_string());
        index
    }

    /// Registers an alignment and lays its gapped query down at its
    /// column range. `gapped_query.len()` must equal `offset_end -
    /// offset_begin`.
    pub fn add_alignment(&mut self, record: AlignmentRecord, gapped_query: &[u8]) -> Result<()> {
        let ref_group_index =
            self.ref_index
                .get(&record.ref_group_id)
                .copied()
                .ok_or(LoadError::UnknownRefGroup {
                    alignment: self.alignments.len(),
                    ref_group_id: record.ref_group_id,
                })?;
        let name = self.aln_group_names.get(&record.aln_group_id).cloned().ok_or(
            LoadError::UnknownAlnGroup {
                alignment: self.alignments.len(),
                aln_group_id: record.aln_group_id,
            },
        )?;
        let read_group_index = self
            .read_group_index(ref_group_index, &name)
            .ok_or(LoadError::UnknownReadGroup {
                alignment: self.alignments.len(),
                name,
            })?;
        let group = &mut self.ref_groups[ref_group_index].read_groups[read_group_index];
        let span = record.offset_end - record.offset_begin;
        if gapped_query.len() != span || record.offset_end > group.columns.len() {
            return Err(LoadError::ColumnOutOfRange {
                offset: record.offset_begin,
                end: record.offset_end,
                len: group.columns.len(),
            });
        }
        group.columns[record.offset_begin..record.offset_end].copy_from_slice(gapped_query);
        self.alignments.push(record);
        Ok(())
    }

    pub fn ref_groups(&self) -> &[RefGroup] {
        &self.ref_groups
    }

    /// Restores index maps after deserialization.
    pub(crate) fn from_parts(
        read_type: ReadType,
        movies: Vec<MovieInfo>,
        ref_groups: Vec<RefGroup>,
        alignments: Vec<AlignmentRecord>,
    ) -> MemArchive {
        let mut ref_index = HashMap::new();
        let mut aln_group_names = HashMap::new();
        for (i, group) in ref_groups.iter().enumerate() {
            ref_index.insert(group.id, i);
            for rg in &group.read_groups {
                aln_group_names.insert(rg.aln_group_id, rg.name.clone());
            }
        }
        MemArchive {
            read_type,
            movies,
            ref_groups,
            alignments,
            ref_index,
            aln_group_names,
        }
    }

    /// Metric buffer of one group, if it has been written.
    pub fn metric_columns(
        &self,
        ref_group_index: usize,
        read_group_index: usize,
        metric: Metric,
    ) -> Option<&ColumnValues> {
        self.ref_groups[ref_group_index].read_groups[read_group_index]
            .metrics
            .get(&metric)
    }
}

impl CompareArchive for MemArchive {
    fn read_type(&self) -> ReadType {
        self.read_type
    }

    fn movies(&self) -> &[MovieInfo] {
        &self.movies
    }

    fn alignments(&self) -> &[AlignmentRecord] {
        &self.alignments
    }

    fn ref_group_index(&self, ref_group_id: u32) -> Option<usize> {
        self.ref_index.get(&ref_group_id).copied()
    }

    fn read_group_name(&self, aln_group_id: u32) -> Option<&str> {
        self.aln_group_names.get(&aln_group_id).map(String::as_str)
    }

    fn read_group_index(&self, ref_group_index: usize, name: &str) -> Option<usize> {
        self.ref_groups
            .get(ref_group_index)?
            .read_groups
            .iter()
            .position(|rg| rg.name == name)
    }

    fn column_len(&self, ref_group_index: usize, read_group_index: usize) -> usize {
        self.ref_groups[ref_group_index].read_groups[read_group_index]
            .columns
            .len()
    }

    fn aligned_query(
        &self,
        ref_group_index: usize,
        read_group_index: usize,
        begin: usize,
        end: usize,
    ) -> Result<Vec<u8>> {
        let group = &self.ref_groups[ref_group_index].read_groups[read_group_index];
        let columns = group
            .columns
            .get(begin..end)
            .ok_or(LoadError::ColumnOutOfRange {
                offset: begin,
                end,
                len: group.columns.len(),
            })?;
        Ok(columns.to_vec())
    }

    fn write_columns(
        &mut self,
        ref_group_index: usize,
        read_group_index: usize,
        metric: Metric,
        offset: usize,
        values: &ColumnValues,
    ) -> Result<()> {
        let group = &mut self.ref_groups[ref_group_index].read_groups[read_group_index];
        let column_len = group.columns.len();
        let end = offset + values.len();
        if end > column_len {
            return Err(LoadError::ColumnOutOfRange {
                offset,
                end,
                len: column_len,
            });
        }
        let element = metric
            .element_type()
            .ok_or(LoadError::ElementTypeMismatch(metric.name()))?;
        let buffer = group
            .metrics
            .entry(metric)
            .or_insert_with(|| ColumnValues::sentinel_filled(element, column_len));
        match (buffer, values) {
            (ColumnValues::Qv(dst), ColumnValues::Qv(src)) => {
                dst[offset..end].copy_from_slice(src);
            }
            (ColumnValues::Frames(dst), ColumnValues::Frames(src)) => {
                dst[offset..end].copy_from_slice(src);
            }
            (ColumnValues::Pulses(dst), ColumnValues::Pulses(src)) => {
                dst[offset..end].copy_from_slice(src);
            }
            (ColumnValues::Tag(dst), ColumnValues::Tag(src)) => {
                dst[offset..end].copy_from_slice(src);
            }
            (ColumnValues::Float(dst), ColumnValues::Float(src)) => {
                dst[offset..end].copy_from_slice(src);
            }
            _ => return Err(LoadError::ElementTypeMismatch(metric.name())),
        }
        Ok(())
    }

    fn store_frame_rate(&mut self, movie_id: u32, frame_rate: f32) {
        if let Some(movie) = self.movies.iter_mut().find(|m| m.id == movie_id) {
            movie.frame_rate = Some(frame_rate);
        }
    }

    fn store_when_started(&mut self, movie_id: u32, value: &str) {
        if let Some(movie) = self.movies.iter_mut().find(|m| m.id == movie_id) {
            movie.when_started = Some(value.to_string());
        }
    }
}
