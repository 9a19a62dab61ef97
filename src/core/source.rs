use crate::core::error::{LoadError, Result};

/// Basecall-space fields, parallel over all bases of a movie.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BaseField {
    Basecall,
    QualityValue,
    InsertionQV,
    MergeQV,
    DeletionQV,
    SubstitutionQV,
    DeletionTag,
    SubstitutionTag,
    PreBaseFrames,
    WidthInFrames,
    PulseIndex,
}

/// Pulse-space fields, parallel over all pulses of a movie.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PulseField {
    StartFrame,
    WidthInFrames,
    MidSignal,
    MeanSignal,
    ClassifierQV,
}

/// A field in one of the two source namespaces.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SourceField {
    Base(BaseField),
    Pulse(PulseField),
}

impl SourceField {
    pub fn name(self) -> &'static str {
        match self {
            SourceField::Base(BaseField::Basecall) => "Basecall",
            SourceField::Base(BaseField::QualityValue) => "QualityValue",
            SourceField::Base(BaseField::InsertionQV) => "InsertionQV",
            SourceField::Base(BaseField::MergeQV) => "MergeQV",
            SourceField::Base(BaseField::DeletionQV) => "DeletionQV",
            SourceField::Base(BaseField::SubstitutionQV) => "SubstitutionQV",
            SourceField::Base(BaseField::DeletionTag) => "DeletionTag",
            SourceField::Base(BaseField::SubstitutionTag) => "SubstitutionTag",
            SourceField::Base(BaseField::PreBaseFrames) => "PreBaseFrames",
            SourceField::Base(BaseField::WidthInFrames) => "WidthInFrames",
            SourceField::Base(BaseField::PulseIndex) => "PulseIndex",
            SourceField::Pulse(PulseField::StartFrame) => "StartFrame",
            SourceField::Pulse(PulseField::WidthInFrames) => "WidthInFrames",
            SourceField::Pulse(PulseField::MidSignal) => "MidSignal",
            SourceField::Pulse(PulseField::MeanSignal) => "MeanSignal",
            SourceField::Pulse(PulseField::ClassifierQV) => "ClassifierQV",
        }
    }

    /// True for fields whose values are frame counts; requesting any
    /// metric built on one of these copies the movie's frame rate into
    /// the archive.
    pub fn is_frames_valued(self) -> bool {
        matches!(
            self,
            SourceField::Base(BaseField::PreBaseFrames)
                | SourceField::Base(BaseField::WidthInFrames)
                | SourceField::Pulse(PulseField::StartFrame)
                | SourceField::Pulse(PulseField::WidthInFrames)
        )
    }
}

/// A movie-wide field loaded into an owned buffer.
#[derive(Clone, Debug)]
pub enum FieldValues {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

/// Per-movie reader over instrument output.
///
/// Read layout (hole numbers, read start positions, pulse start
/// positions) is available from open; bulk fields are loaded on demand
/// so the caller controls residency.
pub trait MovieSource {
    fn movie_name(&self) -> &str;

    fn frame_rate(&self) -> f32;

    /// Acquisition timestamp attribute, if the movie carries one.
    fn when_started(&self) -> Option<&str>;

    /// Hole number of each read, indexed by read index.
    fn hole_numbers(&self) -> &[u32];

    /// Base-space start of each read; `read_starts()[i + 1] -
    /// read_starts()[i]` is read `i`'s length. One longer than the read
    /// count.
    fn read_starts(&self) -> &[u64];

    /// Pulse-space start of each read, one longer than the read count.
    /// `None` when the movie carries no pulse data.
    fn pulse_starts(&self) -> Option<&[u64]>;

    fn has_field(&self, field: SourceField) -> bool;

    /// Load an entire movie-wide field. Fails with
    /// [`LoadError::MissingField`] when the field is absent.
    fn load_field(&self, field: SourceField) -> Result<FieldValues>;

    /// Random access for the row-major path: all available fields of
    /// one read, pulse-space fields restricted to that read's pulses.
    fn read_record(&self, read_index: usize) -> Result<ReadRecord>;

    fn num_reads(&self) -> usize {
        self.hole_numbers().len()
    }

    fn has_pulse_data(&self) -> bool {
        self.pulse_starts().is_some()
    }

    fn total_bases(&self) -> u64 {
        self.read_starts().last().copied().unwrap_or(0)
    }

    fn total_pulses(&self) -> u64 {
        self.pulse_starts()
            .and_then(|p| p.last().copied())
            .unwrap_or(0)
    }
}

/// A contiguous slice of the movie's base arrays belonging to one read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadSpan {
    pub index: usize,
    pub start: usize,
    pub len: usize,
}

/// Borrowed views of one read's source data, the common input of every
/// metric computer.
///
/// Base-space slices cover exactly the read (`len` elements). Pulse
/// slices are indexed through the base-to-pulse map: movie-wide with
/// `pulse_origin = pulse_starts[read]` in column-major mode, read-local
/// with `pulse_origin = 0` in row-major mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadData<'a> {
    pub bases: Option<&'a [u8]>,
    pub quality_value: Option<&'a [u8]>,
    pub insertion_qv: Option<&'a [u8]>,
    pub merge_qv: Option<&'a [u8]>,
    pub deletion_qv: Option<&'a [u8]>,
    pub substitution_qv: Option<&'a [u8]>,
    pub deletion_tag: Option<&'a [u8]>,
    pub substitution_tag: Option<&'a [u8]>,
    pub pre_base_frames: Option<&'a [u16]>,
    pub bas_width_in_frames: Option<&'a [u16]>,
    pub pulse_index: Option<&'a [u32]>,
    pub pulse_origin: usize,
    pub pls_start_frame: Option<&'a [u32]>,
    pub pls_width_in_frames: Option<&'a [u16]>,
    pub mid_signal: Option<&'a [u16]>,
    pub mean_signal: Option<&'a [u16]>,
    pub classifier_qv: Option<&'a [f32]>,
}

impl<'a> ReadData<'a> {
    pub fn base_u8(&self, field: BaseField) -> Result<&'a [u8]> {
        let slice = match field {
            BaseField::Basecall => self.bases,
            BaseField::QualityValue => self.quality_value,
            BaseField::InsertionQV => self.insertion_qv,
            BaseField::MergeQV => self.merge_qv,
            BaseField::DeletionQV => self.deletion_qv,
            BaseField::SubstitutionQV => self.substitution_qv,
            BaseField::DeletionTag => self.deletion_tag,
            BaseField::SubstitutionTag => self.substitution_tag,
            _ => None,
        };
        slice.ok_or(LoadError::MissingField(SourceField::Base(field).name()))
    }

    /// Length of the pulse-space slices, if any pulse field is present.
    pub fn pulse_len(&self) -> Option<usize> {
        self.pls_start_frame
            .map(<[u32]>::len)
            .or(self.pls_width_in_frames.map(<[u16]>::len))
            .or(self.mid_signal.map(<[u16]>::len))
            .or(self.mean_signal.map(<[u16]>::len))
            .or(self.classifier_qv.map(<[f32]>::len))
    }
}

/// Owned per-read source data for the row-major path.
#[derive(Clone, Debug, Default)]
pub struct ReadRecord {
    pub bases: Option<Vec<u8>>,
    pub quality_value: Option<Vec<u8>>,
    pub insertion_qv: Option<Vec<u8>>,
    pub merge_qv: Option<Vec<u8>>,
    pub deletion_qv: Option<Vec<u8>>,
    pub substitution_qv: Option<Vec<u8>>,
    pub deletion_tag: Option<Vec<u8>>,
    pub substitution_tag: Option<Vec<u8>>,
    pub pre_base_frames: Option<Vec<u16>>,
    pub bas_width_in_frames: Option<Vec<u16>>,
    pub pulse_index: Option<Vec<u32>>,
    pub pls_start_frame: Option<Vec<u32>>,
    pub pls_width_in_frames: Option<Vec<u16>>,
    pub mid_signal: Option<Vec<u16>>,
    pub mean_signal: Option<Vec<u16>>,
    pub classifier_qv: Option<Vec<f32>>,
}

impl ReadRecord {
    pub fn data(&self) -> ReadData<'_> {
        ReadData {
            bases: self.bases.as_deref(),
            quality_value: self.quality_value.as_deref(),
            insertion_qv: self.insertion_qv.as_deref(),
            merge_qv: self.merge_qv.as_deref(),
            deletion_qv: self.deletion_qv.as_deref(),
            substitution_qv: self.substitution_qv.as_deref(),
            deletion_tag: self.deletion_tag.as_deref(),
            substitution_tag: self.substitution_tag.as_deref(),
            pre_base_frames: self.pre_base_frames.as_deref(),
            bas_width_in_frames: self.bas_width_in_frames.as_deref(),
            pulse_index: self.pulse_index.as_deref(),
            pulse_origin: 0,
            pls_start_frame: self.pls_start_frame.as_deref(),
            pls_width_in_frames: self.pls_width_in_frames.as_deref(),
            mid_signal: self.mid_signal.as_deref(),
            mean_signal: self.mean_signal.as_deref(),
            classifier_qv: self.classifier_qv.as_deref(),
        }
    }
}

/// In-memory movie source, the reference implementation of the contract.
#[derive(Clone, Debug)]
pub struct MemMovie {
    pub name: String,
    pub frame_rate: f32,
    pub when_started: Option<String>,
    pub hole_numbers: Vec<u32>,
    pub read_starts: Vec<u64>,
    pub pulse_starts: Option<Vec<u64>>,
    pub basecall: Option<Vec<u8>>,
    pub quality_value: Option<Vec<u8>>,
    pub insertion_qv: Option<Vec<u8>>,
    pub merge_qv: Option<Vec<u8>>,
    pub deletion_qv: Option<Vec<u8>>,
    pub substitution_qv: Option<Vec<u8>>,
    pub deletion_tag: Option<Vec<u8>>,
    pub substitution_tag: Option<Vec<u8>>,
    pub pre_base_frames: Option<Vec<u16>>,
    pub bas_width_in_frames: Option<Vec<u16>>,
    pub bas_pulse_index: Option<Vec<u32>>,
    pub pls_start_frame: Option<Vec<u32>>,
    pub pls_width_in_frames: Option<Vec<u16>>,
    pub mid_signal: Option<Vec<u16>>,
    pub mean_signal: Option<Vec<u16>>,
    pub classifier_qv: Option<Vec<f32>>,
}

impl MemMovie {
    pub fn new(name: &str, frame_rate: f32) -> MemMovie {
        MemMovie {
            name: name.to_string(),
            frame_rate,
            when_started: None,
            hole_numbers: Vec::new(),
            read_starts: vec![0],
            pulse_starts: None,
            basecall: None,
            quality_value: None,
            insertion_qv: None,
            merge_qv: None,
            deletion_qv: None,
            substitution_qv: None,
            deletion_tag: None,
            substitution_tag: None,
            pre_base_frames: None,
            bas_width_in_frames: None,
            bas_pulse_index: None,
            pls_start_frame: None,
            pls_width_in_frames: None,
            mid_signal: None,
            mean_signal: None,
            classifier_qv: None,
        }
    }

    fn base_range(&self, read_index: usize) -> (usize, usize) {
        let start = self.read_starts[read_index] as usize;
        let end = self.read_starts[read_index + 1] as usize;
        (start, end)
    }

    fn pulse_range(&self, read_index: usize) -> Option<(usize, usize)> {
        let starts = self.pulse_starts.as_ref()?;
        Some((starts[read_index] as usize, starts[read_index + 1] as usize))
    }
}

fn slice_opt<T: Clone>(field: &Option<Vec<T>>, start: usize, end: usize) -> Option<Vec<T>> {
    field.as_ref().map(|v| v[start..end].to_vec())
}

impl MovieSource for MemMovie {
    fn movie_name(&self) -> &str {
        &self.name
    }

    fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    fn when_started(&self) -> Option<&str> {
        self.when_started.as_deref()
    }

    fn hole_numbers(&self) -> &[u32] {
        &self.hole_numbers
    }

    fn read_starts(&self) -> &[u64] {
        &self.read_starts
    }

    fn pulse_starts(&self) -> Option<&[u64]> {
        self.pulse_starts.as_deref()
    }

    fn has_field(&self, field: SourceField) -> bool {
        match field {
            SourceField::Base(BaseField::Basecall) => self.basecall.is_some(),
            SourceField::Base(BaseField::QualityValue) => self.quality_value.is_some(),
            SourceField::Base(BaseField::InsertionQV) => self.insertion_qv.is_some(),
            SourceField::Base(BaseField::MergeQV) => self.merge_qv.is_some(),
            SourceField::Base(BaseField::DeletionQV) => self.deletion_qv.is_some(),
            SourceField::Base(BaseField::SubstitutionQV) => self.substitution_qv.is_some(),
            SourceField::Base(BaseField::DeletionTag) => self.deletion_tag.is_some(),
            SourceField::Base(BaseField::SubstitutionTag) => self.substitution_tag.is_some(),
            SourceField::Base(BaseField::PreBaseFrames) => self.pre_base_frames.is_some(),
            SourceField::Base(BaseField::WidthInFrames) => self.bas_width_in_frames.is_some(),
            SourceField::Base(BaseField::PulseIndex) => self.bas_pulse_index.is_some(),
            SourceField::Pulse(PulseField::StartFrame) => self.pls_start_frame.is_some(),
            SourceField::Pulse(PulseField::WidthInFrames) => self.pls_width_in_frames.is_some(),
            SourceField::Pulse(PulseField::MidSignal) => self.mid_signal.is_some(),
            SourceField::Pulse(PulseField::MeanSignal) => self.mean_signal.is_some(),
            SourceField::Pulse(PulseField::ClassifierQV) => self.classifier_qv.is_some(),
        }
    }

    fn load_field(&self, field: SourceField) -> Result<FieldValues> {
        let missing = || LoadError::MissingField(field.name());
        let values = match field {
            SourceField::Base(BaseField::Basecall) => {
                FieldValues::U8(self.basecall.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::QualityValue) => {
                FieldValues::U8(self.quality_value.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::InsertionQV) => {
                FieldValues::U8(self.insertion_qv.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::MergeQV) => {
                FieldValues::U8(self.merge_qv.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::DeletionQV) => {
                FieldValues::U8(self.deletion_qv.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::SubstitutionQV) => {
                FieldValues::U8(self.substitution_qv.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::DeletionTag) => {
                FieldValues::U8(self.deletion_tag.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::SubstitutionTag) => {
                FieldValues::U8(self.substitution_tag.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::PreBaseFrames) => {
                FieldValues::U16(self.pre_base_frames.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::WidthInFrames) => {
                FieldValues::U16(self.bas_width_in_frames.clone().ok_or_else(missing)?)
            }
            SourceField::Base(BaseField::PulseIndex) => {
                FieldValues::U32(self.bas_pulse_index.clone().ok_or_else(missing)?)
            }
            SourceField::Pulse(PulseField::StartFrame) => {
                FieldValues::U32(self.pls_start_frame.clone().ok_or_else(missing)?)
            }
            SourceField::Pulse(PulseField::WidthInFrames) => {
                FieldValues::U16(self.pls_width_in_frames.clone().ok_or_else(missing)?)
            }
            SourceField::Pulse(PulseField::MidSignal) => {
                FieldValues::U16(self.mid_signal.clone().ok_or_else(missing)?)
            }
            SourceField::Pulse(PulseField::MeanSignal) => {
                FieldValues::U16(self.mean_signal.clone().ok_or_else(missing)?)
            }
            SourceField::Pulse(PulseField::ClassifierQV) => {
                FieldValues::F32(self.classifier_qv.clone().ok_or_else(missing)?)
            }
        };
        Ok(values)
    }

    fn read_record(&self, read_index: usize) -> Result<ReadRecord> {
        let (bs, be) = self.base_range(read_index);
        let mut record = ReadRecord {
            bases: slice_opt(&self.basecall, bs, be),
            quality_value: slice_opt(&self.quality_value, bs, be),
            insertion_qv: slice_opt(&self.insertion_qv, bs, be),
            merge_qv: slice_opt(&self.merge_qv, bs, be),
            deletion_qv: slice_opt(&self.deletion_qv, bs, be),
            substitution_qv: slice_opt(&self.substitution_qv, bs, be),
            deletion_tag: slice_opt(&self.deletion_tag, bs, be),
            substitution_tag: slice_opt(&self.substitution_tag, bs, be),
            pre_base_frames: slice_opt(&self.pre_base_frames, bs, be),
            bas_width_in_frames: slice_opt(&self.bas_width_in_frames, bs, be),
            pulse_index: slice_opt(&self.bas_pulse_index, bs, be),
            ..ReadRecord::default()
        };
        if let Some((ps, pe)) = self.pulse_range(read_index) {
            record.pls_start_frame = slice_opt(&self.pls_start_frame, ps, pe);
            record.pls_width_in_frames = slice_opt(&self.pls_width_in_frames, ps, pe);
            record.mid_signal = slice_opt(&self.mid_signal, ps, pe);
            record.mean_signal = slice_opt(&self.mean_signal, ps, pe);
            record.classifier_qv = slice_opt(&self.classifier_qv, ps, pe);
        }
        Ok(record)
    }
}
