use crate::core::error::{LoadError, Result};
use crate::core::metrics::Metric;
use crate::core::source::{
    BaseField, FieldValues, MovieSource, PulseField, ReadData, ReadSpan, SourceField,
};

/// Movie-wide field residency for the column-major path.
///
/// Before a metric is computed, its required fields are loaded for the
/// entire movie; after the metric is written, fields the next metric
/// does not share are dropped. Under the registry's canonical order the
/// peak footprint is bounded by the worst adjacent metric pair, not by
/// the union of all requirements. The per-read event counts (the pulse
/// start positions) stay resident in the source for as long as the
/// movie is open.
#[derive(Debug, Default)]
pub struct FieldCache {
    basecall: Option<Vec<u8>>,
    quality_value: Option<Vec<u8>>,
    insertion_qv: Option<Vec<u8>>,
    merge_qv: Option<Vec<u8>>,
    deletion_qv: Option<Vec<u8>>,
    substitution_qv: Option<Vec<u8>>,
    deletion_tag: Option<Vec<u8>>,
    substitution_tag: Option<Vec<u8>>,
    pre_base_frames: Option<Vec<u16>>,
    bas_width_in_frames: Option<Vec<u16>>,
    bas_pulse_index: Option<Vec<u32>>,
    pls_start_frame: Option<Vec<u32>>,
    pls_width_in_frames: Option<Vec<u16>>,
    mid_signal: Option<Vec<u16>>,
    mean_signal: Option<Vec<u16>>,
    classifier_qv: Option<Vec<f32>>,
}

const ALL_FIELDS: [SourceField; 16] = [
    SourceField::Base(BaseField::Basecall),
    SourceField::Base(BaseField::QualityValue),
    SourceField::Base(BaseField::InsertionQV),
    SourceField::Base(BaseField::MergeQV),
    SourceField::Base(BaseField::DeletionQV),
    SourceField::Base(BaseField::SubstitutionQV),
    SourceField::Base(BaseField::DeletionTag),
    SourceField::Base(BaseField::SubstitutionTag),
    SourceField::Base(BaseField::PreBaseFrames),
    SourceField::Base(BaseField::WidthInFrames),
    SourceField::Base(BaseField::PulseIndex),
    SourceField::Pulse(PulseField::StartFrame),
    SourceField::Pulse(PulseField::WidthInFrames),
    SourceField::Pulse(PulseField::MidSignal),
    SourceField::Pulse(PulseField::MeanSignal),
    SourceField::Pulse(PulseField::ClassifierQV),
];

fn slice_span<'a, T>(
    field: &'a Option<Vec<T>>,
    name: &'static str,
    span: &ReadSpan,
) -> Result<Option<&'a [T]>> {
    match field {
        None => Ok(None),
        Some(values) => values
            .get(span.start..span.start + span.len)
            .map(Some)
            .ok_or(LoadError::FieldTooShort {
                field: name,
                len: values.len(),
                needed: span.start + span.len,
            }),
    }
}

impl FieldCache {
    pub fn new() -> FieldCache {
        FieldCache::default()
    }

    pub fn resident(&self, field: SourceField) -> bool {
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

    /// Loads every field `metric` requires that the movie actually
    /// carries and that is not already resident.
    pub fn prepare(&mut self, metric: Metric, source: &dyn MovieSource) -> Result<()> {
        for &field in metric.required_fields() {
            if self.resident(field) || !source.has_field(field) {
                continue;
            }
            self.stash(field, source.load_field(field)?)?;
        }
        Ok(())
    }

    /// Drops every resident field the next metric does not require.
    pub fn evict_for_next(&mut self, next: Option<Metric>) {
        let keep: &[SourceField] = next.map(Metric::required_fields).unwrap_or(&[]);
        for field in ALL_FIELDS {
            if self.resident(field) && !keep.contains(&field) {
                self.clear(field);
            }
        }
    }

    /// Borrowed per-read views over the resident fields: base-space
    /// slices restricted to `span`, pulse-space fields movie-wide with
    /// the read's pulse origin.
    pub fn read_data<'a>(&'a self, span: &ReadSpan, pulse_origin: usize) -> Result<ReadData<'a>> {
        Ok(ReadData {
            bases: slice_span(&self.basecall, "Basecall", span)?,
            quality_value: slice_span(&self.quality_value, "QualityValue", span)?,
            insertion_qv: slice_span(&self.insertion_qv, "InsertionQV", span)?,
            merge_qv: slice_span(&self.merge_qv, "MergeQV", span)?,
            deletion_qv: slice_span(&self.deletion_qv, "DeletionQV", span)?,
            substitution_qv: slice_span(&self.substitution_qv, "SubstitutionQV", span)?,
            deletion_tag: slice_span(&self.deletion_tag, "DeletionTag", span)?,
            substitution_tag: slice_span(&self.substitution_tag, "SubstitutionTag", span)?,
            pre_base_frames: slice_span(&self.pre_base_frames, "PreBaseFrames", span)?,
            bas_width_in_frames: slice_span(&self.bas_width_in_frames, "WidthInFrames", span)?,
            pulse_index: slice_span(&self.bas_pulse_index, "PulseIndex", span)?,
            pulse_origin,
            pls_start_frame: self.pls_start_frame.as_deref(),
            pls_width_in_frames: self.pls_width_in_frames.as_deref(),
            mid_signal: self.mid_signal.as_deref(),
            mean_signal: self.mean_signal.as_deref(),
            classifier_qv: self.classifier_qv.as_deref(),
        })
    }

    fn stash(&mut self, field: SourceField, values: FieldValues) -> Result<()> {
        let mismatch = || LoadError::ElementTypeMismatch(field.name());
        match (field, values) {
            (SourceField::Base(BaseField::Basecall), FieldValues::U8(v)) => self.basecall = Some(v),
            (SourceField::Base(BaseField::QualityValue), FieldValues::U8(v)) => {
                self.quality_value = Some(v)
            }
            (SourceField::Base(BaseField::InsertionQV), FieldValues::U8(v)) => {
                self.insertion_qv = Some(v)
            }
            (SourceField::Base(BaseField::MergeQV), FieldValues::U8(v)) => self.merge_qv = Some(v),
            (SourceField::Base(BaseField::DeletionQV), FieldValues::U8(v)) => {
                self.deletion_qv = Some(v)
            }
            (SourceField::Base(BaseField::SubstitutionQV), FieldValues::U8(v)) => {
                self.substitution_qv = Some(v)
            }
            (SourceField::Base(BaseField::DeletionTag), FieldValues::U8(v)) => {
                self.deletion_tag = Some(v)
            }
            (SourceField::Base(BaseField::SubstitutionTag), FieldValues::U8(v)) => {
                self.substitution_tag = Some(v)
            }
            (SourceField::Base(BaseField::PreBaseFrames), FieldValues::U16(v)) => {
                self.pre_base_frames = Some(v)
            }
            (SourceField::Base(BaseField::WidthInFrames), FieldValues::U16(v)) => {
                self.bas_width_in_frames = Some(v)
            }
            (SourceField::Base(BaseField::PulseIndex), FieldValues::U32(v)) => {
                self.bas_pulse_index = Some(v)
            }
            (SourceField::Pulse(PulseField::StartFrame), FieldValues::U32(v)) => {
                self.pls_start_frame = Some(v)
            }
            (SourceField::Pulse(PulseField::WidthInFrames), FieldValues::U16(v)) => {
                self.pls_width_in_frames = Some(v)
            }
            (SourceField::Pulse(PulseField::MidSignal), FieldValues::U16(v)) => {
                self.mid_signal = Some(v)
            }
            (SourceField::Pulse(PulseField::MeanSignal), FieldValues::U16(v)) => {
                self.mean_signal = Some(v)
            }
            (SourceField::Pulse(PulseField::ClassifierQV), FieldValues::F32(v)) => {
                self.classifier_qv = Some(v)
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    fn clear(&mut self, field: SourceField) {
        match field {
            SourceField::Base(BaseField::Basecall) => self.basecall = None,
            SourceField::Base(BaseField::QualityValue) => self.quality_value = None,
            SourceField::Base(BaseField::InsertionQV) => self.insertion_qv = None,
            SourceField::Base(BaseField::MergeQV) => self.merge_qv = None,
            SourceField::Base(BaseField::DeletionQV) => self.deletion_qv = None,
            SourceField::Base(BaseField::SubstitutionQV) => self.substitution_qv = None,
            SourceField::Base(BaseField::DeletionTag) => self.deletion_tag = None,
            SourceField::Base(BaseField::SubstitutionTag) => self.substitution_tag = None,
            SourceField::Base(BaseField::PreBaseFrames) => self.pre_base_frames = None,
            SourceField::Base(BaseField::WidthInFrames) => self.bas_width_in_frames = None,
            SourceField::Base(BaseField::PulseIndex) => self.bas_pulse_index = None,
            SourceField::Pulse(PulseField::StartFrame) => self.pls_start_frame = None,
            SourceField::Pulse(PulseField::WidthInFrames) => self.pls_width_in_frames = None,
            SourceField::Pulse(PulseField::MidSignal) => self.mid_signal = None,
            SourceField::Pulse(PulseField::MeanSignal) => self.mean_signal = None,
            SourceField::Pulse(PulseField::ClassifierQV) => self.classifier_qv = None,
        }
    }

    #[cfg(test)]
    fn resident_fields(&self) -> Vec<SourceField> {
        ALL_FIELDS
            .into_iter()
            .filter(|&f| self.resident(f))
            .collect()
    }
}
