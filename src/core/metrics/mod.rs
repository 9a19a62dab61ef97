use crate::core::alnmap;
use crate::core::error::Result;
use crate::core::lookup::LookupEntry;
use crate::core::model::{ColumnValues, ElementType};
use crate::core::source::{BaseField, PulseField, ReadData, SourceField};

mod gather;
mod ipd;
mod light;
mod start_frame;

pub use start_frame::start_frame_from_base;

use crate::core::source::SourceField::{Base as B, Pulse as P};

/// The metrics this tool can load into a compare archive.
///
/// Declaration order is the canonical order: it is both the iteration
/// order of the writer loop and the order that maximizes reuse of
/// cached fields between neighboring metrics, so keep metrics with
/// shared requirements adjacent.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Metric {
    WhenStarted,
    QualityValue,
    InsertionQV,
    MergeQV,
    DeletionQV,
    DeletionTag,
    SubstitutionTag,
    SubstitutionQV,
    PreBaseFrames,
    StartFrameBase,
    Ipd,
    StartFrame,
    StartFramePulse,
    PulseWidth,
    WidthInFrames,
    Light,
    Pkmid,
    ClassifierQV,
    PulseIndex,
}

/// How a metric's column values are produced from source data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Projection {
    /// Movie-level attribute written once per movie, not per column.
    MovieAttribute,
    /// Per-base quality channel, capped at [`crate::core::model::MAX_QUALITY_VALUE`].
    QvFromBase(BaseField),
    /// Per-base tag character.
    TagFromBase(BaseField),
    /// Per-base frame count read directly from base space.
    FramesFromBase(BaseField),
    /// Per-base pulse offset.
    PulseIndexFromBase,
    /// Pulse width, pulse-derived when possible, else base-derived.
    Width,
    /// Pulse-space signal gathered through the base-to-pulse map.
    SignalFromPulse(PulseField),
    /// Cumulative start frame of each base.
    StartFrame(StartFramePath),
    /// Inter-pulse distance.
    Ipd,
    /// Mean signal times pulse width.
    Light,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StartFramePath {
    /// Pulse-derived when pulse data is present (exact), else
    /// base-derived.
    Prefer,
    BaseOnly,
    PulseOnly,
}

impl Metric {
    /// Every supported metric, in canonical order.
    pub const ALL: [Metric; 19] = [
        Metric::WhenStarted,
        Metric::QualityValue,
        Metric::InsertionQV,
        Metric::MergeQV,
        Metric::DeletionQV,
        Metric::DeletionTag,
        Metric::SubstitutionTag,
        Metric::SubstitutionQV,
        Metric::PreBaseFrames,
        Metric::StartFrameBase,
        Metric::Ipd,
        Metric::StartFrame,
        Metric::StartFramePulse,
        Metric::PulseWidth,
        Metric::WidthInFrames,
        Metric::Light,
        Metric::Pkmid,
        Metric::ClassifierQV,
        Metric::PulseIndex,
    ];

    /// Metrics loaded when none are requested.
    pub const DEFAULT: [Metric; 7] = [
        Metric::QualityValue,
        Metric::ClassifierQV,
        Metric::StartFrame,
        Metric::PulseWidth,
        Metric::WidthInFrames,
        Metric::Pkmid,
        Metric::Ipd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::WhenStarted => "WhenStarted",
            Metric::QualityValue => "QualityValue",
            Metric::InsertionQV => "InsertionQV",
            Metric::MergeQV => "MergeQV",
            Metric::DeletionQV => "DeletionQV",
            Metric::DeletionTag => "DeletionTag",
            Metric::SubstitutionTag => "SubstitutionTag",
            Metric::SubstitutionQV => "SubstitutionQV",
            Metric::PreBaseFrames => "PreBaseFrames",
            Metric::StartFrameBase => "StartFrameBase",
            Metric::Ipd => "IPD",
            Metric::StartFrame => "StartFrame",
            Metric::StartFramePulse => "StartFramePulse",
            Metric::PulseWidth => "PulseWidth",
            Metric::WidthInFrames => "WidthInFrames",
            Metric::Light => "Light",
            Metric::Pkmid => "pkmid",
            Metric::ClassifierQV => "ClassifierQV",
            Metric::PulseIndex => "PulseIndex",
        }
    }

    /// Case-sensitive lookup by canonical name.
    pub fn parse(name: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Element type of the metric's column buffer; `None` for the
    /// movie-attribute metric, which has no columns.
    pub fn element_type(self) -> Option<ElementType> {
        let element = match self {
            Metric::WhenStarted => return None,
            Metric::QualityValue
            | Metric::InsertionQV
            | Metric::MergeQV
            | Metric::DeletionQV
            | Metric::SubstitutionQV => ElementType::Qv,
            Metric::DeletionTag | Metric::SubstitutionTag => ElementType::Tag,
            Metric::PreBaseFrames
            | Metric::Ipd
            | Metric::PulseWidth
            | Metric::WidthInFrames
            | Metric::Light => ElementType::Frames,
            Metric::StartFrameBase
            | Metric::StartFrame
            | Metric::StartFramePulse
            | Metric::PulseIndex => ElementType::Pulses,
            Metric::Pkmid | Metric::ClassifierQV => ElementType::Float,
        };
        Some(element)
    }

    /// Source fields that must be resident before this metric can be
    /// computed. Fields absent from the movie are skipped at load time;
    /// availability is the resolver's concern.
    pub fn required_fields(self) -> &'static [SourceField] {
        match self {
            Metric::WhenStarted => &[],
            Metric::QualityValue => &[B(BaseField::QualityValue)],
            Metric::InsertionQV => &[B(BaseField::InsertionQV)],
            Metric::MergeQV => &[B(BaseField::MergeQV)],
            Metric::DeletionQV => &[B(BaseField::DeletionQV)],
            Metric::DeletionTag => &[B(BaseField::DeletionTag)],
            Metric::SubstitutionTag => &[B(BaseField::SubstitutionTag)],
            Metric::SubstitutionQV => &[B(BaseField::SubstitutionQV)],
            Metric::PreBaseFrames => &[B(BaseField::PreBaseFrames)],
            Metric::StartFrameBase => &[B(BaseField::PreBaseFrames), B(BaseField::WidthInFrames)],
            Metric::Ipd => &[
                B(BaseField::PreBaseFrames),
                P(PulseField::StartFrame),
                P(PulseField::WidthInFrames),
                B(BaseField::PulseIndex),
            ],
            Metric::StartFrame => &[
                B(BaseField::PreBaseFrames),
                B(BaseField::WidthInFrames),
                P(PulseField::StartFrame),
                B(BaseField::PulseIndex),
            ],
            Metric::StartFramePulse => &[P(PulseField::StartFrame), B(BaseField::PulseIndex)],
            Metric::PulseWidth | Metric::WidthInFrames => &[
                B(BaseField::WidthInFrames),
                P(PulseField::WidthInFrames),
                B(BaseField::PulseIndex),
            ],
            Metric::Light => &[
                P(PulseField::WidthInFrames),
                P(PulseField::MeanSignal),
                B(BaseField::PulseIndex),
            ],
            Metric::Pkmid => &[P(PulseField::MidSignal), B(BaseField::PulseIndex)],
            Metric::ClassifierQV => &[P(PulseField::ClassifierQV), B(BaseField::PulseIndex)],
            Metric::PulseIndex => &[B(BaseField::PulseIndex)],
        }
    }

    /// True for metrics that read pulse space through the base-to-pulse
    /// map when pulse data is available.
    pub fn is_pulse_metric(self) -> bool {
        matches!(
            self,
            Metric::StartFrame
                | Metric::StartFramePulse
                | Metric::ClassifierQV
                | Metric::PulseWidth
                | Metric::WidthInFrames
                | Metric::Ipd
                | Metric::Pkmid
                | Metric::Light
        )
    }

    /// True for the metrics that may be loaded into consensus
    /// alignments.
    pub fn consensus_safe(self) -> bool {
        matches!(
            self,
            Metric::QualityValue
                | Metric::InsertionQV
                | Metric::MergeQV
                | Metric::DeletionQV
                | Metric::SubstitutionQV
                | Metric::DeletionTag
                | Metric::SubstitutionTag
        )
    }

    pub fn projection(self) -> Projection {
        match self {
            Metric::WhenStarted => Projection::MovieAttribute,
            Metric::QualityValue => Projection::QvFromBase(BaseField::QualityValue),
            Metric::InsertionQV => Projection::QvFromBase(BaseField::InsertionQV),
            Metric::MergeQV => Projection::QvFromBase(BaseField::MergeQV),
            Metric::DeletionQV => Projection::QvFromBase(BaseField::DeletionQV),
            Metric::SubstitutionQV => Projection::QvFromBase(BaseField::SubstitutionQV),
            Metric::DeletionTag => Projection::TagFromBase(BaseField::DeletionTag),
            Metric::SubstitutionTag => Projection::TagFromBase(BaseField::SubstitutionTag),
            Metric::PreBaseFrames => Projection::FramesFromBase(BaseField::PreBaseFrames),
            Metric::StartFrameBase => Projection::StartFrame(StartFramePath::BaseOnly),
            Metric::Ipd => Projection::Ipd,
            Metric::StartFrame => Projection::StartFrame(StartFramePath::Prefer),
            Metric::StartFramePulse => Projection::StartFrame(StartFramePath::PulseOnly),
            Metric::PulseWidth | Metric::WidthInFrames => Projection::Width,
            Metric::Light => Projection::Light,
            Metric::Pkmid => Projection::SignalFromPulse(PulseField::MidSignal),
            Metric::ClassifierQV => Projection::SignalFromPulse(PulseField::ClassifierQV),
            Metric::PulseIndex => Projection::PulseIndexFromBase,
        }
    }
}

/// The per-entry index maps shared by all metric computers.
pub struct EntryMaps {
    /// Ungapped base position to gapped alignment column.
    pub base_to_aln: Vec<usize>,
    /// Base position within the read to pulse index; present only when
    /// pulse data is in play for a pulse metric.
    pub base_to_pulse: Option<Vec<usize>>,
}

impl EntryMaps {
    pub fn build(entry: &LookupEntry, data: &ReadData<'_>, metric: Metric) -> Result<EntryMaps> {
        let base_to_aln = alnmap::base_to_alignment_map(&entry.aligned_sequence);
        let base_to_pulse = match (metric.is_pulse_metric(), data.pulse_index, data.pulse_len()) {
            (true, Some(pulse_index), Some(pulses_len)) => Some(alnmap::base_to_pulse_map(
                data.pulse_origin,
                pulse_index,
                pulses_len,
            )?),
            _ => None,
        };
        Ok(EntryMaps {
            base_to_aln,
            base_to_pulse,
        })
    }
}

/// Computes one metric's column window for one alignment: a buffer of
/// length `offset_end - offset_begin + 1`, gap columns holding the
/// metric's sentinel and the final cell holding the zero terminator.
pub fn compute_window(
    metric: Metric,
    entry: &LookupEntry,
    data: &ReadData<'_>,
    maps: &EntryMaps,
) -> Result<ColumnValues> {
    debug_assert_eq!(maps.base_to_aln.len(), entry.ungapped_len());
    match metric.projection() {
        Projection::MovieAttribute => Err(crate::core::error::LoadError::ElementTypeMismatch(
            metric.name(),
        )),
        Projection::QvFromBase(field) => gather::quality_window(entry, data.base_u8(field)?, maps),
        Projection::TagFromBase(field) => gather::tag_window(entry, data.base_u8(field)?, maps),
        Projection::FramesFromBase(_) => gather::frames_window(entry, data, maps),
        Projection::PulseIndexFromBase => gather::pulse_index_window(entry, data, maps),
        Projection::Width => gather::width_window(entry, data, maps),
        Projection::SignalFromPulse(field) => gather::signal_window(entry, field, data, maps),
        Projection::StartFrame(path) => start_frame::window(path, entry, data, maps),
        Projection::Ipd => ipd::window(entry, data, maps),
        Projection::Light => light::window(entry, data, maps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_is_stable() {
        let names: Vec<&str> = Metric::ALL.iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            [
                "WhenStarted",
                "QualityValue",
                "InsertionQV",
                "MergeQV",
                "DeletionQV",
                "DeletionTag",
                "SubstitutionTag",
                "SubstitutionQV",
                "PreBaseFrames",
                "StartFrameBase",
                "IPD",
                "StartFrame",
                "StartFramePulse",
                "PulseWidth",
                "WidthInFrames",
                "Light",
                "pkmid",
                "ClassifierQV",
                "PulseIndex",
            ]
        );
    }

    #[test]
    fn names_parse_back_case_sensitively() {
        for metric in Metric::ALL {
            assert_eq!(Metric::parse(metric.name()), Some(metric));
        }
        assert_eq!(Metric::parse("ipd"), None);
        assert_eq!(Metric::parse("StartTimeOffset"), None);
    }

    #[test]
    fn neighboring_kinetic_metrics_share_fields() {
        // The cache bound depends on adjacent metrics overlapping; IPD
        // and StartFrame share three of their required fields.
        let ipd = Metric::Ipd.required_fields();
        let sf = Metric::StartFrame.required_fields();
        let shared = ipd.iter().filter(|&f| sf.contains(f)).count();
        assert!(shared >= 3);
    }

    #[test]
    fn element_types_match_the_archive_layout() {
        assert_eq!(Metric::QualityValue.element_type(), Some(ElementType::Qv));
        assert_eq!(Metric::DeletionTag.element_type(), Some(ElementType::Tag));
        assert_eq!(Metric::Ipd.element_type(), Some(ElementType::Frames));
        assert_eq!(Metric::StartFrame.element_type(), Some(ElementType::Pulses));
        assert_eq!(Metric::Pkmid.element_type(), Some(ElementType::Float));
        assert_eq!(Metric::WhenStarted.element_type(), None);
    }
}
