use crate::core::error::{LoadError, Result};
use crate::core::metrics::{Metric, Projection, StartFramePath};
use crate::core::model::ReadType;
use crate::core::source::{BaseField, MovieSource, PulseField, SourceField};

/// What to do when a requested metric's source data is missing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MissingDataPolicy {
    /// Warn on stderr and drop the metric.
    Warn,
    /// Fail the run.
    Fail,
}

/// Parses a comma-separated metric list (no spaces). Unknown names are
/// fatal; requesting a metric twice is the same as requesting it once.
pub fn parse_metric_list(list: &str) -> Result<Vec<Metric>> {
    let mut metrics = Vec::new();
    for name in list.split(',') {
        let metric = Metric::parse(name).ok_or_else(|| LoadError::UnknownMetric(name.to_string()))?;
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    Ok(metrics)
}

/// Filters the requested metrics down to the ones computable from this
/// movie, preserving the registry's canonical order. Dropped metrics
/// warn or fail according to `policy`.
pub fn resolve_metrics(
    requested: &[Metric],
    source: &dyn MovieSource,
    read_type: ReadType,
    policy: MissingDataPolicy,
) -> Result<Vec<Metric>> {
    let mut resolved = Vec::new();
    for metric in Metric::ALL {
        if !requested.contains(&metric) {
            continue;
        }
        if is_computable(metric, source, read_type) {
            resolved.push(metric);
            continue;
        }
        match policy {
            MissingDataPolicy::Fail => {
                return Err(LoadError::InsufficientData {
                    metric: metric.name(),
                    movie: source.movie_name().to_string(),
                });
            }
            MissingDataPolicy::Warn => {
                eprintln!(
                    "WARNING: insufficient data to compute metric {} from movie {}; it will be ignored",
                    metric.name(),
                    source.movie_name()
                );
            }
        }
    }
    Ok(resolved)
}

/// True when any requested metric is built on a frames-valued field, in
/// which case the movie's frame rate is copied into the archive.
pub fn needs_frame_rate(requested: &[Metric]) -> bool {
    requested
        .iter()
        .any(|m| m.required_fields().iter().any(|f| f.is_frames_valued()))
}

fn is_computable(metric: Metric, source: &dyn MovieSource, read_type: ReadType) -> bool {
    if read_type == ReadType::Ccs && !metric.consensus_safe() {
        return false;
    }
    let base = |f: BaseField| source.has_field(SourceField::Base(f));
    let pulse =
        |f: PulseField| source.has_pulse_data() && source.has_field(SourceField::Pulse(f));
    match metric.projection() {
        Projection::MovieAttribute => source.when_started().is_some(),
        Projection::QvFromBase(f) | Projection::TagFromBase(f) | Projection::FramesFromBase(f) => {
            base(f)
        }
        Projection::PulseIndexFromBase => base(BaseField::PulseIndex),
        Projection::Width => {
            (pulse(PulseField::WidthInFrames) && base(BaseField::PulseIndex))
                || base(BaseField::WidthInFrames)
        }
        Projection::SignalFromPulse(f) => pulse(f) && base(BaseField::PulseIndex),
        Projection::StartFrame(StartFramePath::Prefer) => {
            (pulse(PulseField::StartFrame) && base(BaseField::PulseIndex))
                || (base(BaseField::PreBaseFrames) && base(BaseField::WidthInFrames))
        }
        Projection::StartFrame(StartFramePath::BaseOnly) => {
            base(BaseField::PreBaseFrames) && base(BaseField::WidthInFrames)
        }
        Projection::StartFrame(StartFramePath::PulseOnly) => {
            pulse(PulseField::StartFrame) && base(BaseField::PulseIndex)
        }
        Projection::Ipd => {
            base(BaseField::PreBaseFrames)
                || (pulse(PulseField::StartFrame)
                    && pulse(PulseField::WidthInFrames)
                    && base(BaseField::PulseIndex))
        }
        Projection::Light => {
            pulse(PulseField::MeanSignal)
                && pulse(PulseField::WidthInFrames)
                && base(BaseField::PulseIndex)
        }
    }
}
