use crate::cli::args::Cli;
use crate::container;
use crate::container::movie::FileMovie;
use crate::core::archive::{CompareArchive, MemArchive};
use crate::core::error::LoadError;
use crate::core::lookup;
use crate::core::metrics::Metric;
use crate::core::resolve::{self, MissingDataPolicy};
use crate::core::source::{BaseField, FieldValues, MovieSource, SourceField};
use crate::core::writer;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mode {
    ByMetric,
    ByRead,
}

pub fn entry() -> Result<()> {
    run(Cli::parse())
}

pub fn run(args: Cli) -> Result<()> {
    let stats = stats_enabled();
    let t0 = Instant::now();

    let requested = match &args.metrics {
        Some(list) => resolve::parse_metric_list(list)?,
        None => Metric::DEFAULT.to_vec(),
    };
    let policy = if args.fail_on_missing_data {
        MissingDataPolicy::Fail
    } else {
        MissingDataPolicy::Warn
    };
    let mode = if args.byread { Mode::ByRead } else { Mode::ByMetric };

    let movie_paths = expand_movie_list(&args.movie_file)
        .with_context(|| format!("failed to read movie list {}", args.movie_file.display()))?;
    if movie_paths.is_empty() {
        bail!("no movie files listed in {}", args.movie_file.display());
    }

    let t_open = Instant::now();
    let mut archive = container::archive::read(&args.cmp_file)
        .with_context(|| format!("failed to open compare archive {}", args.cmp_file.display()))?;
    log_stage(stats, "archive.open", t_open);

    if archive.alignments().is_empty() {
        eprintln!(
            "WARNING: there are no alignments in {}",
            args.cmp_file.display()
        );
        return Ok(());
    }

    // Group alignment indices by the movie that produced them; each
    // movie file is then processed against its own set.
    let mut by_movie: HashMap<u32, Vec<usize>> = HashMap::new();
    for (i, record) in archive.alignments().iter().enumerate() {
        by_movie.entry(record.movie_id).or_default().push(i);
    }

    for path in &movie_paths {
        let t_movie = Instant::now();
        let source = FileMovie::open(path)
            .with_context(|| format!("failed to open movie file {}", path.display()))?;
        process_movie(
            &mut archive,
            &source,
            &by_movie,
            &requested,
            mode,
            policy,
            args.max_elements,
        )
        .with_context(|| format!("failed to load metrics from {}", path.display()))?;
        log_stage(stats, "movie", t_movie);
    }

    let t_write = Instant::now();
    container::archive::write(&args.cmp_file, &archive)
        .with_context(|| format!("failed to write compare archive {}", args.cmp_file.display()))?;
    log_stage(stats, "archive.write", t_write);
    log_stage(stats, "total", t0);
    Ok(())
}

fn process_movie(
    archive: &mut MemArchive,
    source: &FileMovie,
    by_movie: &HashMap<u32, Vec<usize>>,
    requested: &[Metric],
    mode: Mode,
    policy: MissingDataPolicy,
    max_elements: Option<u64>,
) -> Result<()> {
    let Some(info) = archive
        .movies()
        .iter()
        .find(|m| m.name == source.movie_name())
    else {
        eprintln!(
            "WARNING: movie {} is not indexed in the compare archive",
            source.movie_name()
        );
        return Ok(());
    };
    let movie_id = info.id;

    // Column-major buffering of a huge movie can exhaust memory; fall
    // back to per-read loading above the configured element count.
    let mut movie_mode = mode;
    if movie_mode == Mode::ByMetric {
        if let Some(max) = max_elements {
            if source.total_bases() > max || source.total_pulses() > max {
                eprintln!("loading metrics from {} by read", source.movie_name());
                movie_mode = Mode::ByRead;
            }
        }
    }

    let metrics = resolve::resolve_metrics(requested, source, archive.read_type(), policy)?;

    if movie_mode == Mode::ByRead {
        if let Some(&restricted) = metrics
            .iter()
            .find(|&&m| matches!(m, Metric::StartFrameBase | Metric::StartFramePulse))
        {
            return Err(LoadError::ByReadRestricted(restricted.name()).into());
        }
    }

    if metrics.contains(&Metric::WhenStarted) {
        if let Some(value) = source.when_started() {
            archive.store_when_started(movie_id, value);
        }
    }
    if resolve::needs_frame_rate(requested) {
        archive.store_frame_rate(movie_id, source.frame_rate());
    }

    let empty = Vec::new();
    let indices = by_movie.get(&movie_id).unwrap_or(&empty);
    let mut order = indices.clone();
    order.sort_by_key(|&i| archive.alignments()[i].alignment_id);

    eprintln!("loading {} alignments for movie {}", order.len(), movie_id);

    let entries = lookup::build_lookup_tables(archive, source, &order)?;
    match movie_mode {
        Mode::ByMetric => {
            // The basecalls are pulled in bulk for the movie/archive
            // sanity check and dropped again before any metric loads.
            let basecalls =
                match source.load_field(SourceField::Base(BaseField::Basecall))? {
                    FieldValues::U8(v) => v,
                    _ => return Err(LoadError::ElementTypeMismatch("Basecall").into()),
                };
            lookup::verify_basecalls(&entries, &basecalls)?;
            drop(basecalls);
            let groups = lookup::group_entries(&entries)?;
            writer::load_by_metric(archive, source, &entries, &groups, &metrics)?;
        }
        Mode::ByRead => {
            writer::load_by_read(archive, source, &entries, &metrics)?;
        }
    }
    Ok(())
}

/// A `.fofn` movie argument is a newline-separated list of movie
/// paths; anything else is a single movie file.
fn expand_movie_list(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    if path.extension().and_then(|e| e.to_str()) == Some("fofn") {
        let text = fs::read_to_string(path)?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

fn stats_enabled() -> bool {
    matches!(env::var("LOADPULSES_STATS").as_deref(), Ok("1"))
}

fn log_stage(stats: bool, name: &str, t: Instant) {
    if stats {
        eprintln!("LOADPULSES_STATS stage={} time={}", name, fmt_dur(t.elapsed()));
    }
}

fn fmt_dur(d: Duration) -> String {
    if d.as_secs_f64() < 1.0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}
