use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "loadpulses",
    version,
    about = "Load pulse and quality metrics from movie files into a compare archive"
)]
pub struct Cli {
    /// Movie file, or a .fofn listing one movie file per line.
    pub movie_file: PathBuf,

    /// Compare archive to load metrics into.
    pub cmp_file: PathBuf,

    /// Comma-separated list of metrics (no spaces).
    #[arg(long, value_name = "m1,m2,...")]
    pub metrics: Option<String>,

    /// Load metrics one read at a time instead of buffering whole-movie
    /// fields. Slower, but uses far less memory.
    #[arg(long, conflicts_with = "bymetric")]
    pub byread: bool,

    /// Load every required field movie-wide before computing a metric
    /// (the default).
    #[arg(long)]
    pub bymetric: bool,

    /// Fall back to --byread for any movie whose base or pulse count
    /// exceeds this many elements.
    #[arg(long, value_name = "N")]
    pub max_elements: Option<u64>,

    /// Exit instead of warning when a requested metric's source data is
    /// missing from the movie.
    #[arg(long)]
    pub fail_on_missing_data: bool,
}
