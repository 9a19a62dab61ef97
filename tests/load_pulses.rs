use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use loadpulses::cli::args::Cli;
use loadpulses::cli::run;
use loadpulses::container;
use loadpulses::core::archive::{AlignmentRecord, CompareArchive, MemArchive};
use loadpulses::core::metrics::Metric;
use loadpulses::core::model::{ColumnValues, ReadType};
use loadpulses::core::source::MemMovie;

/// A two-read movie with pulse data arranged so that the base-derived
/// and pulse-derived start frames agree exactly.
fn movie() -> MemMovie {
    let mut movie = MemMovie::new("m1", 75.0);
    movie.when_started = Some("2013-01-01T00:00:00".to_string());
    movie.hole_numbers = vec![7, 9];
    movie.read_starts = vec![0, 4, 8];
    movie.basecall = Some(b"ACGTTGCA".to_vec());
    movie.quality_value = Some(vec![40, 101, 50, 255, 10, 20, 30, 40]);
    movie.insertion_qv = Some(vec![1, 2, 3, 4, 5, 6, 7, 8]);
    movie.deletion_tag = Some(b"NNNNNNNN".to_vec());
    movie.pre_base_frames = Some(vec![0, 5, 3, 2, 7, 6, 5, 4]);
    movie.bas_width_in_frames = Some(vec![4, 3, 2, 3, 1, 2, 3, 4]);
    movie.bas_pulse_index = Some(vec![0, 1, 2, 3, 0, 1, 2, 3]);
    movie.pulse_starts = Some(vec![0, 4, 8]);
    movie.pls_start_frame = Some(vec![0, 9, 15, 19, 7, 14, 21, 28]);
    movie.pls_width_in_frames = Some(vec![4, 3, 2, 3, 1, 2, 3, 4]);
    movie.mid_signal = Some(vec![100, 200, 300, 400, 500, 600, 700, 800]);
    movie.mean_signal = Some(vec![10, 20, 30, 40, 50, 60, 70, 80]);
    movie.classifier_qv = Some(vec![0.5, 0.25, 0.75, 1.0, 0.1, 0.2, 0.3, 0.4]);
    movie
}

/// Three alignments over two reference groups: a gapped one, one over
/// an inner query window, and an ungapped one.
fn archive() -> MemArchive {
    let mut archive = MemArchive::new(ReadType::Standard);
    archive.add_movie(1, "m1");
    let rg0 = archive.add_ref_group(10);
    archive.add_read_group(rg0, 100, "ref10/m1", 10);
    let rg1 = archive.add_ref_group(11);
    archive.add_read_group(rg1, 101, "ref11/m1", 6);

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
                query_start: 1,
                query_end: 3,
            },
            b"GC",
        )
        .unwrap();
    archive
        .add_alignment(
            AlignmentRecord {
                alignment_id: 3,
                movie_id: 1,
                ref_group_id: 11,
                aln_group_id: 101,
                hole_number: 7,
                offset_begin: 0,
                offset_end: 4,
                query_start: 0,
                query_end: 4,
            },
            b"ACGT",
        )
        .unwrap();
    archive
}

struct Fixture {
    _dir: tempfile::TempDir,
    movie_path: PathBuf,
    cmp_path: PathBuf,
}

fn fixture(movie_data: &MemMovie, archive_data: &MemArchive) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let movie_path = dir.path().join("m1.mov");
    let cmp_path = dir.path().join("aligned.cmp");
    container::movie::write(&movie_path, movie_data).unwrap();
    container::archive::write(&cmp_path, archive_data).unwrap();
    Fixture {
        _dir: dir,
        movie_path,
        cmp_path,
    }
}

fn cli(movie: &Path, cmp: &Path, metrics: Option<&str>, byread: bool) -> Cli {
    Cli {
        movie_file: movie.to_path_buf(),
        cmp_file: cmp.to_path_buf(),
        metrics: metrics.map(str::to_string),
        byread,
        bymetric: !byread,
        max_elements: None,
        fail_on_missing_data: false,
    }
}

fn columns(archive: &MemArchive, rg: usize, metric: Metric) -> ColumnValues {
    archive.metric_columns(rg, 0, metric).unwrap().clone()
}

#[test]
fn quality_values_project_with_caps_gaps_and_terminators() {
    let fx = fixture(&movie(), &archive());
    run::run(cli(&fx.movie_path, &fx.cmp_path, Some("QualityValue"), false)).unwrap();

    let loaded = container::archive::read(&fx.cmp_path).unwrap();
    match columns(&loaded, 0, Metric::QualityValue) {
        // Alignment 1 occupies columns 0..=5 (gap at column 2 keeps the
        // sentinel), alignment 2 columns 6..=8; column 9 was never
        // written.
        ColumnValues::Qv(v) => assert_eq!(v, vec![40, 100, 255, 50, 100, 0, 20, 30, 0, 255]),
        other => panic!("unexpected buffer: {:?}", other),
    }
    match columns(&loaded, 1, Metric::QualityValue) {
        ColumnValues::Qv(v) => assert_eq!(v, vec![40, 100, 50, 100, 0, 255]),
        other => panic!("unexpected buffer: {:?}", other),
    }
}

#[test]
fn kinetic_metrics_prefer_the_pulse_path() {
    let fx = fixture(&movie(), &archive());
    run::run(cli(
        &fx.movie_path,
        &fx.cmp_path,
        Some("IPD,StartFrame,WidthInFrames,Light,PulseIndex"),
        false,
    ))
    .unwrap();

    let loaded = container::archive::read(&fx.cmp_path).unwrap();
    match columns(&loaded, 0, Metric::Ipd) {
        ColumnValues::Frames(v) => {
            assert_eq!(v, vec![0, 5, 65535, 3, 2, 0, 6, 5, 0, 65535]);
        }
        other => panic!("unexpected buffer: {:?}", other),
    }
    match columns(&loaded, 0, Metric::StartFrame) {
        ColumnValues::Pulses(v) => {
            assert_eq!(v, vec![0, 9, u32::MAX, 15, 19, 0, 14, 21, 0, u32::MAX]);
        }
        other => panic!("unexpected buffer: {:?}", other),
    }
    match columns(&loaded, 0, Metric::WidthInFrames) {
        ColumnValues::Frames(v) => assert_eq!(v, vec![4, 3, 65535, 2, 3, 0, 2, 3, 0, 65535]),
        other => panic!("unexpected buffer: {:?}", other),
    }
    match columns(&loaded, 0, Metric::Light) {
        ColumnValues::Frames(v) => assert_eq!(v, vec![40, 60, 65535, 60, 120, 0, 120, 210, 0, 65535]),
        other => panic!("unexpected buffer: {:?}", other),
    }
    match columns(&loaded, 0, Metric::PulseIndex) {
        ColumnValues::Pulses(v) => {
            assert_eq!(v, vec![0, 1, u32::MAX, 2, 3, 0, 1, 2, 0, u32::MAX]);
        }
        other => panic!("unexpected buffer: {:?}", other),
    }
}

#[test]
fn float_metrics_keep_nan_sentinels_on_gap_columns() {
    let fx = fixture(&movie(), &archive());
    run::run(cli(
        &fx.movie_path,
        &fx.cmp_path,
        Some("pkmid,ClassifierQV"),
        false,
    ))
    .unwrap();

    let loaded = container::archive::read(&fx.cmp_path).unwrap();
    match columns(&loaded, 0, Metric::Pkmid) {
        ColumnValues::Float(v) => {
            assert_eq!(v[0], 100.0);
            assert_eq!(v[1], 200.0);
            assert!(v[2].is_nan());
            assert_eq!(v[3], 300.0);
            assert_eq!(v[4], 400.0);
            assert_eq!(v[5], 0.0);
            assert_eq!(&v[6..9], &[600.0, 700.0, 0.0]);
            assert!(v[9].is_nan());
        }
        other => panic!("unexpected buffer: {:?}", other),
    }
}

#[test]
fn base_and_pulse_derived_start_frames_agree_when_data_is_consistent() {
    let fx = fixture(&movie(), &archive());
    run::run(cli(
        &fx.movie_path,
        &fx.cmp_path,
        Some("StartFrameBase,StartFrame,StartFramePulse"),
        false,
    ))
    .unwrap();

    let loaded = container::archive::read(&fx.cmp_path).unwrap();
    for rg in 0..2 {
        let base = columns(&loaded, rg, Metric::StartFrameBase);
        let prefer = columns(&loaded, rg, Metric::StartFrame);
        let pulse = columns(&loaded, rg, Metric::StartFramePulse);
        assert!(base.bits_eq(&prefer));
        assert!(prefer.bits_eq(&pulse));
    }
}

#[test]
fn row_major_and_column_major_agree_on_shared_metrics() {
    let metrics = "QualityValue,InsertionQV,DeletionTag,PreBaseFrames,IPD,StartFrame,PulseWidth,WidthInFrames,Light,pkmid,ClassifierQV,PulseIndex";

    let by_metric = fixture(&movie(), &archive());
    run::run(cli(
        &by_metric.movie_path,
        &by_metric.cmp_path,
        Some(metrics),
        false,
    ))
    .unwrap();

    let by_read = fixture(&movie(), &archive());
    run::run(cli(
        &by_read.movie_path,
        &by_read.cmp_path,
        Some(metrics),
        true,
    ))
    .unwrap();

    let a = fs::read(&by_metric.cmp_path).unwrap();
    let b = fs::read(&by_read.cmp_path).unwrap();
    assert_eq!(a, b);
}

#[test]
fn reloading_is_idempotent() {
    let fx = fixture(&movie(), &archive());
    let args = || cli(&fx.movie_path, &fx.cmp_path, None, false);
    run::run(args()).unwrap();
    let first = fs::read(&fx.cmp_path).unwrap();
    run::run(args()).unwrap();
    let second = fs::read(&fx.cmp_path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn split_movie_parts_leave_foreign_alignments_untouched() {
    // A part of movie m1 covering only hole 7; the hole-9 alignment is
    // skipped, not an error, and its columns stay at the sentinel.
    let mut part = movie();
    part.hole_numbers = vec![7];
    part.read_starts = vec![0, 4];
    part.basecall = Some(b"ACGT".to_vec());
    part.quality_value = Some(vec![40, 101, 50, 255]);
    part.insertion_qv = Some(vec![1, 2, 3, 4]);
    part.deletion_tag = Some(b"NNNN".to_vec());
    part.pre_base_frames = Some(vec![0, 5, 3, 2]);
    part.bas_width_in_frames = Some(vec![4, 3, 2, 3]);
    part.bas_pulse_index = Some(vec![0, 1, 2, 3]);
    part.pulse_starts = Some(vec![0, 4]);
    part.pls_start_frame = Some(vec![0, 9, 15, 19]);
    part.pls_width_in_frames = Some(vec![4, 3, 2, 3]);
    part.mid_signal = Some(vec![100, 200, 300, 400]);
    part.mean_signal = Some(vec![10, 20, 30, 40]);
    part.classifier_qv = Some(vec![0.5, 0.25, 0.75, 1.0]);

    let fx = fixture(&part, &archive());
    run::run(cli(&fx.movie_path, &fx.cmp_path, Some("QualityValue"), false)).unwrap();

    let loaded = container::archive::read(&fx.cmp_path).unwrap();
    match columns(&loaded, 0, Metric::QualityValue) {
        ColumnValues::Qv(v) => {
            assert_eq!(&v[0..6], &[40, 100, 255, 50, 100, 0]);
            // Columns of the skipped alignment were never written.
            assert_eq!(&v[6..10], &[255, 255, 255, 255]);
        }
        other => panic!("unexpected buffer: {:?}", other),
    }
}

#[test]
fn missing_pulse_data_fails_when_requested() {
    let mut bas_only = movie();
    bas_only.pulse_starts = None;
    bas_only.pls_start_frame = None;
    bas_only.pls_width_in_frames = None;
    bas_only.mid_signal = None;
    bas_only.mean_signal = None;
    bas_only.classifier_qv = None;

    let fx = fixture(&bas_only, &archive());
    let before = fs::read(&fx.cmp_path).unwrap();

    let mut args = cli(&fx.movie_path, &fx.cmp_path, Some("pkmid"), false);
    args.fail_on_missing_data = true;
    assert!(run::run(args).is_err());
    // The failed run must not have modified the archive.
    assert_eq!(before, fs::read(&fx.cmp_path).unwrap());

    // Without the flag the metric is dropped with a warning and the
    // run succeeds.
    run::run(cli(&fx.movie_path, &fx.cmp_path, Some("pkmid"), false)).unwrap();
    let loaded = container::archive::read(&fx.cmp_path).unwrap();
    assert!(loaded.metric_columns(0, 0, Metric::Pkmid).is_none());
}

#[test]
fn internal_start_frame_metrics_reject_row_major() {
    let fx = fixture(&movie(), &archive());
    let err = run::run(cli(
        &fx.movie_path,
        &fx.cmp_path,
        Some("StartFrameBase"),
        true,
    ))
    .unwrap_err();
    assert!(err.to_string().contains("failed to load metrics"));
}

#[test]
fn unknown_metric_names_are_fatal() {
    let fx = fixture(&movie(), &archive());
    assert!(run::run(cli(&fx.movie_path, &fx.cmp_path, Some("Qualityvalue"), false)).is_err());
}

#[test]
fn empty_archive_warns_and_succeeds() {
    let mut empty = MemArchive::new(ReadType::Standard);
    empty.add_movie(1, "m1");
    let fx = fixture(&movie(), &empty);
    run::run(cli(&fx.movie_path, &fx.cmp_path, None, false)).unwrap();
}

#[test]
fn movie_attributes_are_copied_into_the_archive() {
    let fx = fixture(&movie(), &archive());
    run::run(cli(
        &fx.movie_path,
        &fx.cmp_path,
        Some("WhenStarted,IPD"),
        false,
    ))
    .unwrap();

    let loaded = container::archive::read(&fx.cmp_path).unwrap();
    let info = &loaded.movies()[0];
    assert_eq!(info.when_started.as_deref(), Some("2013-01-01T00:00:00"));
    // IPD is frames-valued, so the movie's frame rate is stored too.
    assert_eq!(info.frame_rate, Some(75.0));
}

#[test]
fn gzip_compressed_movies_are_inflated_transparently() {
    let fx = fixture(&movie(), &archive());
    let plain = fs::read(&fx.movie_path).unwrap();
    let gz_path = fx.movie_path.with_extension("mov.gz");
    let mut encoder =
        flate2::write::GzEncoder::new(fs::File::create(&gz_path).unwrap(), Default::default());
    encoder.write_all(&plain).unwrap();
    encoder.finish().unwrap();

    run::run(cli(&gz_path, &fx.cmp_path, Some("QualityValue"), false)).unwrap();
    let loaded = container::archive::read(&fx.cmp_path).unwrap();
    assert!(loaded.metric_columns(0, 0, Metric::QualityValue).is_some());
}

#[test]
fn fofn_inputs_process_every_listed_movie_part() {
    // Split the movie into two parts, one hole each, listed in a fofn.
    let mut part1 = movie();
    part1.hole_numbers = vec![7];
    part1.read_starts = vec![0, 4];
    part1.basecall = Some(b"ACGT".to_vec());
    part1.quality_value = Some(vec![40, 101, 50, 255]);
    part1.insertion_qv = Some(vec![1, 2, 3, 4]);
    part1.deletion_tag = Some(b"NNNN".to_vec());
    part1.pre_base_frames = Some(vec![0, 5, 3, 2]);
    part1.bas_width_in_frames = Some(vec![4, 3, 2, 3]);
    part1.bas_pulse_index = Some(vec![0, 1, 2, 3]);
    part1.pulse_starts = Some(vec![0, 4]);
    part1.pls_start_frame = Some(vec![0, 9, 15, 19]);
    part1.pls_width_in_frames = Some(vec![4, 3, 2, 3]);
    part1.mid_signal = Some(vec![100, 200, 300, 400]);
    part1.mean_signal = Some(vec![10, 20, 30, 40]);
    part1.classifier_qv = Some(vec![0.5, 0.25, 0.75, 1.0]);

    let mut part2 = movie();
    part2.hole_numbers = vec![9];
    part2.read_starts = vec![0, 4];
    part2.basecall = Some(b"TGCA".to_vec());
    part2.quality_value = Some(vec![10, 20, 30, 40]);
    part2.insertion_qv = Some(vec![5, 6, 7, 8]);
    part2.deletion_tag = Some(b"NNNN".to_vec());
    part2.pre_base_frames = Some(vec![7, 6, 5, 4]);
    part2.bas_width_in_frames = Some(vec![1, 2, 3, 4]);
    part2.bas_pulse_index = Some(vec![0, 1, 2, 3]);
    part2.pulse_starts = Some(vec![0, 4]);
    part2.pls_start_frame = Some(vec![7, 14, 21, 28]);
    part2.pls_width_in_frames = Some(vec![1, 2, 3, 4]);
    part2.mid_signal = Some(vec![500, 600, 700, 800]);
    part2.mean_signal = Some(vec![50, 60, 70, 80]);
    part2.classifier_qv = Some(vec![0.1, 0.2, 0.3, 0.4]);

    let dir = tempfile::tempdir().unwrap();
    let part1_path = dir.path().join("m1.part1.mov");
    let part2_path = dir.path().join("m1.part2.mov");
    let cmp_path = dir.path().join("aligned.cmp");
    let fofn_path = dir.path().join("input.fofn");
    container::movie::write(&part1_path, &part1).unwrap();
    container::movie::write(&part2_path, &part2).unwrap();
    container::archive::write(&cmp_path, &archive()).unwrap();
    fs::write(
        &fofn_path,
        format!("{}\n{}\n", part1_path.display(), part2_path.display()),
    )
    .unwrap();

    run::run(cli(&fofn_path, &cmp_path, Some("QualityValue"), false)).unwrap();

    let loaded = container::archive::read(&cmp_path).unwrap();
    match columns(&loaded, 0, Metric::QualityValue) {
        ColumnValues::Qv(v) => assert_eq!(v, vec![40, 100, 255, 50, 100, 0, 20, 30, 0, 255]),
        other => panic!("unexpected buffer: {:?}", other),
    }
}

#[test]
fn corrupt_movie_archive_pairs_are_fatal() {
    let mut wrong = movie();
    // Hole 7's read no longer matches the archived aligned query.
    wrong.basecall = Some(b"ACGATGCA".to_vec());
    let fx = fixture(&wrong, &archive());
    for byread in [false, true] {
        let err = run::run(cli(
            &fx.movie_path,
            &fx.cmp_path,
            Some("QualityValue"),
            byread,
        ))
        .unwrap_err();
        assert!(format!("{:?}", err).contains("does not match"), "{:?}", err);
    }
}

#[test]
fn max_elements_downgrades_to_row_major() {
    let fx = fixture(&movie(), &archive());
    let mut args = cli(&fx.movie_path, &fx.cmp_path, Some("QualityValue"), false);
    // The fixture movie has 8 bases, so this forces the per-read path.
    args.max_elements = Some(4);
    run::run(args).unwrap();

    let by_read = fixture(&movie(), &archive());
    run::run(cli(
        &by_read.movie_path,
        &by_read.cmp_path,
        Some("QualityValue"),
        true,
    ))
    .unwrap();
    assert_eq!(
        fs::read(&fx.cmp_path).unwrap(),
        fs::read(&by_read.cmp_path).unwrap()
    );
}

#[test]
fn movie_container_round_trips_all_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m1.mov");
    let original = movie();
    container::movie::write(&path, &original).unwrap();

    let reopened = container::movie::FileMovie::open(&path).unwrap();
    use loadpulses::core::source::{FieldValues, MovieSource, PulseField, SourceField};
    assert_eq!(reopened.movie_name(), "m1");
    assert_eq!(reopened.frame_rate(), 75.0);
    assert_eq!(reopened.hole_numbers(), &[7, 9]);
    assert_eq!(reopened.read_starts(), &[0, 4, 8]);
    assert_eq!(reopened.pulse_starts(), Some(&[0u64, 4, 8][..]));
    match reopened
        .load_field(SourceField::Pulse(PulseField::StartFrame))
        .unwrap()
    {
        FieldValues::U32(v) => assert_eq!(v, vec![0, 9, 15, 19, 7, 14, 21, 28]),
        other => panic!("unexpected field: {:?}", other),
    }
    let record = reopened.read_record(1).unwrap();
    assert_eq!(record.bases.as_deref(), Some(&b"TGCA"[..]));
    assert_eq!(record.mid_signal.as_deref(), Some(&[500u16, 600, 700, 800][..]));
}
