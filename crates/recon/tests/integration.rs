use std::path::PathBuf;

use ratelink_recon::config::ReconConfig;
use ratelink_recon::engine::{load_commercial_csv, load_input, load_reader_csv, run};
use ratelink_recon::model::{ReconInput, ReconResult, UnmatchedReason};
use ratelink_recon::ReconError;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_config() -> ReconConfig {
    let toml = std::fs::read_to_string(fixtures_dir().join("books.ratelink.toml")).unwrap();
    ReconConfig::from_toml(&toml).unwrap()
}

fn load_and_run(config: &ReconConfig) -> ReconResult {
    let input = load_input(config, &fixtures_dir()).unwrap();
    run(config, &input).unwrap()
}

fn pair_ids(result: &ReconResult) -> Vec<(String, String)> {
    result
        .matched
        .iter()
        .map(|m| (m.commercial.source_id.clone(), m.reader.source_id.clone()))
        .collect()
}

// -------------------------------------------------------------------------
// Loading
// -------------------------------------------------------------------------

#[test]
fn fixture_loads_one_record_per_book() {
    let config = fixture_config();
    let input = load_input(&config, &fixtures_dir()).unwrap();

    // The review without an Id is skipped.
    assert_eq!(input.commercial.len(), 8);
    assert_eq!(input.reader.len(), 8);

    let gatsby = &input.commercial[0];
    assert_eq!(gatsby.source_id, "B01");
    assert_eq!(gatsby.rating, 4.5);
    assert_eq!(gatsby.rating_count, 2);
    assert_eq!(gatsby.price, Some(11.0));

    let omens = input.commercial.iter().find(|b| b.source_id == "B05").unwrap();
    assert_eq!(omens.price, None, "'$15' is not a number");
    let dune = input.commercial.iter().find(|b| b.source_id == "B07").unwrap();
    assert_eq!(dune.price, None, "900 is outside the price bounds");
}

#[test]
fn chunk_size_does_not_change_loaded_records() {
    let config = fixture_config();
    let reviews = std::fs::read(fixtures_dir().join("reviews.csv")).unwrap();
    let catalog = std::fs::read(fixtures_dir().join("catalog.csv")).unwrap();

    let load = |chunk: usize| {
        (
            load_commercial_csv(reviews.as_slice(), &config.sources.commercial, config.price, chunk)
                .unwrap(),
            load_reader_csv(catalog.as_slice(), &config.sources.reader, chunk).unwrap(),
        )
    };
    let baseline = load(10_000);
    for chunk in [1, 2, 5] {
        assert_eq!(load(chunk), baseline, "chunk size {chunk}");
    }
}

#[test]
fn missing_file_is_io_error() {
    let mut config = fixture_config();
    config.sources.reader.file = "does-not-exist.csv".into();
    let err = load_input(&config, &fixtures_dir()).unwrap_err();
    assert!(matches!(err, ReconError::Io(ref msg) if msg.contains("does-not-exist.csv")));
}

// -------------------------------------------------------------------------
// Matching
// -------------------------------------------------------------------------

#[test]
fn fixture_matches_expected_pairs() {
    let result = load_and_run(&fixture_config());

    let expected: Vec<(String, String)> = [
        ("B01", "1001"),
        ("B03", "1003"),
        ("B04", "1004"),
        ("B05", "1005"),
        ("B07", "1006"),
    ]
    .iter()
    .map(|(c, r)| (c.to_string(), r.to_string()))
    .collect();
    assert_eq!(pair_ids(&result), expected);

    assert_eq!(result.summary.commercial_records, 8);
    assert_eq!(result.summary.reader_records, 8);
    assert_eq!(result.summary.matched, 5);
    assert!((result.summary.match_rate - 0.625).abs() < 1e-12);
}

#[test]
fn fixture_residuals_carry_reasons() {
    let result = load_and_run(&fixture_config());

    let commercial: Vec<(&str, UnmatchedReason)> = result
        .unmatched_commercial
        .iter()
        .map(|r| (r.record.source_id.as_str(), r.reason))
        .collect();
    assert_eq!(
        commercial,
        vec![
            ("B02", UnmatchedReason::BelowThreshold),
            ("B06", UnmatchedReason::NoCandidates),
            ("B08", UnmatchedReason::MissingTitle),
        ]
    );

    let reader: Vec<(&str, UnmatchedReason)> = result
        .unmatched_reader
        .iter()
        .map(|r| (r.record.source_id.as_str(), r.reason))
        .collect();
    assert_eq!(
        reader,
        vec![
            ("1002", UnmatchedReason::Unclaimed),
            ("1007", UnmatchedReason::Unclaimed),
            ("1008", UnmatchedReason::MissingAuthor),
        ]
    );

    // Anna Karenina: same title, different author.
    let anna = &result.unmatched_commercial[0];
    assert_eq!(anna.best_title_similarity, Some(1.0));
    assert!(anna.best_author_similarity.unwrap() < 0.7);
}

#[test]
fn every_match_clears_both_thresholds() {
    let config = fixture_config();
    let result = load_and_run(&config);
    for m in &result.matched {
        assert!(m.title_similarity >= config.matching.title_threshold);
        assert!(m.author_similarity >= config.matching.author_threshold);
    }
}

#[test]
fn stricter_author_threshold_rejects_partial_credit() {
    let mut config = fixture_config();
    config.matching.author_threshold = 1.0;
    let result = load_and_run(&config);
    // Every fixture match has identical surname sets, so nothing is lost.
    assert_eq!(result.summary.matched, 5);

    config.matching.title_threshold = 1.0;
    config.matching.author_threshold = 0.0;
    let result = load_and_run(&config);
    // Anna Karenina now passes on title alone.
    assert_eq!(result.summary.matched, 6);
}

#[test]
fn jaro_winkler_scorer_runs() {
    let toml = std::fs::read_to_string(fixtures_dir().join("books.ratelink.toml"))
        .unwrap()
        .replace(
            "max_candidates_per_record = 25",
            "max_candidates_per_record = 25\nscorer = \"jaro_winkler\"",
        );
    let config = ReconConfig::from_toml(&toml).unwrap();
    let result = load_and_run(&config);
    assert_eq!(result.meta.scorer, "jaro_winkler");
    assert_eq!(result.summary.matched, 5);
}

// -------------------------------------------------------------------------
// Discrepancy
// -------------------------------------------------------------------------

#[test]
fn fixture_discrepancy_rows() {
    let result = load_and_run(&fixture_config());
    let report = &result.discrepancy;

    let deltas: Vec<(&str, f64)> = report
        .rows
        .iter()
        .map(|r| (r.commercial_id.as_str(), r.delta))
        .collect();
    let expected = [
        ("B01", 1.15),
        ("B03", 1.46),
        ("B04", -6.02),
        ("B05", -1.0),
        ("B07", -1.0),
    ];
    assert_eq!(deltas.len(), expected.len());
    for ((id, delta), (want_id, want)) in deltas.iter().zip(expected) {
        assert_eq!(*id, want_id);
        assert!((delta - want).abs() < 1e-9, "{id}: {delta} != {want}");
    }

    let outliers: Vec<&str> = report
        .rows
        .iter()
        .filter(|r| r.is_outlier)
        .map(|r| r.commercial_id.as_str())
        .collect();
    assert_eq!(outliers, vec!["B04"]);

    assert_eq!(report.stats.pairs, 5);
    assert_eq!(report.stats.outliers, 1);
    assert_eq!(report.stats.higher_on_commercial, 2);
    assert_eq!(report.stats.higher_on_reader, 3);
    assert!((report.stats.max_abs_delta - 6.02).abs() < 1e-9);
    assert!(report.stats.correlation.is_some());
}

#[test]
fn gatsby_delta_follows_configured_ranges() {
    let mut config = fixture_config();
    config.sources.commercial.rating_range.min = 0.0;
    let result = load_and_run(&config);
    let gatsby = &result.discrepancy.rows[0];
    // 4.5 on [0, 5] -> 9.0; 3.8 on [0, 5] -> 7.6
    assert!((gatsby.commercial_rating_norm - 9.0).abs() < 1e-9);
    assert!((gatsby.delta - 1.4).abs() < 1e-9);
}

#[test]
fn narrower_native_range_fails_the_run() {
    let mut config = fixture_config();
    config.sources.reader.rating_range.max = 4.0;
    let err = load_input(&config, &fixtures_dir()).unwrap_err();
    assert!(err.is_range_error());
}

// -------------------------------------------------------------------------
// Determinism + JSON
// -------------------------------------------------------------------------

#[test]
fn repeated_runs_are_identical() {
    let config = fixture_config();
    let input = load_input(&config, &fixtures_dir()).unwrap();
    let a = run(&config, &input).unwrap();

    let mut reversed = ReconInput {
        commercial: input.commercial.clone(),
        reader: input.reader.clone(),
    };
    reversed.commercial.reverse();
    reversed.reader.reverse();
    let b = run(&config, &reversed).unwrap();

    assert_eq!(pair_ids(&a), pair_ids(&b));
    assert_eq!(a.meta.result_digest, b.meta.result_digest);
    let residual_ids = |r: &ReconResult| {
        r.unmatched_commercial
            .iter()
            .chain(&r.unmatched_reader)
            .map(|u| u.record.source_id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(residual_ids(&a), residual_ids(&b));
}

#[test]
fn result_serializes_to_json() {
    let result = load_and_run(&fixture_config());
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["meta"]["config_name"], "Commercial vs Reader");
    assert_eq!(json["summary"]["matched"], 5);
    assert_eq!(json["unmatched_commercial"][0]["reason"], "below_threshold");
    assert_eq!(json["unmatched_commercial"][0]["side"], "commercial");
    assert_eq!(json["discrepancy"]["stats"]["outliers"], 1);
    assert_eq!(json["summary"]["reason_counts"]["reader/unclaimed"], 2);
}
