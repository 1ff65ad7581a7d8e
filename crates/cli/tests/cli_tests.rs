// End-to-end tests for the ratelink binary: exit codes, output files, stdout contract.
// Run with: cargo test -p ratelink-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn ratelink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ratelink"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../recon/tests/fixtures")
}

/// Copy the shared fixtures into a scratch directory so runs can write outputs
/// and tests can edit inputs without touching the tree.
fn scratch() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in ["books.ratelink.toml", "reviews.csv", "catalog.csv"] {
        std::fs::copy(fixtures_dir().join(name), dir.path().join(name)).unwrap();
    }
    dir
}

fn edit(path: &Path, from: &str, to: &str) {
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.contains(from), "{} does not contain {from:?}", path.display());
    std::fs::write(path, text.replace(from, to)).unwrap();
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn assert_exit(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "stderr:\n{}",
        stderr(output)
    );
}

// ===========================================================================
// ratelink run
// ===========================================================================

#[test]
fn run_writes_json_and_matched_csv() {
    let dir = scratch();
    let json_path = dir.path().join("result.json");
    let csv_path = dir.path().join("matched.csv");

    let output = ratelink()
        .arg("run")
        .arg(dir.path().join("books.ratelink.toml"))
        .arg("--output")
        .arg(&json_path)
        .arg("--matched-csv")
        .arg(&csv_path)
        .output()
        .unwrap();
    assert_exit(&output, 0);
    assert!(stderr(&output).contains("5 matched"), "{}", stderr(&output));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["summary"]["matched"], 5);
    assert_eq!(json["summary"]["commercial_records"], 8);
    assert!(json["meta"]["result_digest"]
        .as_str()
        .unwrap()
        .starts_with("sha256:"));

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "commercial_id");
    assert_eq!(&headers[11], "price");
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 5);
    assert_eq!(&rows[0][0], "B01");
    assert_eq!(&rows[0][1], "1001");
    assert_eq!(&rows[0][6], "1.1500");
    assert_eq!(&rows[0][11], "11.00");
    // No usable price on the Pride and Prejudice reviews.
    assert_eq!(&rows[2][0], "B04");
    assert_eq!(&rows[2][11], "");
}

#[test]
fn run_json_stdout_is_a_single_value() {
    let dir = scratch();
    let output = ratelink()
        .arg("run")
        .arg(dir.path().join("books.ratelink.toml"))
        .arg("--json")
        .output()
        .unwrap();
    assert_exit(&output, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be JSON: {e}\n{stdout}"));
    assert_eq!(json["discrepancy"]["stats"]["outliers"], 1);
    assert_eq!(json["unmatched_commercial"].as_array().unwrap().len(), 3);
}

#[test]
fn run_outliers_only_keeps_flagged_rows() {
    let dir = scratch();
    let csv_path = dir.path().join("outliers.csv");
    let output = ratelink()
        .arg("run")
        .arg(dir.path().join("books.ratelink.toml"))
        .arg("--matched-csv")
        .arg(&csv_path)
        .arg("--outliers-only")
        .output()
        .unwrap();
    assert_exit(&output, 0);

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], "B04");
    assert_eq!(&rows[0][8], "true");
}

#[test]
fn run_uses_output_paths_from_config() {
    let dir = scratch();
    let config = dir.path().join("books.ratelink.toml");
    let mut text = std::fs::read_to_string(&config).unwrap();
    text.push_str("\n[output]\njson = \"out/result.json\"\n");
    std::fs::write(&config, text).unwrap();
    std::fs::create_dir(dir.path().join("out")).unwrap();

    let output = ratelink().arg("run").arg(&config).output().unwrap();
    assert_exit(&output, 0);
    assert!(dir.path().join("out/result.json").exists());
}

#[test]
fn run_is_deterministic() {
    let dir = scratch();
    let config = dir.path().join("books.ratelink.toml");
    let digest = || {
        let output = ratelink().arg("run").arg(&config).arg("--json").output().unwrap();
        assert_exit(&output, 0);
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        json["meta"]["result_digest"].as_str().unwrap().to_string()
    };
    assert_eq!(digest(), digest());
}

// ===========================================================================
// Failure exit codes
// ===========================================================================

#[test]
fn invalid_config_exits_60() {
    let dir = scratch();
    let config = dir.path().join("books.ratelink.toml");
    edit(&config, "title_threshold = 0.85", "title_threshold = 1.5");

    let output = ratelink().arg("run").arg(&config).output().unwrap();
    assert_exit(&output, 60);
    assert!(stderr(&output).contains("title_threshold"));
}

#[test]
fn unparseable_config_exits_60() {
    let dir = scratch();
    let config = dir.path().join("books.ratelink.toml");
    std::fs::write(&config, "name = [unterminated").unwrap();

    let output = ratelink().arg("validate").arg(&config).output().unwrap();
    assert_exit(&output, 60);
}

#[test]
fn missing_config_exits_2() {
    let dir = scratch();
    let output = ratelink()
        .arg("run")
        .arg(dir.path().join("nope.ratelink.toml"))
        .output()
        .unwrap();
    assert_exit(&output, 2);
}

#[test]
fn missing_column_exits_61() {
    let dir = scratch();
    edit(
        &dir.path().join("books.ratelink.toml"),
        "rating  = \"review/score\"",
        "rating  = \"review/stars\"",
    );

    let output = ratelink()
        .arg("run")
        .arg(dir.path().join("books.ratelink.toml"))
        .output()
        .unwrap();
    assert_exit(&output, 61);
    let err = stderr(&output);
    assert!(err.contains("review/stars"), "{err}");
    assert!(err.contains("hint:"), "{err}");
}

#[test]
fn rating_out_of_range_exits_62() {
    let dir = scratch();
    edit(
        &dir.path().join("catalog.csv"),
        "1006,Dune,\"Herbert, Frank\",4.25",
        "1006,Dune,\"Herbert, Frank\",5.25",
    );

    let json_path = dir.path().join("result.json");
    let output = ratelink()
        .arg("run")
        .arg(dir.path().join("books.ratelink.toml"))
        .arg("--output")
        .arg(&json_path)
        .output()
        .unwrap();
    assert_exit(&output, 62);
    assert!(stderr(&output).contains("1006"));
    assert!(!json_path.exists());
}

#[test]
fn unwritable_output_exits_63_without_partial_files() {
    let dir = scratch();
    let csv_path = dir.path().join("matched.csv");
    let output = ratelink()
        .arg("run")
        .arg(dir.path().join("books.ratelink.toml"))
        .arg("--output")
        .arg(dir.path().join("missing-dir/result.json"))
        .arg("--matched-csv")
        .arg(&csv_path)
        .output()
        .unwrap();
    assert_exit(&output, 63);
    assert!(!csv_path.exists());
}

#[test]
fn unwritable_csv_leaves_no_json_behind() {
    let dir = scratch();
    let json_path = dir.path().join("result.json");
    let output = ratelink()
        .arg("run")
        .arg(dir.path().join("books.ratelink.toml"))
        .arg("--output")
        .arg(&json_path)
        .arg("--matched-csv")
        .arg(dir.path().join("missing-dir/matched.csv"))
        .output()
        .unwrap();
    assert_exit(&output, 63);
    assert!(!json_path.exists());
    assert!(stderr(&output).contains("matched.csv"));
}

// ===========================================================================
// ratelink validate / score
// ===========================================================================

#[test]
fn validate_accepts_fixture_config() {
    let dir = scratch();
    let output = ratelink()
        .arg("validate")
        .arg(dir.path().join("books.ratelink.toml"))
        .output()
        .unwrap();
    assert_exit(&output, 0);
    let err = stderr(&output);
    assert!(err.contains("Commercial vs Reader"), "{err}");
    assert!(err.contains("levenshtein"), "{err}");
}

#[test]
fn validate_does_not_read_data_files() {
    let dir = scratch();
    std::fs::remove_file(dir.path().join("reviews.csv")).unwrap();
    let output = ratelink()
        .arg("validate")
        .arg(dir.path().join("books.ratelink.toml"))
        .output()
        .unwrap();
    assert_exit(&output, 0);
}

#[test]
fn score_ignores_leading_article() {
    let output = ratelink()
        .args(["score", "The Great Gatsby", "Great Gatsby"])
        .output()
        .unwrap();
    assert_exit(&output, 0);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1.0000");
}

#[test]
fn score_authors_compares_surnames() {
    let output = ratelink()
        .args(["score", "--author", "F. Scott Fitzgerald", "Fitzgerald, F. Scott"])
        .output()
        .unwrap();
    assert_exit(&output, 0);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1.0000");

    let output = ratelink()
        .args(["score", "--author", "Leo Tolstoy", "Cara Delevingne"])
        .output()
        .unwrap();
    assert_exit(&output, 0);
    let score: f64 = String::from_utf8_lossy(&output.stdout).trim().parse().unwrap();
    assert!(score < 0.7, "{score}");
}

#[test]
fn score_placeholder_author_is_usage_error() {
    let output = ratelink()
        .args(["score", "--author", "Anonymous", "Homer"])
        .output()
        .unwrap();
    assert_exit(&output, 2);
}
