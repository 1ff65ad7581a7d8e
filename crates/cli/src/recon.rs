//! `ratelink run | validate | score`: config-driven book record linkage.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use ratelink_recon::model::{BookRecord, DiscrepancyRow, ReconResult};
use ratelink_recon::normalize::{author_surnames, normalize_key};
use ratelink_recon::similarity::{author_similarity, title_similarity};
use ratelink_recon::{ReconConfig, ReconError, ScorerKind};

use crate::exit_codes::{
    recon_exit_code, EXIT_ERROR, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_OUTPUT, EXIT_USAGE,
};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Link the two catalogs named in a TOML config and compare ratings
    #[command(after_help = "\
Examples:
  ratelink run books.ratelink.toml
  ratelink run books.ratelink.toml --json
  ratelink run books.ratelink.toml --output result.json --matched-csv matched.csv
  ratelink run books.ratelink.toml --matched-csv outliers.csv --outliers-only")]
    Run {
        /// Path to the .ratelink.toml config file
        config: PathBuf,

        /// Output JSON to stdout in addition to the human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides [output].json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write matched books as CSV (overrides [output].matched_csv)
        #[arg(long)]
        matched_csv: Option<PathBuf>,

        /// Only write pairs whose rating delta exceeds the outlier threshold
        #[arg(long)]
        outliers_only: bool,
    },

    /// Validate a config without loading any data
    #[command(after_help = "\
Examples:
  ratelink validate books.ratelink.toml")]
    Validate {
        /// Path to the .ratelink.toml config file
        config: PathBuf,
    },

    /// Print the similarity of two titles (or author credits)
    #[command(after_help = "\
Examples:
  ratelink score \"The Great Gatsby\" \"Great Gatsby\"
  ratelink score --author \"F. Scott Fitzgerald\" \"Fitzgerald, F. Scott\"
  ratelink score --scorer jaro_winkler \"Emma\" \"Emma (Penguin Classics)\"")]
    Score {
        a: String,
        b: String,

        /// Compare as author credits (surnames) instead of titles
        #[arg(long)]
        author: bool,

        /// Similarity measure: levenshtein or jaro_winkler
        #[arg(long, default_value = "levenshtein")]
        scorer: ScorerKind,
    },
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run {
            config,
            json,
            output,
            matched_csv,
            outliers_only,
        } => cmd_run(config, json, output, matched_csv, outliers_only),
        ReconCommands::Validate { config } => cmd_validate(config),
        ReconCommands::Score {
            a,
            b,
            author,
            scorer,
        } => cmd_score(&a, &b, author, scorer),
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError {
        code,
        message: msg.into(),
        hint: None,
    }
}

fn engine_err(err: ReconError) -> CliError {
    let code = recon_exit_code(&err);
    let hint = match &err {
        ReconError::RatingOutOfRange { side, .. } => Some(format!(
            "check sources.{side}.rating_range against the data; ratings are never clamped"
        )),
        ReconError::MissingColumn { side, .. } => Some(format!(
            "column names in [sources.{side}.columns] must match the CSV header exactly"
        )),
        _ => None,
    };
    CliError {
        code,
        message: err.to_string(),
        hint,
    }
}

fn read_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        recon_err(
            EXIT_USAGE,
            format!("cannot read config {}: {e}", config_path.display()),
        )
    })?;
    ReconConfig::from_toml(&config_str)
        .map_err(|e| recon_err(EXIT_RECON_INVALID_CONFIG, e.to_string()))
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    matched_csv: Option<PathBuf>,
    outliers_only: bool,
) -> Result<(), CliError> {
    let config = read_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    tracing::info!(
        config = %config_path.display(),
        base_dir = %base_dir.display(),
        "loading recon inputs"
    );
    let input = ratelink_recon::load_input(&config, base_dir).map_err(engine_err)?;
    let result = ratelink_recon::run(&config, &input).map_err(engine_err)?;

    // Render everything before touching the filesystem.
    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| recon_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    let json_path = output_file.or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p)));
    let csv_path =
        matched_csv.or_else(|| config.output.matched_csv.as_ref().map(|p| base_dir.join(p)));
    let csv_bytes = match csv_path {
        Some(_) => Some(render_matched_csv(&result.discrepancy.rows, outliers_only)?),
        None => None,
    };

    let mut outputs: Vec<(&Path, &[u8])> = Vec::new();
    if let Some(ref path) = json_path {
        outputs.push((path.as_path(), json_str.as_bytes()));
    }
    if let (Some(path), Some(bytes)) = (&csv_path, &csv_bytes) {
        outputs.push((path.as_path(), bytes.as_slice()));
    }
    for path in commit_outputs(&outputs)? {
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&result);
    Ok(())
}

fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "recon '{}': {} matched ({:.1}%) of {} commercial / {} reader, {} unmatched commercial, {} unmatched reader",
        result.meta.config_name,
        s.matched,
        s.match_rate * 100.0,
        s.commercial_records,
        s.reader_records,
        s.unmatched_commercial,
        s.unmatched_reader,
    );

    let d = &result.discrepancy.stats;
    if d.pairs > 0 {
        let correlation = d
            .correlation
            .map(|c| format!("{c:.3}"))
            .unwrap_or_else(|| "n/a".into());
        eprintln!(
            "ratings: mean delta {:+.2}, mean |delta| {:.2}, {} outlier(s) above {}, correlation {}",
            d.mean_delta,
            d.mean_abs_delta,
            d.outliers,
            result.discrepancy.outlier_threshold,
            correlation,
        );
    }

    if !s.reason_counts.is_empty() {
        let reasons: Vec<String> = s
            .reason_counts
            .iter()
            .map(|(reason, count)| format!("{reason}={count}"))
            .collect();
        eprintln!("unmatched: {}", reasons.join(", "));
    }
}

const MATCHED_CSV_HEADERS: [&str; 12] = [
    "commercial_id",
    "reader_id",
    "title",
    "author",
    "commercial_rating_norm",
    "reader_rating_norm",
    "delta",
    "abs_delta",
    "is_outlier",
    "commercial_count",
    "reader_count",
    "price",
];

fn render_matched_csv(rows: &[DiscrepancyRow], outliers_only: bool) -> Result<Vec<u8>, CliError> {
    let csv_err = |e: csv::Error| recon_err(EXIT_ERROR, format!("CSV serialization error: {e}"));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(MATCHED_CSV_HEADERS).map_err(csv_err)?;
    for row in rows.iter().filter(|r| !outliers_only || r.is_outlier) {
        writer
            .write_record([
                row.commercial_id.clone(),
                row.reader_id.clone(),
                row.title.clone(),
                row.author.clone(),
                format!("{:.4}", row.commercial_rating_norm),
                format!("{:.4}", row.reader_rating_norm),
                format!("{:.4}", row.delta),
                format!("{:.4}", row.abs_delta),
                row.is_outlier.to_string(),
                row.commercial_count.to_string(),
                row.reader_count.to_string(),
                row.price.map(|p| format!("{p:.2}")).unwrap_or_default(),
            ])
            .map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| recon_err(EXIT_ERROR, format!("CSV serialization error: {e}")))
}

fn output_err(path: &Path, e: std::io::Error) -> CliError {
    recon_err(
        EXIT_RECON_OUTPUT,
        format!("cannot write {}: {e}", path.display()),
    )
}

/// Stage every output in a temp file beside its destination, then rename
/// them all into place. Either every output lands or none does.
fn commit_outputs<'p>(outputs: &[(&'p Path, &[u8])]) -> Result<Vec<&'p Path>, CliError> {
    let mut staged = Vec::with_capacity(outputs.len());
    for &(path, bytes) in outputs {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| output_err(path, e))?;
        tmp.write_all(bytes).map_err(|e| output_err(path, e))?;
        tmp.flush().map_err(|e| output_err(path, e))?;
        staged.push((path, tmp));
    }

    let mut committed: Vec<&'p Path> = Vec::with_capacity(staged.len());
    for (path, tmp) in staged {
        if let Err(e) = tmp.persist(path) {
            for done in &committed {
                if let Err(rm) = std::fs::remove_file(done) {
                    tracing::warn!(path = %done.display(), error = %rm, "cannot roll back output");
                }
            }
            return Err(output_err(path, e.error));
        }
        committed.push(path);
    }
    Ok(committed)
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!(
        "valid: recon '{}' ({} vs {}), scorer {}, thresholds title={} author={}",
        config.name,
        config.sources.commercial.file,
        config.sources.reader.file,
        config.matching.scorer,
        config.matching.title_threshold,
        config.matching.author_threshold,
    );
    Ok(())
}

// ============================================================================
// score
// ============================================================================

fn cmd_score(a: &str, b: &str, author: bool, scorer: ScorerKind) -> Result<(), CliError> {
    let scorer = scorer.scorer();
    let (left, right, score) = if author {
        let (left, right) = (author_surnames(a), author_surnames(b));
        let score = author_similarity(&left, &right, scorer.as_ref());
        (left, right, score)
    } else {
        let (left, right) = (title_tokens(a), title_tokens(b));
        let score = title_similarity(&left, &right, scorer.as_ref());
        (left, right, score)
    };

    if left.is_empty() || right.is_empty() {
        let what = if author { "author" } else { "title" };
        return Err(CliError::usage(format!("{what} is empty after normalization"))
            .with_hint("placeholder credits such as \"Anonymous\" carry no surname"));
    }

    eprintln!("a: {}", left.join(" "));
    eprintln!("b: {}", right.join(" "));
    println!("{score:.4}");
    Ok(())
}

/// Title tokens exactly as the matcher sees them.
fn title_tokens(title: &str) -> Vec<String> {
    normalize_key(&BookRecord {
        source_id: String::new(),
        raw_title: title.to_string(),
        raw_author: String::new(),
        rating: 0.0,
        rating_count: 0,
        price: None,
    })
    .title_tokens
}
