use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::aggregate::{
    Aggregator, CatalogRow, CommercialAggregator, ReaderAggregator, ReviewRow,
};
use crate::config::{PriceBounds, ReconConfig, SourceConfig};
use crate::discrepancy::analyze;
use crate::error::ReconError;
use crate::matcher::match_books;
use crate::model::{BookRecord, MatchedPair, ReconInput, ReconMeta, ReconResult, Source};
use crate::summary::compute_summary;

/// Run record linkage and discrepancy analysis per config.
///
/// Nothing is returned unless the whole run succeeds.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    tracing::info!(
        config = %config.name,
        commercial = input.commercial.len(),
        reader = input.reader.len(),
        scorer = %config.matching.scorer,
        "starting reconciliation"
    );

    let scorer = config.matching.scorer.scorer();
    let rescaler = config.rescaler();
    let output = match_books(
        &input.commercial,
        &input.reader,
        &config.matching,
        scorer.as_ref(),
        &rescaler,
    )?;

    let discrepancy = analyze(&output.matched, config.rating.outlier_threshold);
    let summary = compute_summary(input.commercial.len(), input.reader.len(), &output);

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            scorer: scorer.name().to_string(),
            title_threshold: config.matching.title_threshold,
            author_threshold: config.matching.author_threshold,
            result_digest: result_digest(&output.matched),
        },
        summary,
        matched: output.matched,
        unmatched_commercial: output.unmatched_commercial,
        unmatched_reader: output.unmatched_reader,
        discrepancy,
    })
}

/// SHA-256 over `commercial_id\treader_id` lines in match order
/// → "sha256:<64 hex>".
pub fn result_digest(matched: &[MatchedPair]) -> String {
    let mut hasher = Sha256::new();
    for (i, pair) in matched.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(pair.commercial.source_id.as_bytes());
        hasher.update(b"\t");
        hasher.update(pair.reader.source_id.as_bytes());
    }
    format!("sha256:{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// CSV loading
// ---------------------------------------------------------------------------

/// Load both sources named in `config`, resolving file paths against
/// `base_dir`.
pub fn load_input(config: &ReconConfig, base_dir: &Path) -> Result<ReconInput, ReconError> {
    let open = |side: Source| -> Result<File, ReconError> {
        let path = base_dir.join(&config.sources.get(side).file);
        File::open(&path)
            .map_err(|e| ReconError::Io(format!("{side} source {}: {e}", path.display())))
    };

    let commercial = load_commercial_csv(
        open(Source::Commercial)?,
        &config.sources.commercial,
        config.price,
        config.ingest.chunk_size,
    )?;
    let reader = load_reader_csv(
        open(Source::Reader)?,
        &config.sources.reader,
        config.ingest.chunk_size,
    )?;
    Ok(ReconInput { commercial, reader })
}

/// Stream commercial review rows through `CommercialAggregator`.
pub fn load_commercial_csv<R: Read>(
    input: R,
    source: &SourceConfig,
    price: PriceBounds,
    chunk_size: usize,
) -> Result<Vec<BookRecord>, ReconError> {
    let side = Source::Commercial;
    let mut reader = csv_reader(input);
    let headers = reader.headers().map_err(|e| csv_error(side, e))?.clone();
    let idx = |name: &str| column_index(side, &headers, name);

    let col = &source.columns;
    let id_idx = idx(&col.book_id)?;
    let title_idx = idx(&col.title)?;
    let author_idx = idx(&col.author)?;
    let rating_idx = idx(&col.rating)?;
    let price_idx = col.price.as_deref().map(idx).transpose()?;

    let aggregator = CommercialAggregator::new(source.rating_range, price);
    stream_chunks(side, &mut reader, aggregator, id_idx, chunk_size, |record| {
        let book_id = field(record, id_idx).trim();
        Ok(ReviewRow {
            rating: parse_rating(side, book_id, field(record, rating_idx))?,
            // Unparseable prices are treated as missing.
            price: price_idx.and_then(|i| field(record, i).trim().parse::<f64>().ok()),
            book_id: book_id.to_string(),
            title: field(record, title_idx).to_string(),
            author: field(record, author_idx).to_string(),
        })
    })
}

/// Stream reader catalog rows through `ReaderAggregator`.
///
/// Without a `rating_count` column every row counts as one rating.
pub fn load_reader_csv<R: Read>(
    input: R,
    source: &SourceConfig,
    chunk_size: usize,
) -> Result<Vec<BookRecord>, ReconError> {
    let side = Source::Reader;
    let mut reader = csv_reader(input);
    let headers = reader.headers().map_err(|e| csv_error(side, e))?.clone();
    let idx = |name: &str| column_index(side, &headers, name);

    let col = &source.columns;
    let id_idx = idx(&col.book_id)?;
    let title_idx = idx(&col.title)?;
    let author_idx = idx(&col.author)?;
    let rating_idx = idx(&col.rating)?;
    let count_idx = col.rating_count.as_deref().map(idx).transpose()?;

    let aggregator = ReaderAggregator::new(source.rating_range);
    stream_chunks(side, &mut reader, aggregator, id_idx, chunk_size, |record| {
        let book_id = field(record, id_idx).trim();
        let rating_count = match count_idx {
            Some(i) => parse_count(side, book_id, field(record, i))?,
            None => 1,
        };
        Ok(CatalogRow {
            rating: parse_rating(side, book_id, field(record, rating_idx))?,
            rating_count,
            book_id: book_id.to_string(),
            title: field(record, title_idx).to_string(),
            author: field(record, author_idx).to_string(),
        })
    })
}

fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input)
}

/// Parse rows and hand them to `aggregator` in chunks of `chunk_size`.
/// Rows with a blank book id are skipped.
fn stream_chunks<R, A, F>(
    side: Source,
    reader: &mut csv::Reader<R>,
    mut aggregator: A,
    id_idx: usize,
    chunk_size: usize,
    mut parse: F,
) -> Result<Vec<BookRecord>, ReconError>
where
    R: Read,
    A: Aggregator,
    F: FnMut(&csv::StringRecord) -> Result<A::Row, ReconError>,
{
    let chunk_size = chunk_size.max(1);
    let mut chunk = Vec::with_capacity(chunk_size.min(4096));
    let mut chunks = 0usize;
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| csv_error(side, e))?;
        if field(&record, id_idx).trim().is_empty() {
            skipped += 1;
            continue;
        }
        chunk.push(parse(&record)?);
        if chunk.len() >= chunk_size {
            aggregator.ingest(&chunk)?;
            chunk.clear();
            chunks += 1;
        }
    }
    if !chunk.is_empty() {
        aggregator.ingest(&chunk)?;
        chunks += 1;
    }

    if skipped > 0 {
        tracing::warn!(%side, skipped, "skipped rows without a book id");
    }
    let records = aggregator.finish();
    tracing::debug!(%side, chunks, records = records.len(), "loaded source");
    Ok(records)
}

fn column_index(side: Source, headers: &csv::StringRecord, name: &str) -> Result<usize, ReconError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| ReconError::MissingColumn {
            side,
            column: name.into(),
        })
}

fn field(record: &csv::StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn parse_rating(side: Source, record_id: &str, value: &str) -> Result<f64, ReconError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ReconError::RatingParse {
            side,
            record_id: record_id.into(),
            value: value.into(),
        })
}

/// Blank counts read as zero.
fn parse_count(side: Source, record_id: &str, value: &str) -> Result<u64, ReconError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse::<u64>().map_err(|_| ReconError::RatingParse {
        side,
        record_id: record_id.into(),
        value: value.into(),
    })
}

fn csv_error(side: Source, e: csv::Error) -> ReconError {
    ReconError::Csv {
        side,
        message: e.to_string(),
    }
}
