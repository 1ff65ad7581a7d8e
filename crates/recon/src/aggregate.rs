use std::collections::BTreeMap;

use crate::config::PriceBounds;
use crate::error::ReconError;
use crate::model::{BookRecord, Source};
use crate::rating::RatingRange;

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// One commercial-platform review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRow {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub rating: f64,
    pub price: Option<f64>,
}

/// One reader-community catalog entry (already an average).
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub rating: f64,
    pub rating_count: u64,
}

/// Folds raw rows, chunk by chunk, into complete per-book records.
pub trait Aggregator {
    type Row;

    fn ingest(&mut self, chunk: &[Self::Row]) -> Result<(), ReconError>;

    /// Complete records, ascending by `source_id`.
    fn finish(self) -> Vec<BookRecord>;
}

/// Feed `rows` through `aggregator` in chunks of at most `chunk_size`.
pub fn aggregate<A: Aggregator>(
    mut aggregator: A,
    rows: &[A::Row],
    chunk_size: usize,
) -> Result<Vec<BookRecord>, ReconError> {
    for chunk in rows.chunks(chunk_size.max(1)) {
        aggregator.ingest(chunk)?;
    }
    Ok(aggregator.finish())
}

// ---------------------------------------------------------------------------
// Partial sums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
struct Partial {
    title: String,
    author: String,
    weighted_sum: f64,
    weight: u64,
    rating_count: u64,
    price_sum: f64,
    price_count: u64,
}

impl Partial {
    fn absorb_text(&mut self, title: &str, author: &str) {
        if self.title.trim().is_empty() && !title.trim().is_empty() {
            self.title = title.trim().to_string();
        }
        if self.author.trim().is_empty() && !author.trim().is_empty() {
            self.author = author.trim().to_string();
        }
    }

    fn merge(&mut self, other: Partial) {
        self.absorb_text(&other.title, &other.author);
        self.weighted_sum += other.weighted_sum;
        self.weight += other.weight;
        self.rating_count += other.rating_count;
        self.price_sum += other.price_sum;
        self.price_count += other.price_count;
    }

    fn into_record(self, source_id: String) -> BookRecord {
        let rating = if self.weight == 0 {
            0.0
        } else {
            self.weighted_sum / self.weight as f64
        };
        let price = (self.price_count > 0).then(|| self.price_sum / self.price_count as f64);
        BookRecord {
            source_id,
            raw_title: self.title,
            raw_author: self.author,
            rating,
            rating_count: self.rating_count,
            price,
        }
    }
}

/// Per-book partial sums from one or more chunks. Summaries built
/// independently can be merged in chunk order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkSummary {
    books: BTreeMap<String, Partial>,
    rows: usize,
    prices_dropped: usize,
}

impl ChunkSummary {
    pub fn merge(&mut self, other: ChunkSummary) {
        for (id, partial) in other.books {
            self.books.entry(id).or_default().merge(partial);
        }
        self.rows += other.rows;
        self.prices_dropped += other.prices_dropped;
    }

    pub fn books(&self) -> usize {
        self.books.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    fn into_records(self) -> Vec<BookRecord> {
        self.books
            .into_iter()
            .map(|(id, partial)| partial.into_record(id))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Commercial aggregator
// ---------------------------------------------------------------------------

/// Averages per-review ratings and prices into one record per book.
#[derive(Debug, Clone)]
pub struct CommercialAggregator {
    range: RatingRange,
    price: PriceBounds,
    merged: ChunkSummary,
}

impl CommercialAggregator {
    pub fn new(range: RatingRange, price: PriceBounds) -> Self {
        Self {
            range,
            price,
            merged: ChunkSummary::default(),
        }
    }

    /// Fold one chunk without touching the running total.
    pub fn aggregate_chunk(&self, chunk: &[ReviewRow]) -> Result<ChunkSummary, ReconError> {
        let mut summary = ChunkSummary::default();
        for row in chunk {
            check_rating(Source::Commercial, &row.book_id, row.rating, self.range)?;

            let partial = summary.books.entry(row.book_id.clone()).or_default();
            partial.absorb_text(&row.title, &row.author);
            partial.weighted_sum += row.rating;
            partial.weight += 1;
            partial.rating_count += 1;

            match row.price {
                Some(p) if self.price.accepts(p) => {
                    partial.price_sum += p;
                    partial.price_count += 1;
                }
                Some(_) => summary.prices_dropped += 1,
                None => {}
            }
            summary.rows += 1;
        }
        Ok(summary)
    }

    pub fn merge(&mut self, summary: ChunkSummary) {
        self.merged.merge(summary);
    }
}

impl Aggregator for CommercialAggregator {
    type Row = ReviewRow;

    fn ingest(&mut self, chunk: &[ReviewRow]) -> Result<(), ReconError> {
        let summary = self.aggregate_chunk(chunk)?;
        self.merge(summary);
        Ok(())
    }

    fn finish(self) -> Vec<BookRecord> {
        if self.merged.prices_dropped > 0 {
            tracing::warn!(
                dropped = self.merged.prices_dropped,
                min = self.price.min,
                max = self.price.max,
                "ignored commercial prices outside bounds"
            );
        }
        tracing::info!(
            rows = self.merged.rows,
            books = self.merged.books(),
            "aggregated commercial reviews"
        );
        self.merged.into_records()
    }
}

// ---------------------------------------------------------------------------
// Reader aggregator
// ---------------------------------------------------------------------------

/// Collapses catalog rows per book; duplicates are merged with a
/// rating-count-weighted average.
#[derive(Debug, Clone)]
pub struct ReaderAggregator {
    range: RatingRange,
    merged: ChunkSummary,
}

impl ReaderAggregator {
    pub fn new(range: RatingRange) -> Self {
        Self {
            range,
            merged: ChunkSummary::default(),
        }
    }
}

impl Aggregator for ReaderAggregator {
    type Row = CatalogRow;

    fn ingest(&mut self, chunk: &[CatalogRow]) -> Result<(), ReconError> {
        for row in chunk {
            check_rating(Source::Reader, &row.book_id, row.rating, self.range)?;

            // Unrated books still carry their listed average.
            let weight = row.rating_count.max(1);
            let partial = self.merged.books.entry(row.book_id.clone()).or_default();
            partial.absorb_text(&row.title, &row.author);
            partial.weighted_sum += row.rating * weight as f64;
            partial.weight += weight;
            partial.rating_count += row.rating_count;
            self.merged.rows += 1;
        }
        Ok(())
    }

    fn finish(self) -> Vec<BookRecord> {
        tracing::info!(
            rows = self.merged.rows,
            books = self.merged.books(),
            "aggregated reader catalog"
        );
        self.merged.into_records()
    }
}

fn check_rating(side: Source, id: &str, rating: f64, range: RatingRange) -> Result<(), ReconError> {
    if range.contains(rating) {
        Ok(())
    } else {
        Err(ReconError::RatingOutOfRange {
            side,
            record_id: id.to_string(),
            value: rating,
            min: range.min,
            max: range.max,
        })
    }
}
