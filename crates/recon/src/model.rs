use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Which catalog a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Commercial,
    Reader,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commercial => write!(f, "commercial"),
            Self::Reader => write!(f, "reader"),
        }
    }
}

/// One aggregated book from either catalog. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookRecord {
    pub source_id: String,
    pub raw_title: String,
    pub raw_author: String,
    /// Average rating on the source's native scale.
    pub rating: f64,
    pub rating_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

/// Complete per-book summaries for both sides of a run.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub commercial: Vec<BookRecord>,
    pub reader: Vec<BookRecord>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Lookup key derived from a record. Never used to accept a match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedKey {
    /// Lower-cased title, punctuation and leading article stripped.
    pub title: String,
    /// Title tokens with stop words removed, in title order.
    pub title_tokens: Vec<String>,
    /// Sorted, deduplicated author surnames.
    pub surnames: Vec<String>,
}

impl NormalizedKey {
    pub fn has_title(&self) -> bool {
        !self.title.is_empty()
    }

    pub fn has_author(&self) -> bool {
        !self.surnames.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// A reader-side candidate for one commercial record, before scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Index into the reader record slice.
    pub reader: usize,
    /// Naive title-token + surname Jaccard overlap, in [0, 2].
    pub lexical_overlap: f64,
}

/// A scored (commercial, reader) pairing. Discarded after the decision.
#[derive(Debug, Clone)]
pub struct MatchCandidatePair<'a> {
    pub commercial: &'a BookRecord,
    pub reader: &'a BookRecord,
    pub title_similarity: f64,
    pub author_similarity: f64,
    pub combined_score: f64,
}

// ---------------------------------------------------------------------------
// Match output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MatchedPair {
    pub commercial: BookRecord,
    pub reader: BookRecord,
    pub title_similarity: f64,
    pub author_similarity: f64,
    pub combined_score: f64,
    pub commercial_rating_norm: f64,
    pub reader_rating_norm: f64,
    /// `commercial_rating_norm - reader_rating_norm`.
    pub delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// Title is blank after normalization.
    MissingTitle,
    /// No surname could be extracted from the author string.
    MissingAuthor,
    /// Candidate generation produced nothing to score.
    NoCandidates,
    /// Every candidate was already claimed by an earlier record.
    CandidatesClaimed,
    /// Candidates existed but none cleared both thresholds.
    BelowThreshold,
    /// Reader record never claimed by any commercial record.
    Unclaimed,
}

impl std::fmt::Display for UnmatchedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "missing_title"),
            Self::MissingAuthor => write!(f, "missing_author"),
            Self::NoCandidates => write!(f, "no_candidates"),
            Self::CandidatesClaimed => write!(f, "candidates_claimed"),
            Self::BelowThreshold => write!(f, "below_threshold"),
            Self::Unclaimed => write!(f, "unclaimed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedResidual {
    pub side: Source,
    pub record: BookRecord,
    pub reason: UnmatchedReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_title_similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_author_similarity: Option<f64>,
}

impl UnmatchedResidual {
    pub fn new(side: Source, record: BookRecord, reason: UnmatchedReason) -> Self {
        Self {
            side,
            record,
            reason,
            best_title_similarity: None,
            best_author_similarity: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchOutput {
    /// Ordered by ascending commercial `source_id`.
    pub matched: Vec<MatchedPair>,
    /// In processing order (ascending commercial `source_id`).
    pub unmatched_commercial: Vec<UnmatchedResidual>,
    /// Ascending reader `source_id`.
    pub unmatched_reader: Vec<UnmatchedResidual>,
}

// ---------------------------------------------------------------------------
// Discrepancy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DiscrepancyRow {
    pub commercial_id: String,
    pub reader_id: String,
    pub title: String,
    pub author: String,
    pub commercial_rating_norm: f64,
    pub reader_rating_norm: f64,
    pub delta: f64,
    pub abs_delta: f64,
    pub is_outlier: bool,
    pub commercial_count: u64,
    pub reader_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscrepancyStats {
    pub pairs: usize,
    pub outliers: usize,
    pub higher_on_commercial: usize,
    pub higher_on_reader: usize,
    pub mean_delta: f64,
    pub mean_abs_delta: f64,
    pub max_abs_delta: f64,
    pub commercial_mean: f64,
    pub reader_mean: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscrepancyReport {
    pub outlier_threshold: f64,
    pub stats: DiscrepancyStats,
    pub rows: Vec<DiscrepancyRow>,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    pub commercial_records: usize,
    pub reader_records: usize,
    pub matched: usize,
    pub unmatched_commercial: usize,
    pub unmatched_reader: usize,
    /// Matched share of the smaller catalog.
    pub match_rate: f64,
    pub reason_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub scorer: String,
    pub title_threshold: f64,
    pub author_threshold: f64,
    /// SHA-256 over the ordered matched id pairs.
    pub result_digest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub matched: Vec<MatchedPair>,
    pub unmatched_commercial: Vec<UnmatchedResidual>,
    pub unmatched_reader: Vec<UnmatchedResidual>,
    pub discrepancy: DiscrepancyReport,
}
