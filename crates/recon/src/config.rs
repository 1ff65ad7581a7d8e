use serde::Deserialize;

use crate::error::ReconError;
use crate::model::Source;
use crate::rating::{RatingRange, RatingRescaler};
use crate::similarity::ScorerKind;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconConfig {
    pub name: String,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub matching: MatchConfig,
    #[serde(default)]
    pub rating: RatingConfig,
    #[serde(default)]
    pub price: PriceBounds,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    pub commercial: SourceConfig,
    pub reader: SourceConfig,
}

impl SourcesConfig {
    pub fn get(&self, side: Source) -> &SourceConfig {
        match side {
            Source::Commercial => &self.commercial,
            Source::Reader => &self.reader,
        }
    }
}

/// One input CSV. Commercial rows are individual reviews; reader rows are
/// per-book catalog entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub file: String,
    pub rating_range: RatingRange,
    pub columns: ColumnMapping,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnMapping {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub rating: String,
    /// Reader catalogs: number of ratings behind the average. Defaults to 1.
    #[serde(default)]
    pub rating_count: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    pub title_threshold: f64,
    pub author_threshold: f64,
    pub max_candidates_per_record: usize,
    pub title_weight: f64,
    pub author_weight: f64,
    pub scorer: ScorerKind,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            title_threshold: 0.85,
            author_threshold: 0.70,
            max_candidates_per_record: 25,
            title_weight: 0.6,
            author_weight: 0.4,
            scorer: ScorerKind::Levenshtein,
        }
    }
}

impl MatchConfig {
    /// Weighted mean of the two similarities.
    pub fn combined_score(&self, title: f64, author: f64) -> f64 {
        (self.title_weight * title + self.author_weight * author)
            / (self.title_weight + self.author_weight)
    }

    pub fn accepts(&self, title: f64, author: f64) -> bool {
        title >= self.title_threshold && author >= self.author_threshold
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        for (name, value) in [
            ("title_threshold", self.title_threshold),
            ("author_threshold", self.author_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ReconError::ConfigValidation(format!(
                    "matching.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.max_candidates_per_record == 0 {
            return Err(ReconError::ConfigValidation(
                "matching.max_candidates_per_record must be at least 1".into(),
            ));
        }
        let weights_ok = self.title_weight.is_finite()
            && self.author_weight.is_finite()
            && self.title_weight >= 0.0
            && self.author_weight >= 0.0
            && self.title_weight + self.author_weight > 0.0;
        if !weights_ok {
            return Err(ReconError::ConfigValidation(format!(
                "matching weights must be non-negative with a positive sum, got title={} author={}",
                self.title_weight, self.author_weight
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rating, price, ingest, output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RatingConfig {
    pub target: RatingRange,
    /// Absolute rescaled delta above which a pair is an outlier.
    pub outlier_threshold: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            target: RatingRange::new(0.0, 10.0),
            outlier_threshold: 2.0,
        }
    }
}

/// Prices are kept only when strictly inside `(min, max)`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 500.0 }
    }
}

impl PriceBounds {
    pub fn accepts(&self, price: f64) -> bool {
        price.is_finite() && price > self.min && price < self.max
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Rows folded per aggregation chunk.
    pub chunk_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { chunk_size: 10_000 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub matched_csv: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        for side in [Source::Commercial, Source::Reader] {
            let source = self.sources.get(side);
            if source.file.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "sources.{side}.file must not be empty"
                )));
            }
            source.rating_range.validate().map_err(|e| {
                ReconError::ConfigValidation(format!("sources.{side}.rating_range: {e}"))
            })?;
        }

        self.matching.validate()?;

        self.rating
            .target
            .validate()
            .map_err(|e| ReconError::ConfigValidation(format!("rating.target: {e}")))?;
        if !(self.rating.outlier_threshold >= 0.0 && self.rating.outlier_threshold.is_finite()) {
            return Err(ReconError::ConfigValidation(format!(
                "rating.outlier_threshold must be a non-negative number, got {}",
                self.rating.outlier_threshold
            )));
        }

        if !(self.price.min < self.price.max) {
            return Err(ReconError::ConfigValidation(format!(
                "price.min ({}) must be less than price.max ({})",
                self.price.min, self.price.max
            )));
        }

        if self.ingest.chunk_size == 0 {
            return Err(ReconError::ConfigValidation(
                "ingest.chunk_size must be at least 1".into(),
            ));
        }

        Ok(())
    }

    pub fn rescaler(&self) -> RatingRescaler {
        RatingRescaler::new(
            self.sources.commercial.rating_range,
            self.sources.reader.rating_range,
            self.rating.target,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
