use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::model::{BookRecord, Source};

/// Closed rating interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RatingRange {
    pub min: f64,
    pub max: f64,
}

impl RatingRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let invalid = |reason: &str| ReconError::InvalidRange {
            min: self.min,
            max: self.max,
            reason: reason.into(),
        };
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if self.min >= self.max {
            return Err(invalid("min must be less than max"));
        }
        Ok(())
    }

    /// NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Linearly map `value` from `native` onto `target`.
///
/// Fails instead of clamping when `value` lies outside `native`.
pub fn rescale(value: f64, native: RatingRange, target: RatingRange) -> Result<f64, ReconError> {
    native.validate()?;
    target.validate()?;
    if !native.contains(value) {
        return Err(ReconError::ValueOutOfRange {
            value,
            min: native.min,
            max: native.max,
        });
    }
    Ok(target.min + (value - native.min) / native.span() * target.span())
}

/// Per-source native ranges plus the shared target scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingRescaler {
    pub commercial: RatingRange,
    pub reader: RatingRange,
    pub target: RatingRange,
}

impl RatingRescaler {
    pub fn new(commercial: RatingRange, reader: RatingRange, target: RatingRange) -> Self {
        Self {
            commercial,
            reader,
            target,
        }
    }

    pub fn native(&self, side: Source) -> RatingRange {
        match side {
            Source::Commercial => self.commercial,
            Source::Reader => self.reader,
        }
    }

    /// Check a record's rating against its side's native range.
    pub fn check(&self, side: Source, record: &BookRecord) -> Result<(), ReconError> {
        let native = self.native(side);
        if native.contains(record.rating) {
            Ok(())
        } else {
            Err(ReconError::RatingOutOfRange {
                side,
                record_id: record.source_id.clone(),
                value: record.rating,
                min: native.min,
                max: native.max,
            })
        }
    }

    /// Rescale a record's rating onto the target scale.
    pub fn normalize(&self, side: Source, record: &BookRecord) -> Result<f64, ReconError> {
        self.check(side, record)?;
        rescale(record.rating, self.native(side), self.target)
    }
}
