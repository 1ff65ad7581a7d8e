use thiserror::Error;

use crate::model::Source;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (threshold out of bounds, bad range, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// Missing required column in input data.
    #[error("source '{side}': missing column '{column}'")]
    MissingColumn { side: Source, column: String },

    /// Rating cell could not be parsed as a number.
    #[error("source '{side}', record '{record_id}': cannot parse rating '{value}'")]
    RatingParse {
        side: Source,
        record_id: String,
        value: String,
    },

    /// Rating falls outside the source's documented native range.
    #[error(
        "source '{side}', record '{record_id}': rating {value} outside native range [{min}, {max}]"
    )]
    RatingOutOfRange {
        side: Source,
        record_id: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A bare value outside the range it is being rescaled from.
    #[error("rating {value} outside native range [{min}, {max}]")]
    ValueOutOfRange { value: f64, min: f64, max: f64 },

    /// A rating range that cannot be used for rescaling.
    #[error("invalid rating range [{min}, {max}]: {reason}")]
    InvalidRange { min: f64, max: f64, reason: String },

    /// The same book identifier appears twice on one side of a match run.
    #[error("source '{side}': duplicate record id '{record_id}'")]
    DuplicateRecord { side: Source, record_id: String },

    /// CSV decoding error.
    #[error("source '{side}': CSV error: {message}")]
    Csv { side: Source, message: String },

    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
}

impl ReconError {
    /// True for errors caused by ratings outside their documented scale.
    pub fn is_range_error(&self) -> bool {
        matches!(
            self,
            Self::RatingOutOfRange { .. } | Self::ValueOutOfRange { .. } | Self::InvalidRange { .. }
        )
    }
}
