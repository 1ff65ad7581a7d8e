//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 60-69   | recon            | Record linkage run codes                 |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in `recon_exit_code` if an engine error produces it

use ratelink_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (60-69)
// =============================================================================

/// Config file could not be parsed or failed validation.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 60;

/// Input could not be read or decoded (missing file, missing column,
/// unparseable rating, duplicate id).
pub const EXIT_RECON_RUNTIME: u8 = 61;

/// A rating fell outside its source's native range.
pub const EXIT_RECON_RATING_RANGE: u8 = 62;

/// A result file could not be written.
pub const EXIT_RECON_OUTPUT: u8 = 63;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::RatingOutOfRange { .. }
        | ReconError::ValueOutOfRange { .. }
        | ReconError::InvalidRange { .. } => {
            EXIT_RECON_RATING_RANGE
        }
        ReconError::MissingColumn { .. }
        | ReconError::RatingParse { .. }
        | ReconError::DuplicateRecord { .. }
        | ReconError::Csv { .. }
        | ReconError::Io(_) => EXIT_RECON_RUNTIME,
    }
}
