//! `ratelink-recon`: cross-source book record linkage engine.
//!
//! Links a commercial review catalog to a reader-community catalog that
//! share no identifier, then compares the two sides' ratings on one scale.
//! Pure engine crate apart from CSV loading helpers: no CLI dependencies.

pub mod aggregate;
pub mod candidates;
pub mod config;
pub mod discrepancy;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod rating;
pub mod similarity;
pub mod summary;

pub use config::ReconConfig;
pub use engine::{load_input, run};
pub use error::ReconError;
pub use matcher::match_books;
pub use model::{BookRecord, MatchOutput, MatchedPair, ReconInput, ReconResult};
pub use rating::{RatingRange, RatingRescaler};
pub use similarity::{ScorerKind, Similarity};
