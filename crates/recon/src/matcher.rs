//! Match decision: turns scored candidates into 1:1 `MatchedPair`s.
//!
//! Commercial records are visited in ascending `source_id` order. Each one
//! claims its best reader candidate that clears both the title and author
//! thresholds; a claimed reader record is unavailable to every later
//! commercial record. The claimed set is threaded through the decision
//! explicitly, so a run is a pure function of its inputs.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use ordered_float::OrderedFloat;

use crate::candidates::CandidateIndex;
use crate::config::MatchConfig;
use crate::error::ReconError;
use crate::model::{
    BookRecord, MatchCandidatePair, MatchOutput, MatchedPair, NormalizedKey, Source,
    UnmatchedReason, UnmatchedResidual,
};
use crate::normalize::normalize_key;
use crate::rating::RatingRescaler;
use crate::similarity::{author_similarity, title_similarity, Similarity};

/// Link `commercial` to `reader` records.
///
/// Fails before any matching if either side holds a duplicate id or a
/// rating outside its native range; otherwise every record ends up either
/// in exactly one `MatchedPair` or in a residual list.
pub fn match_books(
    commercial: &[BookRecord],
    reader: &[BookRecord],
    config: &MatchConfig,
    scorer: &dyn Similarity,
    rescaler: &RatingRescaler,
) -> Result<MatchOutput, ReconError> {
    check_inputs(Source::Commercial, commercial, rescaler)?;
    check_inputs(Source::Reader, reader, rescaler)?;

    let commercial_keys: Vec<NormalizedKey> = commercial.iter().map(normalize_key).collect();
    let reader_keys: Vec<NormalizedKey> = reader.iter().map(normalize_key).collect();

    let run = MatchRun {
        reader,
        reader_keys: &reader_keys,
        index: CandidateIndex::new(reader, &reader_keys),
        config,
        scorer,
    };

    let mut order: Vec<usize> = (0..commercial.len()).collect();
    order.sort_by(|&a, &b| commercial[a].source_id.cmp(&commercial[b].source_id));

    let mut claimed: BTreeSet<&str> = BTreeSet::new();
    let mut output = MatchOutput::default();

    for ci in order {
        let record = &commercial[ci];
        match run.decide(record, &commercial_keys[ci], &claimed) {
            Decision::Accept(pair) => {
                tracing::debug!(
                    commercial = %record.source_id,
                    reader = %pair.reader.source_id,
                    title = pair.title_similarity,
                    author = pair.author_similarity,
                    "accepted match"
                );
                claimed.insert(pair.reader.source_id.as_str());
                output.matched.push(matched_pair(&pair, rescaler)?);
            }
            Decision::Reject(residual) => {
                tracing::debug!(
                    commercial = %record.source_id,
                    reason = %residual.reason,
                    "commercial record unmatched"
                );
                output.unmatched_commercial.push(residual);
            }
        }
    }

    let mut unclaimed: Vec<usize> = (0..reader.len())
        .filter(|&ri| !claimed.contains(reader[ri].source_id.as_str()))
        .collect();
    unclaimed.sort_by(|&a, &b| reader[a].source_id.cmp(&reader[b].source_id));
    output.unmatched_reader = unclaimed
        .into_iter()
        .map(|ri| {
            let reason = malformed_reason(&reader_keys[ri]).unwrap_or(UnmatchedReason::Unclaimed);
            UnmatchedResidual::new(Source::Reader, reader[ri].clone(), reason)
        })
        .collect();

    tracing::info!(
        commercial = commercial.len(),
        reader = reader.len(),
        matched = output.matched.len(),
        unmatched_commercial = output.unmatched_commercial.len(),
        unmatched_reader = output.unmatched_reader.len(),
        "match run complete"
    );

    Ok(output)
}

/// Score one (commercial, reader) pairing.
pub fn score_pair<'a>(
    commercial: (&'a BookRecord, &NormalizedKey),
    reader: (&'a BookRecord, &NormalizedKey),
    config: &MatchConfig,
    scorer: &dyn Similarity,
) -> MatchCandidatePair<'a> {
    let title = title_similarity(&commercial.1.title_tokens, &reader.1.title_tokens, scorer);
    let author = author_similarity(&commercial.1.surnames, &reader.1.surnames, scorer);
    MatchCandidatePair {
        commercial: commercial.0,
        reader: reader.0,
        title_similarity: title,
        author_similarity: author,
        combined_score: config.combined_score(title, author),
    }
}

enum Decision<'a> {
    Accept(MatchCandidatePair<'a>),
    Reject(UnmatchedResidual),
}

struct MatchRun<'a> {
    reader: &'a [BookRecord],
    reader_keys: &'a [NormalizedKey],
    index: CandidateIndex<'a>,
    config: &'a MatchConfig,
    scorer: &'a dyn Similarity,
}

impl<'a> MatchRun<'a> {
    fn decide(
        &self,
        record: &'a BookRecord,
        key: &NormalizedKey,
        claimed: &BTreeSet<&str>,
    ) -> Decision<'a> {
        if let Some(reason) = malformed_reason(key) {
            return Decision::Reject(UnmatchedResidual::new(
                Source::Commercial,
                record.clone(),
                reason,
            ));
        }

        let eligible = |ri: usize| {
            !claimed.contains(self.reader[ri].source_id.as_str())
                && malformed_reason(&self.reader_keys[ri]).is_none()
        };
        let scored: Vec<MatchCandidatePair<'a>> = self
            .index
            .candidates(key, self.config.max_candidates_per_record, eligible)
            .into_iter()
            .map(|c| {
                score_pair(
                    (record, key),
                    (&self.reader[c.reader], &self.reader_keys[c.reader]),
                    self.config,
                    self.scorer,
                )
            })
            .collect();

        if scored.is_empty() {
            let any_claimed = self
                .index
                .pool(key)
                .into_iter()
                .any(|ri| claimed.contains(self.reader[ri].source_id.as_str()));
            let reason = if any_claimed {
                UnmatchedReason::CandidatesClaimed
            } else {
                UnmatchedReason::NoCandidates
            };
            return Decision::Reject(UnmatchedResidual::new(
                Source::Commercial,
                record.clone(),
                reason,
            ));
        }

        let best_accepted = scored
            .iter()
            .filter(|p| self.config.accepts(p.title_similarity, p.author_similarity))
            .max_by(|a, b| rank(a, b));
        if let Some(best) = best_accepted {
            return Decision::Accept(best.clone());
        }

        let mut residual =
            UnmatchedResidual::new(Source::Commercial, record.clone(), UnmatchedReason::BelowThreshold);
        if let Some(nearest) = scored.iter().max_by(|a, b| rank(a, b)) {
            residual.best_title_similarity = Some(nearest.title_similarity);
            residual.best_author_similarity = Some(nearest.author_similarity);
        }
        Decision::Reject(residual)
    }
}

/// Total order over candidates for one commercial record; greater is better.
/// Combined score, then author similarity, then the smaller reader id.
fn rank(a: &MatchCandidatePair<'_>, b: &MatchCandidatePair<'_>) -> Ordering {
    OrderedFloat(a.combined_score)
        .cmp(&OrderedFloat(b.combined_score))
        .then_with(|| OrderedFloat(a.author_similarity).cmp(&OrderedFloat(b.author_similarity)))
        .then_with(|| b.reader.source_id.cmp(&a.reader.source_id))
}

fn malformed_reason(key: &NormalizedKey) -> Option<UnmatchedReason> {
    if !key.has_title() {
        Some(UnmatchedReason::MissingTitle)
    } else if !key.has_author() {
        Some(UnmatchedReason::MissingAuthor)
    } else {
        None
    }
}

fn matched_pair(
    pair: &MatchCandidatePair<'_>,
    rescaler: &RatingRescaler,
) -> Result<MatchedPair, ReconError> {
    let commercial_norm = rescaler.normalize(Source::Commercial, pair.commercial)?;
    let reader_norm = rescaler.normalize(Source::Reader, pair.reader)?;
    Ok(MatchedPair {
        commercial: pair.commercial.clone(),
        reader: pair.reader.clone(),
        title_similarity: pair.title_similarity,
        author_similarity: pair.author_similarity,
        combined_score: pair.combined_score,
        commercial_rating_norm: commercial_norm,
        reader_rating_norm: reader_norm,
        delta: commercial_norm - reader_norm,
    })
}

fn check_inputs(
    side: Source,
    records: &[BookRecord],
    rescaler: &RatingRescaler,
) -> Result<(), ReconError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.source_id.as_str()) {
            return Err(ReconError::DuplicateRecord {
                side,
                record_id: record.source_id.clone(),
            });
        }
        rescaler.check(side, record)?;
    }
    Ok(())
}
