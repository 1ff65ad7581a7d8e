//! Candidate generation: narrows the commercial × reader comparison space
//! before any edit-distance scoring happens.

use std::collections::{BTreeSet, HashMap};

use ordered_float::OrderedFloat;

use crate::model::{BookRecord, Candidate, NormalizedKey};
use crate::normalize::normalize_key;

/// Reader-side lookup tables keyed by normalized title and title token.
pub struct CandidateIndex<'a> {
    readers: &'a [BookRecord],
    keys: &'a [NormalizedKey],
    by_title: HashMap<&'a str, Vec<usize>>,
    by_token: HashMap<&'a str, Vec<usize>>,
}

impl<'a> CandidateIndex<'a> {
    /// `keys[i]` must be the normalized key of `readers[i]`.
    pub fn new(readers: &'a [BookRecord], keys: &'a [NormalizedKey]) -> Self {
        debug_assert_eq!(readers.len(), keys.len());

        let mut by_title: HashMap<&'a str, Vec<usize>> = HashMap::new();
        let mut by_token: HashMap<&'a str, Vec<usize>> = HashMap::new();

        for (i, key) in keys.iter().enumerate() {
            if !key.has_title() {
                continue;
            }
            by_title.entry(key.title.as_str()).or_default().push(i);

            let unique: BTreeSet<&str> = key.title_tokens.iter().map(String::as_str).collect();
            for token in unique {
                by_token.entry(token).or_default().push(i);
            }
        }

        Self {
            readers,
            keys,
            by_title,
            by_token,
        }
    }

    /// Reader indices sharing the record's normalized title, or failing
    /// that, at least one significant title token. Ascending index order.
    pub fn pool(&self, key: &NormalizedKey) -> Vec<usize> {
        if !key.has_title() {
            return Vec::new();
        }
        match self.by_title.get(key.title.as_str()) {
            Some(exact) => exact.clone(),
            None => {
                let mut shared = BTreeSet::new();
                for token in &key.title_tokens {
                    if let Some(hits) = self.by_token.get(token.as_str()) {
                        shared.extend(hits.iter().copied());
                    }
                }
                shared.into_iter().collect()
            }
        }
    }

    /// Candidates for one commercial record, best lexical overlap first,
    /// at most `max` long.
    ///
    /// Readers rejected by `eligible` are dropped before truncation, so
    /// claimed or unusable readers never take a slot.
    pub fn candidates<F>(&self, key: &NormalizedKey, max: usize, eligible: F) -> Vec<Candidate>
    where
        F: Fn(usize) -> bool,
    {
        let mut scored: Vec<Candidate> = self
            .pool(key)
            .into_iter()
            .filter(|&reader| eligible(reader))
            .map(|reader| Candidate {
                reader,
                lexical_overlap: lexical_overlap(key, &self.keys[reader]),
            })
            .collect();

        scored.sort_by(|a, b| {
            OrderedFloat(b.lexical_overlap)
                .cmp(&OrderedFloat(a.lexical_overlap))
                .then_with(|| self.readers[a.reader].source_id.cmp(&self.readers[b.reader].source_id))
                .then_with(|| a.reader.cmp(&b.reader))
        });

        if scored.len() > max {
            tracing::warn!(
                title = %key.title,
                found = scored.len(),
                kept = max,
                "candidate fan-out truncated"
            );
            scored.truncate(max);
        }
        scored
    }
}

/// Title-token Jaccard plus surname Jaccard; cheap and order-insensitive.
pub fn lexical_overlap(a: &NormalizedKey, b: &NormalizedKey) -> f64 {
    jaccard(&a.title_tokens, &b.title_tokens) + jaccard(&a.surnames, &b.surnames)
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Candidate lists for every commercial record, in input order.
pub fn generate_candidates(
    commercial: &[BookRecord],
    reader: &[BookRecord],
    max_per_record: usize,
) -> Vec<Vec<Candidate>> {
    let reader_keys: Vec<NormalizedKey> = reader.iter().map(normalize_key).collect();
    let index = CandidateIndex::new(reader, &reader_keys);
    commercial
        .iter()
        .map(|record| index.candidates(&normalize_key(record), max_per_record, |_| true))
        .collect()
}
