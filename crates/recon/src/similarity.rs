//! String similarity used to score title and author agreement.
//!
//! Every scorer returns a value in `[0, 1]`, is symmetric, and returns `1.0`
//! only for identical input.

use serde::Deserialize;

/// A swappable string similarity measure.
pub trait Similarity {
    fn score(&self, a: &str, b: &str) -> f64;

    fn name(&self) -> &'static str;
}

/// `1 - levenshtein(a, b) / max(len(a), len(b))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedLevenshtein;

impl Similarity for NormalizedLevenshtein {
    fn score(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        strsim::normalized_levenshtein(a, b).clamp(0.0, 1.0)
    }

    fn name(&self) -> &'static str {
        "levenshtein"
    }
}

/// Jaro-Winkler, which rewards shared prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl Similarity for JaroWinkler {
    fn score(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        // strsim's prefix bonus can make jw(a, b) and jw(b, a) differ in the
        // last bits; order the arguments so the result is symmetric.
        let (x, y) = if a <= b { (a, b) } else { (b, a) };
        strsim::jaro_winkler(x, y).clamp(0.0, 1.0).min(1.0 - f64::EPSILON)
    }

    fn name(&self) -> &'static str {
        "jaro_winkler"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    #[default]
    Levenshtein,
    JaroWinkler,
}

impl ScorerKind {
    pub fn scorer(self) -> Box<dyn Similarity> {
        match self {
            Self::Levenshtein => Box::new(NormalizedLevenshtein),
            Self::JaroWinkler => Box::new(JaroWinkler),
        }
    }
}

impl std::fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Levenshtein => write!(f, "levenshtein"),
            Self::JaroWinkler => write!(f, "jaro_winkler"),
        }
    }
}

impl std::str::FromStr for ScorerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "levenshtein" => Ok(Self::Levenshtein),
            "jaro_winkler" => Ok(Self::JaroWinkler),
            other => Err(format!(
                "unknown scorer \"{other}\" (expected \"levenshtein\" or \"jaro_winkler\")"
            )),
        }
    }
}

/// Title agreement over stop-word-stripped tokens.
///
/// Takes the better of the in-order and token-sorted comparisons so that
/// reordered subtitles still score high. Empty input scores 0.
pub fn title_similarity(a: &[String], b: &[String], scorer: &dyn Similarity) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let plain = scorer.score(&a.join(" "), &b.join(" "));
    if plain >= 1.0 {
        return 1.0;
    }
    let sorted = scorer.score(&sorted_join(a), &sorted_join(b));
    plain.max(sorted)
}

fn sorted_join(tokens: &[String]) -> String {
    let mut sorted: Vec<&str> = tokens.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(" ")
}

/// Author agreement over surname sets.
///
/// Each surname on either side contributes its best match on the other
/// side, averaged over both sides. This is symmetric and reaches 1.0 only
/// when both sets contain exactly the same surnames.
pub fn author_similarity(a: &[String], b: &[String], scorer: &dyn Similarity) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let best = |name: &String, others: &[String]| {
        others
            .iter()
            .map(|o| scorer.score(name, o))
            .fold(0.0_f64, f64::max)
    };
    let forward: f64 = a.iter().map(|n| best(n, b)).sum();
    let backward: f64 = b.iter().map(|n| best(n, a)).sum();
    ((forward + backward) / (a.len() + b.len()) as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn identical_strings_score_one() {
        for scorer in [ScorerKind::Levenshtein.scorer(), ScorerKind::JaroWinkler.scorer()] {
            assert_eq!(scorer.score("great gatsby", "great gatsby"), 1.0);
            assert_eq!(scorer.score("", ""), 1.0);
        }
    }

    #[test]
    fn distinct_strings_score_below_one() {
        for scorer in [ScorerKind::Levenshtein.scorer(), ScorerKind::JaroWinkler.scorer()] {
            let s = scorer.score("martha", "marhta");
            assert!(s > 0.0 && s < 1.0, "{}: {s}", scorer.name());
        }
    }

    #[test]
    fn scorers_are_symmetric() {
        let pairs = [("tolstoy", "delevingne"), ("dixon", "dicksonx"), ("a", ""), ("abc", "cab")];
        for scorer in [ScorerKind::Levenshtein.scorer(), ScorerKind::JaroWinkler.scorer()] {
            for (a, b) in pairs {
                assert_eq!(scorer.score(a, b), scorer.score(b, a), "{}: {a} / {b}", scorer.name());
            }
        }
    }

    #[test]
    fn title_token_order_tolerated() {
        let scorer = NormalizedLevenshtein;
        let s = title_similarity(&words("gatsby great"), &words("great gatsby"), &scorer);
        assert_eq!(s, 1.0);
    }

    #[test]
    fn empty_title_scores_zero() {
        let scorer = NormalizedLevenshtein;
        assert_eq!(title_similarity(&[], &words("great gatsby"), &scorer), 0.0);
    }

    #[test]
    fn author_exact_surname_set_scores_one() {
        let scorer = NormalizedLevenshtein;
        let s = author_similarity(&words("fitzgerald"), &words("fitzgerald"), &scorer);
        assert_eq!(s, 1.0);
    }

    #[test]
    fn author_partial_overlap_is_intermediate() {
        let scorer = NormalizedLevenshtein;
        let s = author_similarity(&words("gaiman pratchett"), &words("gaiman"), &scorer);
        assert!(s > 0.5 && s < 1.0, "{s}");
    }

    #[test]
    fn unrelated_authors_score_low() {
        let scorer = NormalizedLevenshtein;
        let s = author_similarity(&words("tolstoy"), &words("delevingne"), &scorer);
        assert!(s < 0.3, "{s}");
    }

    #[test]
    fn parse_scorer_kind() {
        assert_eq!("jaro_winkler".parse::<ScorerKind>().unwrap(), ScorerKind::JaroWinkler);
        assert!("soundex".parse::<ScorerKind>().is_err());
    }
}
