//! Title and author cleaning shared by candidate lookup and scoring.
//!
//! Titles are case-folded, stripped of bracketed annotations such as
//! `(Penguin Classics)` or `(Harry Potter, #1)`, and split into tokens.
//! Authors are reduced to one surname per credited person, so
//! `F. Scott Fitzgerald` and `Fitzgerald, F. Scott` both become `fitzgerald`.

use crate::model::{BookRecord, NormalizedKey};

const LEADING_ARTICLES: &[&str] = &["the", "a", "an"];

const TITLE_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "and", "in", "on", "to", "for", "with", "at", "by", "from", "or",
];

const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "phd", "md", "esq"];

const SURNAME_PARTICLES: &[&str] = &[
    "le", "la", "de", "da", "di", "du", "del", "della", "des", "van", "von", "der", "den", "ten",
    "ter", "st", "al", "bin", "ibn",
];

/// Contributor annotations that do not identify the work's author.
const CONTRIBUTOR_ROLES: &[&str] = &[
    "translator",
    "translated",
    "illustrator",
    "illustrated",
    "editor",
    "edited",
    "foreword",
    "introduction",
    "afterword",
    "narrator",
    "contributor",
    "adapter",
];

const PLACEHOLDER_AUTHORS: &[&str] = &["anonymous", "unknown", "various", "anon"];

/// Derive the lookup key for a record.
pub fn normalize_key(record: &BookRecord) -> NormalizedKey {
    let tokens = title_words(&record.raw_title);
    let key_tokens = strip_leading_article(&tokens);

    let mut title_tokens: Vec<String> = key_tokens
        .iter()
        .filter(|t| !TITLE_STOP_WORDS.contains(&t.as_str()))
        .cloned()
        .collect();
    if title_tokens.is_empty() {
        // All stop words ("The The"): score on the key form instead.
        title_tokens = key_tokens.to_vec();
    }

    NormalizedKey {
        title: key_tokens.join(" "),
        title_tokens,
        surnames: author_surnames(&record.raw_author),
    }
}

/// Lower-cased title words with bracketed annotations removed.
pub fn title_words(raw: &str) -> Vec<String> {
    let stripped = strip_brackets(raw);
    let words = fold_words(&stripped);
    if words.is_empty() {
        // Title is entirely bracketed; keep its contents.
        return fold_words(raw);
    }
    words
}

fn strip_leading_article(tokens: &[String]) -> &[String] {
    match tokens.first() {
        Some(first) if tokens.len() > 1 && LEADING_ARTICLES.contains(&first.as_str()) => {
            &tokens[1..]
        }
        _ => tokens,
    }
}

/// Extract sorted, deduplicated surnames from a raw author credit.
///
/// Returns an empty vec when nothing usable remains (blank, placeholder
/// credits like "Anonymous", or initials only).
pub fn author_surnames(raw: &str) -> Vec<String> {
    let mut surnames: Vec<String> = split_credits(raw)
        .iter()
        .filter_map(|name| name.surname())
        .collect();
    surnames.sort();
    surnames.dedup();
    surnames
}

// ---------------------------------------------------------------------------
// Author parsing
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum PersonName {
    /// "Given Middle Surname"
    Natural(Vec<String>),
    /// "Surname, Given"
    Inverted { surname: Vec<String>, given: Vec<String> },
}

impl PersonName {
    fn surname(&self) -> Option<String> {
        let joined = match self {
            Self::Natural(words) => {
                let words: Vec<&String> = words.iter().filter(|w| !is_suffix(w)).collect();
                let last = words.iter().rposition(|w| !is_initial(w))?;
                let mut start = last;
                while start > 0 && is_particle(words[start - 1]) {
                    start -= 1;
                }
                words[start..=last].iter().map(|w| w.as_str()).collect::<String>()
            }
            Self::Inverted { surname, given } => {
                // "Beethoven, Ludwig van": trailing particles belong to the surname.
                let particles: Vec<&String> = given
                    .iter()
                    .rev()
                    .take_while(|w| is_particle(w))
                    .collect();
                particles
                    .into_iter()
                    .rev()
                    .chain(surname.iter().filter(|w| !is_suffix(w)))
                    .map(|w| w.as_str())
                    .collect::<String>()
            }
        };

        if joined.is_empty() || PLACEHOLDER_AUTHORS.contains(&joined.as_str()) {
            None
        } else {
            Some(joined)
        }
    }
}

fn split_credits(raw: &str) -> Vec<PersonName> {
    let lowered = raw.trim().to_lowercase();
    let lowered = lowered.strip_prefix("by ").unwrap_or(&lowered);

    let mut separated = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        match c {
            ';' | '&' | '/' | '|' | '+' => separated.push(';'),
            _ => separated.push(c),
        }
    }
    let separated = separated.replace(" and ", ";").replace(" with ", ";");

    let mut names = Vec::new();
    for segment in separated.split(';') {
        let parts: Vec<&str> = segment
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .filter(|p| !is_contributor(p))
            .filter(|p| {
                let words = fold_words(p);
                !words.is_empty() && !words.iter().all(|w| is_suffix(w))
            })
            .collect();

        if parts.len() == 2 && looks_inverted(parts[0], parts[1]) {
            names.push(PersonName::Inverted {
                surname: fold_words(&strip_brackets(parts[0])),
                given: fold_words(&strip_brackets(parts[1])),
            });
            continue;
        }

        for part in parts {
            let words = fold_words(&strip_brackets(part));
            if !words.is_empty() {
                names.push(PersonName::Natural(words));
            }
        }
    }
    names
}

/// "Fitzgerald, F. Scott" vs "Neil Gaiman, Terry Pratchett".
fn looks_inverted(first: &str, second: &str) -> bool {
    let significant = |part: &str| {
        fold_words(&strip_brackets(part))
            .iter()
            .filter(|w| !is_initial(w) && !is_particle(w) && !is_suffix(w))
            .count()
    };
    significant(first) <= 1 || significant(second) <= 1
}

fn is_contributor(part: &str) -> bool {
    let Some(open) = part.find(['(', '[']) else {
        return false;
    };
    let annotation = &part[open..];
    CONTRIBUTOR_ROLES.iter().any(|role| annotation.contains(role))
}

fn is_initial(word: &str) -> bool {
    word.chars().count() == 1
}

fn is_suffix(word: &str) -> bool {
    NAME_SUFFIXES.contains(&word)
}

fn is_particle(word: &str) -> bool {
    SURNAME_PARTICLES.contains(&word)
}

// ---------------------------------------------------------------------------
// Character folding
// ---------------------------------------------------------------------------

/// Remove `(...)`, `[...]` and `{...}` segments, including nested ones.
fn strip_brackets(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Case-fold, drop apostrophes and hyphens inside words, map `&` to `and`,
/// turn every other non-alphanumeric character into a word break.
fn fold_words(raw: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\'' | '\u{2019}' | '\u{2018}' | '`' | '-' | '\u{2010}' | '\u{2011}' => {}
            '&' => cleaned.push_str(" and "),
            c if c.is_alphanumeric() => {
                for lower in c.to_lowercase() {
                    push_folded(&mut cleaned, lower);
                }
            }
            _ => cleaned.push(' '),
        }
    }
    cleaned.split_whitespace().map(str::to_string).collect()
}

fn push_folded(out: &mut String, c: char) {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => out.push('a'),
        'æ' => out.push_str("ae"),
        'ç' | 'č' | 'ć' => out.push('c'),
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => out.push('e'),
        'ì' | 'í' | 'î' | 'ï' | 'ī' => out.push('i'),
        'ñ' | 'ń' => out.push('n'),
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => out.push('o'),
        'œ' => out.push_str("oe"),
        'ß' => out.push_str("ss"),
        'š' | 'ś' => out.push('s'),
        'ù' | 'ú' | 'û' | 'ü' | 'ū' => out.push('u'),
        'ý' | 'ÿ' => out.push('y'),
        'ž' | 'ź' | 'ż' => out.push('z'),
        'ł' => out.push('l'),
        _ => out.push(c),
    }
}
