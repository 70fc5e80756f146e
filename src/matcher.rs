//! Keyword / ticker matching and context snippets.
//!
//! Matching is plain case-insensitive substring containment. The title is
//! scanned before the body, and a keyword already found in the title is not
//! reported again for the body.

use std::collections::BTreeSet;

use crate::error::ConfigError;
use crate::types::Announcement;

/// Characters of body text kept on each side of a keyword hit.
pub const CONTEXT_RADIUS: usize = 50;

const TITLE_MATCH_NOTE: &str = " (Match found in title)";

/// Immutable search input for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCriteria {
    keywords: Vec<String>,
    tickers: BTreeSet<String>,
}

impl MatchCriteria {
    /// Keywords are trimmed and lower-cased (order kept, duplicates dropped);
    /// tickers are trimmed and upper-cased. At least one must remain.
    pub fn new<K, T>(keywords: K, tickers: T) -> Result<Self, ConfigError>
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        let mut kws: Vec<String> = Vec::new();
        for k in keywords {
            let k = k.as_ref().trim().to_lowercase();
            if !k.is_empty() && !kws.contains(&k) {
                kws.push(k);
            }
        }
        let tickers: BTreeSet<String> = tickers
            .into_iter()
            .map(|t| t.as_ref().trim().to_uppercase())
            .filter(|t| !t.is_empty())
            .collect();

        if kws.is_empty() && tickers.is_empty() {
            return Err(ConfigError::Invalid(
                "keywords or tickers are required".to_string(),
            ));
        }
        Ok(Self {
            keywords: kws,
            tickers,
        })
    }

    /// Build from comma-separated lists, e.g. `"dividend, Rick Rule"` and `"cba,bhp"`.
    pub fn parse(keywords_csv: &str, tickers_csv: &str) -> Result<Self, ConfigError> {
        Self::new(keywords_csv.split(','), tickers_csv.split(','))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn tickers(&self) -> &BTreeSet<String> {
        &self.tickers
    }

    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty()
    }

    pub fn is_ticker_match(&self, ticker: &str) -> bool {
        !self.tickers.is_empty() && self.tickers.contains(&ticker.trim().to_uppercase())
    }

    /// Whether an announcement could qualify before its text is known.
    /// Without keywords only a ticker hit can produce a match.
    pub fn may_match(&self, ticker: &str) -> bool {
        self.has_keywords() || self.is_ticker_match(ticker)
    }
}

/// Result of testing one announcement against the criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub keywords: Vec<String>,
    pub ticker_matched: bool,
}

impl Evaluation {
    pub fn qualifies(&self) -> bool {
        !self.keywords.is_empty() || self.ticker_matched
    }
}

pub fn evaluate(ticker: &str, title: &str, body: &str, criteria: &MatchCriteria) -> Evaluation {
    Evaluation {
        keywords: find_keywords(title, body, criteria.keywords()),
        ticker_matched: criteria.is_ticker_match(ticker),
    }
}

/// Title hits in criteria order, then body hits not already seen in the title.
pub fn find_keywords(title: &str, body: &str, keywords: &[String]) -> Vec<String> {
    let mut found: Vec<String> = keywords
        .iter()
        .filter(|kw| contains_ignore_case(title, kw))
        .cloned()
        .collect();

    for kw in keywords {
        if !found.contains(kw) && contains_ignore_case(body, kw) {
            found.push(kw.clone());
        }
    }
    found
}

/// Context for a match. The first keyword wins: a title hit returns the
/// annotated title, a body hit returns a window around it. No keywords
/// means the announcement matched on its ticker.
pub fn context_snippet(ann: &Announcement, body: &str, keywords: &[String]) -> String {
    match keywords.first() {
        Some(kw) if contains_ignore_case(&ann.title, kw) => {
            format!("{}{TITLE_MATCH_NOTE}", ann.title)
        }
        Some(kw) => build_snippet(body, kw),
        None => format!("Match found based on ticker {} only.", ann.ticker),
    }
}

/// Up to [`CONTEXT_RADIUS`] characters either side of the first
/// case-insensitive occurrence of `keyword`, with `...` markers where the
/// window was cut and newlines flattened. Empty if the keyword is absent.
pub fn build_snippet(text: &str, keyword: &str) -> String {
    let Some((start, end)) = find_ignore_case(text, keyword) else {
        return String::new();
    };

    let from = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_RADIUS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let to = text[end..]
        .char_indices()
        .nth(CONTEXT_RADIUS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());

    let mut snippet = String::with_capacity(to - from + 8);
    if from > 0 {
        snippet.push_str("... ");
    }
    snippet.push_str(&text[from..to]);
    if to < text.len() {
        snippet.push_str(" ...");
    }
    snippet.replace(['\r', '\n'], " ")
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    find_ignore_case(haystack, needle).is_some()
}

/// Byte range in `haystack` of the first case-insensitive occurrence of
/// `needle`. Both sides are lowered char by char, so characters whose
/// lowercase form is longer than one char still line up.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: String = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }

    let mut lowered = String::with_capacity(haystack.len());
    // Start of the source char behind each byte of `lowered`.
    let mut origin = Vec::with_capacity(haystack.len());
    for (i, c) in haystack.char_indices() {
        for l in c.to_lowercase() {
            lowered.push(l);
            origin.resize(lowered.len(), i);
        }
    }

    let at = lowered.find(&needle)?;
    let start = origin[at];
    let last = origin[at + needle.len() - 1];
    let end = last + haystack[last..].chars().next().map_or(0, char::len_utf8);
    Some((start, end))
}
