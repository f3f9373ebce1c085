//! Headline text cleanup and the clustering key.
//!
//! `clean_text` undoes feed markup (entities, tags, stray whitespace).
//! `norm_key` maps a cleaned title to a coarse bag-of-significant-words
//! signature: outlets wording the same event differently still collapse
//! to one key, unrelated events almost never collide.

use once_cell::sync::OnceCell;
use std::collections::HashSet;

/// Clean feed-supplied text: decode HTML entities, strip tags, normalize
/// curly quotes to ASCII, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Closed-class function words excluded from clustering keys. Tokens
/// shorter than 4 chars are dropped before this set is consulted, so only
/// the longer entries carry weight; the short ones are kept for clarity.
fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceCell<HashSet<&'static str>> = OnceCell::new();
    SET.get_or_init(|| {
        [
            // articles, conjunctions, prepositions
            "a", "an", "the", "and", "but", "or", "nor", "yet", "so", "for", "of",
            "in", "on", "at", "by", "to", "up", "off", "out", "into", "onto",
            "over", "under", "about", "above", "below", "across", "after",
            "before", "against", "along", "amid", "among", "around", "behind",
            "beside", "between", "beyond", "during", "except", "through",
            "toward", "towards", "upon", "with", "within", "without", "from",
            "until", "till", "since", "while", "because", "although", "though",
            "whether", "unless",
            // auxiliaries and modals
            "is", "am", "are", "was", "were", "be", "been", "being", "do",
            "does", "did", "done", "have", "has", "had", "having", "will",
            "would", "shall", "should", "can", "could", "may", "might", "must",
            // demonstratives, pronouns, interrogatives
            "this", "that", "these", "those", "here", "there", "then", "than",
            "it", "its", "they", "them", "their", "theirs", "he", "she", "his",
            "her", "hers", "we", "us", "our", "ours", "you", "your", "yours",
            "who", "whom", "whose", "what", "which", "when", "where", "why",
            "how", "also", "such", "each", "some", "any", "all", "both", "more",
            "most", "other", "same", "only", "very", "just", "not", "no",
        ]
        .into_iter()
        .collect()
    })
}

/// Maximum number of tokens a clustering key keeps.
const NORM_KEY_MAX_TOKENS: usize = 10;

/// Minimum token length considered significant.
const NORM_KEY_MIN_TOKEN_LEN: usize = 4;

/// Map a title to its clustering key. Pure and total.
///
/// Lower-case; every char that is not an ASCII letter/digit/whitespace
/// becomes a separator (so hyphenated or quoted words don't fuse); split;
/// drop short tokens and stop-words; dedupe; sort; keep the first 10;
/// join with single spaces. Titles made entirely of stop-words or short
/// tokens map to the empty key and cluster together.
pub fn norm_key(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mapped: String = lowered
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut tokens: Vec<&str> = mapped
        .split_whitespace()
        .filter(|t| t.len() >= NORM_KEY_MIN_TOKEN_LEN)
        .filter(|t| !stopwords().contains(t))
        .collect();

    tokens.sort_unstable();
    tokens.dedup();
    tokens.truncate(NORM_KEY_MAX_TOKENS);
    tokens.join(" ")
}
