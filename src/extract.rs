//! Recover a JSON payload from raw generated text.
//!
//! Models often wrap their answer in markdown fences even when asked not to.
//! Extraction is best-effort normalization only: the caller parses the result
//! and treats a parse failure as its own error.
use regex::Regex;
use std::sync::LazyLock;

/// Opening fence tagged exactly `json` (any case), up to the first closing
/// fence. The tag must end at whitespace, so `json-ld` or `jsonc` do not count.
static JSON_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?i:json)(?:[ \t]*\r?\n|[ \t]+)(.*?)```").expect("valid json fence")
});

/// Any fence. A tag line directly after the opening fence is skipped.
static ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[ \t]*[\w.+-]*[ \t]*\r?\n)?(.*?)```").expect("valid generic fence")
});

/// Extract the JSON payload from text that might carry markdown fences.
///
/// The first `json`-tagged block wins, then the first fenced block of any tag,
/// then the whole text. The result is always trimmed and never contains a
/// fence pair, so extracting twice yields the same string.
pub fn extract_json(text: &str) -> &str {
    if let Some(inner) = first_capture(&JSON_FENCE, text) {
        return inner;
    }
    if let Some(inner) = first_capture(&ANY_FENCE, text) {
        return inner;
    }
    text.trim()
}

fn first_capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|inner| inner.as_str().trim())
}
