//! Accent and whitespace folding used by matching code.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Remove diacritics, keeping case: "Ministério" -> "Ministerio".
pub fn strip_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Accent-stripped, lower-cased, whitespace-collapsed form.
pub fn fold(text: &str) -> String {
    collapse_whitespace(&strip_accents(text).to_lowercase())
}

pub fn has_accents(text: &str) -> bool {
    text.nfd().any(is_combining_mark)
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
