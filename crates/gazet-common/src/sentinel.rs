//! Placeholder ("Selecione...", "Todos", "--") detection for dropdown entries.

use crate::fold::fold;
use crate::model::DropdownOption;
use regex::Regex;

/// Folded prefixes that mean "pick something".
const PLACEHOLDER_PREFIXES: &[&str] = &[
    "selecione",
    "selecionar",
    "seleccione",
    "escolha",
    "escolher",
    "select",
    "choose",
    "pick ",
    "please select",
    "-- selecione",
    "-- select",
];

/// Folded texts that mean "no filter".
const PLACEHOLDER_EXACT: &[&str] = &["all", "todos", "todas", "tudo", "-", "--", "---"];

pub fn is_placeholder(text: &str) -> bool {
    let folded = fold(text);
    if folded.is_empty() {
        return true;
    }
    if PLACEHOLDER_EXACT.contains(&folded.as_str()) {
        return true;
    }
    if PLACEHOLDER_PREFIXES.iter().any(|p| folded.starts_with(p)) {
        return true;
    }
    is_numeric_stub(&folded)
}

/// A bare one- or two-digit numeral with nothing else around it.
fn is_numeric_stub(folded: &str) -> bool {
    (1..=2).contains(&folded.len()) && folded.chars().all(|c| c.is_ascii_digit())
}

/// An entry is a sentinel when its label is a placeholder, whatever its value.
/// A placeholder value alone does not disqualify a real label.
pub fn is_sentinel_option(option: &DropdownOption) -> bool {
    is_placeholder(&option.text)
}

/// Sentinel detection extended with a caller-supplied pattern.
#[derive(Debug, Clone, Default)]
pub struct SentinelRules {
    extra: Option<Regex>,
}

impl SentinelRules {
    pub fn new(extra: Option<Regex>) -> Self {
        Self { extra }
    }

    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        let re = regex::RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()?;
        Ok(Self { extra: Some(re) })
    }

    pub fn is_sentinel(&self, value: &str, label: &str) -> bool {
        let option = DropdownOption {
            text: label.to_string(),
            value: Some(value.to_string()).filter(|v| !v.is_empty()),
            ..Default::default()
        };
        if is_sentinel_option(&option) {
            return true;
        }
        match &self.extra {
            Some(re) => re.is_match(label) || (!value.is_empty() && re.is_match(value)),
            None => false,
        }
    }
}
