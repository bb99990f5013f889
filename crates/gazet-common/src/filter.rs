//! Regex / pick-list / limit filtering over dropdown options.
//!
//! Precedence per option, in original order:
//! 1. sentinels are dropped (unless disabled),
//! 2. a pick-list, when given, decides alone,
//! 3. otherwise a case-insensitive regex is matched against label or value,
//!    retried on accent-stripped text only when nothing matched verbatim and the
//!    pattern itself carries no accents,
//! 4. the survivors are truncated to `limit`.

use crate::fold::{fold, has_accents, strip_accents};
use crate::model::DropdownOption;
use crate::sentinel::is_sentinel_option;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Per-level filter as stored in plans and passed on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl LevelFilter {
    pub fn is_empty(&self) -> bool {
        self.select_regex.is_none() && self.pick_list.is_none() && self.limit.is_none()
    }

    pub fn to_filter(&self) -> OptionFilter<'_> {
        OptionFilter {
            select_regex: self.select_regex.as_deref(),
            pick_list: self.pick_list.as_deref(),
            limit: self.limit,
            ..OptionFilter::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OptionFilter<'a> {
    pub select_regex: Option<&'a str>,
    /// Comma-separated exact labels or values.
    pub pick_list: Option<&'a str>,
    pub limit: Option<usize>,
    pub drop_sentinels: bool,
    /// When the regex matches nothing (or is not a valid regex), treat it as
    /// newline-separated literal tokens matched against folded labels.
    pub token_fallback: bool,
}

impl Default for OptionFilter<'_> {
    fn default() -> Self {
        Self {
            select_regex: None,
            pick_list: None,
            limit: None,
            drop_sentinels: true,
            token_fallback: false,
        }
    }
}

impl<'a> OptionFilter<'a> {
    pub fn regex(mut self, pattern: &'a str) -> Self {
        self.select_regex = Some(pattern);
        self
    }

    pub fn pick(mut self, list: &'a str) -> Self {
        self.pick_list = Some(list);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn keep_sentinels(mut self) -> Self {
        self.drop_sentinels = false;
        self
    }

    pub fn with_token_fallback(mut self) -> Self {
        self.token_fallback = true;
        self
    }

    pub fn apply(&self, options: &[DropdownOption]) -> Result<Vec<DropdownOption>, FilterError> {
        filter_options(options, self)
    }
}

pub fn filter_options(
    options: &[DropdownOption],
    filter: &OptionFilter<'_>,
) -> Result<Vec<DropdownOption>, FilterError> {
    let candidates: Vec<&DropdownOption> = options
        .iter()
        .filter(|o| !filter.drop_sentinels || !is_sentinel_option(o))
        .collect();

    let mut kept: Vec<&DropdownOption> = match (non_blank(filter.pick_list), non_blank(filter.select_regex)) {
        (Some(pick), _) => {
            let wanted: HashSet<&str> = pick
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            candidates
                .into_iter()
                .filter(|o| wanted.contains(o.text.trim()) || wanted.contains(o.value_str().trim()))
                .collect()
        }
        (None, Some(pattern)) => match_pattern(&candidates, pattern, filter.token_fallback)?,
        (None, None) => candidates,
    };

    if let Some(limit) = filter.limit {
        kept.truncate(limit);
    }
    Ok(kept.into_iter().cloned().collect())
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

fn match_pattern<'o>(
    candidates: &[&'o DropdownOption],
    pattern: &str,
    token_fallback: bool,
) -> Result<Vec<&'o DropdownOption>, FilterError> {
    let re = match compile(pattern) {
        Ok(re) => re,
        Err(_) if token_fallback => return Ok(match_tokens(candidates, pattern)),
        Err(source) => {
            return Err(FilterError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            });
        }
    };

    let verbatim: Vec<&DropdownOption> = candidates
        .iter()
        .copied()
        .filter(|o| re.is_match(&o.text) || re.is_match(o.value_str()))
        .collect();
    if !verbatim.is_empty() {
        return Ok(verbatim);
    }

    if !has_accents(pattern) {
        let folded: Vec<&DropdownOption> = candidates
            .iter()
            .copied()
            .filter(|o| re.is_match(&strip_accents(&o.text)) || re.is_match(&strip_accents(o.value_str())))
            .collect();
        if !folded.is_empty() {
            return Ok(folded);
        }
    }

    if token_fallback {
        return Ok(match_tokens(candidates, pattern));
    }
    Ok(Vec::new())
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

fn match_tokens<'o>(candidates: &[&'o DropdownOption], text: &str) -> Vec<&'o DropdownOption> {
    let tokens: Vec<String> = text
        .lines()
        .map(fold)
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    candidates
        .iter()
        .copied()
        .filter(|o| {
            let label = fold(&o.text);
            tokens.iter().any(|t| label.contains(t.as_str()))
        })
        .collect()
}
