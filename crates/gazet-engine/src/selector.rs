use crate::config::CascadeConfig;
use crate::dropdown::{DropdownRoot, DropdownWidget, collect_dropdown_roots, widget_for};
use crate::page::{BackendError, Page};
use crate::ready::{ReadyOptions, Readiness, wait_until_ready};
use gazet_common::fold::fold;
use gazet_common::model::{DropdownOption, Level, LevelTarget};
use gazet_common::sentinel::SentinelRules;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("{level} dropdown absent (no dropdown at index {index})")]
    Absent { level: Level, index: usize },

    #[error("{level}: no option matches '{wanted}' (available: {})", available.join(" | "))]
    NoMatch {
        level: Level,
        wanted: String,
        available: Vec<String>,
    },

    #[error("{level}: option '{wanted}' could not be activated")]
    NotActivated { level: Level, wanted: String },

    #[error("{level} dropdown vanished before it became ready")]
    Vanished { level: Level },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectOutcome {
    Selected(DropdownOption),
    /// The target was a placeholder; the control was left at its default.
    Placeholder,
}

/// Drives one level of the cascade: find, wait, match, activate, settle.
pub struct LevelSelector<'a> {
    config: &'a CascadeConfig,
    sentinels: &'a SentinelRules,
}

impl<'a> LevelSelector<'a> {
    pub fn new(config: &'a CascadeConfig, sentinels: &'a SentinelRules) -> Self {
        Self { config, sentinels }
    }

    fn ready_options(&self) -> ReadyOptions {
        ReadyOptions {
            min_real_options: self.config.min_real_options,
            timeout: self.config.ready_timeout(),
            poll: self.config.ready_poll(),
        }
    }

    /// Locate the dropdown for `level` and wait for it. A readiness timeout is
    /// tolerated and the current options are read as they are.
    pub async fn ready_dropdown(
        &self,
        page: &mut dyn Page,
        level: Level,
    ) -> Result<(DropdownRoot, Vec<DropdownOption>), SelectError> {
        let index = self.config.index_for(level);
        let mut rerendered = false;
        loop {
            let root = self.locate(page, level, index).await?;
            let widget = widget_for(root.kind, self.config);
            match wait_until_ready(page, &root, widget.as_ref(), self.ready_options()).await {
                Readiness::Ready(options) => return Ok((root, options)),
                Readiness::TimedOut => {
                    warn!(
                        "{} dropdown not ready after {} ms, proceeding best-effort",
                        level, self.config.select_ready_timeout_ms
                    );
                    let options = widget.read_options(page, root.element).await?;
                    return Ok((root, options));
                }
                // Pages that rebuild the control on change hand us a new element.
                Readiness::Gone if !rerendered => {
                    debug!("{} dropdown re-rendered, locating it again", level);
                    rerendered = true;
                }
                Readiness::Gone => return Err(SelectError::Vanished { level }),
            }
        }
    }

    async fn locate(
        &self,
        page: &mut dyn Page,
        level: Level,
        index: usize,
    ) -> Result<DropdownRoot, SelectError> {
        let mut roots = collect_dropdown_roots(page, self.config.scope_selector.as_deref()).await?;
        if index >= roots.len() {
            debug!("{} wanted dropdown #{}, page has {}", level, index, roots.len());
            return Err(SelectError::Absent { level, index });
        }
        Ok(roots.swap_remove(index))
    }

    pub async fn select_level(
        &self,
        page: &mut dyn Page,
        level: Level,
        target: LevelTarget<'_>,
    ) -> Result<SelectOutcome, SelectError> {
        if self.sentinels.is_sentinel(target.value, target.label) {
            debug!("{} target '{}' is a placeholder, leaving default", level, target.label);
            return Ok(SelectOutcome::Placeholder);
        }

        let (root, options) = self.ready_dropdown(page, level).await?;
        let Some(choice) = match_option(&options, target).cloned() else {
            let available: Vec<String> = options
                .iter()
                .map(|o| format!("{} [{}]", o.text, o.value_str()))
                .collect();
            warn!(
                "{}: '{}' ({}) not among {} option(s): {}",
                level,
                target.label,
                target.value,
                available.len(),
                available.join(" | ")
            );
            return Err(SelectError::NoMatch {
                level,
                wanted: target.label.to_string(),
                available,
            });
        };

        let widget: Box<dyn DropdownWidget> = widget_for(root.kind, self.config);
        if !widget.select(page, root.element, &choice).await? {
            return Err(SelectError::NotActivated {
                level,
                wanted: choice.text,
            });
        }
        debug!("{} selected '{}'", level, choice.text);
        page.wait_for_timeout(self.config.delay_after_select_ms).await;
        Ok(SelectOutcome::Selected(choice))
    }
}

/// Value first, then exact label, then accent/case-insensitive label.
pub fn match_option<'o>(
    options: &'o [DropdownOption],
    target: LevelTarget<'_>,
) -> Option<&'o DropdownOption> {
    let value = target.value.trim();
    if !value.is_empty()
        && let Some(hit) = options.iter().find(|o| o.value_str().trim() == value)
    {
        return Some(hit);
    }
    let label = target.label.trim();
    if let Some(hit) = options.iter().find(|o| o.text.trim() == label) {
        return Some(hit);
    }
    let folded = fold(label);
    if folded.is_empty() {
        return None;
    }
    options.iter().find(|o| fold(&o.text) == folded)
}
