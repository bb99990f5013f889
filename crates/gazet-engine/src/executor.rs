//! Cascade execution: replay each combo of a plan against one page.
//!
//! Per combo: navigate (when configured), select N1, N2 and N3, submit, extract.
//! Every combo runs inside its own wall-clock budget and its outcome is
//! classified at the combo boundary, so one failure never takes down the run.

use crate::config::CascadeConfig;
use crate::dropdown::collect_dropdown_roots;
use crate::extract::extract_results;
use crate::page::{BackendError, Page};
use crate::selector::{LevelSelector, SelectError};
use futures::FutureExt;
use gazet_common::filter::{FilterError, LevelFilter, OptionFilter};
use gazet_common::model::{
    CascadeReport, Combo, ComboResult, ComboStatus, DropdownOption, Level, Plan, ResultItem,
};
use gazet_common::sentinel::SentinelRules;
use std::collections::HashMap;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Invalid sentinel pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Combo range {start}..{end} outside plan of {len}")]
    Range { start: usize, end: usize, len: usize },
}

/// Failure inside one combo. Never escapes the combo boundary.
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Submit control '{0}' not found")]
    SubmitMissing(String),
}

pub struct CascadeExecutor {
    config: CascadeConfig,
    sentinels: SentinelRules,
    cancel: CancellationToken,
}

/// State owned by one run over one page.
struct CascadeRun<'p> {
    page: &'p mut dyn Page,
    config: CascadeConfig,
    url: Option<String>,
    n2_filter: Option<LevelFilter>,
    /// Level-2 expansion per level-1 key, for this run only.
    n2_cache: HashMap<String, Expansion>,
    /// The page shows a fresh load nobody has touched yet.
    fresh: bool,
    /// The plan URL has been loaded at least once.
    loaded: bool,
}

impl CascadeExecutor {
    pub fn new(config: CascadeConfig) -> Result<Self, ExecutorError> {
        let sentinels = config.sentinel_rules()?;
        Ok(Self {
            config,
            sentinels,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, page: &mut dyn Page, plan: &Plan) -> Result<CascadeReport, ExecutorError> {
        self.run_range(page, plan, 0..plan.combos().len()).await
    }

    /// Execute `plan.combos()[range]` in order. Results keep their plan position
    /// in `combo_index`.
    pub async fn run_range(
        &self,
        page: &mut dyn Page,
        plan: &Plan,
        range: Range<usize>,
    ) -> Result<CascadeReport, ExecutorError> {
        let combos = plan.combos();
        let Some(slice) = combos.get(range.clone()) else {
            return Err(ExecutorError::Range {
                start: range.start,
                end: range.end,
                len: combos.len(),
            });
        };

        let defaults = plan.defaults();
        let n2_filter = defaults.n2_filter.clone().filter(|f| !f.is_empty());
        let mut run = CascadeRun {
            page,
            config: self.config.with_plan_defaults(defaults),
            url: defaults.url.clone().filter(|u| !u.trim().is_empty()),
            n2_filter,
            n2_cache: HashMap::new(),
            fresh: false,
            loaded: false,
        };

        let started = Instant::now();
        let mut report = CascadeReport::default();
        info!("Running {} combo(s) [{}..{}]", slice.len(), range.start, range.end);

        // A failed pre-flight load is retried by the first combo's prepare step.
        if let Some(url) = run.url.clone() {
            match run.page.goto(&url).await {
                Ok(()) => {
                    run.fresh = true;
                    run.loaded = true;
                }
                Err(e) => warn!("Initial load of {} failed: {}", url, e),
            }
        }

        for (offset, combo) in slice.iter().enumerate() {
            let index = range.start + offset;
            if self.cancel.is_cancelled() {
                let remaining = slice.len() - offset;
                warn!("Cancelled, skipping {} remaining combo(s)", remaining);
                report.summary.skipped += remaining;
                report.cancelled = true;
                break;
            }

            let failed = if combo.dynamic_n2 {
                self.run_dynamic(&mut run, combo, index, &mut report).await
            } else {
                let result = self.attempt(&mut run, combo.clone(), index).await;
                let failed = result.status == ComboStatus::Error;
                report.push(result);
                failed
            };

            if failed && run.config.stop_on_error {
                let remaining = slice.len() - offset - 1;
                warn!(
                    "Stopping after combo {} failed, {} combo(s) skipped",
                    index, remaining
                );
                report.summary.skipped += remaining;
                break;
            }
        }

        report.summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Run finished: {} ok, {} empty, {} error, {} timeout, {} skipped in {} ms",
            report.summary.ok,
            report.summary.empty,
            report.summary.error,
            report.summary.timeout,
            report.summary.skipped,
            report.summary.elapsed_ms
        );
        Ok(report)
    }

    /// Run one combo, re-attempting an error or timeout up to `combo_retries` times.
    async fn attempt(&self, run: &mut CascadeRun<'_>, combo: Combo, index: usize) -> ComboResult {
        let max_attempts = run.config.combo_retries.saturating_add(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut result = self.execute_once(run, combo.clone(), index).await;
            result.attempts = attempts;
            let retryable = matches!(result.status, ComboStatus::Error | ComboStatus::Timeout);
            if !retryable || attempts >= max_attempts {
                return result;
            }
            warn!(
                "Combo {} ({}) ended {}, retrying ({}/{})",
                index,
                combo.describe(),
                result.status,
                attempts,
                max_attempts - 1
            );
            // Retries always start from a fresh load, whatever reload_per_combo says.
            if let Some(url) = run.url.clone() {
                match run.page.goto(&url).await {
                    Ok(()) => {
                        run.fresh = true;
                        run.loaded = true;
                    }
                    Err(e) => {
                        warn!("Reload before retry failed: {}", e);
                        run.loaded = false;
                    }
                }
            }
        }
    }

    async fn execute_once(&self, run: &mut CascadeRun<'_>, combo: Combo, index: usize) -> ComboResult {
        info!("Combo {}: {}", index, combo.describe());
        run.page.release_handles().await;
        let started = Instant::now();
        let budget = run.config.per_combo_timeout();

        let outcome = tokio::time::timeout(
            budget,
            AssertUnwindSafe(self.cascade(run, &combo)).catch_unwind(),
        )
        .await;
        // Whatever happened, the page is no longer pristine.
        run.fresh = false;

        let (status, items, error) = match outcome {
            Ok(Ok(Ok(items))) if items.is_empty() => (ComboStatus::Empty, items, None),
            Ok(Ok(Ok(items))) => (ComboStatus::Ok, items, None),
            Ok(Ok(Err(e))) => (ComboStatus::Error, Vec::new(), Some(e.to_string())),
            Ok(Err(panic)) => (
                ComboStatus::Error,
                Vec::new(),
                Some(format!("panic: {}", panic_message(panic.as_ref()))),
            ),
            Err(_) => (
                ComboStatus::Timeout,
                Vec::new(),
                Some(format!("exceeded {} ms", budget.as_millis())),
            ),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &error {
            Some(e) if status == ComboStatus::Error => {
                error!("Combo {} error after {} ms: {}", index, elapsed_ms, e)
            }
            Some(e) => warn!("Combo {} {}: {}", index, status, e),
            None => info!("Combo {} {} ({} item(s), {} ms)", index, status, items.len(), elapsed_ms),
        }

        ComboResult {
            combo,
            combo_index: index,
            status,
            items,
            elapsed_ms,
            attempts: 1,
            error,
        }
    }

    async fn prepare(&self, run: &mut CascadeRun<'_>) -> Result<(), BackendError> {
        if run.fresh {
            return Ok(());
        }
        if let Some(url) = &run.url
            && (run.config.reload_per_combo || !run.loaded)
        {
            debug!("Loading {}", url);
            run.page.goto(url).await?;
            run.loaded = true;
        }
        Ok(())
    }

    async fn cascade(&self, run: &mut CascadeRun<'_>, combo: &Combo) -> Result<Vec<ResultItem>, StepError> {
        self.prepare(run).await?;
        let selector = LevelSelector::new(&run.config, &self.sentinels);

        if let Some(target) = combo.target(Level::N1) {
            selector.select_level(run.page, Level::N1, target).await?;
            run.page.wait_for_timeout(run.config.wait_after_n1_ms).await;
        }
        if let Some(target) = combo.target(Level::N2) {
            selector.select_level(run.page, Level::N2, target).await?;
            run.page.wait_for_timeout(run.config.wait_after_n2_ms).await;
        }
        if run.config.enable_n3
            && let Some(target) = combo.target(Level::N3)
        {
            selector.select_level(run.page, Level::N3, target).await?;
        }

        if let Some(submit) = run.config.submit_selector.as_deref().filter(|s| !s.trim().is_empty()) {
            let Some(&button) = run.page.query_all(None, submit).await?.first() else {
                return Err(StepError::SubmitMissing(submit.to_string()));
            };
            run.page.click(button).await?;
            run.page.wait_for_timeout(run.config.submit_wait_ms).await;
        }

        Ok(extract_results(run.page, &run.config).await?)
    }

    /// Expand a deferred combo into one execution per live level-2 option.
    /// Returns true when an error should stop the run.
    async fn run_dynamic(
        &self,
        run: &mut CascadeRun<'_>,
        combo: &Combo,
        index: usize,
        report: &mut CascadeReport,
    ) -> bool {
        let started = Instant::now();
        let level2 = match self.level2_for(run, combo).await {
            Ok(Expansion::Options(options)) => options,
            Ok(Expansion::FilteredOut) => {
                info!("Combo {}: no level-2 option passes the filter, skipped", index);
                report.summary.skipped += 1;
                return false;
            }
            Ok(Expansion::NoLevel2) => {
                info!("Combo {}: no level-2 options, running level 1 alone", index);
                let plain = Combo {
                    dynamic_n2: false,
                    ..combo.clone()
                };
                let result = self.attempt(run, plain, index).await;
                let failed = result.status == ComboStatus::Error;
                report.push(result);
                return failed;
            }
            Err(e) => {
                error!("Combo {}: level-2 discovery failed: {}", index, e);
                report.push(ComboResult {
                    combo: combo.clone(),
                    combo_index: index,
                    status: if e.is_timeout() {
                        ComboStatus::Timeout
                    } else {
                        ComboStatus::Error
                    },
                    items: Vec::new(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    attempts: 1,
                    error: Some(e.to_string()),
                });
                return !e.is_timeout();
            }
        };

        info!("Combo {}: expanding into {} level-2 option(s)", index, level2.len());
        for (i, option) in level2.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.summary.skipped += level2.len() - i;
                report.cancelled = true;
                break;
            }
            let result = self.attempt(run, combo.clone().with_level2(option), index).await;
            let failed = result.status == ComboStatus::Error;
            report.push(result);
            if failed && run.config.stop_on_error {
                report.summary.skipped += level2.len() - i - 1;
                return true;
            }
        }
        false
    }

    async fn level2_for(
        &self,
        run: &mut CascadeRun<'_>,
        combo: &Combo,
    ) -> Result<Expansion, DiscoverError> {
        if run.config.dynamic_reuse_cache
            && let Some(cached) = run.n2_cache.get(&combo.key1)
        {
            debug!("Level-2 options for '{}' from cache", combo.label1);
            return Ok(cached.clone());
        }

        let budget = run.config.per_combo_timeout();
        let mut real = tokio::time::timeout(budget, self.discover_level2(run, combo))
            .await
            .map_err(|_| DiscoverError::Timeout(budget.as_millis() as u64))??;
        real.retain(|o| !self.sentinels.is_sentinel(o.value_str(), &o.text));

        let expansion = if real.is_empty() {
            Expansion::NoLevel2
        } else {
            let mut options = match &run.n2_filter {
                Some(filter) => filter.to_filter().with_token_fallback().apply(&real)?,
                None => OptionFilter::default().apply(&real)?,
            };
            if let Some(limit) = run.config.dynamic_n2_chunk_limit {
                options.truncate(limit);
            }
            if options.is_empty() {
                Expansion::FilteredOut
            } else {
                Expansion::Options(options)
            }
        };
        if run.config.dynamic_reuse_cache {
            run.n2_cache.insert(combo.key1.clone(), expansion.clone());
        }
        Ok(expansion)
    }

    async fn discover_level2(
        &self,
        run: &mut CascadeRun<'_>,
        combo: &Combo,
    ) -> Result<Vec<DropdownOption>, DiscoverError> {
        run.page.release_handles().await;
        self.prepare(run).await?;
        run.fresh = false;
        let selector = LevelSelector::new(&run.config, &self.sentinels);
        if let Some(target) = combo.target(Level::N1) {
            selector.select_level(run.page, Level::N1, target).await?;
            run.page.wait_for_timeout(run.config.wait_after_n1_ms).await;
        }

        let roots = collect_dropdown_roots(run.page, run.config.scope_selector.as_deref()).await?;
        if roots.len() <= run.config.n2_index {
            debug!("No level-2 dropdown after selecting '{}'", combo.label1);
            return Ok(Vec::new());
        }
        let (_, options) = selector.ready_dropdown(run.page, Level::N2).await?;
        Ok(options)
    }
}

/// Live level-2 set for one level-1 value.
#[derive(Debug, Clone)]
enum Expansion {
    Options(Vec<DropdownOption>),
    /// The level-1 value has no level 2 at all.
    NoLevel2,
    /// Level 2 exists but the plan's filter keeps none of it.
    FilteredOut,
}

#[derive(Debug, thiserror::Error)]
enum DiscoverError {
    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("level-2 discovery exceeded {0} ms")]
    Timeout(u64),
}

impl DiscoverError {
    fn is_timeout(&self) -> bool {
        matches!(self, DiscoverError::Timeout(_))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
