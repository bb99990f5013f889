//! Map discovery: walk the live dropdown tree once so plans can be built offline.

use crate::config::CascadeConfig;
use crate::dropdown::collect_dropdown_roots;
use crate::page::{BackendError, Page};
use crate::selector::{LevelSelector, SelectError};
use gazet_common::filter::{FilterError, LevelFilter, OptionFilter};
use gazet_common::model::{DropdownMap, DropdownOption, Level, LevelTarget, MapEntry};
use gazet_common::sentinel::SentinelRules;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Invalid sentinel pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Invalid level-1 filter: {0}")]
    Filter(#[from] FilterError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Level-1 dropdown unusable: {0}")]
    Level1(#[from] SelectError),
}

#[derive(Debug, thiserror::Error)]
enum EntryError {
    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("exceeded {0} ms")]
    Timeout(u64),
}

pub async fn discover_map(
    page: &mut dyn Page,
    config: &CascadeConfig,
    url: &str,
    level1_filter: &LevelFilter,
) -> Result<DropdownMap, DiscoveryError> {
    let sentinels = config.sentinel_rules()?;
    let selector = LevelSelector::new(config, &sentinels);

    page.goto(url).await?;
    let (_, raw) = selector.ready_dropdown(page, Level::N1).await?;
    let mut level1 = level1_filter.to_filter().with_token_fallback().apply(&raw)?;
    level1.retain(|o| !sentinels.is_sentinel(o.value_str(), &o.text));
    if let Some(sample) = config.sample_size {
        level1.truncate(sample);
    }
    info!("Discovering level 2 under {} level-1 option(s)", level1.len());

    let budget = config.per_combo_timeout();
    let mut entries = Vec::with_capacity(level1.len());
    for (i, option) in level1.into_iter().enumerate() {
        let mut entry = MapEntry {
            option,
            ..Default::default()
        };
        page.release_handles().await;
        let explored = tokio::time::timeout(
            budget,
            explore(page, config, &selector, &sentinels, url, i > 0, &mut entry),
        )
        .await
        .unwrap_or(Err(EntryError::Timeout(budget.as_millis() as u64)));
        if let Err(e) = explored {
            warn!("Discovery under '{}' failed: {}", entry.option.text, e);
            entry.error = Some(e.to_string());
        } else {
            info!(
                "'{}': {} level-2 option(s), {} level-3 option(s)",
                entry.option.text,
                entry.level2.len(),
                entry.level3.values().map(Vec::len).sum::<usize>()
            );
        }
        entries.push(entry);
    }

    Ok(DropdownMap {
        url: url.to_string(),
        level1: entries,
    })
}

async fn explore(
    page: &mut dyn Page,
    config: &CascadeConfig,
    selector: &LevelSelector<'_>,
    sentinels: &SentinelRules,
    url: &str,
    reload: bool,
    entry: &mut MapEntry,
) -> Result<(), EntryError> {
    if reload && config.reload_per_combo {
        page.goto(url).await?;
    }
    selector
        .select_level(page, Level::N1, target_of(&entry.option))
        .await?;
    page.wait_for_timeout(config.wait_after_n1_ms).await;
    entry.level2 = read_level(page, config, selector, sentinels, Level::N2).await?;

    if !config.enable_n3 {
        return Ok(());
    }
    let level2 = entry.level2.clone();
    for option in &level2 {
        selector.select_level(page, Level::N2, target_of(option)).await?;
        page.wait_for_timeout(config.wait_after_n2_ms).await;
        let level3 = read_level(page, config, selector, sentinels, Level::N3).await?;
        if !level3.is_empty() {
            entry.level3.insert(option.key().to_string(), level3);
        }
    }
    Ok(())
}

/// Real options of a dependent level, or none when that level never appeared.
async fn read_level(
    page: &mut dyn Page,
    config: &CascadeConfig,
    selector: &LevelSelector<'_>,
    sentinels: &SentinelRules,
    level: Level,
) -> Result<Vec<DropdownOption>, EntryError> {
    let roots = collect_dropdown_roots(page, config.scope_selector.as_deref()).await?;
    if roots.len() <= config.index_for(level) {
        return Ok(Vec::new());
    }
    let (_, options) = selector.ready_dropdown(page, level).await?;
    let mut options: Vec<DropdownOption> = options
        .into_iter()
        .filter(|o| !sentinels.is_sentinel(o.value_str(), &o.text))
        .collect();
    // Lists that re-render mid-read may repeat entries.
    let mut seen = std::collections::HashSet::new();
    options.retain(|o| seen.insert(o.dedup_key()));
    Ok(options)
}

fn target_of(option: &DropdownOption) -> LevelTarget<'_> {
    LevelTarget {
        value: option.key(),
        label: &option.text,
    }
}
