//! Subcommands shared by every gazet binary. Binaries only pick the backend.

use crate::config::CascadeConfig;
use crate::discovery::{DiscoveryError, discover_map};
use crate::executor::{CascadeExecutor, ExecutorError};
use crate::inspect::list_select_options;
use crate::page::{BackendError, Page, PageFactory};
use crate::parallel::run_partitioned;
use crate::persist::{PersistError, load_json, save_json};
use crate::plan::{PlanRequest, build_plan_from_map, limit_plan};
use clap::Subcommand;
use gazet_common::filter::{FilterError, LevelFilter};
use gazet_common::model::{CascadeReport, DropdownMap, Plan, Summary};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone, Copy)]
pub struct OutputHandlers {
    pub out: fn(&str),
    pub err: fn(&str),
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the options currently visible in the page's dropdowns
    Inspect {
        #[arg(long)]
        url: String,
        /// Dropdown position to report (repeatable; default: all)
        #[arg(long = "index")]
        indices: Vec<usize>,
    },
    /// Discover the level-1 → level-2 (→ level-3) option tree
    Map {
        #[arg(long)]
        url: String,
        #[arg(long)]
        n1_regex: Option<String>,
        #[arg(long)]
        n1_pick: Option<String>,
        #[arg(long)]
        n1_limit: Option<usize>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build a combination plan from a discovered map
    Plan {
        #[arg(long)]
        map: PathBuf,
        #[arg(long)]
        n1_regex: Option<String>,
        #[arg(long)]
        n1_pick: Option<String>,
        #[arg(long)]
        n1_limit: Option<usize>,
        #[arg(long)]
        n2_regex: Option<String>,
        #[arg(long)]
        n2_pick: Option<String>,
        #[arg(long)]
        n2_limit: Option<usize>,
        #[arg(long)]
        n3_regex: Option<String>,
        #[arg(long)]
        n3_pick: Option<String>,
        #[arg(long)]
        n3_limit: Option<usize>,
        #[arg(long)]
        max_combos: Option<usize>,
        /// Defer level 2 to execution time
        #[arg(long)]
        dynamic_n2: bool,
        #[arg(long)]
        data: Option<String>,
        #[arg(long)]
        secao: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Execute a plan and collect result links per combo
    Run {
        #[arg(long)]
        plan: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        limit_combos: Option<usize>,
    },
}

fn level_filter(regex: Option<String>, pick: Option<String>, limit: Option<usize>) -> LevelFilter {
    LevelFilter {
        select_regex: regex.filter(|s| !s.trim().is_empty()),
        pick_list: pick.filter(|s| !s.trim().is_empty()),
        limit,
    }
}

async fn emit<T: Serialize>(
    value: &T,
    out: Option<&Path>,
    output: OutputHandlers,
) -> Result<(), CliError> {
    match out {
        Some(path) => {
            save_json(path, value).await?;
            (output.err)(&format!("Wrote {}", path.display()));
        }
        None => (output.out)(&serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

pub fn summary_line(summary: &Summary, cancelled: bool) -> String {
    format!(
        "{} combo(s): {} ok, {} empty, {} error, {} timeout, {} skipped in {} ms{}",
        summary.total + summary.skipped,
        summary.ok,
        summary.empty,
        summary.error,
        summary.timeout,
        summary.skipped,
        summary.elapsed_ms,
        if cancelled { " (cancelled)" } else { "" }
    )
}

/// Execute one subcommand. Pages come from `factory`, one per worker.
pub async fn run_command(
    factory: &dyn PageFactory,
    config: &CascadeConfig,
    command: Command,
    output: OutputHandlers,
) -> Result<(), CliError> {
    match command {
        Command::Inspect { url, indices } => {
            let mut page = factory.open_isolated(0).await?;
            let inspected = match page.goto(&url).await {
                Ok(()) => list_select_options(page.as_mut(), config, &indices).await,
                Err(e) => Err(e),
            };
            close_quietly(page.as_mut()).await;
            emit(&inspected?, None, output).await
        }
        Command::Map {
            url,
            n1_regex,
            n1_pick,
            n1_limit,
            out,
        } => {
            let filter = level_filter(n1_regex, n1_pick, n1_limit);
            let mut page = factory.open_isolated(0).await?;
            let map = discover_map(page.as_mut(), config, &url, &filter).await;
            close_quietly(page.as_mut()).await;
            emit(&map?, out.as_deref(), output).await
        }
        Command::Plan {
            map,
            n1_regex,
            n1_pick,
            n1_limit,
            n2_regex,
            n2_pick,
            n2_limit,
            n3_regex,
            n3_pick,
            n3_limit,
            max_combos,
            dynamic_n2,
            data,
            secao,
            out,
        } => {
            let map: DropdownMap = load_json(&map).await?;
            let request = PlanRequest {
                data,
                secao_default: secao,
                n1: level_filter(n1_regex, n1_pick, n1_limit),
                n2: level_filter(n2_regex, n2_pick, n2_limit),
                n3: level_filter(n3_regex, n3_pick, n3_limit),
                max_combos,
                dynamic_n2,
                ..Default::default()
            };
            let plan = build_plan_from_map(&map, request)?;
            (output.err)(&format!("Plan with {} combo(s)", plan.combos().len()));
            emit(&plan, out.as_deref(), output).await
        }
        Command::Run {
            plan,
            out,
            workers,
            limit_combos,
        } => {
            let mut plan: Plan = load_json(&plan).await?;
            if let Some(limit) = limit_combos.or(config.limit_combos) {
                plan = limit_plan(&plan, limit);
            }
            let workers = workers.unwrap_or(config.workers).max(1);
            let report = run_plan(factory, config, &plan, workers).await?;
            (output.err)(&summary_line(&report.summary, report.cancelled));
            emit(&report, out.as_deref(), output).await
        }
    }
}

/// Run a plan with Ctrl+C wired to cancellation between combos.
pub async fn run_plan(
    factory: &dyn PageFactory,
    config: &CascadeConfig,
    plan: &Plan,
    workers: usize,
) -> Result<CascadeReport, CliError> {
    let cancel = CancellationToken::new();
    let executor = CascadeExecutor::new(config.clone())?.with_cancellation(cancel.clone());

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing the current combo");
                cancel.cancel();
            }
        })
    };

    let report = if workers > 1 {
        Ok(run_partitioned(factory, &executor, plan, workers).await)
    } else {
        let mut page = factory.open_isolated(0).await?;
        let report = executor.run(page.as_mut(), plan).await;
        close_quietly(page.as_mut()).await;
        report
    };
    watcher.abort();
    info!("Plan finished");
    Ok(report?)
}

async fn close_quietly(page: &mut dyn Page) {
    if let Err(e) = page.close().await {
        warn!("Failed to close page: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_skipped_in_total() {
        let summary = Summary {
            ok: 2,
            empty: 1,
            error: 1,
            timeout: 0,
            skipped: 3,
            total: 4,
            elapsed_ms: 1200,
        };
        assert_eq!(
            summary_line(&summary, true),
            "7 combo(s): 2 ok, 1 empty, 1 error, 0 timeout, 3 skipped in 1200 ms (cancelled)"
        );
    }

    #[test]
    fn blank_filters_are_dropped() {
        let f = level_filter(Some("  ".into()), Some("a,b".into()), Some(3));
        assert_eq!(f.select_regex, None);
        assert_eq!(f.pick_list.as_deref(), Some("a,b"));
        assert_eq!(f.limit, Some(3));
    }
}
