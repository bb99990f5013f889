use crate::executor::CascadeExecutor;
use crate::page::PageFactory;
use futures::future::join_all;
use gazet_common::model::{CascadeReport, Plan};
use std::ops::Range;
use tracing::{error, info, warn};

/// Split `len` combos into at most `workers` contiguous, non-empty ranges whose
/// sizes differ by at most one.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.clamp(1, len.max(1));
    let base = len / workers;
    let extra = len % workers;
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for w in 0..workers {
        let size = base + usize::from(w < extra);
        if size == 0 {
            continue;
        }
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Run the plan across `workers` isolated pages at once and merge the reports
/// back into plan order. Each worker owns its page and its level-2 cache.
///
/// A worker that cannot run accounts for its share as skipped; the other
/// workers' results are always kept.
pub async fn run_partitioned(
    factory: &dyn PageFactory,
    executor: &CascadeExecutor,
    plan: &Plan,
    workers: usize,
) -> CascadeReport {
    let ranges = partition(plan.combos().len(), workers);
    info!(
        "Running {} combo(s) on {} worker(s)",
        plan.combos().len(),
        ranges.len()
    );

    let tasks = ranges.into_iter().enumerate().map(|(worker, range)| async move {
        let mut page = match factory.open_isolated(worker).await {
            Ok(page) => page,
            Err(e) => {
                error!("Worker {} could not open a page: {}", worker, e);
                return skipped(range.len());
            }
        };
        let report = match executor.run_range(page.as_mut(), plan, range.clone()).await {
            Ok(report) => report,
            Err(e) => {
                error!("Worker {} failed: {}", worker, e);
                skipped(range.len())
            }
        };
        if let Err(e) = page.close().await {
            warn!("Worker {} failed to close its page: {}", worker, e);
        }
        report
    });

    CascadeReport::merge(join_all(tasks).await)
}

fn skipped(count: usize) -> CascadeReport {
    let mut report = CascadeReport::default();
    report.summary.skipped = count;
    report
}
