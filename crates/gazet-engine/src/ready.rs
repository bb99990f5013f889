use crate::dropdown::{DropdownRoot, DropdownWidget};
use crate::page::{Page, is_enabled};
use crate::wait::{Poller, Check};
use gazet_common::model::DropdownOption;
use gazet_common::sentinel::is_sentinel_option;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// Enabled and populated; carries the options read on the winning tick.
    Ready(Vec<DropdownOption>),
    TimedOut,
    /// The control left the page while we were waiting.
    Gone,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadyOptions {
    pub min_real_options: usize,
    pub timeout: Duration,
    pub poll: Duration,
}

/// Poll until the dropdown is enabled and shows at least `min_real_options`
/// non-sentinel entries, the timeout elapses, or the element vanishes.
pub async fn wait_until_ready(
    page: &mut dyn Page,
    root: &DropdownRoot,
    widget: &dyn DropdownWidget,
    opts: ReadyOptions,
) -> Readiness {
    let mut poller = Poller::new(opts.timeout, opts.poll);
    loop {
        match check_once(page, root, widget, opts.min_real_options).await {
            Check::Ready(options) => {
                debug!("Dropdown {} ready after {} tick(s)", root.element, poller.ticks());
                return Readiness::Ready(options);
            }
            Check::Gone => {
                debug!("Dropdown {} vanished while waiting", root.element);
                return Readiness::Gone;
            }
            Check::Pending => {}
        }
        if !poller.tick().await {
            debug!(
                "Dropdown {} not ready within {} ms",
                root.element,
                opts.timeout.as_millis()
            );
            return Readiness::TimedOut;
        }
    }
}

async fn check_once(
    page: &mut dyn Page,
    root: &DropdownRoot,
    widget: &dyn DropdownWidget,
    min_real_options: usize,
) -> Check<Vec<DropdownOption>> {
    match is_enabled(page, root.element).await {
        Ok(true) => {}
        Ok(false) => return Check::Pending,
        Err(e) if e.is_gone() => return Check::Gone,
        Err(e) => {
            debug!("Enabled check failed on {}: {}", root.element, e);
            return Check::Pending;
        }
    }
    match widget.read_options(page, root.element).await {
        Ok(options) => {
            let real = options.iter().filter(|o| !is_sentinel_option(o)).count();
            if real >= min_real_options {
                Check::Ready(options)
            } else {
                Check::Pending
            }
        }
        Err(e) if e.is_gone() => Check::Gone,
        Err(e) => {
            debug!("Option read failed on {}: {}", root.element, e);
            Check::Pending
        }
    }
}
