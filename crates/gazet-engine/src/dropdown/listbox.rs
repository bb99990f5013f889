use super::{DropdownWidget, read_option_element, same_option};
use crate::page::{BackendError, ElementRef, Page};
use async_trait::async_trait;
use gazet_common::model::{DropdownOption, WidgetKind};
use std::collections::HashSet;
use tracing::debug;

/// Option elements of an open custom widget, wherever the library renders them.
const OPTION_SELECTORS: &str = "[role='option'], .select2-results__option, \
     .choices__list--dropdown .choices__item, .ng-dropdown-panel .ng-option, mat-option, \
     [class*='react-select__option']";

/// Upper bound on scroll nudges while waiting for a lazy list to stop growing.
const MAX_SCROLL_ROUNDS: usize = 40;

const SCROLL_SETTLE_MS: u64 = 120;

/// ARIA combobox / third-party listbox: must be opened before its options exist
/// and closed afterwards.
pub struct CustomListbox {
    settle_after_open_ms: u64,
}

struct Scan {
    options: Vec<DropdownOption>,
    hit: Option<ElementRef>,
}

impl CustomListbox {
    pub fn new(settle_after_open_ms: u64) -> Self {
        Self {
            settle_after_open_ms,
        }
    }

    async fn option_elements(
        &self,
        page: &mut dyn Page,
        root: ElementRef,
    ) -> Result<Vec<ElementRef>, BackendError> {
        for attr in ["aria-controls", "aria-owns"] {
            if let Some(id) = page.attribute(root, attr).await?.filter(|v| !v.is_empty()) {
                let selector = format!("[id='{}'] [role='option']", id.replace('\'', "\\'"));
                let found = page.query_all(None, &selector).await?;
                if !found.is_empty() {
                    return Ok(found);
                }
            }
        }
        let inline = page.query_all(Some(root), OPTION_SELECTORS).await?;
        if !inline.is_empty() {
            return Ok(inline);
        }
        page.query_all(None, OPTION_SELECTORS).await
    }

    /// Read the open list, nudging it to the end until no new options appear.
    /// With a target, stops at the first element showing it.
    async fn scan(
        &self,
        page: &mut dyn Page,
        root: ElementRef,
        target: Option<&DropdownOption>,
    ) -> Result<Scan, BackendError> {
        let mut seen = HashSet::new();
        let mut options = Vec::new();

        for round in 0..MAX_SCROLL_ROUNDS {
            let elements = self.option_elements(page, root).await?;
            let mut added = 0;
            for &element in &elements {
                let option = match read_option_element(page, element, &["data-value", "value"]).await {
                    Ok(option) => option,
                    // Virtualized rows unmount while we read them.
                    Err(e) if e.is_gone() => continue,
                    Err(e) => return Err(e),
                };
                if let Some(target) = target
                    && same_option(target, &option)
                {
                    return Ok(Scan {
                        options,
                        hit: Some(element),
                    });
                }
                if seen.insert(option.dedup_key()) {
                    options.push(option);
                    added += 1;
                }
            }

            let Some(&last) = elements.last() else {
                break;
            };
            if added == 0 {
                debug!("Option list converged after {} round(s)", round);
                break;
            }
            if page.scroll_into_view(last).await.is_err() {
                page.press_key(root, "End").await?;
            }
            page.wait_for_timeout(SCROLL_SETTLE_MS).await;
        }

        Ok(Scan { options, hit: None })
    }
}

#[async_trait]
impl DropdownWidget for CustomListbox {
    fn kind(&self) -> WidgetKind {
        WidgetKind::CustomListbox
    }

    async fn open(&self, page: &mut dyn Page, root: ElementRef) -> Result<(), BackendError> {
        if page.attribute(root, "aria-expanded").await?.as_deref() == Some("true") {
            return Ok(());
        }
        page.click(root).await?;
        page.wait_for_timeout(self.settle_after_open_ms).await;
        Ok(())
    }

    async fn close(&self, page: &mut dyn Page, root: ElementRef) -> Result<(), BackendError> {
        if page.attribute(root, "aria-expanded").await?.as_deref() != Some("true") {
            return Ok(());
        }
        page.press_key(root, "Escape").await?;
        if page.attribute(root, "aria-expanded").await?.as_deref() == Some("true") {
            page.click(root).await?;
        }
        Ok(())
    }

    async fn read_options(
        &self,
        page: &mut dyn Page,
        root: ElementRef,
    ) -> Result<Vec<DropdownOption>, BackendError> {
        self.open(page, root).await?;
        let scanned = self.scan(page, root, None).await;
        if let Err(e) = self.close(page, root).await {
            debug!("Failed to close listbox {}: {}", root, e);
        }
        Ok(scanned?.options)
    }

    async fn select(
        &self,
        page: &mut dyn Page,
        root: ElementRef,
        choice: &DropdownOption,
    ) -> Result<bool, BackendError> {
        self.open(page, root).await?;
        let mut scanned = self.scan(page, root, Some(choice)).await?;
        if scanned.hit.is_none() {
            // The list may have been left scrolled past the entry; start over from the top.
            page.press_key(root, "Home").await?;
            page.wait_for_timeout(SCROLL_SETTLE_MS).await;
            scanned = self.scan(page, root, Some(choice)).await?;
        }
        match scanned.hit {
            Some(element) => {
                page.click(element).await?;
                if let Err(e) = self.close(page, root).await {
                    debug!("Listbox {} did not close after selection: {}", root, e);
                }
                Ok(true)
            }
            None => {
                debug!(
                    "'{}' not found among {} option(s) of {}",
                    choice.text,
                    scanned.options.len(),
                    root
                );
                if let Err(e) = self.close(page, root).await {
                    debug!("Failed to close listbox {}: {}", root, e);
                }
                Ok(false)
            }
        }
    }
}
