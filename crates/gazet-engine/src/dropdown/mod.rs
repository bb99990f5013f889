//! Dropdown discovery and reading.
//!
//! The page is not ours: a "dropdown" may be a native `<select>`, an ARIA
//! combobox, or a third-party widget whose option list only exists while open.
//! Roots are found with a prioritized selector list, classified by sniffing the
//! element, and then only ever driven through the [`DropdownWidget`] capability.

mod listbox;
mod native;

pub use listbox::CustomListbox;
pub use native::NativeSelect;

use crate::config::CascadeConfig;
use crate::page::{BackendError, ElementRef, Page};
use async_trait::async_trait;
use gazet_common::fold::collapse_whitespace;
use gazet_common::model::{DropdownOption, OptionLocator, WidgetKind};
use tracing::debug;

/// Candidate root selectors, most specific first.
pub const ROOT_SELECTORS: &[&str] = &[
    "select",
    "[role='combobox']",
    "button[aria-haspopup='listbox']",
    "[role='button'][aria-expanded]",
    ".select2-container",
    ".choices",
    ".ng-select",
    ".v-select",
    "mat-select",
    "[class*='react-select__control']",
];

/// A dropdown found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownRoot {
    pub element: ElementRef,
    pub path: String,
    pub kind: WidgetKind,
}

/// Polymorphic driver for one widget family.
#[async_trait]
pub trait DropdownWidget: Send + Sync {
    fn kind(&self) -> WidgetKind;

    async fn open(&self, page: &mut dyn Page, root: ElementRef) -> Result<(), BackendError>;

    async fn close(&self, page: &mut dyn Page, root: ElementRef) -> Result<(), BackendError>;

    /// Current option set, de-duplicated, in display order. Leaves the widget closed.
    async fn read_options(
        &self,
        page: &mut dyn Page,
        root: ElementRef,
    ) -> Result<Vec<DropdownOption>, BackendError>;

    /// Activate `choice`. Returns false when it cannot be found any more.
    async fn select(
        &self,
        page: &mut dyn Page,
        root: ElementRef,
        choice: &DropdownOption,
    ) -> Result<bool, BackendError>;
}

pub fn widget_for(kind: WidgetKind, config: &CascadeConfig) -> Box<dyn DropdownWidget> {
    match kind {
        WidgetKind::NativeSelect => Box::new(NativeSelect),
        WidgetKind::CustomListbox => Box::new(CustomListbox::new(config.settle_after_open_ms)),
    }
}

pub async fn classify(page: &mut dyn Page, element: ElementRef) -> Result<WidgetKind, BackendError> {
    let tag = page.tag_name(element).await?;
    if tag.eq_ignore_ascii_case("select") {
        Ok(WidgetKind::NativeSelect)
    } else {
        Ok(WidgetKind::CustomListbox)
    }
}

/// Dropdown roots in document order.
///
/// Elements hidden from assistive tech (the original `<select>` that widget
/// libraries keep behind their replacement) are skipped, as are candidates
/// nested inside an already accepted root.
pub async fn collect_dropdown_roots(
    page: &mut dyn Page,
    scope_selector: Option<&str>,
) -> Result<Vec<DropdownRoot>, BackendError> {
    let scope = match scope_selector.filter(|s| !s.trim().is_empty()) {
        Some(selector) => match page.query_all(None, selector).await?.first() {
            Some(el) => Some(*el),
            None => {
                debug!("Scope '{}' not present, no dropdowns", selector);
                return Ok(Vec::new());
            }
        },
        None => None,
    };

    let combined = ROOT_SELECTORS.join(", ");
    let candidates = page.query_all(scope, &combined).await?;

    let mut roots: Vec<DropdownRoot> = Vec::new();
    for element in candidates {
        match inspect_candidate(page, element, &roots).await {
            Ok(Some(root)) => roots.push(root),
            Ok(None) => {}
            // Replaced while we were looking at it.
            Err(e) if e.is_gone() => debug!("Candidate {} went away, skipped", element),
            Err(e) => return Err(e),
        }
    }
    debug!("Collected {} dropdown root(s)", roots.len());
    Ok(roots)
}

async fn inspect_candidate(
    page: &mut dyn Page,
    element: ElementRef,
    accepted: &[DropdownRoot],
) -> Result<Option<DropdownRoot>, BackendError> {
    if is_hidden(page, element).await? {
        return Ok(None);
    }
    let path = page.element_path(element).await?;
    if accepted.iter().any(|r| is_within(&path, &r.path)) {
        return Ok(None);
    }
    let kind = classify(page, element).await?;
    Ok(Some(DropdownRoot {
        element,
        path,
        kind,
    }))
}

/// Root at `index`, or `None` when the page has fewer dropdowns.
pub async fn find_dropdown(
    page: &mut dyn Page,
    scope_selector: Option<&str>,
    index: usize,
) -> Result<Option<DropdownRoot>, BackendError> {
    let mut roots = collect_dropdown_roots(page, scope_selector).await?;
    if index < roots.len() {
        Ok(Some(roots.swap_remove(index)))
    } else {
        Ok(None)
    }
}

pub async fn read_options(
    page: &mut dyn Page,
    root: &DropdownRoot,
    config: &CascadeConfig,
) -> Result<Vec<DropdownOption>, BackendError> {
    widget_for(root.kind, config)
        .read_options(page, root.element)
        .await
}

async fn is_hidden(page: &mut dyn Page, element: ElementRef) -> Result<bool, BackendError> {
    if page.attribute(element, "hidden").await?.is_some() {
        return Ok(true);
    }
    if page.attribute(element, "aria-hidden").await?.as_deref() == Some("true") {
        return Ok(true);
    }
    let class = page.attribute(element, "class").await?.unwrap_or_default();
    Ok(class.contains("hidden-accessible"))
}

fn is_within(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with('>')
}

/// Snapshot of one option element.
pub(crate) async fn read_option_element(
    page: &mut dyn Page,
    element: ElementRef,
    value_attrs: &[&str],
) -> Result<DropdownOption, BackendError> {
    let text = collapse_whitespace(&page.text(element).await?);
    let mut value = None;
    for attr in value_attrs {
        if let Some(v) = page.attribute(element, attr).await? {
            value = Some(v);
            break;
        }
    }
    let locator = OptionLocator {
        id: non_empty(page.attribute(element, "id").await?),
        data_id: non_empty(page.attribute(element, "data-id").await?),
        data_value: non_empty(page.attribute(element, "data-value").await?),
        data_index: non_empty(page.attribute(element, "data-index").await?),
    };
    Ok(DropdownOption {
        text,
        value: non_empty(value),
        locator,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Same entry as seen in an earlier snapshot.
pub(crate) fn same_option(a: &DropdownOption, b: &DropdownOption) -> bool {
    if !a.locator.is_empty() && a.locator == b.locator {
        return true;
    }
    a.text.trim() == b.text.trim() && a.value_str() == b.value_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths() {
        assert!(is_within("body>div:nth-of-type(2)>span", "body>div:nth-of-type(2)"));
        assert!(!is_within("body>div:nth-of-type(2)", "body>div:nth-of-type(2)"));
        assert!(!is_within("body>div:nth-of-type(20)", "body>div:nth-of-type(2)"));
    }

    #[test]
    fn same_option_by_locator_or_label_value() {
        let mut a = DropdownOption::new("Portaria", "1");
        let b = DropdownOption::new("Portaria", "1");
        assert!(same_option(&a, &b));
        a.locator.data_id = Some("x1".into());
        let mut c = DropdownOption::labelled("Portaria (renamed)");
        c.locator.data_id = Some("x1".into());
        assert!(same_option(&a, &c));
        assert!(!same_option(&DropdownOption::new("A", "1"), &DropdownOption::new("A", "2")));
    }
}
