use crate::config::CascadeConfig;
use crate::page::{BackendError, ElementRef, Page};
use gazet_common::fold::collapse_whitespace;
use gazet_common::model::ResultItem;
use std::collections::HashSet;
use tracing::debug;

/// Result items inside the first results container, in document order.
///
/// A missing container or zero matching items is an empty list, not an error.
/// Items without an outbound link are skipped; duplicate links are kept once.
pub async fn extract_results(
    page: &mut dyn Page,
    config: &CascadeConfig,
) -> Result<Vec<ResultItem>, BackendError> {
    let Some(&container) = page
        .query_all(None, &config.results_root_selector)
        .await?
        .first()
    else {
        debug!("Results container '{}' not present", config.results_root_selector);
        return Ok(Vec::new());
    };

    let elements = page
        .query_all(Some(container), &config.result_item_selector)
        .await?;
    let cap = config.max_items_per_combo.unwrap_or(usize::MAX);

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for element in elements {
        if items.len() >= cap {
            break;
        }
        let Some(href) = link_of(page, element, config.result_link_selector.as_deref()).await?
        else {
            continue;
        };
        if !seen.insert(href.clone()) {
            continue;
        }
        let mut text = collapse_whitespace(&page.text(element).await?);
        if text.is_empty() {
            text = page
                .attribute(element, "title")
                .await?
                .map(|t| collapse_whitespace(&t))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| href.clone());
        }
        items.push(ResultItem { text, href });
    }
    debug!("Extracted {} result item(s)", items.len());
    Ok(items)
}

async fn link_of(
    page: &mut dyn Page,
    item: ElementRef,
    link_selector: Option<&str>,
) -> Result<Option<String>, BackendError> {
    if let Some(selector) = link_selector.filter(|s| !s.trim().is_empty())
        && let Some(&link) = page.query_all(Some(item), selector).await?.first()
        && let Some(href) = href_of(page, link).await?
    {
        return Ok(Some(href));
    }
    if let Some(href) = href_of(page, item).await? {
        return Ok(Some(href));
    }
    match page.query_all(Some(item), "a[href]").await?.first() {
        Some(&anchor) => href_of(page, anchor).await,
        None => Ok(None),
    }
}

async fn href_of(page: &mut dyn Page, element: ElementRef) -> Result<Option<String>, BackendError> {
    Ok(page
        .attribute(element, "href")
        .await?
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty() && !h.starts_with("javascript:") && h != "#"))
}
