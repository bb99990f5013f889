use crate::config::CascadeConfig;
use crate::dropdown::{collect_dropdown_roots, read_options};
use crate::page::{BackendError, Page};
use gazet_common::model::{InspectedOption, InspectedSelect, SelectInspection};
use tracing::debug;

/// Report what the dropdowns at `indices` currently show, placeholders included.
/// With no indices, every dropdown on the page is reported.
pub async fn list_select_options(
    page: &mut dyn Page,
    config: &CascadeConfig,
    indices: &[usize],
) -> Result<SelectInspection, BackendError> {
    let roots = collect_dropdown_roots(page, config.scope_selector.as_deref()).await?;
    let wanted: Vec<usize> = if indices.is_empty() {
        (0..roots.len()).collect()
    } else {
        indices.to_vec()
    };

    let mut selects = Vec::with_capacity(wanted.len());
    for index in wanted {
        let Some(root) = roots.get(index) else {
            debug!("No dropdown at index {}", index);
            selects.push(InspectedSelect {
                index,
                kind: None,
                options: Vec::new(),
            });
            continue;
        };
        let options = read_options(page, root, config).await?;
        selects.push(InspectedSelect {
            index,
            kind: Some(root.kind),
            options: options.iter().map(InspectedOption::from).collect(),
        });
    }
    Ok(SelectInspection { selects })
}
