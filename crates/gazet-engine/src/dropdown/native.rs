use super::{DropdownWidget, read_option_element};
use crate::page::{BackendError, ElementRef, Page};
use async_trait::async_trait;
use gazet_common::model::{DropdownOption, WidgetKind};
use std::collections::HashSet;

/// `<select>` element: options are always attached, selection sets the value.
pub struct NativeSelect;

#[async_trait]
impl DropdownWidget for NativeSelect {
    fn kind(&self) -> WidgetKind {
        WidgetKind::NativeSelect
    }

    async fn open(&self, _page: &mut dyn Page, _root: ElementRef) -> Result<(), BackendError> {
        Ok(())
    }

    async fn close(&self, _page: &mut dyn Page, _root: ElementRef) -> Result<(), BackendError> {
        Ok(())
    }

    async fn read_options(
        &self,
        page: &mut dyn Page,
        root: ElementRef,
    ) -> Result<Vec<DropdownOption>, BackendError> {
        let elements = page.query_all(Some(root), "option").await?;
        let mut seen = HashSet::new();
        let mut options = Vec::with_capacity(elements.len());
        for element in elements {
            let option = read_option_element(page, element, &["value"]).await?;
            if seen.insert(option.dedup_key()) {
                options.push(option);
            }
        }
        Ok(options)
    }

    async fn select(
        &self,
        page: &mut dyn Page,
        root: ElementRef,
        choice: &DropdownOption,
    ) -> Result<bool, BackendError> {
        // An <option> without a value attribute submits its text.
        page.select_value(root, choice.key()).await
    }
}
