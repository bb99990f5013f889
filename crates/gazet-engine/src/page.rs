use async_trait::async_trait;
pub use gazet_common::error::BackendError;
use std::fmt;
use std::time::Duration;

/// Opaque handle to an element held by a page implementation.
///
/// Handles are only meaningful to the page that produced them and may go stale
/// when the page re-renders; operations on a stale handle report
/// `BackendError::ElementStale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u32);

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The page/frame capability the engine drives. Implemented once per automation
/// library (CDP, WebDriver) and by in-memory fakes in tests.
#[async_trait]
pub trait Page: Send + Sync {
    /// Start the browser / connect to the driver.
    async fn launch(&mut self) -> Result<(), BackendError>;

    /// Close the browser and cleanup resources.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Check if the page is ready to accept commands.
    async fn is_ready(&self) -> bool;

    async fn goto(&mut self, url: &str) -> Result<(), BackendError>;

    /// All elements matching `selector`, in document order. With a scope, only
    /// descendants of that element are searched.
    async fn query_all(
        &mut self,
        scope: Option<ElementRef>,
        selector: &str,
    ) -> Result<Vec<ElementRef>, BackendError>;

    /// Lower-case tag name.
    async fn tag_name(&mut self, element: ElementRef) -> Result<String, BackendError>;

    async fn attribute(
        &mut self,
        element: ElementRef,
        name: &str,
    ) -> Result<Option<String>, BackendError>;

    /// Text content of the element.
    async fn text(&mut self, element: ElementRef) -> Result<String, BackendError>;

    async fn click(&mut self, element: ElementRef) -> Result<(), BackendError>;

    /// Choose `value` on a native `<select>` and fire its change events.
    /// Returns false when the select has no such value.
    async fn select_value(&mut self, element: ElementRef, value: &str)
    -> Result<bool, BackendError>;

    /// Send a named key ("End", "Home", "Escape", "Enter") to the element.
    async fn press_key(&mut self, element: ElementRef, key: &str) -> Result<(), BackendError>;

    async fn scroll_into_view(&mut self, element: ElementRef) -> Result<(), BackendError>;

    /// Stable structural path of the element, computed in the page context.
    async fn element_path(&mut self, element: ElementRef) -> Result<String, BackendError>;

    /// Drop every handle handed out so far. Called between combos, when no
    /// handle is held any more; later use reports `ElementStale`.
    async fn release_handles(&mut self) {}

    async fn wait_for_timeout(&mut self, ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

/// Source of isolated browsing contexts, one per parallel worker.
#[async_trait]
pub trait PageFactory: Send + Sync {
    /// A launched page whose cookies and storage are not shared with other workers.
    async fn open_isolated(&self, worker: usize) -> Result<Box<dyn Page>, BackendError>;
}

/// Element is enabled when neither `disabled` nor `aria-disabled="true"` is set.
pub async fn is_enabled(page: &mut dyn Page, element: ElementRef) -> Result<bool, BackendError> {
    if page.attribute(element, "disabled").await?.is_some() {
        return Ok(false);
    }
    let aria = page.attribute(element, "aria-disabled").await?;
    Ok(!matches!(aria.as_deref(), Some("true")))
}
