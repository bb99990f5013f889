use crate::webdriver::{WebDriverClient, headless_capabilities};
use async_trait::async_trait;
use fantoccini::Locator;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use gazet_engine::page::{BackendError, ElementRef, Page, PageFactory};
use gazet_engine::script;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// `Page` over a WebDriver session (chromedriver, geckodriver, WPEWebDriver...).
pub struct EmbeddedBackend {
    client: Option<WebDriverClient>,
    webdriver_url: String,
    headless: bool,
    elements: HashMap<u32, Element>,
    next_id: u32,
}

impl EmbeddedBackend {
    pub fn with_url(webdriver_url: impl Into<String>) -> Self {
        Self {
            client: None,
            webdriver_url: webdriver_url.into(),
            headless: true,
            elements: HashMap::new(),
            next_id: 1,
        }
    }

    /// Let the driver open a visible window.
    pub fn visible(mut self, visible: bool) -> Self {
        self.headless = !visible;
        self
    }

    fn session(&self) -> Result<&fantoccini::Client, BackendError> {
        self.client
            .as_ref()
            .map(|c| &c.client)
            .ok_or(BackendError::NotReady)
    }

    fn register(&mut self, element: Element) -> ElementRef {
        let id = self.next_id;
        self.next_id += 1;
        self.elements.insert(id, element);
        ElementRef(id)
    }

    fn handle(&self, element: ElementRef) -> Result<&Element, BackendError> {
        match self.elements.get(&element.0) {
            Some(found) => Ok(found),
            None if element.0 < self.next_id => Err(BackendError::ElementStale { id: element.0 }),
            None => Err(BackendError::ElementNotFound { id: element.0 }),
        }
    }

    /// Run a [`script`] helper with the element as `arguments[0]`.
    async fn call(&self, element: ElementRef, helper: &str) -> Result<Value, BackendError> {
        let target = serde_json::to_value(self.handle(element)?)?;
        let body = format!("return ({})(arguments[0]);", script::guarded(helper));
        let value = self
            .session()?
            .execute(&body, vec![target])
            .await
            .map_err(|e| command_error(element, e))?;
        script::unwrap_guarded(value, element.0)
    }
}

fn is_stale(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("stale element") || lower.contains("no such element")
}

fn command_error(element: ElementRef, err: CmdError) -> BackendError {
    let message = err.to_string();
    if is_stale(&message) {
        BackendError::ElementStale { id: element.0 }
    } else {
        BackendError::ScriptError(message)
    }
}

fn query_error(selector: &str, err: CmdError) -> BackendError {
    let message = err.to_string();
    if message.to_lowercase().contains("invalid selector") {
        BackendError::SelectorInvalid {
            selector: selector.to_string(),
        }
    } else {
        BackendError::Other(format!("find_all('{}') failed: {}", selector, message))
    }
}

/// WebDriver code points for the keys the dropdown handlers send.
fn webdriver_key(key: &str) -> Option<&'static str> {
    match key {
        "Enter" => Some("\u{E007}"),
        "Escape" => Some("\u{E00C}"),
        "End" => Some("\u{E010}"),
        "Home" => Some("\u{E011}"),
        "ArrowUp" => Some("\u{E013}"),
        "ArrowDown" => Some("\u{E015}"),
        _ => None,
    }
}

#[async_trait]
impl Page for EmbeddedBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Connecting to WebDriver at {}...", self.webdriver_url);
        let capabilities = self.headless.then(headless_capabilities);
        let client = WebDriverClient::connect(&self.webdriver_url, capabilities)
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.elements.clear();
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| BackendError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn release_handles(&mut self) {
        // WebDriver references hold nothing on the driver side
        self.elements.clear();
    }

    async fn goto(&mut self, url: &str) -> Result<(), BackendError> {
        info!("Navigating to: {}", url);
        self.elements.clear();
        self.session()?
            .goto(url)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn query_all(
        &mut self,
        scope: Option<ElementRef>,
        selector: &str,
    ) -> Result<Vec<ElementRef>, BackendError> {
        let found = match scope {
            None => self
                .session()?
                .find_all(Locator::Css(selector))
                .await
                .map_err(|e| query_error(selector, e))?,
            Some(scope) => {
                let root = self.handle(scope)?;
                match root.find_all(Locator::Css(selector)).await {
                    Ok(found) => found,
                    Err(e) if is_stale(&e.to_string()) => {
                        return Err(BackendError::ElementStale { id: scope.0 });
                    }
                    Err(e) => return Err(query_error(selector, e)),
                }
            }
        };
        Ok(found.into_iter().map(|el| self.register(el)).collect())
    }

    async fn tag_name(&mut self, element: ElementRef) -> Result<String, BackendError> {
        let value = self.call(element, script::TAG_NAME).await?;
        Ok(script::as_opt_string(value)?.unwrap_or_default())
    }

    async fn attribute(
        &mut self,
        element: ElementRef,
        name: &str,
    ) -> Result<Option<String>, BackendError> {
        script::as_opt_string(self.call(element, &script::attribute(name)).await?)
    }

    async fn text(&mut self, element: ElementRef) -> Result<String, BackendError> {
        // textContent, so options of a closed dropdown still read
        let value = self.call(element, script::TEXT).await?;
        Ok(script::as_opt_string(value)?.unwrap_or_default())
    }

    async fn click(&mut self, element: ElementRef) -> Result<(), BackendError> {
        let native = self.handle(element)?.click().await;
        match native {
            Ok(()) => Ok(()),
            Err(e) if is_stale(&e.to_string()) => Err(BackendError::ElementStale { id: element.0 }),
            Err(e) => {
                // Overlays and zero-size options refuse native clicks
                debug!("Native click on {} failed ({}), dispatching events", element, e);
                self.call(element, script::CLICK).await?;
                Ok(())
            }
        }
    }

    async fn select_value(
        &mut self,
        element: ElementRef,
        value: &str,
    ) -> Result<bool, BackendError> {
        match self.call(element, &script::select_value(value)).await? {
            Value::Bool(changed) => Ok(changed),
            _ => Err(BackendError::ScriptError(format!(
                "element {} is not a <select>",
                element
            ))),
        }
    }

    async fn press_key(&mut self, element: ElementRef, key: &str) -> Result<(), BackendError> {
        if let Some(code) = webdriver_key(key) {
            match self.handle(element)?.send_keys(code).await {
                Ok(()) => return Ok(()),
                Err(e) if is_stale(&e.to_string()) => {
                    return Err(BackendError::ElementStale { id: element.0 });
                }
                Err(e) => debug!("send_keys({}) refused ({}), dispatching events", key, e),
            }
        }
        self.call(element, &script::dispatch_key(key)).await?;
        Ok(())
    }

    async fn scroll_into_view(&mut self, element: ElementRef) -> Result<(), BackendError> {
        self.call(element, script::SCROLL_INTO_VIEW).await?;
        Ok(())
    }

    async fn element_path(&mut self, element: ElementRef) -> Result<String, BackendError> {
        let value = self.call(element, script::ELEMENT_PATH).await?;
        Ok(script::as_opt_string(value)?.unwrap_or_default())
    }
}

/// One WebDriver session per worker against the same driver endpoint.
pub struct WebDriverFactory {
    url: String,
    visible: bool,
}

impl WebDriverFactory {
    pub fn new(url: impl Into<String>, visible: bool) -> Self {
        Self {
            url: url.into(),
            visible,
        }
    }
}

#[async_trait]
impl PageFactory for WebDriverFactory {
    async fn open_isolated(&self, worker: usize) -> Result<Box<dyn Page>, BackendError> {
        debug!("Opening WebDriver session for worker {}", worker);
        let mut backend = EmbeddedBackend::with_url(self.url.clone()).visible(self.visible);
        backend.launch().await?;
        Ok(Box::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_handles() {
        let backend = EmbeddedBackend::with_url("http://localhost:4444");
        assert!(matches!(
            backend.handle(ElementRef(1)),
            Err(BackendError::ElementNotFound { id: 1 })
        ));
        assert!(matches!(backend.session(), Err(BackendError::NotReady)));
    }

    #[test]
    fn driver_messages() {
        assert!(is_stale("stale element reference: element is not attached"));
        assert!(is_stale("No such element: Unable to locate element"));
        assert!(!is_stale("element not interactable"));
        assert_eq!(webdriver_key("End"), Some("\u{E010}"));
        assert_eq!(webdriver_key("a"), None);
    }
}
