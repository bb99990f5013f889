use crate::cdp::{CdpClient, LaunchOptions};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::js_protocol::runtime::{
    CallFunctionOnParams, ReleaseObjectParams, RemoteObjectId,
};
use chromiumoxide::error::CdpError;
use futures::future::join_all;
use gazet_engine::page::{BackendError, ElementRef, Page, PageFactory};
use gazet_engine::script;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// `Page` over one Chromium tab driven through the DevTools protocol.
///
/// Element handles map to CDP remote objects. Navigation drops them all, so
/// handles from a previous document report `ElementStale`.
pub struct HeadlessBackend {
    client: Option<CdpClient>,
    options: LaunchOptions,
    worker: usize,
    elements: HashMap<u32, RemoteObjectId>,
    next_id: u32,
    query_seq: u64,
}

impl HeadlessBackend {
    pub fn new(options: LaunchOptions) -> Self {
        Self::for_worker(options, 0)
    }

    pub fn for_worker(options: LaunchOptions, worker: usize) -> Self {
        Self {
            client: None,
            options,
            worker,
            elements: HashMap::new(),
            next_id: 1,
            query_seq: 0,
        }
    }

    pub fn get_client(&self) -> Option<&CdpClient> {
        self.client.as_ref()
    }

    fn tab(&self) -> Result<chromiumoxide::Page, BackendError> {
        self.client
            .as_ref()
            .map(|c| c.page.clone())
            .ok_or(BackendError::NotReady)
    }

    fn register(&mut self, object: RemoteObjectId) -> ElementRef {
        let id = self.next_id;
        self.next_id += 1;
        self.elements.insert(id, object);
        ElementRef(id)
    }

    /// Forget every registered handle and return the remote objects behind them.
    fn forget_handles(&mut self) -> Vec<RemoteObjectId> {
        self.elements.drain().map(|(_, object)| object).collect()
    }

    fn handle(&self, element: ElementRef) -> Result<RemoteObjectId, BackendError> {
        match self.elements.get(&element.0) {
            Some(object) => Ok(object.clone()),
            None if element.0 < self.next_id => Err(BackendError::ElementStale { id: element.0 }),
            None => Err(BackendError::ElementNotFound { id: element.0 }),
        }
    }

    /// Run a [`script`] helper against the element and return its value.
    async fn call(&self, element: ElementRef, helper: &str) -> Result<Value, BackendError> {
        let object = self.handle(element)?;
        let tab = self.tab()?;
        let params = CallFunctionOnParams::builder()
            .function_declaration(format!(
                "function() {{ return ({})(this); }}",
                script::guarded(helper)
            ))
            .object_id(object)
            .return_by_value(true)
            .build()
            .map_err(BackendError::ScriptError)?;
        let returned = tab
            .execute(params)
            .await
            .map_err(|e| call_error(element, e))?;
        if let Some(details) = &returned.result.exception_details {
            return Err(BackendError::ScriptError(details.text.clone()));
        }
        let value = returned.result.result.value.clone().unwrap_or(Value::Null);
        script::unwrap_guarded(value, element.0)
    }

    async fn dispatch_key(&self, key: &str) -> Result<(), BackendError> {
        let tab = self.tab()?;
        let code = virtual_key_code(key);
        for kind in [DispatchKeyEventType::RawKeyDown, DispatchKeyEventType::KeyUp] {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(key)
                .code(key);
            if let Some(code) = code {
                builder = builder.windows_virtual_key_code(code);
            }
            let event = builder
                .build()
                .map_err(|e| BackendError::Other(format!("Failed to build key event: {}", e)))?;
            tab.execute(event)
                .await
                .map_err(|e| BackendError::Other(format!("press_key failed: {}", e)))?;
        }
        Ok(())
    }
}

fn virtual_key_code(key: &str) -> Option<i64> {
    match key {
        "Enter" => Some(13),
        "Escape" => Some(27),
        "End" => Some(35),
        "Home" => Some(36),
        "ArrowUp" => Some(38),
        "ArrowDown" => Some(40),
        _ => None,
    }
}

/// Remote objects die with their execution context.
fn is_context_error(message: &str) -> bool {
    message.contains("Could not find object")
        || message.contains("Cannot find context")
        || message.contains("Execution context was destroyed")
}

fn call_error(element: ElementRef, err: CdpError) -> BackendError {
    let message = err.to_string();
    if is_context_error(&message) {
        BackendError::ElementStale { id: element.0 }
    } else {
        BackendError::ScriptError(message)
    }
}

#[async_trait]
impl Page for HeadlessBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Launching headless backend (worker {})", self.worker);
        let client = CdpClient::launch(&self.options, self.worker)
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
        let objects = self.forget_handles();
        let Ok(tab) = self.tab() else {
            return;
        };
        if objects.is_empty() {
            return;
        }
        debug!("Releasing {} remote object(s)", objects.len());
        let released = join_all(
            objects
                .into_iter()
                .map(|object| tab.execute(ReleaseObjectParams::new(object))),
        )
        .await;
        let failed = released.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            // Objects of a navigated-away document are already gone.
            debug!("{} remote object(s) were already released", failed);
        }
    }

    async fn goto(&mut self, url: &str) -> Result<(), BackendError> {
        let tab = self.tab()?;
        info!("Navigating to: {}", url);
        self.elements.clear();
        tab.goto(url)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn query_all(
        &mut self,
        scope: Option<ElementRef>,
        selector: &str,
    ) -> Result<Vec<ElementRef>, BackendError> {
        let tab = self.tab()?;
        let invalid = || BackendError::SelectorInvalid {
            selector: selector.to_string(),
        };

        let found = match scope {
            None => tab.find_elements(selector).await.map_err(|e| {
                debug!("querySelectorAll('{}') failed: {}", selector, e);
                invalid()
            })?,
            // Scoped lookups go through a temporary marker: node ids from an
            // earlier document fetch are not reusable.
            Some(scope) => {
                self.query_seq += 1;
                let token = format!("q{}", self.query_seq);
                let marked = self
                    .call(scope, &script::mark_descendants(selector, &token))
                    .await?;
                match marked.as_i64() {
                    Some(-1) => return Err(invalid()),
                    Some(0) => return Ok(Vec::new()),
                    _ => {}
                }
                let found = tab
                    .find_elements(script::marker_selector(&token))
                    .await
                    .map_err(|e| BackendError::ScriptError(e.to_string()));
                if let Err(e) = tab.evaluate(script::unmark(&token)).await {
                    debug!("Failed to clear query marker {}: {}", token, e);
                }
                found?
            }
        };

        Ok(found
            .into_iter()
            .map(|element| self.register(element.remote_object_id))
            .collect())
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
        let value = self.call(element, script::TEXT).await?;
        Ok(script::as_opt_string(value)?.unwrap_or_default())
    }

    async fn click(&mut self, element: ElementRef) -> Result<(), BackendError> {
        self.call(element, script::CLICK).await?;
        Ok(())
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
        self.call(element, script::FOCUS).await?;
        self.dispatch_key(key).await
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

/// One Chromium instance with its own profile per worker.
pub struct HeadlessFactory {
    options: LaunchOptions,
}

impl HeadlessFactory {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl PageFactory for HeadlessFactory {
    async fn open_isolated(&self, worker: usize) -> Result<Box<dyn Page>, BackendError> {
        let mut backend = HeadlessBackend::for_worker(self.options.clone(), worker);
        backend.launch().await?;
        Ok(Box::new(backend))
    }
}
