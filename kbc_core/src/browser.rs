//! A minimal W3C WebDriver client.
//!
//! The Maidstone form cannot be scraped statically, so its adapter drives a
//! real browser through an external WebDriver endpoint (chromedriver or
//! compatible). Only the handful of commands the bin-day form needs are
//! implemented here, over plain HTTP + JSON.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AdapterError;

/// W3C key code for Tab.
pub const KEY_TAB: &str = "\u{e004}";
/// W3C key code for the down arrow.
pub const KEY_ARROW_DOWN: &str = "\u{e015}";

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// How often bounded waits re-probe the page.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct WdResponse<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct NewSessionValue {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Handle to an element inside the current browsing context.
#[derive(Debug, Clone)]
pub struct Element(String);

/// Factory for browser sessions against one WebDriver endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    client: Client,
    base_url: String,
}

impl WebDriverClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Open a fresh headless browser session.
    pub async fn new_session(&self) -> Result<BrowserSession, AdapterError> {
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": ["--headless=new", "--no-sandbox", "--disable-gpu"]
                    }
                }
            }
        });
        let response = self
            .client
            .post(format!("{}/session", self.base_url))
            .json(&capabilities)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status(status.as_u16()));
        }
        let body: WdResponse<NewSessionValue> = response
            .json()
            .await
            .map_err(|err| AdapterError::Parse(err.to_string()))?;
        Ok(BrowserSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session_id: body.value.session_id,
        })
    }
}

/// One live browser session, scoped to a single schedule request.
///
/// The session holds a real browser process on the WebDriver host, so it must
/// be [`close`](BrowserSession::close)d on every exit path.
#[derive(Debug)]
pub struct BrowserSession {
    client: Client,
    base_url: String,
    session_id: String,
}

impl BrowserSession {
    async fn command<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, AdapterError> {
        let url = format!(
            "{}/session/{}{}",
            self.base_url, self.session_id, path
        );
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status(status.as_u16()));
        }
        let body: WdResponse<T> = response
            .json()
            .await
            .map_err(|err| AdapterError::Parse(err.to_string()))?;
        Ok(body.value)
    }

    pub async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        self.command::<Value>(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    /// Look up a single element by CSS selector; absence is not an error.
    pub async fn find_element(&self, css: &str) -> Result<Option<Element>, AdapterError> {
        let url = format!("{}/session/{}/element", self.base_url, self.session_id);
        let response = self
            .client
            .post(url)
            .json(&json!({ "using": "css selector", "value": css }))
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AdapterError::Status(status.as_u16()));
        }
        let body: WdResponse<HashMap<String, String>> = response
            .json()
            .await
            .map_err(|err| AdapterError::Parse(err.to_string()))?;
        let id = body
            .value
            .get(ELEMENT_KEY)
            .cloned()
            .ok_or_else(|| AdapterError::Parse("element response without reference".into()))?;
        Ok(Some(Element(id)))
    }

    /// Poll for an element until it exists or `timeout` elapses.
    pub async fn wait_for_element(
        &self,
        css: &str,
        what: &'static str,
        timeout: Duration,
    ) -> Result<Element, AdapterError> {
        poll_until(what, timeout, POLL_INTERVAL, || self.find_element(css)).await
    }

    /// Switch the browsing context into a frame element.
    pub async fn switch_to_frame(&self, frame: &Element) -> Result<(), AdapterError> {
        self.command::<Value>(
            Method::POST,
            "/frame",
            Some(json!({ "id": { ELEMENT_KEY: frame.0 } })),
        )
        .await?;
        Ok(())
    }

    /// Focus the element and type `text` into it.
    pub async fn send_keys(&self, element: &Element, text: &str) -> Result<(), AdapterError> {
        self.command::<Value>(
            Method::POST,
            &format!("/element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    /// Press one key against the currently focused context.
    pub async fn press_key(&self, key: &str) -> Result<(), AdapterError> {
        self.command::<Value>(
            Method::POST,
            "/actions",
            Some(json!({
                "actions": [{
                    "type": "key",
                    "id": "keyboard",
                    "actions": [
                        { "type": "keyDown", "value": key },
                        { "type": "keyUp", "value": key }
                    ]
                }]
            })),
        )
        .await?;
        Ok(())
    }

    /// Run a synchronous script in the page, returning its JSON result.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        script: &str,
        args: Vec<Value>,
    ) -> Result<T, AdapterError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// Tear the session (and its browser process) down.
    pub async fn close(self) -> Result<(), AdapterError> {
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        let response = self.client.request(Method::DELETE, url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Re-probe `probe` until it yields a value or `timeout` elapses.
///
/// This is the one wait primitive behind every bounded browser wait: selector
/// existence, dropdown population and results-panel polling all go through
/// here, so no browser step can block indefinitely.
pub async fn poll_until<T, F, Fut>(
    what: &'static str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, AdapterError>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(AdapterError::Timeout(what));
        }
        tokio::time::sleep(interval).await;
    }
}
