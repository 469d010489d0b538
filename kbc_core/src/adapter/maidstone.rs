//! Maidstone: headless-browser automation.
//!
//! The bin-day form lives inside an iframe, populates its address dropdown
//! from keystroke events and renders results asynchronously, so there is no
//! request to replay. The adapter walks the form in a real browser via
//! [`crate::browser`]: type the postcode with per-character pacing (the
//! autocomplete ignores pasted input), force the dropdown open, pick the
//! matching address and scrape the collection panels once they settle.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::SourceAdapter;
use crate::browser::{poll_until, BrowserSession, WebDriverClient, KEY_ARROW_DOWN, KEY_TAB};
use crate::error::AdapterError;
use crate::normalize::parse_numeric_date;
use crate::schedule::ScheduleEntry;

const DEFAULT_FORM_URL: &str = "https://my.maidstone.gov.uk/service/Find-your-bin-day";
const FRAME_SELECTOR: &str = "iframe#fillform-frame-1";
const POSTCODE_SELECTOR: &str = r#"input[name="postcode"]"#;
/// Phrase that marks a populated results panel.
const PANEL_MARKER: &str = "Next collection";

const FRAME_TIMEOUT: Duration = Duration::from_secs(30);
const POSTCODE_TIMEOUT: Duration = Duration::from_secs(60);
const PANEL_TIMEOUT: Duration = Duration::from_secs(20);
const PANEL_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Pacing between typed characters; the autocomplete needs real keystrokes.
const TYPE_DELAY: Duration = Duration::from_millis(50);
const AUTOCOMPLETE_SETTLE: Duration = Duration::from_secs(5);
const DROPDOWN_SETTLE: Duration = Duration::from_secs(1);
/// The results panels keep filling in after they first appear.
const PANEL_SETTLE: Duration = Duration::from_secs(5);

const OPTION_TEXTS_SCRIPT: &str =
    "return Array.from(document.querySelectorAll('div')).map(el => el.textContent || '');";
const CLICK_OPTION_SCRIPT: &str =
    "var els = document.querySelectorAll('div'); if (els[arguments[0]]) { els[arguments[0]].click(); }";
const PANELS_SCRIPT: &str = "return Array.from(document.querySelectorAll('div.col-collection-panel')).map(panel => ({\
        header: (panel.querySelector('h3.collectionDataHeader') || {}).textContent || '',\
        items: Array.from(panel.querySelectorAll('ul li')).map(li => li.textContent || '')\
    }));";

#[derive(Debug, Deserialize)]
struct Panel {
    header: String,
    items: Vec<String>,
}

pub struct Maidstone {
    webdriver: WebDriverClient,
    form_url: String,
}

impl Maidstone {
    pub fn new(webdriver_url: &str) -> Self {
        Self::with_urls(webdriver_url, DEFAULT_FORM_URL)
    }

    /// Override both endpoints (tests point them at mock servers).
    pub fn with_urls(webdriver_url: &str, form_url: &str) -> Self {
        Self {
            webdriver: WebDriverClient::new(webdriver_url),
            form_url: form_url.to_string(),
        }
    }

    async fn run(
        &self,
        session: &BrowserSession,
        postcode: &str,
        property: &str,
    ) -> Result<Vec<ScheduleEntry>, AdapterError> {
        session.navigate(&self.form_url).await?;

        let frame = session
            .wait_for_element(FRAME_SELECTOR, "form frame", FRAME_TIMEOUT)
            .await?;
        session.switch_to_frame(&frame).await?;

        let postcode_input = session
            .wait_for_element(POSTCODE_SELECTOR, "postcode input", POSTCODE_TIMEOUT)
            .await?;
        for character in postcode.chars() {
            session
                .send_keys(&postcode_input, &character.to_string())
                .await?;
            tokio::time::sleep(TYPE_DELAY).await;
        }
        tokio::time::sleep(AUTOCOMPLETE_SETTLE).await;

        // Tab then Down forces the autocomplete list open.
        session.press_key(KEY_TAB).await?;
        session.press_key(KEY_ARROW_DOWN).await?;
        tokio::time::sleep(DROPDOWN_SETTLE).await;

        let texts: Vec<String> = session.execute(OPTION_TEXTS_SCRIPT, vec![]).await?;
        let index = texts
            .iter()
            .position(|text| option_matches(text, property))
            .ok_or_else(|| {
                AdapterError::NotFound(format!("no address option matching property {property}"))
            })?;
        session
            .execute::<serde_json::Value>(CLICK_OPTION_SCRIPT, vec![json!(index)])
            .await?;

        poll_until(
            "collection results",
            PANEL_TIMEOUT,
            PANEL_POLL_INTERVAL,
            || async {
                let panels: Vec<Panel> = session.execute(PANELS_SCRIPT, vec![]).await?;
                let populated = panels
                    .iter()
                    .any(|panel| panel.items.iter().any(|item| item.contains(PANEL_MARKER)));
                Ok(populated.then_some(()))
            },
        )
        .await?;
        tokio::time::sleep(PANEL_SETTLE).await;

        let panels: Vec<Panel> = session.execute(PANELS_SCRIPT, vec![]).await?;
        Ok(parse_panels(&panels))
    }
}

/// Match a dropdown option against the requested property identifier.
///
/// The identifier must sit on its own word boundary: preceded by a space or
/// the start of the text, and followed by a space, a comma or the end. A bare
/// "1" therefore never claims "10 High Street".
fn option_matches(text: &str, identifier: &str) -> bool {
    if identifier.is_empty() {
        return false;
    }
    for (start, _) in text.match_indices(identifier) {
        let preceded = start == 0 || text[..start].ends_with(' ');
        let end = start + identifier.len();
        let followed =
            end == text.len() || text[end..].starts_with(' ') || text[end..].starts_with(',');
        if preceded && followed {
            return true;
        }
    }
    false
}

fn parse_panels(panels: &[Panel]) -> Vec<ScheduleEntry> {
    let marker_regex = Regex::new(&format!(r"{PANEL_MARKER}[:\s]*(\d{{2}}/\d{{2}}/\d{{4}})")).unwrap();
    let mut entries = Vec::new();
    for panel in panels {
        let collection_type = panel.header.trim();
        if collection_type.is_empty() {
            continue;
        }
        for item in &panel.items {
            let Some(captures) = marker_regex.captures(item) else {
                continue;
            };
            let Some(date) = parse_numeric_date(&captures[1]) else {
                continue;
            };
            entries.push(ScheduleEntry {
                collection_type: collection_type.to_string(),
                date,
            });
        }
    }
    entries
}

#[async_trait]
impl SourceAdapter for Maidstone {
    fn id(&self) -> &'static str {
        "maidstone"
    }

    fn name(&self) -> &'static str {
        "Maidstone"
    }

    async fn fetch_schedule(
        &self,
        postcode: &str,
        property: &str,
    ) -> Result<Vec<ScheduleEntry>, AdapterError> {
        let session = self.webdriver.new_session().await?;
        // The browser process must be released whatever happens in run().
        let result = self.run(&session, postcode, property).await;
        if let Err(err) = session.close().await {
            tracing::warn!(error = %err, "failed to release browser session");
        }
        result
    }
}
