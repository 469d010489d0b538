//! Tonbridge & Malling: a stateless multipart form replay.
//!
//! The council's XForms page accepts a POST whose layout (anti-forgery token
//! included) never changes, so the whole browser interaction collapses into
//! one request. The response is an HTML results page carrying a table of
//! year-less textual dates.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::header::{CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use scraper::{Html, Selector};

use crate::adapter::SourceAdapter;
use crate::error::AdapterError;
use crate::normalize::parse_textual_date;
use crate::schedule::ScheduleEntry;

const DEFAULT_BASE_URL: &str = "https://www.tmbc.gov.uk";
const FORM_PATH: &str = "/xfp/form/167";
// The form's baked-in anti-forgery token and field ids; replayed verbatim.
const FORM_TOKEN: &str = "s_flSv1eIvJDeCwbFaYxclM3UTomdpWgg2cMWzZckaU";
const POSTCODE_FIELD: &str = "q752eec300b2ffef2757e4536b77b07061842041a_0_0";
const UPRN_FIELD: &str = "q752eec300b2ffef2757e4536b77b07061842041a_1_0";
const BOUNDARY: &str = "----WebKitFormBoundaryI1XYcX9fNeKxm4LB";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

pub struct TonbridgeMalling {
    client: Client,
    base_url: String,
}

impl TonbridgeMalling {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the adapter at a different host (tests use a mock server).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for TonbridgeMalling {
    fn default() -> Self {
        Self::new()
    }
}

fn build_form_body(postcode: &str, uprn: &str) -> String {
    let fields = [
        ("__token", FORM_TOKEN),
        ("page", "128"),
        ("locale", "en_GB"),
        (POSTCODE_FIELD, postcode),
        (UPRN_FIELD, uprn),
        ("next", "Next"),
    ];
    let mut lines = Vec::new();
    for (name, value) in fields {
        lines.push(format!("------{BOUNDARY}"));
        lines.push(format!(
            "Content-Disposition: form-data; name=\"{name}\""
        ));
        lines.push(String::new());
        lines.push(value.to_string());
    }
    lines.push(format!("------{BOUNDARY}--"));
    lines.join("\r\n")
}

/// Pull entries out of the results table.
///
/// Rows look like `<tr><td>Wed 15 January</td><td><div class="collections">
/// <p>Refuse</p><p>Food</p></div></td></tr>`, so one row can yield several
/// entries sharing a date. Missing or malformed markup yields nothing rather
/// than an error: an empty page and a moved table are indistinguishable here.
fn parse_collection_table(html: &str, today: NaiveDate) -> Vec<ScheduleEntry> {
    let row_selector = Selector::parse("table.waste-collections-table tbody tr").unwrap();
    let cell_selector = Selector::parse("td").unwrap();
    let type_selector = Selector::parse("p").unwrap();

    let document = Html::parse_document(html);
    let mut entries = Vec::new();
    for row in document.select(&row_selector) {
        let mut cells = row.select(&cell_selector);
        let Some(date_cell) = cells.next() else {
            continue;
        };
        let date_text = date_cell.text().collect::<String>();
        let Some(date) = parse_textual_date(date_text.trim(), today) else {
            continue;
        };
        let Some(types_cell) = cells.next() else {
            continue;
        };
        for paragraph in types_cell.select(&type_selector) {
            let collection_type = paragraph.text().collect::<String>().trim().to_string();
            if !collection_type.is_empty() {
                entries.push(ScheduleEntry {
                    collection_type,
                    date,
                });
            }
        }
    }
    entries
}

#[async_trait]
impl SourceAdapter for TonbridgeMalling {
    fn id(&self) -> &'static str {
        "tmbc"
    }

    fn name(&self) -> &'static str {
        "Tonbridge & Malling"
    }

    async fn fetch_schedule(
        &self,
        postcode: &str,
        property: &str,
    ) -> Result<Vec<ScheduleEntry>, AdapterError> {
        let response = self
            .client
            .post(format!("{}{FORM_PATH}", self.base_url))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary=----{BOUNDARY}"),
            )
            .header(USER_AGENT, BROWSER_UA)
            .header(ORIGIN, self.base_url.clone())
            .header(REFERER, format!("{}{FORM_PATH}", self.base_url))
            .body(build_form_body(postcode, property))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status(status.as_u16()));
        }
        let html = response.text().await?;
        Ok(parse_collection_table(&html, Local::now().date_naive()))
    }
}
