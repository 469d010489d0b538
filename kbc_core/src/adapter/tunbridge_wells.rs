//! Tunbridge Wells: a session-authenticated JSON API.
//!
//! The council's AchieveForms backend wants a two-step dance: hit the auth
//! endpoint to mint a session id plus cookies, then POST a lookup request
//! with both attached. Field names in the payloads are opaque keys lifted
//! from the form definition; they are contract, not documentation.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, REFERER, SET_COOKIE, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapter::{AddressLookup, SourceAdapter};
use crate::error::AdapterError;
use crate::normalize::parse_numeric_date;
use crate::schedule::{PropertyAddress, ScheduleEntry};

const DEFAULT_BASE_URL: &str = "https://mytwbc.tunbridgewells.gov.uk";
const AUTH_PATH: &str = "/authapi/isauthenticated";
const API_PATH: &str = "/apibroker/runLookup";
const HOSTNAME: &str = "mytwbc.tunbridgewells.gov.uk";
const FORM_URI: &str = "sandbox-publish://AF-Process-e01af4d4-eb0f-4cfe-a5ac-c47b63f017ed/AF-Stage-88caf66c-378f-4082-ad1d-07b7a850af38/definition.json";
const PROCESS_ID: &str = "AF-Process-e01af4d4-eb0f-4cfe-a5ac-c47b63f017ed";
const SCHEDULE_LOOKUP_ID: &str = "6314720683f30";
const ADDRESS_LOOKUP_ID: &str = "5bd2ca3b8e498";
const BROWSER_UA: &str = "Mozilla/5.0";

struct Session {
    id: String,
    cookies: String,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(rename = "auth-session")]
    auth_session: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    integration: Integration<T>,
}

#[derive(Deserialize)]
struct Integration<T> {
    transformed: Transformed<T>,
}

#[derive(Deserialize)]
struct Transformed<T> {
    rows_data: HashMap<String, T>,
}

#[derive(Deserialize)]
struct ScheduleRow {
    #[serde(rename = "collectionType")]
    collection_type: Option<String>,
    #[serde(rename = "nextDateUnformatted")]
    next_date: Option<String>,
}

#[derive(Deserialize)]
struct AddressRow {
    #[serde(rename = "UPRN")]
    uprn: Option<String>,
    #[serde(rename = "FullAddress")]
    full_address: Option<String>,
}

pub struct TunbridgeWells {
    client: Client,
    base_url: String,
}

impl TunbridgeWells {
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

    async fn establish_session(&self) -> Result<Session, AdapterError> {
        let uri = format!(
            "{}/AchieveForms/?mode=fill&consentMessage=yes&form_uri={FORM_URI}&process=1&process_uri=sandbox-processes://{PROCESS_ID}&process_id={PROCESS_ID}",
            self.base_url
        );
        let response = self
            .client
            .get(format!("{}{AUTH_PATH}", self.base_url))
            .query(&[
                ("uri", uri.as_str()),
                ("hostname", HOSTNAME),
                ("withCredentials", "true"),
            ])
            .header(USER_AGENT, BROWSER_UA)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Auth(status.as_u16()));
        }
        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .collect::<Vec<_>>()
            .join("; ");
        let body: AuthResponse = response
            .json()
            .await
            .map_err(|err| AdapterError::Parse(err.to_string()))?;
        Ok(Session {
            id: body.auth_session,
            cookies,
        })
    }

    async fn run_lookup<T: DeserializeOwned>(
        &self,
        session: &Session,
        query: &[(&str, &str)],
        form_values: Value,
    ) -> Result<HashMap<String, T>, AdapterError> {
        let response = self
            .client
            .post(format!("{}{API_PATH}", self.base_url))
            .query(query)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, BROWSER_UA)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(
                REFERER,
                format!("{}/fillform/?iframe_id=fillform-frame-1&db_id=", self.base_url),
            )
            .header(COOKIE, session.cookies.clone())
            .json(&json!({ "formValues": form_values }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status(status.as_u16()));
        }
        let body: Envelope<T> = response
            .json()
            .await
            .map_err(|err| AdapterError::Parse(err.to_string()))?;
        Ok(body.integration.transformed.rows_data)
    }
}

impl Default for TunbridgeWells {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for TunbridgeWells {
    fn id(&self) -> &'static str {
        "tunbridge-wells"
    }

    fn name(&self) -> &'static str {
        "Tunbridge Wells"
    }

    async fn fetch_schedule(
        &self,
        _postcode: &str,
        property: &str,
    ) -> Result<Vec<ScheduleEntry>, AdapterError> {
        let session = self.establish_session().await?;
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let rows: HashMap<String, ScheduleRow> = self
            .run_lookup(
                &session,
                &[
                    ("id", SCHEDULE_LOOKUP_ID),
                    ("repeat_against", ""),
                    ("noRetry", "false"),
                    ("getOnlyTokens", "undefined"),
                    ("log_id", ""),
                    ("app_name", "AF-Renderer::Self"),
                    ("_", timestamp.as_str()),
                    ("sid", session.id.as_str()),
                ],
                json!({ "Property": { "siteReference": { "value": property } } }),
            )
            .await?;
        let entries = rows
            .into_values()
            .filter_map(|row| {
                let collection_type = row.collection_type?;
                let date = parse_numeric_date(&row.next_date?)?;
                Some(ScheduleEntry {
                    collection_type,
                    date,
                })
            })
            .collect();
        Ok(entries)
    }

    fn address_lookup(&self) -> Option<&dyn AddressLookup> {
        Some(self)
    }
}

#[async_trait]
impl AddressLookup for TunbridgeWells {
    async fn lookup_addresses(
        &self,
        postcode: &str,
    ) -> Result<Vec<PropertyAddress>, AdapterError> {
        let session = self.establish_session().await?;
        let rows: HashMap<String, AddressRow> = self
            .run_lookup(
                &session,
                &[
                    ("id", ADDRESS_LOOKUP_ID),
                    ("repeat_against", ""),
                    ("noCache", "true"),
                    ("sid", session.id.as_str()),
                ],
                json!({ "Property": { "searchPostcode": { "value": postcode } } }),
            )
            .await?;
        let mut addresses: Vec<PropertyAddress> = rows
            .into_values()
            .filter_map(|row| {
                Some(PropertyAddress {
                    identifier: row.uprn?,
                    display_text: row.full_address?,
                })
            })
            .collect();
        addresses.sort_by(|a, b| a.display_text.cmp(&b.display_text));
        Ok(addresses)
    }
}
