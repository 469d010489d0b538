//! The normalized schedule data model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single upcoming collection of one bin type.
///
/// The date is always canonical ISO (`YYYY-MM-DD`) regardless of how the
/// source encoded it; entries whose source date could not be parsed are
/// dropped before they get here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub collection_type: String,
    pub date: NaiveDate,
}

/// An address candidate returned by a source's postcode lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAddress {
    /// The key the source wants back when fetching a schedule (UPRN for the
    /// councils that use one).
    pub identifier: String,
    pub display_text: String,
}

/// Registry listing entry for one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub id: &'static str,
    pub name: &'static str,
}
