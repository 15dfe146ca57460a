//! Sheet and column names per logical table.
//!
//! Lookup code resolves columns by these names through the header row, so a
//! renamed column only needs a config change.

use serde::{Deserialize, Serialize};

/// Sheet layout for all logical tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub requests: RequestColumns,
    #[serde(default)]
    pub riders: RiderColumns,
    #[serde(default)]
    pub assignments: AssignmentColumns,
    #[serde(default)]
    pub settings: SettingsColumns,
}

impl SheetsConfig {
    /// All configured sheet names, in table order.
    pub fn sheet_names(&self) -> [&str; 4] {
        [&self.requests.sheet, &self.riders.sheet, &self.assignments.sheet, &self.settings.sheet]
    }
}

fn s(v: &str) -> String {
    v.to_string()
}

/// Escort requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestColumns {
    pub sheet: String,
    pub id: String,
    pub date: String,
    pub requester: String,
    pub start_location: String,
    pub end_location: String,
    pub riders_needed: String,
    pub status: String,
    pub notes: String,
}

impl Default for RequestColumns {
    fn default() -> Self {
        Self {
            sheet: s("Requests"),
            id: s("Request ID"),
            date: s("Date"),
            requester: s("Requester"),
            start_location: s("Start Location"),
            end_location: s("End Location"),
            riders_needed: s("Riders Needed"),
            status: s("Status"),
            notes: s("Notes"),
        }
    }
}

impl RequestColumns {
    /// Header row written when the sheet is created.
    pub fn header(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.date.clone(),
            self.requester.clone(),
            self.start_location.clone(),
            self.end_location.clone(),
            self.riders_needed.clone(),
            self.status.clone(),
            self.notes.clone(),
        ]
    }
}

/// Rider roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiderColumns {
    pub sheet: String,
    pub name: String,
    pub id: String,
    pub status: String,
    pub phone: String,
    pub email: String,
    /// Status values (compared case-insensitively) that count a rider as active.
    pub active_statuses: Vec<String>,
}

impl Default for RiderColumns {
    fn default() -> Self {
        Self {
            sheet: s("Riders"),
            name: s("Full Name"),
            id: s("Rider ID"),
            status: s("Status"),
            phone: s("Phone"),
            email: s("Email"),
            active_statuses: vec![s("Active")],
        }
    }
}

impl RiderColumns {
    pub fn header(&self) -> Vec<String> {
        vec![self.name.clone(), self.id.clone(), self.status.clone(), self.phone.clone(), self.email.clone()]
    }
}

/// Rider-to-request assignments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentColumns {
    pub sheet: String,
    pub id: String,
    pub request_id: String,
    pub rider_name: String,
    pub status: String,
    pub event_date: String,
}

impl Default for AssignmentColumns {
    fn default() -> Self {
        Self {
            sheet: s("Assignments"),
            id: s("Assignment ID"),
            request_id: s("Request ID"),
            rider_name: s("Rider Name"),
            status: s("Status"),
            event_date: s("Event Date"),
        }
    }
}

impl AssignmentColumns {
    pub fn header(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.request_id.clone(),
            self.rider_name.clone(),
            self.status.clone(),
            self.event_date.clone(),
        ]
    }
}

/// Key/value application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsColumns {
    pub sheet: String,
    pub key: String,
    pub value: String,
}

impl Default for SettingsColumns {
    fn default() -> Self {
        Self { sheet: s("Settings"), key: s("Key"), value: s("Value") }
    }
}

impl SettingsColumns {
    pub fn header(&self) -> Vec<String> {
        vec![self.key.clone(), self.value.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_headers() {
        let sheets = SheetsConfig::default();
        assert_eq!(sheets.riders.header(), vec!["Full Name", "Rider ID", "Status", "Phone", "Email"]);
        assert_eq!(sheets.settings.header(), vec!["Key", "Value"]);
        assert_eq!(sheets.requests.header().len(), 8);
    }

    #[test]
    fn test_sheet_names_order() {
        let sheets = SheetsConfig::default();
        assert_eq!(sheets.sheet_names(), ["Requests", "Riders", "Assignments", "Settings"]);
    }

    #[test]
    fn test_partial_table_override_keeps_defaults() {
        let riders: RiderColumns = serde_json::from_str(r#"{"name": "Rider"}"#).unwrap();
        assert_eq!(riders.name, "Rider");
        assert_eq!(riders.sheet, "Riders");
        assert_eq!(riders.active_statuses, vec!["Active"]);
    }
}
