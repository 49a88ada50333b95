//! RFC 7807 style "problem details" payloads and their mapping to and from
//! [`ActionReceipt`]s.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::receipt::{ActionOutcome, ActionReceipt, ErrorMap, InfoEntry};

pub const ERROR_KEY: &str = "errors";
pub const INFORMATION_KEY: &str = "information";

const DEFAULT_TITLE: &str = "No Title";
const DEFAULT_TYPE: &str = "problem-details";
const VALIDATION_TITLE: &str = "One or more validation errors occurred.";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl ProblemDetails {
    pub fn new(status: u16, title: Option<&str>, kind: Option<&str>) -> Self {
        Self {
            kind: Some(kind.unwrap_or(DEFAULT_TYPE).to_string()),
            title: Some(title.unwrap_or(DEFAULT_TITLE).to_string()),
            status: Some(status),
            detail: None,
            extensions: Map::new(),
        }
    }

    /// 400 payload carrying field errors.
    pub fn validation(errors: ErrorMap) -> Self {
        let mut pd = Self::new(400, Some(VALIDATION_TITLE), None);
        pd.set_errors(&errors);
        pd
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Append an information entry. Blank keys and empty values are ignored, as
    /// is an `information` extension that is not a list.
    pub fn add_information(mut self, key: &str, value: &str) -> Self {
        self.push_information(key, value);
        self
    }

    /// Like [`add_information`](Self::add_information) but also rejects
    /// whitespace-only values.
    pub fn add_info_entry(self, entry: Option<&InfoEntry>) -> Self {
        match entry {
            Some(e) if !e.key.trim().is_empty() && !e.value.trim().is_empty() => {
                self.add_information(&e.key, &e.value)
            }
            _ => self,
        }
    }

    fn push_information(&mut self, key: &str, value: &str) {
        if key.trim().is_empty() || value.is_empty() {
            return;
        }
        let entry = serde_json::json!({ "key": key, "value": value });
        match self.extensions.get_mut(INFORMATION_KEY) {
            Some(Value::Array(items)) => items.push(entry),
            Some(_) => {}
            None => {
                self.extensions.insert(INFORMATION_KEY.to_string(), Value::Array(vec![entry]));
            }
        }
    }

    fn set_errors(&mut self, errors: &ErrorMap) {
        let value = serde_json::to_value(errors).unwrap_or_else(|_| Value::Object(Map::new()));
        self.extensions.insert(ERROR_KEY.to_string(), value);
    }

    /// Field errors carried in the `errors` extension; empty when absent or malformed.
    pub fn errors(&self) -> ErrorMap {
        self.extensions
            .get(ERROR_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Information entries carried in the `information` extension.
    pub fn information(&self) -> Vec<InfoEntry> {
        self.extensions
            .get(INFORMATION_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn to_action_receipt(&self) -> ActionReceipt {
        let info_entries = self.information();
        let affected_total = info_entries
            .iter()
            .find(|e| e.key == InfoEntry::AFFECTED_TOTAL)
            .and_then(|e| e.value.parse::<u64>().ok())
            .unwrap_or(0);

        ActionReceipt {
            outcome: ActionOutcome::from_status(self.status),
            affected_total,
            info_entries,
            errors: self.errors(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl ActionReceipt {
    pub fn to_problem_details(&self, title: Option<&str>, kind: Option<&str>) -> ProblemDetails {
        let mut pd = ProblemDetails::new(self.outcome.status_code(), title, kind);
        pd.set_errors(&self.errors);
        for entry in &self.info_entries {
            pd = pd.add_info_entry(Some(entry));
        }
        pd
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl IntoResponse for ActionReceipt {
    fn into_response(self) -> Response {
        self.to_problem_details(Some(self.outcome.title()), None).into_response()
    }
}
