//! Action receipts: the outcome of a service-layer action, independent of HTTP.
//!
//! A receipt is converted into a [`ProblemDetails`](crate::problem::ProblemDetails)
//! payload at the web boundary and can be read back from one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field name -> list of validation messages.
pub type ErrorMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ActionOutcome {
    Success,
    NotFound,
    Exception,
    #[default]
    Unknown,
}

impl ActionOutcome {
    pub fn status_code(self) -> u16 {
        match self {
            Self::Success => 200,
            Self::NotFound => 404,
            Self::Exception | Self::Unknown => 500,
        }
    }

    /// Title used when a receipt is rendered as an HTTP response.
    pub fn title(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::NotFound => "Not Found",
            Self::Exception => "Exception",
            Self::Unknown => "Unknown Error",
        }
    }

    /// Inverse of [`status_code`](Self::status_code). A 500 always reads back as
    /// `Exception`; `Unknown` is not recoverable from a status alone.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(200) => Self::Success,
            Some(404) => Self::NotFound,
            _ => Self::Exception,
        }
    }
}

/// A key/value note attached to a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoEntry {
    pub key: String,
    pub value: String,
}

impl InfoEntry {
    pub const AFFECTED_TOTAL: &'static str = "AffectedTotal";
    pub const SERVICE_ID: &'static str = "ServiceId";
    pub const IDENTIFIER: &'static str = "Identifier";
    pub const API_KEY: &'static str = "ApiKey";
    pub const MESSAGE: &'static str = "Message";

    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionReceipt {
    pub outcome: ActionOutcome,
    pub affected_total: u64,
    pub info_entries: Vec<InfoEntry>,
    pub errors: ErrorMap,
}

impl ActionReceipt {
    pub fn new(outcome: ActionOutcome) -> Self {
        Self { outcome, ..Self::default() }
    }

    /// Successful receipt; the affected total is also recorded as an info entry
    /// so it survives a round trip through problem details.
    pub fn success(affected_total: u64) -> Self {
        Self::new(ActionOutcome::Success).with_affected_total(affected_total)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ActionOutcome::NotFound).with_info(InfoEntry::MESSAGE, message)
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self::new(ActionOutcome::Exception).with_info(InfoEntry::MESSAGE, message)
    }

    pub fn with_affected_total(mut self, total: u64) -> Self {
        self.affected_total = total;
        self.info_entries.retain(|e| e.key != InfoEntry::AFFECTED_TOTAL);
        self.info_entries.push(InfoEntry::new(InfoEntry::AFFECTED_TOTAL, total.to_string()));
        self
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info_entries.push(InfoEntry::new(key, value));
        self
    }

    pub fn with_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.entry(field.into()).or_default().push(message.into());
        self
    }

    pub fn with_errors(mut self, errors: ErrorMap) -> Self {
        for (field, messages) in errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self
    }

    pub fn info(&self, key: &str) -> Option<&str> {
        self.info_entries.iter().find(|e| e.key == key).map(|e| e.value.as_str())
    }
}
