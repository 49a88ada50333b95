use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One API consumer: identity, label and credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub service_id: Uuid,
    pub service_name: String,
    pub api_key: String,
}

impl Service {
    pub const IDENTIFIER_PREFIX: &'static str = "Api-Service-";
    const MASK_PREFIX_MAX: usize = 8;
    const MASK_VISIBLE: usize = 4;

    pub fn new(service_id: Uuid, service_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { service_id, service_name: service_name.into(), api_key: api_key.into() }
    }

    /// Lookup identifier derived from the current name. Renaming a service
    /// changes it.
    pub fn identifier(&self) -> String {
        Self::identifier_for(&self.service_name)
    }

    pub fn identifier_for(service_name: &str) -> String {
        format!("{}{}", Self::IDENTIFIER_PREFIX, service_name)
    }

    pub fn has_identifier(&self, identifier: &str) -> bool {
        identifier
            .strip_prefix(Self::IDENTIFIER_PREFIX)
            .is_some_and(|name| name == self.service_name)
    }

    /// Key prefix (up to and including the first `-`, when short) plus at
    /// most [`MASK_VISIBLE`](Self::MASK_VISIBLE) characters of the body, and
    /// never more than a quarter of the body.
    pub fn masked_key(&self) -> String {
        let (prefix, body) = match self.api_key.split_once('-') {
            Some((tag, body)) if tag.chars().count() <= Self::MASK_PREFIX_MAX => {
                (&self.api_key[..tag.len() + 1], body)
            }
            _ => ("", self.api_key.as_str()),
        };
        let visible = (body.chars().count() / 4).min(Self::MASK_VISIBLE);
        let head: String = body.chars().take(visible).collect();
        format!("{prefix}{head}…")
    }

    pub fn view(&self) -> ServiceView {
        ServiceView {
            service_id: self.service_id,
            service_name: self.service_name.clone(),
            identifier: self.identifier(),
            api_key_hint: self.masked_key(),
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("service_id", &self.service_id)
            .field("service_name", &self.service_name)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl From<models::service_key::Model> for Service {
    fn from(m: models::service_key::Model) -> Self {
        Self { service_id: m.service_id, service_name: m.service_name, api_key: m.api_key }
    }
}

impl From<&Service> for models::service_key::Model {
    fn from(s: &Service) -> Self {
        Self { service_id: s.service_id, service_name: s.service_name.clone(), api_key: s.api_key.clone() }
    }
}

/// Listing shape: the key itself is never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceView {
    pub service_id: Uuid,
    pub service_name: String,
    pub identifier: String,
    pub api_key_hint: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn billing() -> Service {
        Service::new(Uuid::nil(), "Billing", "JGP-abcdefghijklmnop")
    }

    #[test]
    fn identifier_tracks_name() {
        let mut s = billing();
        assert_eq!(s.identifier(), "Api-Service-Billing");
        assert!(s.has_identifier("Api-Service-Billing"));
        s.service_name = "Invoicing".into();
        assert_eq!(s.identifier(), "Api-Service-Invoicing");
        assert!(!s.has_identifier("Api-Service-Billing"));
        assert!(!s.has_identifier("Invoicing"));
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", billing());
        assert!(rendered.contains("Billing"));
        assert!(!rendered.contains("abcdefgh"));
    }

    #[test]
    fn view_masks_key() {
        let v = billing().view();
        assert_eq!(v.api_key_hint, "JGP-abcd…");
        assert_eq!(v.identifier, "Api-Service-Billing");

        let short = Service::new(Uuid::nil(), "x", "ab").view();
        assert_eq!(short.api_key_hint, "…");
    }

    #[test]
    fn mask_never_exposes_more_than_four_body_characters() {
        let eight = Service::new(Uuid::nil(), "x", "abcdefgh");
        assert_eq!(eight.masked_key(), "ab…");

        let long = Service::new(Uuid::nil(), "x", format!("JGP-{}", "z".repeat(200)));
        assert_eq!(long.masked_key(), "JGP-zzzz…");

        let no_tag = Service::new(Uuid::nil(), "x", "averylongprefixwithoutdash-abcdefghijklmnop");
        assert!(!no_tag.masked_key().contains("averylongp"));
    }

    #[test]
    fn converts_to_and_from_rows() {
        let s = billing();
        let row: models::service_key::Model = (&s).into();
        assert_eq!(Service::from(row), s);
    }
}
