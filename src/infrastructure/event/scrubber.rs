//! PII scrubbing of event properties
//!
//! Heuristic and fail-open: a key or value that matches none of the patterns
//! passes through unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::event::ExperimentEvent;

/// Replacement for redacted string values
pub const REDACTED: &str = "[REDACTED]";

/// Key tokens that identify a person on their own
const PII_KEY_TOKENS: &[&str] = &[
    "name",
    "firstname",
    "lastname",
    "fullname",
    "username",
    "displayname",
    "ip",
    "ipaddr",
];

/// Substrings that mark a key as PII wherever they appear
const PII_KEY_FRAGMENTS: &[&str] = &["email", "e-mail", "phone", "address", "user_id", "userid"];

/// Email anywhere inside a string
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

/// Run of 9+ digits anywhere inside a string, optionally split by single
/// spaces or dashes
static LONG_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\+?\d(?:[ -]?\d){8,}\b").unwrap());

/// Removes personally identifying data from events before aggregation
#[derive(Debug, Clone, Copy, Default)]
pub struct EventScrubber;

impl EventScrubber {
    pub fn new() -> Self {
        Self
    }

    /// Return the event with PII keys removed and PII values redacted
    pub fn scrub(&self, mut event: ExperimentEvent) -> ExperimentEvent {
        if let Some(properties) = event.properties.take() {
            event.properties = Some(scrub_map(properties));
        }
        event
    }

    /// Check whether a property key names personal data
    pub fn is_pii_key(key: &str) -> bool {
        let lower = key.to_ascii_lowercase();

        if PII_KEY_FRAGMENTS.iter().any(|f| lower.contains(f)) {
            return true;
        }

        key_tokens(key)
            .iter()
            .any(|token| PII_KEY_TOKENS.contains(&token.as_str()))
    }

    /// Check whether a string value looks like personal data
    pub fn is_pii_value(value: &str) -> bool {
        EMAIL_PATTERN.is_match(value) || LONG_NUMBER_PATTERN.is_match(value)
    }
}

/// Lowercase words of a key, split at separators and at camelCase humps
/// (`clientIP` gives `client`, `ip`)
fn key_tokens(key: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut after_lower = false;

    for c in key.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            after_lower = false;
            continue;
        }

        if c.is_ascii_uppercase() && after_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }

        current.push(c.to_ascii_lowercase());
        after_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn scrub_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(key, _)| !EventScrubber::is_pii_key(key))
        .map(|(key, value)| (key, scrub_value(value)))
        .collect()
}

fn scrub_value(value: Value) -> Value {
    match value {
        Value::String(s) if EventScrubber::is_pii_value(&s) => Value::String(REDACTED.to_string()),
        Value::Object(map) => Value::Object(scrub_map(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(scrub_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::experiment::{ExperimentId, VariantId};
    use serde_json::json;

    fn event() -> ExperimentEvent {
        ExperimentEvent::new(
            ExperimentId::new("exp-1").unwrap(),
            VariantId::new("control").unwrap(),
            "session-1",
            "page_views",
        )
    }

    #[test]
    fn test_removes_pii_keys() {
        let scrubbed = EventScrubber::new().scrub(
            event()
                .with_property("Email", "a@b.com")
                .with_property("first_name", "Ada")
                .with_property("phone_number", "555")
                .with_property("billingAddress", "Main St")
                .with_property("ip", "10.0.0.1")
                .with_property("external_user_id", "u-1")
                .with_property("page", "/checkout"),
        );

        let properties = scrubbed.properties.unwrap();
        assert_eq!(properties.len(), 1);
        assert_eq!(properties["page"], "/checkout");
    }

    #[test]
    fn test_redacts_pii_values() {
        let scrubbed = EventScrubber::new().scrub(
            event()
                .with_property("note", "contact ada@example.com")
                .with_property("ref", "4111 1111 1111 1111")
                .with_property("code", "123-456-789")
                .with_property("short", "12345")
                .with_property("date", "2024-01-15"),
        );

        let properties = scrubbed.properties.unwrap();
        assert_eq!(properties["note"], REDACTED);
        assert_eq!(properties["ref"], REDACTED);
        assert_eq!(properties["code"], REDACTED);
        assert_eq!(properties["short"], "12345");
        assert_eq!(properties["date"], "2024-01-15");
    }

    #[test]
    fn test_removes_camel_case_pii_keys() {
        let scrubbed = EventScrubber::new().scrub(
            event()
                .with_property("clientIp", "10.0.0.1")
                .with_property("remoteIP", "10.0.0.2")
                .with_property("customerName", "Ada")
                .with_property("contactName", "Grace")
                .with_property("userName", "ada")
                .with_property("filename", "report.pdf")
                .with_property("shipping", "express"),
        );

        let properties = scrubbed.properties.unwrap();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties["filename"], "report.pdf");
        assert_eq!(properties["shipping"], "express");
    }

    #[test]
    fn test_key_tokens_split_at_humps_and_separators() {
        assert_eq!(key_tokens("clientIP"), vec!["client", "ip"]);
        assert_eq!(key_tokens("customer_fullName"), vec!["customer", "full", "name"]);
        assert_eq!(key_tokens("IPAddr"), vec!["ipaddr"]);
        assert_eq!(key_tokens("filename"), vec!["filename"]);
    }

    #[test]
    fn test_redacts_long_numbers_inside_text() {
        let scrubbed = EventScrubber::new().scrub(
            event()
                .with_property("payment", "card 4111111111111111")
                .with_property("note", "call 555-123-4567 x")
                .with_property("intl", "reach me at +44 20 7946 0958 today")
                .with_property("order", "order 12345 shipped")
                .with_property("when", "placed on 2024-01-15 at noon"),
        );

        let properties = scrubbed.properties.unwrap();
        assert_eq!(properties["payment"], REDACTED);
        assert_eq!(properties["note"], REDACTED);
        assert_eq!(properties["intl"], REDACTED);
        assert_eq!(properties["order"], "order 12345 shipped");
        assert_eq!(properties["when"], "placed on 2024-01-15 at noon");
    }

    #[test]
    fn test_scrubs_nested_values() {
        let scrubbed = EventScrubber::new().scrub(event().with_property(
            "context",
            json!({
                "device": "mobile",
                "contact": {"email": "x@y.io", "locale": "en"},
                "refs": ["ok", "987654321"]
            }),
        ));

        let properties = scrubbed.properties.unwrap();
        assert_eq!(
            properties["context"],
            json!({
                "device": "mobile",
                "contact": {"locale": "en"},
                "refs": ["ok", REDACTED]
            })
        );
    }

    #[test]
    fn test_leaves_non_pii_untouched() {
        let original = event()
            .with_value(3.5)
            .with_property("shipping", "express")
            .with_property("tip", 2)
            .with_property("filename", "report.pdf");

        let scrubbed = EventScrubber::new().scrub(original.clone());
        assert_eq!(scrubbed, original);
    }

    #[test]
    fn test_event_without_properties() {
        let original = event();
        assert_eq!(EventScrubber::new().scrub(original.clone()), original);
    }
}
