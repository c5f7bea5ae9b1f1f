//! Webhook events as they travel from the ingestion boundary to the worker.
//!
//! An event is never mutated once created. Its identity is the pair
//! `(resourceId, eventDateUtc)`: the same resource legitimately produces many
//! events over time, but a redelivery of one notification carries the same
//! pair and must collapse into a single queue entry.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::{InvoiceId, ResourceId, TenantId};

/// The kind of change the event describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Create,
    Update,
    /// Anything the platform adds later; kept verbatim so it survives the queue file.
    Other(String),
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => EventType::Create,
            "UPDATE" => EventType::Update,
            _ => EventType::Other(s),
        }
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Create => "CREATE".to_string(),
            EventType::Update => "UPDATE".to_string(),
            EventType::Other(s) => s,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Create => write!(f, "CREATE"),
            EventType::Update => write!(f, "UPDATE"),
            EventType::Other(s) => write!(f, "{}", s),
        }
    }
}

/// The kind of entity the event is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventCategory {
    Invoice,
    Contact,
    Other(String),
}

impl From<String> for EventCategory {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "INVOICE" => EventCategory::Invoice,
            "CONTACT" => EventCategory::Contact,
            _ => EventCategory::Other(s),
        }
    }
}

impl From<EventCategory> for String {
    fn from(c: EventCategory) -> Self {
        match c {
            EventCategory::Invoice => "INVOICE".to_string(),
            EventCategory::Contact => "CONTACT".to_string(),
            EventCategory::Other(s) => s,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventCategory::Invoice => write!(f, "INVOICE"),
            EventCategory::Contact => write!(f, "CONTACT"),
            EventCategory::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Identity of an event inside the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub resource_id: ResourceId,
    pub event_date_utc: DateTime<Utc>,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.resource_id, self.event_date_utc.to_rfc3339())
    }
}

/// One webhook notification.
///
/// Field names follow the platform's camelCase payload so the same type is
/// used to parse inbound payloads and to persist the queue file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub resource_id: ResourceId,
    pub event_type: EventType,
    pub event_category: EventCategory,
    pub tenant_id: TenantId,
    #[serde(with = "event_date")]
    pub event_date_utc: DateTime<Utc>,
    #[serde(rename = "resourceUrl", alias = "resourceUri")]
    pub resource_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_type: Option<String>,
}

impl WebhookEvent {
    /// Returns the identity key used for queue deduplication.
    pub fn key(&self) -> EventKey {
        EventKey {
            resource_id: self.resource_id.clone(),
            event_date_utc: self.event_date_utc,
        }
    }

    /// Returns true if both events have the same `(resourceId, eventDateUtc)`.
    pub fn same_key(&self, other: &WebhookEvent) -> bool {
        self.resource_id == other.resource_id && self.event_date_utc == other.event_date_utc
    }

    /// Extracts the entity id from the last path segment of `resource_uri`.
    pub fn entity_id(&self) -> Result<InvoiceId, InvalidResourceUri> {
        extract_entity_id(&self.resource_uri)
    }
}

/// Error returned when a resource URL has no usable trailing path segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot extract entity id from resource URL: {0:?}")]
pub struct InvalidResourceUri(pub String);

/// Extracts the entity id from the last path segment of a resource URL.
///
/// Query strings and fragments are ignored, as is a single trailing slash.
/// The URL must contain at least one `/` so that a bare word is not mistaken
/// for an id.
pub fn extract_entity_id(uri: &str) -> Result<InvoiceId, InvalidResourceUri> {
    let invalid = || InvalidResourceUri(uri.to_string());

    let path = uri.split(['?', '#']).next().unwrap_or_default().trim();
    let path = path.strip_suffix('/').unwrap_or(path);
    let (_, last) = path.rsplit_once('/').ok_or_else(invalid)?;

    if last.is_empty() || last.contains(char::is_whitespace) {
        return Err(invalid());
    }

    Ok(InvoiceId::new(last))
}

/// Serde helpers for `eventDateUtc`.
///
/// The platform sends timestamps without a zone designator
/// (`2024-06-21T01:15:39.902`), which are UTC by contract. Full RFC 3339 is
/// accepted too, and timestamps are always written back as RFC 3339.
mod event_date {
    use super::*;
    use serde::{Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(
        date: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid eventDateUtc: {raw:?}")))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
