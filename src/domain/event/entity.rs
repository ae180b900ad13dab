//! Experiment event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::experiment::{ExperimentId, VariantId};

/// Unique identifier for an ingested event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique ID
    pub fn generate() -> Self {
        Self(format!("evt-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One behavioral fact observed for a session inside an experiment.
///
/// `metric_id` is kept as the raw key sent by the caller: events for metrics
/// the registry does not know yet are still stored, only aggregation skips
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentEvent {
    pub id: EventId,
    pub experiment_id: ExperimentId,
    pub variant_id: VariantId,
    /// Anonymous session identifier
    pub session_id: String,
    pub metric_id: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

impl ExperimentEvent {
    /// Create a new event with a generated id and the current timestamp
    pub fn new(
        experiment_id: ExperimentId,
        variant_id: VariantId,
        session_id: impl Into<String>,
        metric_id: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            experiment_id,
            variant_id,
            session_id: session_id.into(),
            metric_id: metric_id.into(),
            event_type: "metric".to_string(),
            value: None,
            properties: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
