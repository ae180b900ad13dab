//! In-memory implementation of the event repository

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::event::{EventId, EventQuery, EventRepository, ExperimentEvent};
use crate::domain::experiment::ExperimentId;
use crate::domain::DomainError;

#[derive(Debug)]
struct StoredEvent {
    sequence: u64,
    event: ExperimentEvent,
}

#[derive(Debug, Default)]
struct EventLog {
    events: HashMap<EventId, StoredEvent>,
    next_sequence: u64,
}

/// In-memory event repository with bounded retention
#[derive(Debug)]
pub struct InMemoryEventRepository {
    log: RwLock<EventLog>,
    max_events: usize,
}

impl InMemoryEventRepository {
    /// Create a new empty repository with default max events (100,000)
    pub fn new() -> Self {
        Self::with_max_events(100_000)
    }

    /// Create a repository with a custom retention limit
    pub fn with_max_events(max_events: usize) -> Self {
        Self {
            log: RwLock::new(EventLog::default()),
            max_events,
        }
    }

    /// Evict the oldest events if we're over the limit
    fn evict_if_needed(log: &mut EventLog, max_events: usize) {
        if log.events.len() <= max_events {
            return;
        }

        let mut entries: Vec<_> = log
            .events
            .iter()
            .map(|(k, v)| (k.clone(), v.event.timestamp, v.sequence))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        let to_remove = log.events.len() - max_events;

        for (id, _, _) in entries.into_iter().take(to_remove) {
            log.events.remove(&id);
        }
    }

    fn matching(log: &EventLog, query: &EventQuery) -> Vec<ExperimentEvent> {
        let mut results: Vec<_> = log
            .events
            .values()
            .filter(|stored| query.matches(&stored.event))
            .collect();

        results.sort_by(|a, b| {
            a.event
                .timestamp
                .cmp(&b.event.timestamp)
                .then(a.sequence.cmp(&b.sequence))
        });

        results.into_iter().map(|s| s.event.clone()).collect()
    }
}

impl Default for InMemoryEventRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn record(&self, event: ExperimentEvent) -> Result<(), DomainError> {
        let mut log = self
            .log
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;

        let sequence = log.next_sequence;
        log.next_sequence += 1;
        log.events
            .insert(event.id.clone(), StoredEvent { sequence, event });
        Self::evict_if_needed(&mut log, self.max_events);

        Ok(())
    }

    async fn query(&self, query: &EventQuery) -> Result<Vec<ExperimentEvent>, DomainError> {
        let log = self
            .log
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(Self::matching(&log, query)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn count(&self, query: &EventQuery) -> Result<usize, DomainError> {
        let log = self
            .log
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(log
            .events
            .values()
            .filter(|stored| query.matches(&stored.event))
            .count())
    }

    async fn delete_by_experiment(
        &self,
        experiment_id: &ExperimentId,
    ) -> Result<usize, DomainError> {
        let mut log = self
            .log
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;

        let before = log.events.len();
        log.events
            .retain(|_, stored| &stored.event.experiment_id != experiment_id);
        Ok(before - log.events.len())
    }
}
