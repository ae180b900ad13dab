//! Experiment event domain module

mod entity;
mod repository;

pub use entity::{EventId, ExperimentEvent};
pub use repository::{EventQuery, EventRepository};

#[cfg(test)]
pub use repository::MockEventRepository;
