//! Event infrastructure - scrubbing and storage

mod in_memory_repository;
mod scrubber;

pub use in_memory_repository::InMemoryEventRepository;
pub use scrubber::{EventScrubber, REDACTED};
