//! Export infrastructure - serialization and destinations

mod file_destination;
mod serializer;

pub use file_destination::FileExportDestination;
pub use serializer::{from_json, serialize_export, to_json};
