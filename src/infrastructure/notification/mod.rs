//! Notification sinks

mod log_sink;
mod webhook;

pub use log_sink::LogNotificationSink;
pub use webhook::WebhookNotificationSink;
