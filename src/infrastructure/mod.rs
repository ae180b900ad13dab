//! Infrastructure layer - Stores, analysis, collaborators and services

pub mod aggregation;
pub mod analysis;
pub mod event;
pub mod experiment;
pub mod export;
pub mod logging;
pub mod notification;
pub mod observability;
pub mod services;
