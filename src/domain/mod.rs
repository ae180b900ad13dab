//! Domain layer - Core entities, rules and collaborator boundaries

pub mod aggregate;
pub mod analysis;
pub mod dashboard;
pub mod error;
pub mod event;
pub mod experiment;
pub mod export;
pub mod metric;
pub mod notification;

pub use aggregate::{AggregateKey, AggregatedMetric, ConfidenceInterval};
pub use analysis::{
    AutoEndCondition, AutoEndDecision, AutoEndRule, ComparisonRecommendation, ComparisonResult,
    ExperimentResults, MetricResults, Recommendation, RecommendationAction,
    RecommendationPriority, ResultsSummary, StatisticalAnalysis, VariantMetricValue,
    VariantResults,
};
pub use dashboard::{
    AlertKind, AlertSeverity, DashboardAlert, DashboardView, ExperimentOverview, TopLineMetric,
};
pub use error::DomainError;
pub use event::{EventId, EventQuery, EventRepository, ExperimentEvent};
pub use experiment::{
    ExperimentConfig, ExperimentConfigSource, ExperimentId, ExperimentStatus,
    ExperimentValidationError, VariantDefinition, VariantId,
};
pub use export::{ExperimentExport, ExportDestination, ExportFormat};
pub use metric::{
    AggregationKind, MetricDefinition, MetricId, MetricRegistry, MetricTarget, MetricType,
    MetricValidationError, TargetDirection,
};
pub use notification::{ExperimentEndedNotification, NotificationSink};
