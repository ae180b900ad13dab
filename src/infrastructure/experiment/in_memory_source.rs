//! In-memory experiment configuration source

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use tracing::info;

use crate::domain::experiment::{
    ExperimentConfig, ExperimentConfigSource, ExperimentId, ExperimentStatus,
};
use crate::domain::DomainError;

/// Experiment configurations held in memory, optionally loaded from JSON
#[derive(Debug, Default)]
pub struct InMemoryExperimentConfigSource {
    configs: RwLock<HashMap<ExperimentId, ExperimentConfig>>,
    ended: RwLock<HashMap<ExperimentId, String>>,
}

impl InMemoryExperimentConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source from validated configurations
    pub fn with_configs(
        configs: impl IntoIterator<Item = ExperimentConfig>,
    ) -> Result<Self, DomainError> {
        let source = Self::new();

        for config in configs {
            source.insert(config)?;
        }

        Ok(source)
    }

    /// Parse a JSON array of experiment configurations
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        let configs: Vec<ExperimentConfig> = serde_json::from_str(json).map_err(|e| {
            DomainError::configuration(format!("Invalid experiment configuration: {}", e))
        })?;

        Self::with_configs(configs)
    }

    /// Load a JSON array of experiment configurations from a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let source = Self::from_json(&json)?;
        info!(path = %path.display(), experiments = source.len(), "Loaded experiment configurations");

        Ok(source)
    }

    /// Add or replace a configuration
    pub fn insert(&self, config: ExperimentConfig) -> Result<(), DomainError> {
        config.validate().map_err(|e| {
            DomainError::validation(format!("Experiment '{}': {}", config.id(), e))
        })?;

        let mut configs = self
            .configs
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;

        configs.insert(config.id().clone(), config);
        Ok(())
    }

    /// Reason recorded by `mark_ended`, if the experiment was concluded
    pub fn end_reason(&self, id: &ExperimentId) -> Option<String> {
        self.ended.read().ok()?.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.configs.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ExperimentConfigSource for InMemoryExperimentConfigSource {
    async fn get_config(&self, id: &ExperimentId) -> Result<Option<ExperimentConfig>, DomainError> {
        let configs = self
            .configs
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(configs.get(id).cloned())
    }

    async fn list_tracked(&self) -> Result<Vec<ExperimentId>, DomainError> {
        let configs = self
            .configs
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        let mut ids: Vec<_> = configs
            .values()
            .filter(|c| c.status().is_running())
            .map(|c| c.id().clone())
            .collect();

        ids.sort();
        Ok(ids)
    }

    async fn mark_ended(&self, id: &ExperimentId, reason: &str) -> Result<(), DomainError> {
        {
            let mut configs = self.configs.write().map_err(|e| {
                DomainError::internal(format!("Failed to acquire write lock: {}", e))
            })?;

            let config = configs
                .get_mut(id)
                .ok_or_else(|| DomainError::not_found(format!("Experiment '{}' not found", id)))?;

            config.set_status(ExperimentStatus::Completed);
        }

        self.ended
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?
            .insert(id.clone(), reason.to_string());

        info!(experiment_id = %id, reason = %reason, "Experiment marked as ended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG_JSON: &str = r#"[
        {
            "id": "checkout-v2",
            "name": "Checkout redesign",
            "variants": [
                {"id": "control", "control": true},
                {"id": "treatment", "name": "New checkout"}
            ],
            "metrics": ["conversion_rate", "revenue"],
            "primary_metric": "conversion_rate",
            "auto_end_conditions": [
                {"type": "sample_size", "target": 500, "priority": 1},
                {"type": "safety", "metric_ids": ["conversion_rate"], "minimum": 0.01, "priority": 10}
            ],
            "start_date": "2026-01-01T00:00:00Z",
            "status": "running"
        },
        {
            "id": "pricing-page",
            "variants": [{"id": "a"}, {"id": "b"}],
            "start_date": "2026-01-01T00:00:00Z",
            "status": "paused"
        }
    ]"#;

    #[tokio::test]
    async fn test_from_json() {
        let source = InMemoryExperimentConfigSource::from_json(CONFIG_JSON).unwrap();
        assert_eq!(source.len(), 2);

        let id = ExperimentId::new("checkout-v2").unwrap();
        let config = source.get_config(&id).await.unwrap().unwrap();

        assert_eq!(config.variants().len(), 2);
        assert_eq!(config.control_variant().unwrap().id().as_str(), "control");
        assert_eq!(config.auto_end_conditions().len(), 2);
        assert_eq!(config.auto_end_conditions()[1].kind(), "safety");
    }

    #[tokio::test]
    async fn test_list_tracked_only_running() {
        let source = InMemoryExperimentConfigSource::from_json(CONFIG_JSON).unwrap();

        let tracked = source.list_tracked().await.unwrap();
        assert_eq!(tracked, vec![ExperimentId::new("checkout-v2").unwrap()]);
    }

    #[tokio::test]
    async fn test_mark_ended() {
        let source = InMemoryExperimentConfigSource::from_json(CONFIG_JSON).unwrap();
        let id = ExperimentId::new("checkout-v2").unwrap();

        source.mark_ended(&id, "Sample size reached").await.unwrap();

        assert!(source.list_tracked().await.unwrap().is_empty());
        assert_eq!(source.end_reason(&id).as_deref(), Some("Sample size reached"));

        let missing = ExperimentId::new("missing").unwrap();
        assert!(matches!(
            source.mark_ended(&missing, "x").await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let single_variant = r#"[{"id": "exp", "variants": [{"id": "a"}], "start_date": "2026-01-01T00:00:00Z"}]"#;
        assert!(matches!(
            InMemoryExperimentConfigSource::from_json(single_variant),
            Err(DomainError::Validation { .. })
        ));

        assert!(matches!(
            InMemoryExperimentConfigSource::from_json("{not json"),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG_JSON.as_bytes()).unwrap();

        let source = InMemoryExperimentConfigSource::load(file.path()).await.unwrap();
        assert_eq!(source.len(), 2);

        assert!(InMemoryExperimentConfigSource::load("/nonexistent/experiments.json")
            .await
            .is_err());
    }
}
