//! File system export destination

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::experiment::ExperimentId;
use crate::domain::export::{ExportDestination, ExportFormat};
use crate::domain::DomainError;

/// Writes exports as `<experiment>-<timestamp>.<ext>` under a directory
#[derive(Debug, Clone)]
pub struct FileExportDestination {
    directory: PathBuf,
}

impl FileExportDestination {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_name(experiment_id: &ExperimentId, format: ExportFormat) -> String {
        format!(
            "{}-{}.{}",
            experiment_id,
            Utc::now().format("%Y%m%dT%H%M%S%3f"),
            format.extension()
        )
    }
}

#[async_trait]
impl ExportDestination for FileExportDestination {
    async fn store(
        &self,
        experiment_id: &ExperimentId,
        format: ExportFormat,
        bytes: Vec<u8>,
    ) -> Result<String, DomainError> {
        tokio::fs::create_dir_all(&self.directory).await.map_err(|e| {
            DomainError::export(format!(
                "Failed to create {}: {}",
                self.directory.display(),
                e
            ))
        })?;

        let path = self.directory.join(Self::file_name(experiment_id, format));

        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            DomainError::export(format!("Failed to write {}: {}", path.display(), e))
        })?;

        info!(
            experiment_id = %experiment_id,
            format = %format,
            bytes = bytes.len(),
            path = %path.display(),
            "Export written"
        );

        Ok(path.display().to_string())
    }
}
