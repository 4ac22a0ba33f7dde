//! Source of the dashboard payload served by `GET /usage`.
//!
//! How usage is gathered is outside this server; a provider just hands back
//! the JSON document the dashboard renders.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("failed to read usage snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("usage snapshot is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("usage snapshot must be a JSON object")]
    NotAnObject,
}

#[async_trait]
pub trait UsageProvider: Send + Sync {
    async fn dashboard(&self) -> Result<Value, UsageError>;
}

/// Serves a fixed document, loaded once at startup.
#[derive(Debug, Clone)]
pub struct SnapshotUsageProvider {
    snapshot: Value,
}

impl SnapshotUsageProvider {
    pub fn new(snapshot: Value) -> Self {
        Self { snapshot }
    }

    /// A dashboard with no data in it.
    pub fn empty() -> Self {
        Self::new(json!({
            "generatedAt": null,
            "totals": {
                "requests": 0,
                "inputTokens": 0,
                "outputTokens": 0,
                "costUsd": 0.0,
            },
            "daily": [],
            "byModel": [],
            "byApiKey": [],
        }))
    }

    pub async fn load(path: &Path) -> Result<Self, UsageError> {
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Value = serde_json::from_slice(&bytes)?;
        if !snapshot.is_object() {
            return Err(UsageError::NotAnObject);
        }
        tracing::info!(path = %path.display(), "Loaded usage snapshot");
        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl UsageProvider for SnapshotUsageProvider {
    async fn dashboard(&self) -> Result<Value, UsageError> {
        Ok(self.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn empty_dashboard_has_zero_totals() {
        let dashboard = SnapshotUsageProvider::empty().dashboard().await.unwrap();
        assert_eq!(dashboard["totals"]["requests"], 0);
        assert!(dashboard["daily"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_reads_json_object_from_disk() {
        let path = std::env::temp_dir()
            .join(format!("meterdeck-usage-{}.json", std::process::id()));
        tokio::fs::write(&path, br#"{"totals":{"requests":42}}"#)
            .await
            .unwrap();

        let provider = SnapshotUsageProvider::load(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        assert_eq!(provider.dashboard().await.unwrap()["totals"]["requests"], 42);
    }

    #[tokio::test]
    async fn load_rejects_missing_and_non_object_files() {
        let missing = std::env::temp_dir().join("meterdeck-usage-does-not-exist.json");
        assert_matches!(
            SnapshotUsageProvider::load(&missing).await,
            Err(UsageError::Io(_))
        );

        let path = std::env::temp_dir()
            .join(format!("meterdeck-usage-array-{}.json", std::process::id()));
        tokio::fs::write(&path, b"[1, 2, 3]").await.unwrap();
        let result = SnapshotUsageProvider::load(&path).await;
        let _ = tokio::fs::remove_file(&path).await;
        assert_matches!(result, Err(UsageError::NotAnObject));
    }
}
