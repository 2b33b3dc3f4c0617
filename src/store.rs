//! Analysis history storage.
//!
//! The [`ResultStore`] trait is the narrow interface the CLI uses to keep
//! finished analyses (and aborted ones) by id. The pipeline itself never
//! touches a store; the caller decides what to persist.
//!
//! Implementations:
//! - [`InMemoryResultStore`]: `HashMap` behind `std::sync::RwLock`, for tests.
//! - [`JsonDirStore`]: one pretty-printed JSON file per id under a directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use query_fanout_core::models::AnalysisResult;
use query_fanout_core::pipeline::AnalysisFailure;

/// Outcome of one analysis as kept in history.
///
/// Must stay externally tagged: an internally tagged enum cannot read back
/// the integer keys of `chunk_usage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredAnalysis {
    Completed(AnalysisResult),
    Failed(AnalysisFailure),
}

impl StoredAnalysis {
    pub fn url(&self) -> &str {
        match self {
            StoredAnalysis::Completed(r) => &r.url,
            StoredAnalysis::Failed(f) => &f.url,
        }
    }
}

/// A stored analysis together with its id and when it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub analysis: StoredAnalysis,
}

/// One line of `fanout history`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub url: String,
    pub success: bool,
    pub entity: Option<String>,
    pub score: Option<f64>,
}

impl From<&StoredRecord> for AnalysisSummary {
    fn from(record: &StoredRecord) -> Self {
        let (success, entity, score) = match &record.analysis {
            StoredAnalysis::Completed(r) => {
                (true, Some(r.entity.entity_name.clone()), Some(r.rounded_score()))
            }
            StoredAnalysis::Failed(_) => (false, None, None),
        };
        Self {
            id: record.id.clone(),
            recorded_at: record.recorded_at,
            url: record.analysis.url().to_string(),
            success,
            entity,
            score,
        }
    }
}

/// Generate a fresh analysis id (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<StoredRecord>>;

    /// Insert or replace the analysis stored under `id`.
    async fn put(&self, id: &str, analysis: StoredAnalysis) -> Result<()>;

    /// All stored analyses, newest first.
    async fn list(&self) -> Result<Vec<AnalysisSummary>>;
}

fn newest_first(mut summaries: Vec<AnalysisSummary>) -> Vec<AnalysisSummary> {
    summaries.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(a.id.cmp(&b.id)));
    summaries
}

// ============ In-memory ============

#[derive(Default)]
pub struct InMemoryResultStore {
    records: RwLock<HashMap<String, StoredRecord>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("result store lock poisoned"))?;
        Ok(records.get(id).cloned())
    }

    async fn put(&self, id: &str, analysis: StoredAnalysis) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("result store lock poisoned"))?;
        records.insert(
            id.to_string(),
            StoredRecord {
                id: id.to_string(),
                recorded_at: Utc::now(),
                analysis,
            },
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<AnalysisSummary>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow::anyhow!("result store lock poisoned"))?;
        Ok(newest_first(records.values().map(AnalysisSummary::from).collect()))
    }
}

// ============ JSON directory ============

/// Stores each record as `<dir>/<id>.json`.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            bail!("Invalid analysis id: '{}'", id);
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl ResultStore for JsonDirStore {
    async fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let path = self.path_for(id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(record))
    }

    async fn put(&self, id: &str, analysis: StoredAnalysis) -> Result<()> {
        let path = self.path_for(id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create store directory: {}", self.dir.display()))?;
        let record = StoredRecord {
            id: id.to_string(),
            recorded_at: Utc::now(),
            analysis,
        };
        let json = serde_json::to_string_pretty(&record)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<AnalysisSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to list {}", self.dir.display()))
            }
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = match tokio::fs::read_to_string(&path).await {
                Ok(content) => serde_json::from_str::<StoredRecord>(&content).map_err(anyhow::Error::from),
                Err(e) => Err(anyhow::Error::from(e)),
            };
            match parsed {
                Ok(record) => summaries.push(AnalysisSummary::from(&record)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable history file")
                }
            }
        }
        Ok(newest_first(summaries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(url: &str) -> StoredAnalysis {
        StoredAnalysis::Failed(AnalysisFailure {
            success: false,
            url: url.to_string(),
            error: "no queries generated".to_string(),
        })
    }

    #[tokio::test]
    async fn test_in_memory_put_get() {
        let store = InMemoryResultStore::new();
        let id = new_id();
        store.put(&id, failure("https://example.com/a")).await.unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.analysis.url(), "https://example.com/a");
        assert!(store.get("missing").await.unwrap().is_none());

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert!(!list[0].success);
        assert_eq!(list[0].score, None);
    }

    #[tokio::test]
    async fn test_in_memory_put_replaces() {
        let store = InMemoryResultStore::new();
        store.put("abc", failure("https://one")).await.unwrap();
        store.put("abc", failure("https://two")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(store.get("abc").await.unwrap().unwrap().analysis.url(), "https://two");
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let store = JsonDirStore::new("/tmp/history");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for(&new_id()).is_ok());
    }

    #[tokio::test]
    async fn test_list_skips_unreadable_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        store.put("good", failure("https://ok")).await.unwrap();
        std::fs::write(dir.path().join("corrupt.json"), "{ not json").unwrap();
        std::fs::create_dir(dir.path().join("folder.json")).unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "good");
    }

    #[test]
    fn test_failed_record_json_shape() {
        let json = serde_json::to_value(failure("https://x")).unwrap();
        assert_eq!(json["failed"]["success"], false);
        assert_eq!(json["failed"]["url"], "https://x");
    }
}
