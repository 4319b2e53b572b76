//! Metadata service seam - persisted function records
//!
//! The run-execution framework keeps one record per logical function in a
//! remote metadata service. dasklink only reads the record to recover a
//! previously deployed cluster's status and writes it back after a deploy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::ClusterStatus;

/// Errors surfaced by the metadata service
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("metadata API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("metadata transport error: {0}")]
    Transport(String),
}

/// Persisted record of one logical function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Function name
    pub name: String,

    /// Project the function belongs to
    pub project: String,

    /// Version tag
    #[serde(default)]
    pub tag: String,

    /// Last observed cluster status, absent until a deploy succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ClusterStatus>,

    /// When this record was last written
    #[serde(rename = "updatedAt")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FunctionRecord {
    pub fn new(
        name: impl Into<String>,
        project: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            tag: tag.into(),
            status: None,
            updated_at: None,
        }
    }

    /// Attach a status snapshot and stamp the update time
    pub fn with_status(mut self, status: ClusterStatus) -> Self {
        self.status = Some(status);
        self.updated_at = Some(Utc::now());
        self
    }
}

/// Read/write access to persisted function records
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Fetch the record for (name, project, tag); `None` when no record
    /// exists
    async fn get_function(
        &self,
        name: &str,
        project: &str,
        tag: &str,
    ) -> Result<Option<FunctionRecord>, MetadataError>;

    /// Persist a record, replacing any previous version
    async fn save(&self, record: &FunctionRecord) -> Result<(), MetadataError>;
}

/// Metadata client talking to the service's REST API
#[derive(Clone)]
pub struct HttpMetadataService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMetadataService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl MetadataService for HttpMetadataService {
    async fn get_function(
        &self,
        name: &str,
        project: &str,
        tag: &str,
    ) -> Result<Option<FunctionRecord>, MetadataError> {
        let path = format!("/api/projects/{}/functions/{}", project, name);
        let response = self
            .client
            .get(self.url(&path))
            .query(&[("tag", tag)])
            .send()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(MetadataError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let record: FunctionRecord = response
            .json()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;
        Ok(Some(record))
    }

    async fn save(&self, record: &FunctionRecord) -> Result<(), MetadataError> {
        let path = format!(
            "/api/projects/{}/functions/{}",
            record.project, record.name
        );
        let response = self
            .client
            .put(self.url(&path))
            .query(&[("tag", record.tag.as_str())])
            .json(record)
            .send()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(MetadataError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Mock implementation for testing (no I/O)
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory record store with a switchable outage mode
    #[derive(Default)]
    pub struct MockMetadataService {
        pub records: Mutex<HashMap<(String, String, String), FunctionRecord>>,
        /// When true, every call fails with a transport error
        pub unreachable: Mutex<bool>,
        pub saved: Mutex<Vec<FunctionRecord>>,
    }

    impl MockMetadataService {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_record(record: FunctionRecord) -> Self {
            let mock = Self::new();
            mock.records.lock().unwrap().insert(
                (
                    record.name.clone(),
                    record.project.clone(),
                    record.tag.clone(),
                ),
                record,
            );
            mock
        }

        pub fn set_unreachable(&self, value: bool) {
            *self.unreachable.lock().unwrap() = value;
        }
    }

    #[async_trait]
    impl MetadataService for MockMetadataService {
        async fn get_function(
            &self,
            name: &str,
            project: &str,
            tag: &str,
        ) -> Result<Option<FunctionRecord>, MetadataError> {
            if *self.unreachable.lock().unwrap() {
                return Err(MetadataError::Transport("connection reset".to_string()));
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .get(&(name.to_string(), project.to_string(), tag.to_string()))
                .cloned())
        }

        async fn save(&self, record: &FunctionRecord) -> Result<(), MetadataError> {
            if *self.unreachable.lock().unwrap() {
                return Err(MetadataError::Transport("connection reset".to_string()));
            }
            self.saved.lock().unwrap().push(record.clone());
            self.records.lock().unwrap().insert(
                (
                    record.name.clone(),
                    record.project.clone(),
                    record.tag.clone(),
                ),
                record.clone(),
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_with_status_stamps_update_time() {
        let record = FunctionRecord::new("trainer", "default", "latest")
            .with_status(ClusterStatus::default());
        assert!(record.status.is_some());
        assert!(record.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_mock_roundtrip() {
        let service = mock::MockMetadataService::new();
        let record = FunctionRecord::new("trainer", "default", "latest");
        service.save(&record).await.unwrap();

        let loaded = service
            .get_function("trainer", "default", "latest")
            .await
            .unwrap();
        assert!(loaded.is_some());

        let missing = service
            .get_function("other", "default", "latest")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
