//! Reputation database client (VirusTotal-style v3 API).
//!
//! Endpoints spoken:
//! - `POST {base}/api/v3/files` - upload an artifact for scanning
//! - `GET  {base}/api/v3/analyses/{id}` - poll an analysis
//! - `GET  {base}/api/v3/files/{sha256}` - prior results by digest
//!
//! Job references are opaque to callers but carry an internal prefix:
//! `analysis:` refs came from an upload and resolve through the analyses
//! endpoint, `file:` refs came from identity search and resolve through the
//! files endpoint (the backend never re-scans for those).

use async_trait::async_trait;
use std::path::Path;

use super::http::{self, Multipart};
use super::{EngineClient, EngineError, JobState, RawReport};
use crate::domain::{ArtifactIdentity, EngineKind, JobRef};

const ANALYSIS_PREFIX: &str = "analysis:";
const FILE_PREFIX: &str = "file:";

#[derive(Clone)]
pub struct ReputationClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    /// Uploads above this size are rejected locally before any network call
    max_upload_bytes: Option<u64>,
}

impl ReputationClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            agent: http::build_agent(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_upload_bytes: None,
        }
    }

    /// Cap upload size (the public reputation service refuses large files)
    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = Some(limit);
        self
    }

    fn get_json(&self, what: &str, url: &str) -> Result<serde_json::Value, EngineError> {
        self.agent
            .get(url)
            .set("x-apikey", &self.api_key)
            .call()
            .map_err(|e| http::map_ureq_error(what, e))?
            .into_json()
            .map_err(|e| http::map_body_error(what, e))
    }

    fn map_analysis_status(status: &str) -> JobState {
        match status {
            "completed" => JobState::Succeeded,
            "queued" => JobState::Pending,
            "failed" => JobState::Failed("reputation analysis failed".into()),
            _ => JobState::Running,
        }
    }
}

#[async_trait]
impl EngineClient for ReputationClient {
    fn kind(&self) -> EngineKind {
        EngineKind::Reputation
    }

    async fn submit(
        &self,
        artifact: &ArtifactIdentity,
        path: &Path,
    ) -> Result<JobRef, EngineError> {
        if let Some(limit) = self.max_upload_bytes {
            if artifact.length > limit {
                return Err(EngineError::Rejected(format!(
                    "artifact is {} bytes, reputation upload limit is {limit}",
                    artifact.length
                )));
            }
        }

        let this = self.clone();
        let path = path.to_path_buf();
        let file_name = format!("{}.{}", artifact.sha256, artifact.declared_type);

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("reputation submit", || {
                let url = format!("{}/api/v3/files", this.base_url);
                let (content_type, body) =
                    Multipart::new().file("file", &file_name, &path)?.finish();

                let response: serde_json::Value = this
                    .agent
                    .post(&url)
                    .set("x-apikey", &this.api_key)
                    .set("Content-Type", &content_type)
                    .send_bytes(&body)
                    .map_err(|e| http::map_ureq_error("reputation submit", e))?
                    .into_json()
                    .map_err(|e| http::map_body_error("reputation submit", e))?;

                let analysis_id = response
                    .get("data")
                    .and_then(|d| d.get("id"))
                    .and_then(|id| id.as_str())
                    .ok_or_else(|| {
                        EngineError::Protocol("reputation submit: no analysis id".into())
                    })?;

                Ok(JobRef::new(format!("{ANALYSIS_PREFIX}{analysis_id}")))
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("reputation submit worker: {e}")))?
    }

    async fn poll_status(&self, job: &JobRef) -> Result<JobState, EngineError> {
        let this = self.clone();
        let job = job.clone();

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("reputation status", || {
                if let Some(sha256) = job.as_str().strip_prefix(FILE_PREFIX) {
                    // A file ref only exists because the search endpoint
                    // already returned a finished record for it.
                    let url = format!("{}/api/v3/files/{}", this.base_url, sha256);
                    this.get_json("reputation status", &url)?;
                    return Ok(JobState::Succeeded);
                }

                let id = job.as_str().strip_prefix(ANALYSIS_PREFIX).unwrap_or(job.as_str());
                let url = format!("{}/api/v3/analyses/{}", this.base_url, id);
                let response = this.get_json("reputation status", &url)?;
                let status = response
                    .get("data")
                    .and_then(|d| d.get("attributes"))
                    .and_then(|a| a.get("status"))
                    .and_then(|s| s.as_str())
                    .ok_or_else(|| {
                        EngineError::Protocol("reputation status: no status field".into())
                    })?;
                Ok(Self::map_analysis_status(status))
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("reputation status worker: {e}")))?
    }

    async fn fetch_report(&self, job: &JobRef) -> Result<RawReport, EngineError> {
        let this = self.clone();
        let job = job.clone();

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("reputation report", || {
                let url = if let Some(sha256) = job.as_str().strip_prefix(FILE_PREFIX) {
                    format!("{}/api/v3/files/{}", this.base_url, sha256)
                } else {
                    let id = job.as_str().strip_prefix(ANALYSIS_PREFIX).unwrap_or(job.as_str());
                    format!("{}/api/v3/analyses/{}", this.base_url, id)
                };
                this.get_json("reputation report", &url)
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("reputation report worker: {e}")))?
    }

    async fn search_by_identity(
        &self,
        artifact: &ArtifactIdentity,
    ) -> Result<Option<Vec<JobRef>>, EngineError> {
        let this = self.clone();
        let sha256 = artifact.sha256.clone();

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("reputation search", || {
                let url = format!("{}/api/v3/files/{}", this.base_url, sha256);
                match this.agent.get(&url).set("x-apikey", &this.api_key).call() {
                    Ok(response) => {
                        // Parse to confirm the record is well-formed
                        let _: serde_json::Value = response
                            .into_json()
                            .map_err(|e| http::map_body_error("reputation search", e))?;
                        Ok(Some(vec![JobRef::new(format!("{FILE_PREFIX}{sha256}"))]))
                    }
                    // Unknown hash: no prior result anywhere
                    Err(ureq::Error::Status(404, _)) => Ok(Some(Vec::new())),
                    Err(e) => Err(http::map_ureq_error("reputation search", e)),
                }
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("reputation search worker: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeclaredType;

    #[test]
    fn oversized_artifact_is_rejected_locally() {
        let client =
            ReputationClient::new("https://rep.example", "key").with_max_upload_bytes(32);
        let artifact = ArtifactIdentity {
            sha256: "ab".repeat(32),
            md5: "cd".repeat(16),
            length: 33,
            declared_type: DeclaredType::new("exe"),
        };

        let err = futures::executor::block_on(
            client.submit(&artifact, Path::new("/nonexistent")),
        )
        .unwrap_err();
        assert!(
            matches!(err, EngineError::Rejected(_)),
            "oversize must be a fatal rejection, got: {err}"
        );
    }

    #[test]
    fn analysis_status_mapping() {
        assert_eq!(
            ReputationClient::map_analysis_status("completed"),
            JobState::Succeeded
        );
        assert_eq!(
            ReputationClient::map_analysis_status("queued"),
            JobState::Pending
        );
        assert_eq!(
            ReputationClient::map_analysis_status("in-progress"),
            JobState::Running
        );
        assert!(matches!(
            ReputationClient::map_analysis_status("failed"),
            JobState::Failed(_)
        ));
    }
}
