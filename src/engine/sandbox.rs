//! Detonation sandbox client (CAPE-style API).
//!
//! Endpoints spoken:
//! - `POST {base}/apiv2/tasks/create/file/` - submit an artifact
//! - `GET  {base}/apiv2/tasks/status/{id}/` - one status round-trip
//! - `GET  {base}/apiv2/tasks/get/report/{id}/json/` - fetch the report
//! - `GET  {base}/apiv2/tasks/search/sha256/{hash}/` - prior jobs by digest
//!
//! The search endpoint makes this the one engine with full cross-system
//! dedup: anyone who ever detonated the same bytes produced a reusable job.

use async_trait::async_trait;
use std::path::Path;

use super::http::{self, Multipart};
use super::{EngineClient, EngineError, JobState, RawReport};
use crate::domain::{ArtifactIdentity, EngineKind, JobRef};

#[derive(Clone)]
pub struct SandboxClient {
    agent: ureq::Agent,
    base_url: String,
    api_token: Option<String>,
    /// VM to detonate on; engine picks when unset
    machine: Option<String>,
}

impl SandboxClient {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Self {
        Self {
            agent: http::build_agent(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
            machine: None,
        }
    }

    /// Pin detonation to a specific VM
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = Some(machine.into());
        self
    }

    fn get_json(&self, what: &str, url: &str) -> Result<serde_json::Value, EngineError> {
        let mut request = self.agent.get(url);
        if let Some(token) = &self.api_token {
            request = request.set("Authorization", &format!("Token {token}"));
        }
        request
            .call()
            .map_err(|e| http::map_ureq_error(what, e))?
            .into_json()
            .map_err(|e| http::map_body_error(what, e))
    }

    /// The status endpoint has shipped both `{"data": "reported"}` and
    /// `{"data": {"status": "reported"}}` across versions; accept either.
    fn extract_status(value: &serde_json::Value) -> Option<&str> {
        let data = value.get("data")?;
        data.as_str()
            .or_else(|| data.get("status").and_then(|s| s.as_str()))
    }

    fn map_status(status: &str) -> JobState {
        match status {
            "reported" => JobState::Succeeded,
            "failed_analysis" | "failed_processing" | "failed_reporting" => {
                JobState::Failed(format!("sandbox reported {status}"))
            }
            "pending" => JobState::Pending,
            _ => JobState::Running,
        }
    }
}

#[async_trait]
impl EngineClient for SandboxClient {
    fn kind(&self) -> EngineKind {
        EngineKind::Sandbox
    }

    async fn submit(
        &self,
        artifact: &ArtifactIdentity,
        path: &Path,
    ) -> Result<JobRef, EngineError> {
        let this = self.clone();
        let path = path.to_path_buf();
        let file_name = format!("{}.{}", artifact.sha256, artifact.declared_type);

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("sandbox submit", || {
                let url = format!("{}/apiv2/tasks/create/file/", this.base_url);

                let mut parts = Multipart::new();
                if let Some(machine) = &this.machine {
                    parts = parts.text("machine", machine);
                }
                let (content_type, body) = parts.file("file", &file_name, &path)?.finish();

                let mut request = this
                    .agent
                    .post(&url)
                    .set("Content-Type", &content_type);
                if let Some(token) = &this.api_token {
                    request = request.set("Authorization", &format!("Token {token}"));
                }

                let response: serde_json::Value = request
                    .send_bytes(&body)
                    .map_err(|e| http::map_ureq_error("sandbox submit", e))?
                    .into_json()
                    .map_err(|e| http::map_body_error("sandbox submit", e))?;

                if response.get("error").and_then(|e| e.as_bool()) == Some(true) {
                    let msg = response
                        .get("errors")
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unspecified".into());
                    return Err(EngineError::Rejected(format!("sandbox refused task: {msg}")));
                }

                let task_id = response
                    .get("data")
                    .and_then(|d| d.get("task_ids"))
                    .and_then(|ids| ids.get(0))
                    .and_then(|id| id.as_i64())
                    .ok_or_else(|| {
                        EngineError::Protocol("sandbox submit: no task id in response".into())
                    })?;

                Ok(JobRef::new(task_id.to_string()))
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("sandbox submit worker: {e}")))?
    }

    async fn poll_status(&self, job: &JobRef) -> Result<JobState, EngineError> {
        let this = self.clone();
        let job = job.clone();

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("sandbox status", || {
                let url = format!("{}/apiv2/tasks/status/{}/", this.base_url, job);
                let response = this.get_json("sandbox status", &url)?;
                let status = Self::extract_status(&response).ok_or_else(|| {
                    EngineError::Protocol("sandbox status: no status field".into())
                })?;
                Ok(Self::map_status(status))
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("sandbox status worker: {e}")))?
    }

    async fn fetch_report(&self, job: &JobRef) -> Result<RawReport, EngineError> {
        let this = self.clone();
        let job = job.clone();

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("sandbox report", || {
                let url = format!("{}/apiv2/tasks/get/report/{}/json/", this.base_url, job);
                let response = this.get_json("sandbox report", &url)?;
                // Some deployments wrap the report in a data envelope
                Ok(match response.get("data") {
                    Some(inner) if inner.is_object() => inner.clone(),
                    _ => response,
                })
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("sandbox report worker: {e}")))?
    }

    async fn search_by_identity(
        &self,
        artifact: &ArtifactIdentity,
    ) -> Result<Option<Vec<JobRef>>, EngineError> {
        let this = self.clone();
        let sha256 = artifact.sha256.clone();

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("sandbox search", || {
                let url = format!("{}/apiv2/tasks/search/sha256/{}/", this.base_url, sha256);
                let response = this.get_json("sandbox search", &url)?;

                let refs = response
                    .get("data")
                    .and_then(|d| d.as_array())
                    .map(|tasks| {
                        tasks
                            .iter()
                            .filter_map(|t| t.get("id").and_then(|id| id.as_i64()))
                            .map(|id| JobRef::new(id.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();

                Ok(Some(refs))
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("sandbox search worker: {e}")))?
    }
}
