//! Static analyzer client (MobSF-style scan API).
//!
//! Endpoints spoken:
//! - `POST {base}/api/v1/scans` - upload an artifact and queue a scan
//! - `GET  {base}/api/v1/scans/{id}` - one status round-trip
//! - `GET  {base}/api/v1/scans/{id}/report` - fetch the report
//!
//! The static analyzer keeps no digest index, so it exposes no identity
//! search; the lifecycle manager always submits here.

use async_trait::async_trait;
use std::path::Path;

use super::http::{self, Multipart};
use super::{EngineClient, EngineError, JobState, RawReport};
use crate::domain::{ArtifactIdentity, EngineKind, JobRef};

#[derive(Clone)]
pub struct StaticScanClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl StaticScanClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            agent: http::build_agent(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn get_json(&self, what: &str, url: &str) -> Result<serde_json::Value, EngineError> {
        self.agent
            .get(url)
            .set("Authorization", &self.api_key)
            .call()
            .map_err(|e| http::map_ureq_error(what, e))?
            .into_json()
            .map_err(|e| http::map_body_error(what, e))
    }

    fn map_status(status: &str, reason: Option<&str>) -> JobState {
        match status {
            "completed" => JobState::Succeeded,
            "queued" => JobState::Pending,
            "failed" => JobState::Failed(format!(
                "static scan failed: {}",
                reason.unwrap_or("unspecified")
            )),
            _ => JobState::Running,
        }
    }
}

#[async_trait]
impl EngineClient for StaticScanClient {
    fn kind(&self) -> EngineKind {
        EngineKind::StaticScan
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
            http::call_with_retry("static-scan submit", || {
                let url = format!("{}/api/v1/scans", this.base_url);
                let (content_type, body) =
                    Multipart::new().file("file", &file_name, &path)?.finish();

                let response: serde_json::Value = this
                    .agent
                    .post(&url)
                    .set("Authorization", &this.api_key)
                    .set("Content-Type", &content_type)
                    .send_bytes(&body)
                    .map_err(|e| http::map_ureq_error("static-scan submit", e))?
                    .into_json()
                    .map_err(|e| http::map_body_error("static-scan submit", e))?;

                let scan_id = response
                    .get("scan_id")
                    .and_then(|id| id.as_str())
                    .ok_or_else(|| {
                        EngineError::Protocol("static-scan submit: no scan id".into())
                    })?;

                Ok(JobRef::new(scan_id))
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("static-scan submit worker: {e}")))?
    }

    async fn poll_status(&self, job: &JobRef) -> Result<JobState, EngineError> {
        let this = self.clone();
        let job = job.clone();

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("static-scan status", || {
                let url = format!("{}/api/v1/scans/{}", this.base_url, job);
                let response = this.get_json("static-scan status", &url)?;
                let status = response
                    .get("status")
                    .and_then(|s| s.as_str())
                    .ok_or_else(|| {
                        EngineError::Protocol("static-scan status: no status field".into())
                    })?;
                let reason = response.get("reason").and_then(|r| r.as_str());
                Ok(Self::map_status(status, reason))
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("static-scan status worker: {e}")))?
    }

    async fn fetch_report(&self, job: &JobRef) -> Result<RawReport, EngineError> {
        let this = self.clone();
        let job = job.clone();

        tokio::task::spawn_blocking(move || {
            http::call_with_retry("static-scan report", || {
                let url = format!("{}/api/v1/scans/{}/report", this.base_url, job);
                this.get_json("static-scan report", &url)
            })
        })
        .await
        .map_err(|e| EngineError::Transient(format!("static-scan report worker: {e}")))?
    }
}
