//! Per-engine backend settings

use serde::{Deserialize, Serialize};

/// Connection settings for one engine backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Base URL of the backend, without trailing slash
    pub base_url: String,

    /// API token; can also be supplied via MALSIEVE_<KIND>_TOKEN
    #[serde(default)]
    pub api_token: Option<String>,

    /// Uploads above this size are rejected before any network call
    /// (only meaningful for engines with a remote size limit)
    #[serde(default)]
    pub max_upload_bytes: Option<u64>,

    /// Sandbox only: pin detonation to a specific VM
    #[serde(default)]
    pub machine: Option<String>,
}
