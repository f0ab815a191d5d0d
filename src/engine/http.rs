//! Shared HTTP plumbing for engine clients.
//!
//! All backends are spoken to with a blocking [`ureq::Agent`]; the async
//! client implementations wrap these helpers in `spawn_blocking`. Transient
//! failures (transport errors, 5xx, 429) are retried here with backoff -
//! this is the only layer that retries, fatal errors pass straight through.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use super::EngineError;

/// Connect timeout for all engine backends
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read timeout; report downloads can be tens of megabytes
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Bounded retry budget for transient failures
const MAX_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (multiplied by the attempt number)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Build the agent shared by one engine client
pub fn build_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .timeout_read(READ_TIMEOUT)
        .build()
}

/// Map a ureq error onto the engine error taxonomy
pub fn map_ureq_error(what: &str, err: ureq::Error) -> EngineError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            let detail = format!("{what}: HTTP {code}: {}", body.chars().take(200).collect::<String>());
            match code {
                401 | 403 => EngineError::Auth(detail),
                429 => EngineError::Transient(detail),
                400..=499 => EngineError::Rejected(detail),
                _ => EngineError::Transient(detail),
            }
        }
        ureq::Error::Transport(t) => EngineError::Transient(format!("{what}: {t}")),
    }
}

/// Map a body-read/parse failure onto the taxonomy
pub fn map_body_error(what: &str, err: std::io::Error) -> EngineError {
    EngineError::Protocol(format!("{what}: unreadable response body: {err}"))
}

/// Run a blocking request closure with bounded retry on transient errors.
///
/// Fatal errors (auth, rejection, protocol) return immediately; transient
/// errors are retried up to [`MAX_ATTEMPTS`] times with linear backoff.
pub fn call_with_retry<T>(
    what: &str,
    mut op: impl FnMut() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                tracing::warn!(
                    "{what}: attempt {attempt}/{MAX_ATTEMPTS} failed transiently: {err}"
                );
                last_err = Some(err);
                if attempt < MAX_ATTEMPTS {
                    std::thread::sleep(RETRY_BASE_DELAY * attempt);
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or_else(|| EngineError::Transient(format!("{what}: retries exhausted"))))
}

/// A minimal multipart/form-data body builder.
///
/// ureq has no multipart support, and the engine upload endpoints all want
/// one file part plus a handful of text fields, so a small encoder is
/// enough (RFC 7578, no transfer encodings, no nested parts).
pub struct Multipart {
    boundary: String,
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self {
            boundary: format!("----malsieve-{}", uuid::Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    /// Append a plain text field
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// Append a file part read from disk
    pub fn file(mut self, name: &str, file_name: &str, path: &Path) -> Result<Self, EngineError> {
        let mut file = std::fs::File::open(path).map_err(|e| {
            EngineError::Rejected(format!("cannot read artifact {}: {e}", path.display()))
        })?;
        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        file.read_to_end(&mut self.body).map_err(|e| {
            EngineError::Rejected(format!("cannot read artifact {}: {e}", path.display()))
        })?;
        self.body.extend_from_slice(b"\r\n");
        Ok(self)
    }

    /// Finish the body; returns the content type and the encoded bytes
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}
