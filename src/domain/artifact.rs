//! Artifact identity types

use serde::{Deserialize, Serialize};

/// Normalized declared type of an uploaded artifact.
///
/// This is the file extension as declared by the uploader, lowercased and
/// stripped of its leading dot (`"EXE"`, `".exe"` and `"exe"` are the same
/// declared type). It is a claim about the artifact, not a verified fact;
/// engine selection is the only thing that depends on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclaredType(String);

impl DeclaredType {
    /// Normalize a raw declared type (extension or filename suffix)
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().trim_start_matches('.').to_ascii_lowercase())
    }

    /// Declared type extracted from a file name, or the empty type
    pub fn from_file_name(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Self::new(ext),
            _ => Self(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the uploader declared no usable type at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable content identity of an artifact.
///
/// Computed exactly once per artifact from a streaming read. Identical bytes
/// always yield an identical identity; the primary digest is the dedup key
/// shared across all submissions for the same content, regardless of who
/// uploaded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    /// Primary digest (SHA-256, lowercase hex) - the dedup key
    pub sha256: String,

    /// Secondary digest (MD5, lowercase hex) for cross-referencing with
    /// backends that only index legacy hashes
    pub md5: String,

    /// Total byte length of the artifact
    pub length: u64,

    /// Declared type of the artifact
    pub declared_type: DeclaredType,
}

impl ArtifactIdentity {
    /// Short form of the primary digest for log lines
    pub fn short_digest(&self) -> &str {
        &self.sha256[..self.sha256.len().min(12)]
    }
}

impl std::fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} bytes)", self.sha256, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_normalizes_case_and_dot() {
        assert_eq!(DeclaredType::new(".EXE"), DeclaredType::new("exe"));
        assert_eq!(DeclaredType::new("Apk").as_str(), "apk");
    }

    #[test]
    fn declared_type_from_file_name() {
        assert_eq!(DeclaredType::from_file_name("dropper.Exe").as_str(), "exe");
        assert_eq!(DeclaredType::from_file_name("archive.tar.gz").as_str(), "gz");
        assert!(DeclaredType::from_file_name("README").is_empty());
        // A leading dot alone is not an extension
        assert!(DeclaredType::from_file_name(".bashrc").is_empty());
    }
}
