//! Content identity: streaming digest computation.
//!
//! The primary (SHA-256) and secondary (MD5) digests are computed in a
//! single pass over the artifact bytes, either from in-flight upload chunks
//! (before the artifact is persisted) or from an already-persisted file
//! (re-verification). The artifact is never buffered whole in memory.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::{ArtifactIdentity, DeclaredType};

/// Chunk size for hashing persisted files (1 MiB)
const CHUNK_SIZE: usize = 1024 * 1024;

/// Errors surfaced while computing content identity
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The byte source could not be read. A partial digest is never
    /// returned in this case.
    #[error("failed to read artifact bytes: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source was empty; an empty artifact has no meaningful
    /// identity and no engine will accept it
    #[error("artifact is empty")]
    Empty,
}

/// Incremental digest computation over artifact chunks.
///
/// Feed chunks in arrival order with [`update`](Self::update), then call
/// [`finalize`](Self::finalize) once. Two streams with identical byte
/// content always produce an identical [`ArtifactIdentity`].
pub struct IdentityHasher {
    sha256: Sha256,
    md5: md5::Context,
    length: u64,
    declared_type: DeclaredType,
}

impl IdentityHasher {
    pub fn new(declared_type: DeclaredType) -> Self {
        Self {
            sha256: Sha256::new(),
            md5: md5::Context::new(),
            length: 0,
            declared_type,
        }
    }

    /// Feed the next chunk of artifact bytes
    pub fn update(&mut self, chunk: &[u8]) {
        self.sha256.update(chunk);
        self.md5.consume(chunk);
        self.length += chunk.len() as u64;
    }

    /// Finish the pass and produce the identity
    pub fn finalize(self) -> Result<ArtifactIdentity, IdentityError> {
        if self.length == 0 {
            return Err(IdentityError::Empty);
        }
        Ok(ArtifactIdentity {
            sha256: hex::encode(self.sha256.finalize()),
            md5: format!("{:x}", self.md5.compute()),
            length: self.length,
            declared_type: self.declared_type,
        })
    }
}

/// Compute the identity of an already-persisted artifact
pub fn identify_path(
    path: &Path,
    declared_type: DeclaredType,
) -> Result<ArtifactIdentity, IdentityError> {
    let file = std::fs::File::open(path)?;
    identify_reader(file, declared_type)
}

/// Compute the identity from any byte source in bounded chunks
pub fn identify_reader(
    mut reader: impl Read,
    declared_type: DeclaredType,
) -> Result<ArtifactIdentity, IdentityError> {
    let mut hasher = IdentityHasher::new(declared_type);
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn declared() -> DeclaredType {
        DeclaredType::new("bin")
    }

    #[test]
    fn known_vector() {
        let mut hasher = IdentityHasher::new(declared());
        hasher.update(b"abc");
        let identity = hasher.finalize().unwrap();
        assert_eq!(
            identity.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(identity.md5, "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(identity.length, 3);
    }

    #[test]
    fn chunking_does_not_change_identity() {
        let data = b"the quick brown fox jumps over the lazy dog";

        let mut whole = IdentityHasher::new(declared());
        whole.update(data);

        let mut chunked = IdentityHasher::new(declared());
        for piece in data.chunks(7) {
            chunked.update(piece);
        }

        assert_eq!(
            whole.finalize().unwrap(),
            chunked.finalize().unwrap(),
            "identical bytes must yield identical identity regardless of chunking"
        );
    }

    #[test]
    fn streaming_matches_persisted_file() {
        let data: Vec<u8> = (0u32..100_000).map(|i| (i % 251) as u8).collect();

        let mut streamed = IdentityHasher::new(declared());
        for chunk in data.chunks(4096) {
            streamed.update(chunk);
        }
        let streamed = streamed.finalize().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bin");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&data).unwrap();
        drop(file);

        let persisted = identify_path(&path, declared()).unwrap();
        assert_eq!(streamed, persisted);
    }

    #[test]
    fn empty_source_is_an_error() {
        let err = identify_reader(std::io::empty(), declared()).unwrap_err();
        assert!(matches!(err, IdentityError::Empty));

        let err = IdentityHasher::new(declared()).finalize().unwrap_err();
        assert!(matches!(err, IdentityError::Empty));
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let err = identify_path(Path::new("/definitely/not/here.bin"), declared()).unwrap_err();
        assert!(matches!(err, IdentityError::Io(_)));
    }
}
