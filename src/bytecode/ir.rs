use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::bytecode::Op;

/// Leading bytes of every artifact file.
pub const MAGIC: &[u8; 4] = b"WSBC";
pub const FORMAT_VERSION: u8 = 1;

/// A compiled bytecode program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramBc {
    /// The flat instruction stream. Execution starts at op 0.
    pub main: CodeObject,

    /// Number of `call` sites, i.e. cases in the return dispatcher.
    pub return_sites: u32,

    /// Address of the `Dispatch` op, if one was emitted.
    pub dispatcher: Option<usize>,

    /// Number of source instructions this was compiled from.
    pub source_instructions: usize,
}

/// A single compiled instruction stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeObject {
    pub ops: Vec<Op>,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("not a bytecode artifact (bad magic)")]
    BadMagic,

    #[error("unsupported artifact format version {0}")]
    UnsupportedVersion(u8),

    #[error("cannot encode artifact: {0}")]
    Encode(postcard::Error),

    #[error("cannot decode artifact: {0}")]
    Decode(postcard::Error),

    #[error("artifact i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl ProgramBc {
    /// Serializes as magic, version byte, then the postcard body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let body = postcard::to_allocvec(self).map_err(ArtifactError::Encode)?;

        let mut bytes = Vec::with_capacity(MAGIC.len() + 1 + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let rest = bytes.strip_prefix(MAGIC.as_slice()).ok_or(ArtifactError::BadMagic)?;
        let (&version, body) = rest.split_first().ok_or(ArtifactError::BadMagic)?;

        if version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(version));
        }

        postcard::from_bytes(body).map_err(ArtifactError::Decode)
    }

    /// Writes the artifact to a staging file next to `path`, then moves it
    /// into place. A failed write leaves nothing at `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), ArtifactError> {
        let bytes = self.to_bytes()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&bytes)?;
        staged.flush()?;
        staged.persist(path).map_err(|e| ArtifactError::Io(e.error))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}
