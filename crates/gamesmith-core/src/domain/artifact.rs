//! The code artifact under validation and the design document it must honour.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{CoreError, Result};

/// Generated program source, identified by its path on disk.
///
/// The file is the source of truth: each repair overwrites it in place and the
/// orchestrator reloads it. No earlier versions are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub path: PathBuf,
    pub source: String,
}

impl CodeArtifact {
    pub fn new(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Read the artifact at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(source) => Ok(Self::new(path, source)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(CoreError::ArtifactNotFound(path.to_path_buf()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Directory holding the artifact (and its stimulus sidecar).
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// The game design document. Read-only ground truth for review and repair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignDocument(String);

impl DesignDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<String> for DesignDocument {
    fn from(text: String) -> Self {
        Self(text)
    }
}
