use std::path::{Path, PathBuf};

/// A finished recording handed to the transcription collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAudio {
    /// Location of the encoded recording on local disk.
    pub path: PathBuf,
    /// MIME type of the container (e.g. `audio/m4a`).
    pub mime_type: String,
    /// Length of the recording in milliseconds.
    pub duration_ms: u64,
}

impl RecordedAudio {
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
            duration_ms,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name sent alongside the upload; falls back to `recording`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or_else(|| "recording".to_string(), ToString::to_string)
    }
}
