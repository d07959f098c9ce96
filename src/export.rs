use crate::transcript::Transcript;
use crate::transport::{ChatTransport, ExportResponse, TransportError};
use bytes::Bytes;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export is disabled")]
    Disabled,

    #[error("export request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Downloaded export, ready to be written to disk
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub filename: String,
    pub bytes: Bytes,
}

/// Turns the transcript into a downloadable artifact via the export endpoint
#[derive(Debug, Clone)]
pub struct ExportAdapter {
    enabled: bool,
    directory: PathBuf,
}

impl ExportAdapter {
    pub fn new(enabled: bool, directory: impl Into<PathBuf>) -> Self {
        Self {
            enabled,
            directory: directory.into(),
        }
    }

    /// Post the full transcript to the export endpoint. Never mutates the transcript.
    pub async fn export_transcript<T>(
        &self,
        transport: &T,
        transcript: &Transcript,
    ) -> Result<ExportArtifact, ExportError>
    where
        T: ChatTransport + ?Sized,
    {
        if !self.enabled {
            return Err(ExportError::Disabled);
        }

        let messages = transcript.to_messages();
        tracing::debug!(turns = messages.len(), "exporting transcript");
        let ExportResponse { bytes, filename } = transport.export(&messages).await?;

        Ok(ExportArtifact {
            filename: filename
                .map(|name| sanitize_filename(&name))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(default_filename),
            bytes,
        })
    }

    /// Write an artifact into the export directory
    pub fn save(&self, artifact: &ExportArtifact) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.directory).map_err(|source| ExportError::Write {
            path: self.directory.clone(),
            source,
        })?;

        let path = self.directory.join(&artifact.filename);
        fs::write(&path, &artifact.bytes).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), bytes = artifact.bytes.len(), "transcript exported");
        Ok(path)
    }

    /// Export and save in one go
    pub async fn export_to_file<T>(
        &self,
        transport: &T,
        transcript: &Transcript,
    ) -> Result<PathBuf, ExportError>
    where
        T: ChatTransport + ?Sized,
    {
        let artifact = self.export_transcript(transport, transcript).await?;
        self.save(&artifact)
    }
}

/// `chat_history_<timestamp>.json` with a filesystem-safe timestamp
pub fn default_filename() -> String {
    format!(
        "chat_history_{}.json",
        chrono::Local::now().format("%Y-%m-%dT%H-%M-%S")
    )
}

fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}
