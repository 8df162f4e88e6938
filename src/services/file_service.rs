use crate::events::{AppEvent, EventSender};
use crate::services::validation_service::ValidationService;
use crate::state::{source_extension, Blob, MediaKind, RawFile};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

const SNIFF_BYTES: usize = 8192;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("File not found: {path}")]
    NotFound { path: String },
    #[error("Not a file: {path}")]
    NotAFile { path: String },
    #[error("Unsupported file type: {name}")]
    Unsupported { name: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Files that passed the accepted-type filter, and those that did not.
#[derive(Debug, Default)]
pub struct Intake {
    pub accepted: Vec<RawFile>,
    pub rejected: Vec<(String, FileError)>,
}

#[derive(Clone)]
pub struct FileService {
    validator: ValidationService,
    event_sender: EventSender,
}

impl FileService {
    pub fn new(event_sender: EventSender) -> Self {
        Self {
            validator: ValidationService::new(),
            event_sender,
        }
    }

    /// Reads dropped or picked paths and reports the accepted ones back to the UI.
    pub async fn load_paths(&self, paths: Vec<PathBuf>) {
        let intake = self.read_paths(&paths).await;

        if !intake.rejected.is_empty() {
            let names: Vec<&str> = intake.rejected.iter().map(|(n, _)| n.as_str()).collect();
            self.send_event(AppEvent::error(
                "Some files were skipped",
                format!("Unsupported or unreadable: {}", names.join(", ")),
            ));
        }

        if !intake.accepted.is_empty() {
            self.send_event(AppEvent::FilesLoaded(intake.accepted));
        }
    }

    pub async fn read_paths(&self, paths: &[PathBuf]) -> Intake {
        let mut intake = Intake::default();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for path in paths {
            // The same file dropped twice (or via another path) is read once
            let key = tokio::fs::canonicalize(path).await.unwrap_or_else(|_| path.clone());
            if !seen.insert(key) {
                tracing::debug!("Skipping duplicate path {}", path.display());
                continue;
            }

            match self.read_file(path).await {
                Ok(file) => intake.accepted.push(file),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.display().to_string());
                    intake.rejected.push((name, e));
                }
            }
        }

        intake
    }

    pub async fn read_file(&self, path: &Path) -> Result<RawFile, FileError> {
        if !path.exists() {
            return Err(FileError::NotFound {
                path: path.to_string_lossy().to_string(),
            });
        }

        if !path.is_file() {
            return Err(FileError::NotAFile {
                path: path.to_string_lossy().to_string(),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path).await?;
        self.accept_bytes(name, bytes.into())
    }

    /// Accepts a payload that arrived without a path, e.g. dropped bytes.
    pub fn accept_bytes(&self, name: String, data: Arc<[u8]>) -> Result<RawFile, FileError> {
        let extension = source_extension(&name);
        let mime = self.detect_mime(&data, &extension);

        self.validator
            .validate_input(&name, &mime, &extension)
            .map_err(|_| FileError::Unsupported { name: name.clone() })?;

        Ok(RawFile {
            size: data.len() as u64,
            name,
            mime,
            data: Blob::new(data),
        })
    }

    /// Content sniffing first. The extension table decides when the bytes
    /// carry no recognizable signature (svg, raw streams, ...) or when the
    /// sniffed category does not list the extension: containers such as Ogg
    /// and ASF hold both audio and video, so `.ogv` sniffs as `audio/ogg`
    /// and `.wma` as `video/x-ms-wmv`.
    pub fn detect_mime(&self, data: &[u8], extension: &str) -> String {
        let head = &data[..std::cmp::min(data.len(), SNIFF_BYTES)];
        if let Some(kind) = infer::get(head) {
            let sniffed = kind.mime_type();
            let listed = MediaKind::from_mime(sniffed)
                .map_or(false, |k| self.validator.accepted_extensions(k).contains(&extension));
            if listed {
                return sniffed.to_string();
            }
            tracing::debug!("Sniffed {} does not list .{}, using the extension", sniffed, extension);
        }

        match self.validator.kind_for_extension(extension) {
            Some(kind) => format!("{}/{}", kind.mime_prefix(), extension),
            None => String::new(),
        }
    }

    fn send_event(&self, event: AppEvent) {
        if let Err(e) = self.event_sender.send(event) {
            tracing::error!("Failed to send file event: {}", e);
        }
    }
}
