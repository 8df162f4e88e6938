use crate::services::validation_service::ValidationService;
use crate::state::{Blob, Job};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("{name} has not been converted")]
    NotConverted { name: String },
    #[error("Object URL was already revoked: {url}")]
    Revoked { url: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registry of transient `blob:` URLs handed out for downloads and previews.
#[derive(Clone, Default)]
pub struct BlobUrls {
    entries: Arc<Mutex<HashMap<String, (Blob, String)>>>,
}

impl BlobUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, data: Blob, mime: &str) -> ObjectUrl {
        let url = format!("blob:{}", Uuid::new_v4());
        self.lock().insert(url.clone(), (data, mime.to_string()));
        ObjectUrl {
            url,
            registry: self.clone(),
        }
    }

    /// The registered bytes and their MIME type.
    pub fn resolve(&self, url: &str) -> Option<(Blob, String)> {
        self.lock().get(url).cloned()
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn revoke(&self, url: &str) {
        if self.lock().remove(url).is_some() {
            tracing::trace!("Revoked {}", url);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, (Blob, String)>> {
        // A poisoned map still holds valid entries
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A registered URL; revoked when dropped.
pub struct ObjectUrl {
    url: String,
    registry: BlobUrls,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

/// Where a triggered download ends up.
pub trait DownloadSink: Send + Sync {
    fn save(&self, name: &str, mime: &str, data: &[u8]) -> Result<PathBuf, ExportError>;
}

/// Writes downloads into a directory without overwriting existing files.
pub struct DirectorySink {
    dir: PathBuf,
    validator: ValidationService,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            validator: ValidationService::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn unique_path(&self, name: &str) -> PathBuf {
        let path = self.dir.join(name);
        if !path.exists() {
            return path;
        }

        let (stem, extension) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, ext),
            _ => (name, ""),
        };

        let mut counter = 1;
        loop {
            let candidate = if extension.is_empty() {
                format!("{}_{}", stem, counter)
            } else {
                format!("{}_{}.{}", stem, counter, extension)
            };

            let candidate = self.dir.join(candidate);
            if !candidate.exists() {
                return candidate;
            }
            counter += 1;
        }
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, name: &str, mime: &str, data: &[u8]) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.unique_path(&self.validator.sanitize_filename(name));
        std::fs::write(&path, data)?;
        tracing::info!("Saved {} ({}, {} bytes)", path.display(), mime, data.len());
        Ok(path)
    }
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub saved: Vec<PathBuf>,
    pub failed: Vec<(String, ExportError)>,
}

#[derive(Clone)]
pub struct ExportService {
    urls: BlobUrls,
    sink: Arc<dyn DownloadSink>,
}

impl ExportService {
    pub fn new(sink: Arc<dyn DownloadSink>) -> Self {
        Self {
            urls: BlobUrls::new(),
            sink,
        }
    }

    #[cfg(test)]
    pub fn urls(&self) -> &BlobUrls {
        &self.urls
    }

    /// Downloads one converted job under its output name.
    pub fn export_one(&self, job: &Job) -> Result<PathBuf, ExportError> {
        let output = job.status.output().ok_or_else(|| ExportError::NotConverted {
            name: job.file_name.clone(),
        })?;
        self.export_bytes(&output.name, output.data.clone(), &output.mime)
    }

    /// Errored and unconverted jobs are skipped without complaint.
    pub fn export_all(&self, jobs: &[Job]) -> ExportReport {
        let mut report = ExportReport::default();

        for job in jobs.iter().filter(|job| job.status.is_converted()) {
            match self.export_one(job) {
                Ok(path) => report.saved.push(path),
                Err(e) => {
                    tracing::error!("Failed to export {}: {}", job.file_name, e);
                    report.failed.push((job.file_name.clone(), e));
                }
            }
        }

        report
    }

    /// The URL lives exactly as long as this call, whatever the outcome.
    pub fn export_bytes(&self, name: &str, data: Blob, mime: &str) -> Result<PathBuf, ExportError> {
        let url = self.urls.create(data, mime);
        let (data, mime) = self
            .urls
            .resolve(url.as_str())
            .ok_or_else(|| ExportError::Revoked {
                url: url.as_str().to_string(),
            })?;
        self.sink.save(name, &mime, &data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::state::tests::raw;
    use crate::state::{ConvertedOutput, JobStatus};

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) saved: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    impl DownloadSink for RecordingSink {
        fn save(&self, name: &str, mime: &str, data: &[u8]) -> Result<PathBuf, ExportError> {
            self.saved
                .lock()
                .unwrap()
                .push((name.to_string(), mime.to_string(), data.to_vec()));
            Ok(PathBuf::from(name))
        }
    }

    struct FailingSink;

    impl DownloadSink for FailingSink {
        fn save(&self, _name: &str, _mime: &str, _data: &[u8]) -> Result<PathBuf, ExportError> {
            Err(ExportError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    fn converted(name: &str, output_name: &str) -> Job {
        let mut job = Job::from_raw(raw(name, "image/png"));
        job.target_extension = Some("jpg".to_string());
        job.status = JobStatus::Converted {
            output: ConvertedOutput {
                name: output_name.to_string(),
                mime: "image/jpg".to_string(),
                data: output_name.as_bytes().to_vec().into(),
            },
        };
        job
    }

    fn errored(name: &str) -> Job {
        let mut job = Job::from_raw(raw(name, "image/png"));
        job.target_extension = Some("jpg".to_string());
        job.status = JobStatus::Errored {
            reason: "boom".to_string(),
        };
        job
    }

    #[test]
    fn test_object_url_revoked_on_drop() {
        let urls = BlobUrls::new();
        let url = urls.create(vec![1, 2, 3].into(), "image/png");
        assert!(url.as_str().starts_with("blob:"));
        let (data, mime) = urls.resolve(url.as_str()).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(mime, "image/png");

        let key = url.as_str().to_string();
        drop(url);
        assert!(urls.resolve(&key).is_none());
        assert_eq!(urls.live_count(), 0);
    }

    #[test]
    fn test_export_all_skips_errored() {
        let sink = Arc::new(RecordingSink::default());
        let service = ExportService::new(sink.clone());
        let jobs = vec![
            converted("a.png", "a.jpg"),
            errored("b.png"),
            converted("c.png", "c.jpg"),
        ];

        let report = service.export_all(&jobs);
        assert_eq!(report.saved.len(), 2);
        assert!(report.failed.is_empty());

        let saved = sink.saved.lock().unwrap();
        let names: Vec<&str> = saved.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "c.jpg"]);
        // the output MIME travels with the bytes to the sink
        assert_eq!(saved[0].1, "image/jpg");
        assert_eq!(saved[0].2, b"a.jpg".to_vec());
        assert_eq!(service.urls().live_count(), 0);
    }

    #[test]
    fn test_export_one_requires_converted_job() {
        let service = ExportService::new(Arc::new(RecordingSink::default()));
        let result = service.export_one(&errored("b.png"));
        assert!(matches!(result, Err(ExportError::NotConverted { .. })));
    }

    #[test]
    fn test_url_released_when_sink_fails() {
        let service = ExportService::new(Arc::new(FailingSink));
        assert!(service.export_one(&converted("a.png", "a.jpg")).is_err());
        assert_eq!(service.urls().live_count(), 0);
    }

    #[test]
    fn test_directory_sink_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("downloads"));

        let first = sink.save("clip.mp3", "audio/mp3", b"one").unwrap();
        let second = sink.save("clip.mp3", "audio/mp3", b"two").unwrap();
        let third = sink.save("../clip.mp3", "audio/mp3", b"three").unwrap();

        assert_eq!(first.file_name().unwrap(), "clip.mp3");
        assert_eq!(second.file_name().unwrap(), "clip_1.mp3");
        assert_eq!(third.file_name().unwrap(), "_clip.mp3");
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert!(third.starts_with(sink.dir()));
    }
}
