use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub type JobId = Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Job not found: {id}")]
    JobNotFound { id: JobId },
    #[error("Job can no longer be edited: {id}")]
    NotEditable { id: JobId },
    #[error("A conversion is already running")]
    Busy,
    #[error("Every file needs a target format before converting")]
    NotReady,
}

/// Immutable binary payload shared between a job, the engine and exports.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob(Arc<[u8]>);

impl Blob {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn same_allocation(&self, other: &Blob) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.0.len())
    }
}

/// A file as handed over by drag-and-drop or the file picker.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub data: Blob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split('/').next() {
            Some("image") => Some(MediaKind::Image),
            Some("video") => Some(MediaKind::Video),
            Some("audio") => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn mime_prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedOutput {
    pub name: String,
    pub mime: String,
    pub data: Blob,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum JobStatus {
    #[default]
    Queued,
    Converting,
    Converted { output: ConvertedOutput },
    Errored { reason: String },
}

impl JobStatus {
    pub fn is_queued(&self) -> bool {
        matches!(self, JobStatus::Queued)
    }

    pub fn is_converting(&self) -> bool {
        matches!(self, JobStatus::Converting)
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, JobStatus::Converted { .. })
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, JobStatus::Errored { .. })
    }

    /// Converted and Errored are terminal within a batch.
    pub fn is_settled(&self) -> bool {
        self.is_converted() || self.is_errored()
    }

    pub fn output(&self) -> Option<&ConvertedOutput> {
        match self {
            JobStatus::Converted { output } => Some(output),
            _ => None,
        }
    }

    pub fn transition_to_converting(self) -> Self {
        match self {
            JobStatus::Queued => JobStatus::Converting,
            _ => self,
        }
    }

    pub fn transition_to_converted(self, output: ConvertedOutput) -> Self {
        match self {
            JobStatus::Converting => JobStatus::Converted { output },
            _ => self,
        }
    }

    pub fn transition_to_errored(self, reason: String) -> Self {
        match self {
            JobStatus::Converting => JobStatus::Errored { reason },
            _ => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub source_extension: String,
    pub target_extension: Option<String>,
    pub payload: Blob,
    pub status: JobStatus,
}

impl Job {
    pub fn from_raw(file: RawFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_extension: source_extension(&file.name),
            file_name: file.name,
            file_size: file.size,
            file_type: file.mime,
            target_extension: None,
            payload: file.data,
            status: JobStatus::Queued,
        }
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.file_type)
    }

    /// Two jobs collide when they carry the same payload under the same name.
    /// Paths are deduplicated earlier, at intake; this catches the same
    /// descriptor handed over twice in one drop.
    pub fn same_source(&self, other: &Job) -> bool {
        self.file_name == other.file_name && self.payload.same_allocation(&other.payload)
    }
}

/// Last `.`-separated segment of `file_name`, lower-cased; empty without a dot.
pub fn source_extension(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub queued: usize,
    pub converting: usize,
    pub converted: usize,
    pub errored: usize,
}

/// The batch of jobs currently loaded, plus its batch-level flags.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Vec<Job>,
    is_converting: bool,
    is_done: bool,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole batch with one queued job per file.
    pub fn ingest(&mut self, files: impl IntoIterator<Item = RawFile>) -> &[Job] {
        let mut jobs: Vec<Job> = Vec::new();
        for file in files {
            let job = Job::from_raw(file);
            if jobs.iter().any(|existing| existing.same_source(&job)) {
                tracing::debug!("Skipping duplicate file {}", job.file_name);
                continue;
            }
            jobs.push(job);
        }

        if !self.jobs.is_empty() {
            tracing::info!("Replacing batch of {} jobs", self.jobs.len());
        }
        self.jobs = jobs;
        self.is_converting = false;
        self.is_done = false;
        tracing::info!("Queued {} files", self.jobs.len());
        &self.jobs
    }

    pub fn set_target(&mut self, id: JobId, extension: &str) -> Result<(), RegistryError> {
        if self.is_converting {
            return Err(RegistryError::Busy);
        }

        let job = self
            .jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or(RegistryError::JobNotFound { id })?;

        if !job.status.is_queued() {
            return Err(RegistryError::NotEditable { id });
        }

        let extension = extension.trim().to_lowercase();
        if job.target_extension.as_deref() != Some(extension.as_str()) {
            tracing::debug!("{} -> {}", job.file_name, extension);
            job.target_extension = Some(extension);
        }
        Ok(())
    }

    pub fn remove(&mut self, id: JobId) -> Result<Job, RegistryError> {
        if self.is_converting {
            return Err(RegistryError::Busy);
        }

        let index = self
            .jobs
            .iter()
            .position(|job| job.id == id)
            .ok_or(RegistryError::JobNotFound { id })?;
        Ok(self.jobs.remove(index))
    }

    /// Every job has a target; status is deliberately not consulted.
    pub fn is_ready_to_convert(&self) -> bool {
        !self.jobs.is_empty() && self.jobs.iter().all(|job| job.target_extension.is_some())
    }

    pub fn reset(&mut self) {
        self.jobs.clear();
        self.is_converting = false;
        self.is_done = false;
    }

    /// Marks the batch as converting and returns the snapshot to convert.
    pub fn begin_conversion(&mut self) -> Result<Vec<Job>, RegistryError> {
        if self.is_converting {
            return Err(RegistryError::Busy);
        }
        if !self.is_ready_to_convert() {
            return Err(RegistryError::NotReady);
        }

        self.is_converting = true;
        for job in self.jobs.iter_mut() {
            job.status = std::mem::take(&mut job.status).transition_to_converting();
        }
        Ok(self.jobs.clone())
    }

    /// Leaves the batch untouched, e.g. when no engine was available.
    pub fn abort_conversion(&mut self) {
        self.is_converting = false;
        for job in self.jobs.iter_mut() {
            if job.status.is_converting() {
                job.status = JobStatus::Queued;
            }
        }
    }

    pub fn finish_conversion(&mut self, jobs: Vec<Job>) {
        self.jobs = jobs;
        self.is_converting = false;
        self.is_done = true;
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_converting(&self) -> bool {
        self.is_converting
    }

    pub fn is_done(&self) -> bool {
        self.is_done
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.jobs.len(),
            ..Default::default()
        };

        for job in &self.jobs {
            match job.status {
                JobStatus::Queued => summary.queued += 1,
                JobStatus::Converting => summary.converting += 1,
                JobStatus::Converted { .. } => summary.converted += 1,
                JobStatus::Errored { .. } => summary.errored += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn raw(name: &str, mime: &str) -> RawFile {
        let data = Blob::from(name.as_bytes().to_vec());
        RawFile {
            name: name.to_string(),
            size: data.len() as u64,
            mime: mime.to_string(),
            data,
        }
    }

    #[test]
    fn test_source_extension() {
        assert_eq!(source_extension("archive"), "");
        assert_eq!(source_extension("a.b.MP4"), "mp4");
        assert_eq!(source_extension("photo.JPeg"), "jpeg");
        assert_eq!(source_extension("trailing."), "");
    }

    #[test]
    fn test_ingest_replaces_batch() {
        let mut registry = JobRegistry::new();
        registry.ingest(vec![raw("a.png", "image/png"), raw("b.mp3", "audio/mpeg")]);
        assert_eq!(registry.jobs().len(), 2);

        registry.ingest(vec![raw("c.mp4", "video/mp4")]);
        assert_eq!(registry.jobs().len(), 1);
        assert_eq!(registry.jobs()[0].file_name, "c.mp4");
        assert!(registry.jobs()[0].status.is_queued());
        assert!(registry.jobs()[0].target_extension.is_none());
    }

    #[test]
    fn test_ingest_skips_exact_duplicates() {
        let file = raw("a.png", "image/png");
        let mut registry = JobRegistry::new();
        registry.ingest(vec![file.clone(), file, raw("a.png", "image/png")]);
        // same name but a distinct payload is a different file
        assert_eq!(registry.jobs().len(), 2);
    }

    #[test]
    fn test_readiness_tracks_targets() {
        let mut registry = JobRegistry::new();
        assert!(!registry.is_ready_to_convert());

        registry.ingest(vec![raw("a.png", "image/png"), raw("b.wav", "audio/wav")]);
        assert!(!registry.is_ready_to_convert());

        let ids: Vec<JobId> = registry.jobs().iter().map(|job| job.id).collect();
        registry.set_target(ids[0], "jpg").unwrap();
        assert!(!registry.is_ready_to_convert());
        registry.set_target(ids[1], "mp3").unwrap();
        assert!(registry.is_ready_to_convert());
    }

    #[test]
    fn test_set_target_touches_one_job() {
        let mut registry = JobRegistry::new();
        registry.ingest(vec![
            raw("a.png", "image/png"),
            raw("b.png", "image/png"),
            raw("c.png", "image/png"),
        ]);
        let before = registry.jobs().to_vec();
        let id = before[1].id;

        registry.set_target(id, "WEBP").unwrap();
        registry.set_target(id, "webp").unwrap();

        let after = registry.jobs();
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[2]);
        assert_eq!(after[1].target_extension.as_deref(), Some("webp"));
        assert_eq!(after[1].status, JobStatus::Queued);
    }

    #[test]
    fn test_set_target_unknown_job() {
        let mut registry = JobRegistry::new();
        let id = Uuid::new_v4();
        assert_eq!(
            registry.set_target(id, "png"),
            Err(RegistryError::JobNotFound { id })
        );
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut registry = JobRegistry::new();
        registry.ingest(vec![
            raw("a.png", "image/png"),
            raw("b.png", "image/png"),
            raw("c.png", "image/png"),
        ]);
        let id = registry.jobs()[1].id;
        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.file_name, "b.png");

        let names: Vec<&str> = registry.jobs().iter().map(|j| j.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
    }

    #[test]
    fn test_conversion_flags() {
        let mut registry = JobRegistry::new();
        registry.ingest(vec![raw("a.png", "image/png")]);
        assert_eq!(registry.begin_conversion(), Err(RegistryError::NotReady));

        let id = registry.jobs()[0].id;
        registry.set_target(id, "jpg").unwrap();
        let snapshot = registry.begin_conversion().unwrap();
        assert!(registry.is_converting());
        assert!(snapshot[0].status.is_converting());
        assert_eq!(registry.begin_conversion(), Err(RegistryError::Busy));
        assert_eq!(registry.remove(id), Err(RegistryError::Busy));

        registry.abort_conversion();
        assert!(!registry.is_converting());
        assert!(registry.jobs()[0].status.is_queued());

        let snapshot = registry.begin_conversion().unwrap();
        registry.finish_conversion(snapshot);
        assert!(registry.is_done());
        // a finished batch is still considered ready
        assert!(registry.is_ready_to_convert());

        registry.reset();
        assert!(registry.is_empty());
        assert!(!registry.is_done());
        assert!(!registry.is_ready_to_convert());
    }

    #[test]
    fn test_status_transitions_ignore_invalid_edges() {
        assert_eq!(JobStatus::default(), JobStatus::Queued);

        let output = ConvertedOutput {
            name: "a.jpg".to_string(),
            mime: "image/jpg".to_string(),
            data: Blob::from(vec![1, 2, 3]),
        };

        let converted = JobStatus::Queued
            .transition_to_converting()
            .transition_to_converted(output.clone());
        assert_eq!(converted.output(), Some(&output));

        // terminal states do not move
        assert_eq!(
            converted.clone().transition_to_errored("late".to_string()),
            converted
        );
        assert!(JobStatus::Queued
            .transition_to_errored("x".to_string())
            .is_queued());
    }

    #[test]
    fn test_summary_counts() {
        let mut registry = JobRegistry::new();
        registry.ingest(vec![raw("a.png", "image/png"), raw("b.png", "image/png")]);
        let summary = registry.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.queued, 2);
        assert_eq!(summary.converted, 0);
    }
}
