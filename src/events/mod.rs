use crate::state::{Job, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    // Engine lifecycle
    EngineLoaded(String),
    EngineFailed(String),

    // Conversion events
    JobConverting(JobId),
    JobConverted(JobId),
    JobFailed { job_id: JobId, error: String },
    BatchConverted(Vec<Job>),
    ConversionAborted,

    // File intake
    FilesLoaded(Vec<crate::state::RawFile>),

    // User-facing notifications
    Notify {
        severity: Severity,
        title: String,
        message: String,
    },
}

impl AppEvent {
    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        AppEvent::Notify {
            severity: Severity::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

pub type EventSender = tokio::sync::mpsc::UnboundedSender<AppEvent>;
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
