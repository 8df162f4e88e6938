use crate::engine::EngineHandle;
use crate::events::{AppEvent, EventSender};
use crate::state::{Job, JobStatus};
use futures_util::future::join_all;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionServiceError {
    #[error("Conversion engine is not loaded")]
    EngineUnavailable,
}

/// Drives one batch-wide conversion pass against the shared engine.
#[derive(Clone)]
pub struct ConversionService {
    event_sender: EventSender,
}

impl ConversionService {
    pub fn new(event_sender: EventSender) -> Self {
        Self { event_sender }
    }

    /// Converts every job that has not settled yet and returns the batch with
    /// all jobs either Converted or Errored.
    ///
    /// Without an engine nothing is attempted: a single notification goes out
    /// and the caller keeps its batch as it was. Per-job failures never
    /// surface as an error here; they are recorded on the job.
    pub async fn convert_all(
        &self,
        jobs: Vec<Job>,
        engine: Option<&EngineHandle>,
    ) -> Result<Vec<Job>, ConversionServiceError> {
        let Some(engine) = engine else {
            tracing::error!("Convert requested before the engine was loaded");
            self.send_event(AppEvent::error("Error", "The conversion engine is not loaded."));
            return Err(ConversionServiceError::EngineUnavailable);
        };

        let pending = jobs.iter().filter(|job| !job.status.is_settled()).count();
        tracing::info!(
            "Converting {} of {} files with {}",
            pending,
            jobs.len(),
            engine.name()
        );

        let converted = join_all(jobs.into_iter().map(|job| self.convert_job(job, engine))).await;

        let failed = converted.iter().filter(|job| job.status.is_errored()).count();
        tracing::info!("Batch finished: {} errored", failed);
        Ok(converted)
    }

    async fn convert_job(&self, mut job: Job, engine: &EngineHandle) -> Job {
        if job.status.is_settled() {
            return job;
        }

        job.status = std::mem::take(&mut job.status).transition_to_converting();
        self.send_event(AppEvent::JobConverting(job.id));

        let result = engine.convert(&job).await;
        let status = std::mem::take(&mut job.status);
        job.status = match result {
            Ok(output) => {
                tracing::debug!("{} -> {}", job.file_name, output.name);
                self.send_event(AppEvent::JobConverted(job.id));
                status.transition_to_converted(output)
            }
            Err(e) => {
                tracing::warn!("Failed to convert {}: {}", job.file_name, e);
                self.send_event(AppEvent::JobFailed {
                    job_id: job.id,
                    error: e.to_string(),
                });
                status.transition_to_errored(e.to_string())
            }
        };

        debug_assert!(!matches!(job.status, JobStatus::Queued | JobStatus::Converting));
        job
    }

    fn send_event(&self, event: AppEvent) {
        if let Err(e) = self.event_sender.send(event) {
            tracing::error!("Failed to send conversion event: {}", e);
        }
    }
}
