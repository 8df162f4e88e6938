use crate::state::{ConvertedOutput, Job};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

pub mod ffmpeg;

pub use ffmpeg::FfmpegEngine;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Conversion engine not found: {0}")]
    NotFound(String),
    #[error("Conversion engine failed to start: {0}")]
    LoadFailed(String),
    #[error("No target format selected for {file_name}")]
    MissingTarget { file_name: String },
    #[error("Engine exited with {status}: {stderr}")]
    Process { status: String, stderr: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The opaque transcoding capability every conversion goes through.
#[async_trait::async_trait]
pub trait ConversionEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn convert(&self, job: &Job) -> Result<ConvertedOutput, EngineError>;
}

/// Shared, read-only reference to the loaded engine.
#[derive(Clone)]
pub struct EngineHandle(Arc<dyn ConversionEngine>);

impl EngineHandle {
    pub fn new(engine: impl ConversionEngine + 'static) -> Self {
        Self(Arc::new(engine))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub async fn convert(&self, job: &Job) -> Result<ConvertedOutput, EngineError> {
        self.0.convert(job).await
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EngineHandle").field(&self.name()).finish()
    }
}

#[derive(Debug, Clone)]
pub enum EngineState {
    Uninitialized,
    Loading,
    Ready(EngineHandle),
    Failed(String),
}

impl EngineState {
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineState::Ready(_))
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, EngineState::Ready(_) | EngineState::Failed(_))
    }

    pub fn handle(&self) -> Option<EngineHandle> {
        match self {
            EngineState::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            EngineState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Acquires the process-wide engine exactly once and publishes its readiness.
#[derive(Clone)]
pub struct EngineLoader {
    state: Arc<watch::Sender<EngineState>>,
}

impl Default for EngineLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineLoader {
    pub fn new() -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        Self {
            state: Arc::new(state),
        }
    }

    /// Runs `factory` if no load was requested yet; later callers wait for
    /// the first load to settle instead.
    pub async fn load<F, Fut>(&self, factory: F) -> Option<EngineHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EngineHandle, EngineError>>,
    {
        let claimed = self.state.send_if_modified(|state| {
            if matches!(state, EngineState::Uninitialized) {
                *state = EngineState::Loading;
                true
            } else {
                false
            }
        });

        if !claimed {
            tracing::debug!("Engine load already requested");
            return self.wait().await;
        }

        tracing::info!("Loading conversion engine");
        match factory().await {
            Ok(handle) => {
                tracing::info!("Conversion engine ready: {}", handle.name());
                self.state.send_replace(EngineState::Ready(handle.clone()));
                Some(handle)
            }
            Err(e) => {
                tracing::error!("Conversion engine failed to load: {}", e);
                self.state.send_replace(EngineState::Failed(e.to_string()));
                None
            }
        }
    }

    /// Suspends until the load settles, including when it has not been
    /// claimed yet. Returns at once if it already settled. There is no timeout.
    pub async fn wait(&self) -> Option<EngineHandle> {
        let mut receiver = self.state.subscribe();
        let settled = receiver.wait_for(EngineState::is_settled).await;
        match settled {
            Ok(state) => state.handle(),
            Err(_) => None,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    /// Still `Uninitialized` or `Loading`.
    pub fn is_pending(&self) -> bool {
        !self.state.borrow().is_settled()
    }
}

/// `clip.final.mov` + `mp3` -> `clip.final.mp3`
pub fn output_name(file_name: &str, target_extension: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };
    format!("{}.{}", stem, target_extension)
}

/// Keeps the source MIME category and swaps in the target subtype.
pub fn output_mime(file_type: &str, target_extension: &str) -> String {
    let category = file_type.split('/').next().unwrap_or_default();
    format!("{}/{}", category, target_extension)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine double: fails any job whose name contains "broken".
    #[derive(Default)]
    pub(crate) struct ScriptedEngine {
        pub(crate) calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ConversionEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn convert(&self, job: &Job) -> Result<ConvertedOutput, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            let target = job
                .target_extension
                .as_deref()
                .ok_or_else(|| EngineError::MissingTarget {
                    file_name: job.file_name.clone(),
                })?;

            if job.file_name.contains("broken") {
                return Err(EngineError::Process {
                    status: "exit status: 1".to_string(),
                    stderr: "Invalid data found when processing input".to_string(),
                });
            }

            let mut data = job.payload.to_vec();
            data.extend_from_slice(target.as_bytes());
            Ok(ConvertedOutput {
                name: output_name(&job.file_name, target),
                mime: output_mime(&job.file_type, target),
                data: data.into(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedEngine;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_output_naming() {
        assert_eq!(output_name("clip.final.MOV", "mp3"), "clip.final.mp3");
        assert_eq!(output_name("archive", "zip"), "archive.zip");
        assert_eq!(output_name(".hidden", "png"), ".hidden.png");
        assert_eq!(output_mime("video/quicktime", "mp3"), "video/mp3");
        assert_eq!(output_mime("", "png"), "/png");
    }

    #[tokio::test]
    async fn test_loader_runs_factory_once() {
        let loader = EngineLoader::new();
        let factory_calls = Arc::new(AtomicUsize::new(0));
        assert!(!loader.is_ready());

        for _ in 0..3 {
            let calls = factory_calls.clone();
            let handle = loader
                .load(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(EngineHandle::new(ScriptedEngine::default()))
                })
                .await;
            assert!(handle.is_some());
        }

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        assert!(loader.is_ready());
        assert_eq!(
            loader.state().handle().map(|h| h.name().to_string()).as_deref(),
            Some("scripted")
        );
    }

    #[tokio::test]
    async fn test_loader_failure_is_permanent() {
        let loader = EngineLoader::new();
        let handle = loader
            .load(|| async { Err(EngineError::NotFound("ffmpeg".to_string())) })
            .await;
        assert!(handle.is_none());
        assert!(loader.state().error().is_some());
        assert!(!loader.is_pending());
        // settled: waiting returns immediately
        assert!(loader.wait().await.is_none());

        // no retry: a second factory is never consulted
        let handle = loader
            .load(|| async { Ok(EngineHandle::new(ScriptedEngine::default())) })
            .await;
        assert!(handle.is_none());
        assert!(!loader.is_ready());
    }

    #[tokio::test]
    async fn test_wait_suspends_until_loaded() {
        let loader = EngineLoader::new();
        // nothing has claimed the load yet
        assert!(matches!(loader.state(), EngineState::Uninitialized));
        assert!(loader.is_pending());
        let waiter = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.wait().await })
        };

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        loader
            .load(|| async { Ok(EngineHandle::new(ScriptedEngine::default())) })
            .await;

        let handle = waiter.await.unwrap();
        assert!(handle.is_some());
    }
}
