use crate::config::AppConfig;
use crate::constants::{
    AUDIO_EXTENSIONS, IMAGE_EXTENSIONS, MAX_NOTIFICATIONS, NOTIFICATION_TTL_SECONDS,
    VIDEO_EXTENSIONS,
};
use crate::engine::{EngineHandle, EngineLoader, FfmpegEngine};
use crate::events::{create_event_channel, AppEvent, EventReceiver, Severity};
use crate::resize::{self, ResizeState};
use crate::services::ServiceManager;
use crate::state::{JobId, JobRegistry};
use image::DynamicImage;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};
use tokio::runtime::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveTab {
    #[default]
    Converter,
    Resizer,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    created_at: Instant,
}

/// The image loaded into the resizer tab.
pub struct ResizerImage {
    pub file_name: String,
    pub source: DynamicImage,
    pub state: ResizeState,
    pub preview: Option<egui::TextureHandle>,
}

pub struct ConverterApp {
    pub config: AppConfig,
    pub registry: JobRegistry,
    pub engine: EngineLoader,
    pub notifications: Vec<Notification>,
    pub active_tab: ActiveTab,
    pub resizer: Option<ResizerImage>,
    pub services: ServiceManager,
    runtime: Handle,
    event_receiver: EventReceiver,
}

impl ConverterApp {
    pub fn new(runtime: Handle, config: AppConfig) -> Self {
        let (event_sender, event_receiver) = create_event_channel();
        let services = ServiceManager::new(event_sender, &config);

        let app = Self {
            config,
            registry: JobRegistry::new(),
            engine: EngineLoader::new(),
            notifications: Vec::new(),
            active_tab: ActiveTab::default(),
            resizer: None,
            services,
            runtime,
            event_receiver,
        };

        app.load_engine();
        app
    }

    /// Starts the one and only engine load.
    fn load_engine(&self) {
        let loader = self.engine.clone();
        let services = self.services.clone();
        let binary = self.config.ffmpeg_path.clone();

        self.runtime.spawn(async move {
            let handle = loader
                .load(|| async move { FfmpegEngine::load(binary).await.map(EngineHandle::new) })
                .await;

            match handle {
                Some(handle) => services.send_event(AppEvent::EngineLoaded(handle.name().to_string())),
                None => {
                    let error = loader
                        .state()
                        .error()
                        .unwrap_or("unknown error")
                        .to_string();
                    services.send_event(AppEvent::EngineFailed(error));
                }
            }
        });
    }

    pub fn is_engine_ready(&self) -> bool {
        self.engine.is_ready()
    }

    pub fn is_engine_pending(&self) -> bool {
        self.engine.is_pending()
    }

    pub fn update_status(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            match event {
                AppEvent::EngineLoaded(name) => {
                    tracing::debug!("Engine loaded: {}", name);
                }
                AppEvent::EngineFailed(error) => {
                    self.notify(Severity::Error, "Conversion engine unavailable", error);
                }
                AppEvent::JobConverting(id) | AppEvent::JobConverted(id) => {
                    tracing::trace!("Job {} progressed", id);
                }
                AppEvent::JobFailed { job_id, error } => {
                    tracing::debug!("Job {} failed: {}", job_id, error);
                }
                AppEvent::BatchConverted(jobs) => {
                    self.registry.finish_conversion(jobs);
                }
                AppEvent::ConversionAborted => {
                    self.registry.abort_conversion();
                }
                AppEvent::FilesLoaded(files) => {
                    if self.registry.is_converting() {
                        tracing::warn!("Ignoring {} files dropped during conversion", files.len());
                    } else {
                        self.registry.ingest(files);
                    }
                }
                AppEvent::Notify {
                    severity,
                    title,
                    message,
                } => self.notify(severity, title, message),
            }
        }

        let ttl = Duration::from_secs(NOTIFICATION_TTL_SECONDS);
        self.notifications.retain(|n| n.created_at.elapsed() < ttl);
    }

    pub fn notify(&mut self, severity: Severity, title: impl Into<String>, message: impl Into<String>) {
        self.notifications.push(Notification {
            severity,
            title: title.into(),
            message: message.into(),
            created_at: Instant::now(),
        });
        if self.notifications.len() > MAX_NOTIFICATIONS {
            let excess = self.notifications.len() - MAX_NOTIFICATIONS;
            self.notifications.drain(..excess);
        }
    }

    pub fn handle_paths(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() || self.registry.is_converting() {
            return;
        }

        let file_service = self.services.file.clone();
        self.runtime.spawn(async move {
            file_service.load_paths(paths).await;
        });
    }

    pub fn select_files(&mut self) {
        let all: Vec<&str> = IMAGE_EXTENSIONS
            .iter()
            .chain(VIDEO_EXTENSIONS)
            .chain(AUDIO_EXTENSIONS)
            .copied()
            .collect();

        let mut dialog = rfd::FileDialog::new()
            .add_filter("Media", &all)
            .add_filter("Image", IMAGE_EXTENSIONS)
            .add_filter("Video", VIDEO_EXTENSIONS)
            .add_filter("Audio", AUDIO_EXTENSIONS);

        if let Some(ref dir) = self.config.last_input_dir {
            dialog = dialog.set_directory(dir);
        }

        if let Some(paths) = dialog.pick_files() {
            if let Some(first) = paths.first() {
                self.config.update_last_input_dir(first);
                self.save_config();
            }
            self.handle_paths(paths);
        }
    }

    pub fn set_target(&mut self, id: JobId, extension: &str) {
        let Some(job) = self.registry.get(id) else {
            return;
        };

        if let Err(e) = self.services.validation.validate_target(job, extension) {
            self.notify(Severity::Error, "Error", e.to_string());
            return;
        }

        if let Err(e) = self.registry.set_target(id, extension) {
            self.notify(Severity::Error, "Error", e.to_string());
        }
    }

    pub fn remove_job(&mut self, id: JobId) {
        if let Err(e) = self.registry.remove(id) {
            self.notify(Severity::Error, "Error", e.to_string());
        }
    }

    pub fn start_conversion(&mut self) {
        let snapshot = match self.registry.begin_conversion() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.notify(Severity::Error, "Error", e.to_string());
                return;
            }
        };

        let loader = self.engine.clone();
        let services = self.services.clone();
        self.runtime.spawn(async move {
            // A load not yet claimed or still in flight is waited for; a failed one yields nothing
            let engine = loader.wait().await;

            match services.conversion.convert_all(snapshot, engine.as_ref()).await {
                Ok(jobs) => services.send_event(AppEvent::BatchConverted(jobs)),
                Err(_) => services.send_event(AppEvent::ConversionAborted),
            }
        });
    }

    pub fn download(&mut self, id: JobId) {
        let Some(job) = self.registry.get(id) else {
            return;
        };

        match self.services.export.export_one(job) {
            Ok(path) => {
                let message = path.display().to_string();
                self.notify(Severity::Info, "Saved", message);
            }
            Err(e) => self.notify(Severity::Error, "Download failed", e.to_string()),
        }
    }

    pub fn download_all(&mut self) {
        let report = self.services.export.export_all(self.registry.jobs());

        if !report.saved.is_empty() {
            self.notify(
                Severity::Info,
                "Saved",
                format!("{} files saved", report.saved.len()),
            );
        }
        for (name, e) in report.failed {
            self.notify(Severity::Error, format!("Could not save {}", name), e.to_string());
        }
    }

    pub fn reset(&mut self) {
        self.registry.reset();
    }

    pub fn open_resize_image(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("Image", IMAGE_EXTENSIONS);
        if let Some(ref dir) = self.config.last_input_dir {
            dialog = dialog.set_directory(dir);
        }

        let Some(path) = dialog.pick_file() else {
            return;
        };

        let loaded = std::fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| resize::open(&bytes).map_err(|e| e.to_string()));

        match loaded {
            Ok((source, state)) => {
                self.resizer = Some(ResizerImage {
                    file_name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default(),
                    source,
                    state,
                    preview: None,
                });
            }
            Err(e) => self.notify(Severity::Error, "Could not open image", e),
        }
    }

    pub fn save_resized(&mut self) {
        let Some(resizer) = &self.resizer else {
            return;
        };

        let state = &resizer.state;
        let rendered = resize::render(&resizer.source, state.width, state.height, state.quality_reduced);
        let result = rendered.map_err(|e| e.to_string()).and_then(|data| {
            self.services
                .export
                .export_bytes(&resize::download_name(SystemTime::now()), data.into(), "image/jpeg")
                .map_err(|e| e.to_string())
        });

        match result {
            Ok(path) => self.notify(Severity::Info, "Saved", path.display().to_string()),
            Err(e) => self.notify(Severity::Error, "Resize failed", e),
        }
    }

    pub fn save_config(&self) {
        if let Err(e) = self.config.save() {
            tracing::warn!("Failed to save config: {}", e);
        }
    }
}
