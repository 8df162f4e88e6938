use crate::config::AppConfig;
use crate::events::{AppEvent, EventSender};
use std::sync::Arc;

pub mod conversion_service;
pub mod export_service;
pub mod file_service;
pub mod validation_service;

pub use conversion_service::ConversionService;
pub use export_service::{DirectorySink, ExportService};
pub use file_service::FileService;
pub use validation_service::ValidationService;

#[derive(Clone)]
pub struct ServiceManager {
    pub conversion: ConversionService,
    pub file: FileService,
    pub export: ExportService,
    pub validation: ValidationService,
    event_sender: EventSender,
}

impl ServiceManager {
    pub fn new(event_sender: EventSender, config: &AppConfig) -> Self {
        let sink = DirectorySink::new(config.resolved_download_dir());
        tracing::info!("Downloads go to {}", sink.dir().display());

        Self {
            conversion: ConversionService::new(event_sender.clone()),
            file: FileService::new(event_sender.clone()),
            export: ExportService::new(Arc::new(sink)),
            validation: ValidationService::new(),
            event_sender,
        }
    }

    pub fn send_event(&self, event: AppEvent) {
        if let Err(e) = self.event_sender.send(event) {
            tracing::error!("Failed to send event: {}", e);
        }
    }
}
