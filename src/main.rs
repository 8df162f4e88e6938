use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

mod app;
mod config;
mod constants;
mod engine;
mod events;
mod resize;
mod services;
mod state;
mod ui;

use app::ConverterApp;
use config::AppConfig;
use constants::{APP_NAME, APP_VERSION, MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    // Background work (engine load, file intake, conversions) runs here
    let rt = Runtime::new()?;
    let handle = rt.handle().clone();

    let config = AppConfig::load();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_min_inner_size([MIN_WINDOW_WIDTH, MIN_WINDOW_HEIGHT])
            .with_title(APP_NAME)
            .with_resizable(true)
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let app_creator = move |_cc: &eframe::CreationContext| -> Box<dyn eframe::App> {
        Box::new(ConverterApp::new(handle, config))
    };

    eframe::run_native(APP_NAME, options, Box::new(app_creator))
        .map_err(|e| anyhow::anyhow!("Failed to run application: {}", e))?;

    tracing::info!("Application shutting down");
    Ok(())
}
