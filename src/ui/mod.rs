use crate::app::{ActiveTab, ConverterApp};
use crate::constants::{APP_NAME, DISPLAY_NAME_MAX_CHARS};
use crate::events::Severity;
use crate::state::{Job, JobId, JobStatus, MediaKind};
use eframe::egui;
use std::path::PathBuf;

/// Deferred row interactions, applied once the job list is no longer borrowed.
enum RowAction {
    SetTarget(JobId, String),
    Remove(JobId),
    Download(JobId),
}

impl eframe::App for ConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_status();
        self.handle_dropped_files(ctx);

        let window = ctx.input(|i| i.screen_rect().size());
        self.config.remember_window_size(window.x, window.y);

        let mut style = (*ctx.style()).clone();
        style.spacing.button_padding = egui::vec2(12.0, 8.0);
        style.spacing.item_spacing = egui::vec2(10.0, 10.0);
        ctx.set_style(style);
        ctx.set_visuals(egui::Visuals::dark());

        egui::TopBottomPanel::top("header")
            .frame(egui::Frame::none().fill(egui::Color32::from_gray(15)).inner_margin(15.0))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading(egui::RichText::new(APP_NAME).size(26.0).color(egui::Color32::WHITE).strong());
                    ui.label(
                        egui::RichText::new("Convert images, videos and audio on your own machine")
                            .size(14.0)
                            .color(egui::Color32::from_rgb(150, 150, 150)),
                    );
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_tabs(ui);
            match self.active_tab {
                ActiveTab::Converter => self.show_converter_tab(ui),
                ActiveTab::Resizer => self.show_resizer_tab(ui),
            }
        });

        self.show_notifications(ctx);

        if self.registry.is_converting() || self.is_engine_pending() || !self.notifications.is_empty() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.save_config();
    }
}

impl ConverterApp {
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if dropped.is_empty() || self.active_tab != ActiveTab::Converter {
            return;
        }

        let paths: Vec<PathBuf> = dropped.into_iter().filter_map(|file| file.path).collect();
        self.handle_paths(paths);
    }

    fn show_tabs(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.style_mut().spacing.button_padding = egui::vec2(25.0, 12.0);

            for (tab, label) in [
                (ActiveTab::Converter, "🔄 Convert"),
                (ActiveTab::Resizer, "📐 Resize"),
            ] {
                let selected = self.active_tab == tab;
                let text = if selected {
                    egui::RichText::new(label).size(16.0).color(egui::Color32::WHITE).strong()
                } else {
                    egui::RichText::new(label).size(16.0).color(egui::Color32::LIGHT_GRAY)
                };
                if ui.add(egui::SelectableLabel::new(selected, text)).clicked() {
                    self.active_tab = tab;
                }
            }
        });

        ui.add_space(5.0);
        ui.separator();
        ui.add_space(5.0);
    }

    fn show_converter_tab(&mut self, ui: &mut egui::Ui) {
        if self.registry.is_empty() {
            self.show_dropzone(ui);
            return;
        }

        let mut actions = Vec::new();
        egui::ScrollArea::vertical()
            .max_height(ui.available_height() - 70.0)
            .show(ui, |ui| {
                for job in self.registry.jobs() {
                    self.show_job_row(ui, job, &mut actions);
                    ui.add_space(8.0);
                }
            });

        for action in actions {
            match action {
                RowAction::SetTarget(id, extension) => self.set_target(id, &extension),
                RowAction::Remove(id) => self.remove_job(id),
                RowAction::Download(id) => self.download(id),
            }
        }

        ui.add_space(10.0);
        self.show_batch_controls(ui);
    }

    fn show_dropzone(&mut self, ui: &mut egui::Ui) {
        let hovering = ui.ctx().input(|i| !i.raw.hovered_files.is_empty());
        let stroke = if hovering {
            egui::Stroke::new(2.0, egui::Color32::from_rgb(100, 160, 255))
        } else {
            egui::Stroke::new(2.0, egui::Color32::from_gray(70))
        };

        egui::Frame::none()
            .fill(egui::Color32::from_gray(30))
            .stroke(stroke)
            .rounding(10.0)
            .inner_margin(60.0)
            .show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.label(
                        egui::RichText::new("Drag & drop files here, or click to select files")
                            .size(18.0),
                    );
                    ui.add_space(12.0);
                    if ui.button("📁 Browse").clicked() {
                        self.select_files();
                    }
                });
            });
    }

    fn show_job_row(&self, ui: &mut egui::Ui, job: &Job, actions: &mut Vec<RowAction>) {
        let frame = egui::Frame::none()
            .fill(egui::Color32::from_gray(30))
            .stroke(egui::Stroke::new(1.0, egui::Color32::from_gray(45)))
            .rounding(10.0)
            .inner_margin(14.0);

        frame.show(ui, |ui| {
            ui.horizontal(|ui| {
                if self.is_engine_pending() {
                    ui.spinner();
                } else if !self.is_engine_ready() {
                    ui.label(egui::RichText::new("⚠").color(egui::Color32::from_rgb(255, 100, 100)))
                        .on_hover_text("Conversion engine unavailable");
                }

                ui.label(egui::RichText::new(kind_icon(job.kind())).size(20.0));
                ui.label(egui::RichText::new(compress_file_name(&job.file_name)).strong())
                    .on_hover_text(job.file_name.as_str());
                ui.label(
                    egui::RichText::new(format!("({})", bytes_to_size(job.file_size)))
                        .color(egui::Color32::GRAY),
                );

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    match &job.status {
                        JobStatus::Converted { .. } => {
                            if ui.button("Download").clicked() {
                                actions.push(RowAction::Download(job.id));
                            }
                        }
                        _ => {
                            let removable = !self.registry.is_converting();
                            if ui.add_enabled(removable, egui::Button::new("✖")).clicked() {
                                actions.push(RowAction::Remove(job.id));
                            }
                        }
                    }

                    match &job.status {
                        JobStatus::Errored { reason } => {
                            ui.label(
                                egui::RichText::new("Error Converting File ⚠")
                                    .color(egui::Color32::from_rgb(255, 100, 100)),
                            )
                            .on_hover_text(reason.as_str());
                        }
                        JobStatus::Converted { .. } => {
                            ui.label(egui::RichText::new("Done ✔").color(egui::Color32::GREEN));
                        }
                        JobStatus::Converting => {
                            ui.spinner();
                            ui.label("Converting");
                        }
                        JobStatus::Queued => self.show_target_menu(ui, job, actions),
                    }
                });
            });
        });
    }

    fn show_target_menu(&self, ui: &mut egui::Ui, job: &Job, actions: &mut Vec<RowAction>) {
        let Some(kind) = job.kind() else {
            ui.label(egui::RichText::new("Unknown type").color(egui::Color32::GRAY));
            return;
        };

        let selected = job.target_extension.clone().unwrap_or_else(|| "...".to_string());
        egui::ComboBox::from_id_source(job.id)
            .selected_text(selected)
            .width(110.0)
            .show_ui(ui, |ui| {
                for group in self.services.validation.target_groups(kind) {
                    ui.label(egui::RichText::new(group.label).strong());
                    for ext in group.extensions {
                        let current = job.target_extension.as_deref() == Some(*ext);
                        if ui.selectable_label(current, *ext).clicked() && !current {
                            actions.push(RowAction::SetTarget(job.id, ext.to_string()));
                        }
                    }
                    ui.separator();
                }
            });
        ui.label(egui::RichText::new("Convert to").color(egui::Color32::GRAY));
    }

    fn show_batch_controls(&mut self, ui: &mut egui::Ui) {
        let summary = self.registry.summary();

        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(format!(
                    "{} files · {} done · {} failed",
                    summary.total, summary.converted, summary.errored
                ))
                .color(egui::Color32::GRAY),
            );

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if self.registry.is_done() {
                    if ui.button(egui::RichText::new("Reset").color(egui::Color32::from_rgb(255, 100, 100))).clicked() {
                        self.reset();
                    }
                    if ui.button(egui::RichText::new("⬇ Download All").size(16.0)).clicked() {
                        self.download_all();
                    }
                } else {
                    let enabled = self.registry.is_ready_to_convert() && !self.registry.is_converting();
                    let button = egui::Button::new(egui::RichText::new("🚀 Convert").size(16.0));
                    if ui.add_enabled(enabled, button).clicked() {
                        self.start_conversion();
                    }
                    if self.registry.is_converting() {
                        ui.spinner();
                    }
                }
            });
        });
    }

    fn show_resizer_tab(&mut self, ui: &mut egui::Ui) {
        if self.resizer.is_none() {
            ui.vertical_centered(|ui| {
                ui.add_space(50.0);
                if ui.button("📁 Choose an image").clicked() {
                    self.open_resize_image();
                }
            });
            return;
        }
        let Some(resizer) = self.resizer.as_mut() else {
            return;
        };

        let texture = resizer.preview.get_or_insert_with(|| {
            let thumb = resizer.source.thumbnail(512, 512).to_rgba8();
            let size = [thumb.width() as usize, thumb.height() as usize];
            let image = egui::ColorImage::from_rgba_unmultiplied(size, thumb.as_raw());
            ui.ctx().load_texture("resize-preview", image, egui::TextureOptions::LINEAR)
        });
        let preview_size = texture.size_vec2();
        let texture_id = texture.id();

        ui.horizontal(|ui| {
            ui.image((texture_id, preview_size));

            ui.vertical(|ui| {
                let state = &mut resizer.state;
                let (original_width, original_height) = state.original_size();
                ui.label(egui::RichText::new(resizer.file_name.as_str()).strong());
                ui.label(
                    egui::RichText::new(format!("Original: {} × {}", original_width, original_height))
                        .color(egui::Color32::GRAY),
                );
                ui.add_space(10.0);

                egui::Grid::new("resize_controls")
                    .num_columns(2)
                    .spacing([20.0, 12.0])
                    .show(ui, |ui| {
                        ui.label("Width");
                        let mut width = state.width;
                        if ui.add(egui::DragValue::new(&mut width)).changed() {
                            state.on_width_edit(width);
                        }
                        ui.end_row();

                        ui.label("Height");
                        let mut height = state.height;
                        if ui.add(egui::DragValue::new(&mut height)).changed() {
                            state.on_height_edit(height);
                        }
                        ui.end_row();
                    });

                let mut ratio_locked = state.ratio_locked;
                if ui.checkbox(&mut ratio_locked, "Maintain Aspect Ratio").changed() {
                    state.toggle_ratio_lock();
                }
                let mut quality_reduced = state.quality_reduced;
                if ui.checkbox(&mut quality_reduced, "Reduce Quality").changed() {
                    state.toggle_quality();
                }

                let (out_width, out_height) = state.output_size();
                ui.label(
                    egui::RichText::new(format!("Output: {} × {} JPEG", out_width, out_height))
                        .color(egui::Color32::GRAY),
                );
            });
        });

        ui.add_space(15.0);
        ui.horizontal(|ui| {
            if ui.button("⬇ Download").clicked() {
                self.save_resized();
            }
            if ui.button("📁 Choose another image").clicked() {
                self.open_resize_image();
            }
        });
    }

    fn show_notifications(&self, ctx: &egui::Context) {
        if self.notifications.is_empty() {
            return;
        }

        egui::Area::new("notifications")
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-16.0, -16.0))
            .show(ctx, |ui| {
                for notification in &self.notifications {
                    let fill = match notification.severity {
                        Severity::Error => egui::Color32::from_rgb(120, 30, 30),
                        Severity::Info => egui::Color32::from_gray(40),
                    };
                    egui::Frame::none()
                        .fill(fill)
                        .rounding(8.0)
                        .inner_margin(12.0)
                        .show(ui, |ui| {
                            ui.set_max_width(320.0);
                            ui.label(egui::RichText::new(notification.title.as_str()).strong().color(egui::Color32::WHITE));
                            ui.label(notification.message.as_str());
                        });
                    ui.add_space(6.0);
                }
            });
    }
}

fn kind_icon(kind: Option<MediaKind>) -> &'static str {
    match kind {
        Some(MediaKind::Image) => "🖼",
        Some(MediaKind::Video) => "🎬",
        Some(MediaKind::Audio) => "🎵",
        None => "📄",
    }
}

pub fn bytes_to_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Shortens long names in the middle, keeping the extension visible.
pub fn compress_file_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= DISPLAY_NAME_MAX_CHARS {
        return name.to_string();
    }

    let keep = DISPLAY_NAME_MAX_CHARS - 3;
    let head: String = chars[..keep / 2].iter().collect();
    let tail: String = chars[chars.len() - (keep - keep / 2)..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_size() {
        assert_eq!(bytes_to_size(512), "512 B");
        assert_eq!(bytes_to_size(1536), "1.5 KB");
        assert_eq!(bytes_to_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_compress_file_name() {
        assert_eq!(compress_file_name("short.mp4"), "short.mp4");

        let long = "a-really-long-holiday-video-name-2024.mp4";
        let compressed = compress_file_name(long);
        assert_eq!(compressed.chars().count(), DISPLAY_NAME_MAX_CHARS);
        assert!(compressed.ends_with("2024.mp4"));
        assert!(compressed.starts_with("a-really-"));
    }
}
