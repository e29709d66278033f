//! Form application shell: employee field, staging editor, workflow buttons,
//! and the uploaded-images list.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use client_core::{image_url, DEFAULT_IMAGE_TITLE};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use shared::protocol::StoredImageRecord;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{
    err_label, StagedEntryView, UiErrorCategory, UiErrorContext, UiEvent,
};
use crate::controller::orchestration::dispatch_backend_command;

const MAX_PREVIEW_DIMENSION: f32 = 160.0;
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusBannerSeverity {
    Error,
}

#[derive(Debug, Clone)]
struct StatusBanner {
    severity: StatusBannerSeverity,
    message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedGallerySettings {
    pub server_url: String,
    pub employee_id: String,
}

impl Default for PersistedGallerySettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            employee_id: String::new(),
        }
    }
}

impl PersistedGallerySettings {
    fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("employee_gallery").join("settings.json"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(raw) => {
                let _ = fs::write(&path, raw);
            }
            Err(err) => tracing::warn!("failed to serialize gallery settings: {err}"),
        }
    }
}

struct StagedRow {
    view: StagedEntryView,
    title_buffer: String,
}

#[derive(Clone)]
enum StagedPreview {
    Image {
        texture: egui::TextureHandle,
        size: egui::Vec2,
    },
    DecodeFailed,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct PreviewCacheKey {
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl PreviewCacheKey {
    fn for_path(path: &Path) -> Self {
        let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok();
        Self {
            path: path.to_path_buf(),
            modified,
        }
    }
}

pub struct GalleryApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,

    server_url: String,
    employee_id: String,

    staged: Vec<StagedRow>,
    gallery: Vec<StoredImageRecord>,

    status: String,
    status_banner: Option<StatusBanner>,
    backend_ready: bool,

    preview_cache: HashMap<PreviewCacheKey, StagedPreview>,
}

impl GalleryApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        persisted: PersistedGallerySettings,
        server_url_override: Option<String>,
    ) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            server_url: server_url_override.unwrap_or(persisted.server_url),
            employee_id: persisted.employee_id,
            staged: Vec::new(),
            gallery: Vec::new(),
            status: "Backend worker starting...".to_string(),
            status_banner: None,
            backend_ready: false,
            preview_cache: HashMap::new(),
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::BackendReady => {
                    self.backend_ready = true;
                    self.status = "Ready".to_string();
                }
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::Error(err) => {
                    self.status = format!("{} error: {}", err_label(err.category), err.message);
                    let banner_message = match (err.context, err.category) {
                        (UiErrorContext::Upload, UiErrorCategory::Transport) => {
                            Some("Upload failed. Check the log output for details.".to_string())
                        }
                        (UiErrorContext::Fetch, UiErrorCategory::Transport) => {
                            Some("No images found for this Employee ID.".to_string())
                        }
                        (UiErrorContext::BackendStartup, _) => Some(err.message.clone()),
                        (UiErrorContext::Upload | UiErrorContext::Fetch, _) => {
                            Some(err.message.clone())
                        }
                        _ => None,
                    };
                    if let Some(message) = banner_message {
                        self.status_banner = Some(StatusBanner {
                            severity: StatusBannerSeverity::Error,
                            message,
                        });
                    }
                }
                UiEvent::StagedChanged { staged } => {
                    self.staged = staged
                        .into_iter()
                        .map(|view| {
                            let title_buffer = view.summary.title.clone().unwrap_or_default();
                            StagedRow { view, title_buffer }
                        })
                        .collect();
                }
                UiEvent::GalleryReplaced { images } => {
                    self.gallery = images;
                }
                UiEvent::UploadCompleted { stored } => {
                    self.status = format!("Upload successful: {stored} image(s) stored");
                    self.status_banner = None;
                }
            }
        }
    }

    fn show_status_banner(&mut self, ui: &mut egui::Ui) {
        if let Some(banner) = self.status_banner.clone() {
            let (fill, stroke) = match banner.severity {
                StatusBannerSeverity::Error => (
                    egui::Color32::from_rgb(111, 53, 53),
                    egui::Stroke::new(1.0, egui::Color32::from_rgb(175, 96, 96)),
                ),
            };

            egui::Frame::none()
                .fill(fill)
                .stroke(stroke)
                .rounding(8.0)
                .inner_margin(egui::Margin::symmetric(10, 8))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        ui.label(egui::RichText::new(&banner.message).color(egui::Color32::WHITE));
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("Dismiss").clicked() {
                                self.status_banner = None;
                            }
                        });
                    });
                });
            ui.add_space(6.0);
        }
    }

    fn pick_files(&mut self) {
        if let Some(paths) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "gif", "webp", "bmp"])
            .pick_files()
        {
            if paths.is_empty() {
                return;
            }
            dispatch_backend_command(
                &self.cmd_tx,
                BackendCommand::StageFiles { paths },
                &mut self.status,
            );
        }
    }

    fn persist_settings(&self) {
        PersistedGallerySettings {
            server_url: self.server_url.clone(),
            employee_id: self.employee_id.clone(),
        }
        .save();
    }

    fn dispatch_configure(&mut self) {
        dispatch_backend_command(
            &self.cmd_tx,
            BackendCommand::Configure {
                server_url: self.server_url.trim().to_string(),
                employee_id: self.employee_id.trim().to_string(),
            },
            &mut self.status,
        );
    }

    fn try_upload(&mut self) {
        if self.staged.is_empty() || self.employee_id.trim().is_empty() {
            self.status = "Upload rejected: missing files or Employee ID".to_string();
            self.status_banner = Some(StatusBanner {
                severity: StatusBannerSeverity::Error,
                message: "Please select files and enter an Employee ID.".to_string(),
            });
            return;
        }

        self.status_banner = None;
        self.persist_settings();
        self.dispatch_configure();
        dispatch_backend_command(&self.cmd_tx, BackendCommand::Upload, &mut self.status);
        self.status = format!("Uploading {} image(s)...", self.staged.len());
    }

    fn try_fetch(&mut self) {
        if self.employee_id.trim().is_empty() {
            self.status = "Fetch rejected: missing Employee ID".to_string();
            self.status_banner = Some(StatusBanner {
                severity: StatusBannerSeverity::Error,
                message: "Please enter an Employee ID.".to_string(),
            });
            return;
        }

        self.status_banner = None;
        self.persist_settings();
        self.dispatch_configure();
        dispatch_backend_command(&self.cmd_tx, BackendCommand::FetchImages, &mut self.status);
        self.status = format!("Fetching images for {}...", self.employee_id.trim());
    }

    fn ensure_preview(&mut self, ctx: &egui::Context, key: &PreviewCacheKey) {
        if self.preview_cache.contains_key(key) {
            return;
        }

        let preview = match fs::read(&key.path) {
            Ok(bytes) => match image::load_from_memory(&bytes) {
                Ok(decoded) => {
                    let (orig_w, orig_h) = decoded.dimensions();
                    let scale = (MAX_PREVIEW_DIMENSION / orig_w.max(orig_h) as f32).min(1.0);
                    let resized = if scale < 1.0 {
                        decoded.resize(
                            (orig_w as f32 * scale).max(1.0) as u32,
                            (orig_h as f32 * scale).max(1.0) as u32,
                            image::imageops::FilterType::Triangle,
                        )
                    } else {
                        decoded
                    };
                    let rgba = resized.to_rgba8();
                    let [w, h] = [rgba.width() as usize, rgba.height() as usize];
                    let color_image =
                        egui::ColorImage::from_rgba_unmultiplied([w, h], rgba.as_raw());
                    let texture = ctx.load_texture(
                        format!("staged-preview:{}", key.path.display()),
                        color_image,
                        egui::TextureOptions::LINEAR,
                    );
                    StagedPreview::Image {
                        texture,
                        size: egui::vec2(w as f32, h as f32),
                    }
                }
                Err(_) => StagedPreview::DecodeFailed,
            },
            Err(_) => StagedPreview::DecodeFailed,
        };
        self.preview_cache.insert(key.clone(), preview);
    }

    fn render_staged_rows(&mut self, ui: &mut egui::Ui) {
        let keys: Vec<PreviewCacheKey> = self
            .staged
            .iter()
            .map(|row| PreviewCacheKey::for_path(&row.view.source_path))
            .collect();
        for key in &keys {
            self.ensure_preview(ui.ctx(), key);
        }

        let mut remove_index: Option<usize> = None;
        let mut title_changes: Vec<(usize, String)> = Vec::new();

        let preview_cache = &self.preview_cache;
        for (index, row) in self.staged.iter_mut().enumerate() {
            ui.horizontal(|ui| {
                match keys.get(index).and_then(|key| preview_cache.get(key)) {
                    Some(StagedPreview::Image { texture, size }) => {
                        ui.image((texture.id(), *size));
                    }
                    Some(StagedPreview::DecodeFailed) | None => {
                        ui.label(egui::RichText::new("🖼").size(28.0));
                    }
                }

                ui.vertical(|ui| {
                    ui.strong(&row.view.summary.file_name);
                    ui.small(format!(
                        "{} · {}",
                        human_readable_bytes(row.view.summary.size_bytes as u64),
                        row.view
                            .summary
                            .mime_type
                            .as_deref()
                            .unwrap_or("unknown type")
                    ));
                    let response = ui.add(
                        egui::TextEdit::singleline(&mut row.title_buffer)
                            .id_source(("staged_title", index))
                            .hint_text(DEFAULT_IMAGE_TITLE),
                    );
                    if response.changed() {
                        title_changes.push((index, row.title_buffer.clone()));
                    }
                });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Remove").clicked() {
                        remove_index = Some(index);
                    }
                });
            });
            ui.add_space(4.0);
        }

        for (index, title) in title_changes {
            dispatch_backend_command(
                &self.cmd_tx,
                BackendCommand::SetStagedTitle { index, title },
                &mut self.status,
            );
        }
        if let Some(index) = remove_index {
            dispatch_backend_command(
                &self.cmd_tx,
                BackendCommand::RemoveStaged { index },
                &mut self.status,
            );
        }
    }

    fn render_gallery_rows(&mut self, ui: &mut egui::Ui) {
        let server_url = self.server_url.trim().to_string();
        let mut status_update: Option<String> = None;

        for record in &self.gallery {
            ui.horizontal(|ui| {
                ui.strong(&record.title);
                match image_url(&server_url, &record.path) {
                    Ok(url) => {
                        if ui.link("View image").clicked() {
                            if let Err(err) = open_url_in_browser(&url) {
                                status_update = Some(format!("Failed to open viewer: {err}"));
                            }
                        }
                        if ui.button("Copy link").clicked() {
                            if let Ok(mut clipboard) = arboard::Clipboard::new() {
                                let _ = clipboard.set_text(url.clone());
                                status_update =
                                    Some("Copied image link to clipboard".to_string());
                            }
                        }
                    }
                    Err(_) => {
                        ui.small(&record.path);
                    }
                }
            });
        }

        if let Some(status) = status_update {
            self.status = status;
        }
    }
}

impl eframe::App for GalleryApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Upload Images for Employee");
            ui.add_space(8.0);
            self.show_status_banner(ui);

            ui.label(egui::RichText::new("Server URL").strong());
            ui.add(
                egui::TextEdit::singleline(&mut self.server_url)
                    .id_source("server_url")
                    .hint_text("http://127.0.0.1:5000")
                    .desired_width(f32::INFINITY),
            );
            ui.add_space(4.0);

            ui.label(egui::RichText::new("Employee ID").strong());
            ui.add(
                egui::TextEdit::singleline(&mut self.employee_id)
                    .id_source("employee_id")
                    .hint_text("Enter Employee ID")
                    .desired_width(f32::INFINITY),
            );
            ui.add_space(8.0);

            if ui
                .add_enabled(self.backend_ready, egui::Button::new("Add images..."))
                .clicked()
            {
                self.pick_files();
            }

            if !self.staged.is_empty() {
                ui.separator();
                ui.label(egui::RichText::new("Selected files").strong());
                egui::ScrollArea::vertical()
                    .id_source("staged_scroll")
                    .max_height(260.0)
                    .show(ui, |ui| {
                        self.render_staged_rows(ui);
                    });
            }

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(self.backend_ready, egui::Button::new("Upload"))
                    .clicked()
                {
                    self.try_upload();
                }
                if ui
                    .add_enabled(
                        self.backend_ready,
                        egui::Button::new("Fetch uploaded images"),
                    )
                    .clicked()
                {
                    self.try_fetch();
                }
            });

            if !self.gallery.is_empty() {
                ui.separator();
                ui.label(egui::RichText::new("Uploaded files").strong());
                egui::ScrollArea::vertical()
                    .id_source("gallery_scroll")
                    .max_height(220.0)
                    .show(ui, |ui| {
                        self.render_gallery_rows(ui);
                    });
            }

            ui.separator();
            ui.horizontal_wrapped(|ui| {
                ui.small("Status:");
                ui.small(egui::RichText::new(&self.status).weak());
            });
        });

        // Backend events arrive off-frame; poll for them at a steady cadence.
        ctx.request_repaint_after(EVENT_POLL_INTERVAL);
    }
}

fn open_url_in_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    let spawned = std::process::Command::new("cmd")
        .args(["/C", "start", "", url])
        .spawn();

    #[cfg(target_os = "macos")]
    let spawned = std::process::Command::new("open").arg(url).spawn();

    #[cfg(all(unix, not(target_os = "macos")))]
    let spawned = std::process::Command::new("xdg-open").arg(url).spawn();

    spawned.map(|_| ())
}

fn human_readable_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_readable_bytes_picks_sensible_units() {
        assert_eq!(human_readable_bytes(512), "512 B");
        assert_eq!(human_readable_bytes(2048), "2.0 KiB");
        assert_eq!(human_readable_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn persisted_settings_round_trip() {
        let settings = PersistedGallerySettings {
            server_url: "http://gallery.internal:5000".to_string(),
            employee_id: "E123".to_string(),
        };
        let raw = serde_json::to_string(&settings).expect("serialize");
        let restored: PersistedGallerySettings =
            serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(restored, settings);
    }

    #[test]
    fn persisted_settings_default_on_unknown_fields() {
        let restored: PersistedGallerySettings =
            serde_json::from_str(r#"{"theme": "dark"}"#).expect("deserialize");
        assert_eq!(restored, PersistedGallerySettings::default());
    }
}
