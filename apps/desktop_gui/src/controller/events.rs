//! UI/backend events and error modeling for the gallery GUI controller.

use std::path::PathBuf;

use client_core::{GalleryError, StagedImageSummary};
use shared::protocol::StoredImageRecord;

/// A staged entry as the UI renders it: the client-side summary plus the
/// local file it was staged from (used for thumbnails).
#[derive(Debug, Clone)]
pub struct StagedEntryView {
    pub summary: StagedImageSummary,
    pub source_path: PathBuf,
}

pub enum UiEvent {
    BackendReady,
    Info(String),
    Error(UiError),
    StagedChanged { staged: Vec<StagedEntryView> },
    GalleryReplaced { images: Vec<StoredImageRecord> },
    UploadCompleted { stored: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Validation,
    Transport,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Staging,
    Upload,
    Fetch,
}

#[derive(Debug, Clone)]
pub struct UiError {
    pub category: UiErrorCategory,
    pub context: UiErrorContext,
    pub message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        Self {
            category: UiErrorCategory::Unknown,
            context,
            message: message.into(),
        }
    }

    pub fn from_gallery(context: UiErrorContext, err: &GalleryError) -> Self {
        let category = if err.is_validation() {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Transport
        };
        Self {
            category,
            context,
            message: err.to_string(),
        }
    }
}

pub fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Validation => "Validation",
        UiErrorCategory::Transport => "Transport",
        UiErrorCategory::Unknown => "Unexpected",
    }
}
