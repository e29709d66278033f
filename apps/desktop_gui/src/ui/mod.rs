//! UI layer for the gallery GUI: app shell and form panels.

pub mod app;

pub use app::{GalleryApp, PersistedGallerySettings};
