use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use shared::{
    domain::EmployeeId,
    protocol::{ImagesResponse, StoredImageRecord, UploadResponse},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};
use url::Url;

/// Label attached to a staged image when the user never entered one.
pub const DEFAULT_IMAGE_TITLE: &str = "Untitled";

const UPLOAD_FIELD_EMPLOYEE_ID: &str = "employeeId";
const UPLOAD_FIELD_IMAGES: &str = "images";
const UPLOAD_FIELD_TITLES: &str = "titles";
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A locally-selected image awaiting upload. The title lives on the entry
/// itself; there is no separate position-keyed title map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
    pub title: Option<String>,
}

impl StagedImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
            title: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title as it will appear on the wire.
    pub fn resolved_title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_IMAGE_TITLE)
    }
}

/// Lightweight view of a staged entry for front-end rendering; carries the
/// byte length instead of the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImageSummary {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size_bytes: usize,
    pub title: Option<String>,
}

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("employee id must not be empty")]
    EmptyEmployeeId,
    #[error("no images staged for upload")]
    NoStagedImages,
    #[error("server url is not configured")]
    ServerUrlMissing,
    #[error("'{url}' is not a valid server url")]
    InvalidServerUrl { url: String },
    #[error("invalid mime type '{mime}' on staged image '{file}'")]
    InvalidMimeType { file: String, mime: String },
    #[error("no staged image at position {index} ({staged} staged)")]
    StagedIndexOutOfRange { index: usize, staged: usize },
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected response from server: {0}")]
    InvalidResponse(String),
}

impl GalleryError {
    /// True for failures caught before any request is issued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyEmployeeId
                | Self::NoStagedImages
                | Self::ServerUrlMissing
                | Self::InvalidServerUrl { .. }
                | Self::InvalidMimeType { .. }
                | Self::StagedIndexOutOfRange { .. }
        )
    }
}

impl From<reqwest::Error> for GalleryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}

/// Events published by the client so front-ends can react without polling.
#[derive(Debug, Clone)]
pub enum GalleryEvent {
    /// The display list was replaced wholesale (successful upload or fetch).
    GalleryReplaced { images: Vec<StoredImageRecord> },
    UploadCompleted { stored: usize },
}

#[derive(Default)]
struct GalleryState {
    server_url: Option<String>,
    employee_id: EmployeeId,
    staged: Vec<StagedImage>,
    gallery: Vec<StoredImageRecord>,
}

/// Front-end facing surface of the gallery client.
#[async_trait]
pub trait GalleryHandle: Send + Sync {
    async fn set_server_url(&self, server_url: &str);
    async fn set_employee_id(&self, employee_id: &str);
    async fn stage_images(&self, images: Vec<StagedImage>);
    async fn set_staged_title(&self, index: usize, title: &str) -> Result<(), GalleryError>;
    async fn remove_staged(&self, index: usize) -> Result<StagedImage, GalleryError>;
    async fn staged_images(&self) -> Vec<StagedImageSummary>;
    async fn employee_id(&self) -> EmployeeId;
    async fn gallery(&self) -> Vec<StoredImageRecord>;
    async fn upload(&self) -> Result<Vec<StoredImageRecord>, GalleryError>;
    async fn fetch_images(&self) -> Result<Vec<StoredImageRecord>, GalleryError>;
    fn subscribe_events(&self) -> broadcast::Receiver<GalleryEvent>;
}

pub struct GalleryClient {
    http: Client,
    inner: Mutex<GalleryState>,
    events: broadcast::Sender<GalleryEvent>,
}

impl GalleryClient {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            http: Client::new(),
            inner: Mutex::new(GalleryState::default()),
            events,
        })
    }

    pub fn with_server_url(server_url: impl Into<String>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            http: Client::new(),
            inner: Mutex::new(GalleryState {
                server_url: Some(server_url.into()),
                ..GalleryState::default()
            }),
            events,
        })
    }

    async fn upload_context(&self) -> Result<(String, EmployeeId, Vec<StagedImage>), GalleryError> {
        let guard = self.inner.lock().await;
        if guard.staged.is_empty() {
            return Err(GalleryError::NoStagedImages);
        }
        if guard.employee_id.is_empty() {
            return Err(GalleryError::EmptyEmployeeId);
        }
        let server_url = guard
            .server_url
            .clone()
            .ok_or(GalleryError::ServerUrlMissing)?;
        Ok((server_url, guard.employee_id.clone(), guard.staged.clone()))
    }

    fn build_upload_form(
        employee_id: &EmployeeId,
        staged: &[StagedImage],
    ) -> Result<multipart::Form, GalleryError> {
        let mut form =
            multipart::Form::new().text(UPLOAD_FIELD_EMPLOYEE_ID, employee_id.to_string());
        for image in staged {
            let mut part =
                multipart::Part::bytes(image.bytes.clone()).file_name(image.file_name.clone());
            if let Some(mime) = &image.mime_type {
                part = part
                    .mime_str(mime)
                    .map_err(|_| GalleryError::InvalidMimeType {
                        file: image.file_name.clone(),
                        mime: mime.clone(),
                    })?;
            }
            form = form
                .part(UPLOAD_FIELD_IMAGES, part)
                .text(UPLOAD_FIELD_TITLES, image.resolved_title().to_string());
        }
        Ok(form)
    }

    async fn perform_upload(
        &self,
        server_url: &str,
        employee_id: &EmployeeId,
        staged: &[StagedImage],
    ) -> Result<Vec<StoredImageRecord>, GalleryError> {
        let form = Self::build_upload_form(employee_id, staged)?;
        let response: UploadResponse = self
            .http
            .post(format!("{server_url}/upload"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.employee.images)
    }

    async fn perform_fetch(
        &self,
        server_url: &str,
        employee_id: &EmployeeId,
    ) -> Result<Vec<StoredImageRecord>, GalleryError> {
        let response: ImagesResponse = self
            .http
            .get(format!("{server_url}/images/{employee_id}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.images)
    }
}

#[async_trait]
impl GalleryHandle for GalleryClient {
    async fn set_server_url(&self, server_url: &str) {
        let mut guard = self.inner.lock().await;
        guard.server_url = Some(server_url.to_string());
    }

    async fn set_employee_id(&self, employee_id: &str) {
        let mut guard = self.inner.lock().await;
        guard.employee_id = EmployeeId::new(employee_id);
    }

    async fn stage_images(&self, images: Vec<StagedImage>) {
        let mut guard = self.inner.lock().await;
        guard.staged.extend(images);
    }

    async fn set_staged_title(&self, index: usize, title: &str) -> Result<(), GalleryError> {
        let mut guard = self.inner.lock().await;
        let staged = guard.staged.len();
        let entry = guard
            .staged
            .get_mut(index)
            .ok_or(GalleryError::StagedIndexOutOfRange { index, staged })?;
        // An emptied title field falls back to the default label at upload.
        entry.title = if title.is_empty() {
            None
        } else {
            Some(title.to_string())
        };
        Ok(())
    }

    async fn remove_staged(&self, index: usize) -> Result<StagedImage, GalleryError> {
        let mut guard = self.inner.lock().await;
        let staged = guard.staged.len();
        if index >= staged {
            return Err(GalleryError::StagedIndexOutOfRange { index, staged });
        }
        Ok(guard.staged.remove(index))
    }

    async fn staged_images(&self) -> Vec<StagedImageSummary> {
        let guard = self.inner.lock().await;
        guard
            .staged
            .iter()
            .map(|image| StagedImageSummary {
                file_name: image.file_name.clone(),
                mime_type: image.mime_type.clone(),
                size_bytes: image.bytes.len(),
                title: image.title.clone(),
            })
            .collect()
    }

    async fn employee_id(&self) -> EmployeeId {
        self.inner.lock().await.employee_id.clone()
    }

    async fn gallery(&self) -> Vec<StoredImageRecord> {
        self.inner.lock().await.gallery.clone()
    }

    /// Upload every staged image for the current employee id. On success the
    /// display list is replaced with the server's records and the uploaded
    /// entries leave the staged list; on failure both are left untouched.
    async fn upload(&self) -> Result<Vec<StoredImageRecord>, GalleryError> {
        let (server_url, employee_id, staged) = self.upload_context().await?;
        let uploaded_count = staged.len();

        match self
            .perform_upload(&server_url, &employee_id, &staged)
            .await
        {
            Ok(images) => {
                {
                    let mut guard = self.inner.lock().await;
                    guard.gallery = images.clone();
                    let drained = uploaded_count.min(guard.staged.len());
                    guard.staged.drain(..drained);
                }
                info!(
                    employee_id = %employee_id,
                    uploaded = uploaded_count,
                    stored = images.len(),
                    "upload committed"
                );
                let _ = self.events.send(GalleryEvent::UploadCompleted {
                    stored: images.len(),
                });
                let _ = self.events.send(GalleryEvent::GalleryReplaced {
                    images: images.clone(),
                });
                Ok(images)
            }
            Err(err) => {
                error!(employee_id = %employee_id, "upload failed: {err}");
                Err(err)
            }
        }
    }

    /// Fetch the stored images for the current employee id and replace the
    /// display list. An empty result is a success with zero records.
    async fn fetch_images(&self) -> Result<Vec<StoredImageRecord>, GalleryError> {
        let (server_url, employee_id) = {
            let guard = self.inner.lock().await;
            if guard.employee_id.is_empty() {
                return Err(GalleryError::EmptyEmployeeId);
            }
            let server_url = guard
                .server_url
                .clone()
                .ok_or(GalleryError::ServerUrlMissing)?;
            (server_url, guard.employee_id.clone())
        };

        match self.perform_fetch(&server_url, &employee_id).await {
            Ok(images) => {
                {
                    let mut guard = self.inner.lock().await;
                    guard.gallery = images.clone();
                }
                info!(employee_id = %employee_id, fetched = images.len(), "gallery fetched");
                let _ = self.events.send(GalleryEvent::GalleryReplaced {
                    images: images.clone(),
                });
                Ok(images)
            }
            Err(err) => {
                error!(employee_id = %employee_id, "fetch failed: {err}");
                Err(err)
            }
        }
    }

    fn subscribe_events(&self) -> broadcast::Receiver<GalleryEvent> {
        self.events.subscribe()
    }
}

/// Resolve a record's relative path against the server origin, yielding the
/// absolute URL the image is served from.
pub fn image_url(server_url: &str, record_path: &str) -> Result<String, GalleryError> {
    let mut base =
        Url::parse(server_url.trim()).map_err(|_| GalleryError::InvalidServerUrl {
            url: server_url.to_string(),
        })?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let joined = base
        .join(record_path.trim_start_matches('/'))
        .map_err(|_| GalleryError::InvalidServerUrl {
            url: server_url.to_string(),
        })?;
    Ok(joined.to_string())
}

#[cfg(test)]
mod tests;
