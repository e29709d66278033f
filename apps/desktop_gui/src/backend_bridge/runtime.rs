//! Runtime bridge between UI command queue and backend event intake.
//!
//! The worker owns the gallery client and a tokio runtime on a dedicated
//! thread; commands arrive over a crossbeam channel and events flow back the
//! same way so the egui thread never blocks on the network.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use client_core::{GalleryClient, GalleryEvent, GalleryHandle, StagedImage};
use crossbeam_channel::{Receiver, Sender};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{StagedEntryView, UiError, UiErrorContext, UiEvent};

pub fn launch(cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let client: Arc<dyn GalleryHandle> = GalleryClient::new();

            let mut events = client.subscribe_events();
            let events_tx = ui_tx.clone();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    let evt = match event {
                        GalleryEvent::GalleryReplaced { images } => {
                            UiEvent::GalleryReplaced { images }
                        }
                        GalleryEvent::UploadCompleted { stored } => {
                            UiEvent::UploadCompleted { stored }
                        }
                    };
                    let _ = events_tx.try_send(evt);
                }
            });

            let _ = ui_tx.try_send(UiEvent::BackendReady);

            // Source paths of the staged entries, aligned with the client's
            // staged list; every staging mutation funnels through this loop.
            let mut staged_paths: Vec<PathBuf> = Vec::new();

            while let Ok(cmd) = cmd_rx.recv() {
                handle_command(client.as_ref(), &ui_tx, &mut staged_paths, cmd).await;
            }
        });
    });
}

async fn handle_command(
    client: &dyn GalleryHandle,
    ui_tx: &Sender<UiEvent>,
    staged_paths: &mut Vec<PathBuf>,
    cmd: BackendCommand,
) {
    match cmd {
        BackendCommand::Configure {
            server_url,
            employee_id,
        } => {
            client.set_server_url(&server_url).await;
            client.set_employee_id(&employee_id).await;
        }
        BackendCommand::StageFiles { paths } => {
            let mut batch = Vec::with_capacity(paths.len());
            for path in paths {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => {
                        batch.push(staged_image_from_path(&path, bytes));
                        staged_paths.push(path);
                    }
                    Err(err) => {
                        let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                            UiErrorContext::Staging,
                            format!("failed to read '{}': {err}", path.display()),
                        )));
                    }
                }
            }
            if !batch.is_empty() {
                client.stage_images(batch).await;
            }
            send_staged_snapshot(client, ui_tx, staged_paths).await;
        }
        BackendCommand::SetStagedTitle { index, title } => {
            if let Err(err) = client.set_staged_title(index, &title).await {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_gallery(
                    UiErrorContext::Staging,
                    &err,
                )));
            }
        }
        BackendCommand::RemoveStaged { index } => {
            match client.remove_staged(index).await {
                Ok(_) => {
                    if index < staged_paths.len() {
                        staged_paths.remove(index);
                    }
                }
                Err(err) => {
                    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_gallery(
                        UiErrorContext::Staging,
                        &err,
                    )));
                }
            }
            send_staged_snapshot(client, ui_tx, staged_paths).await;
        }
        BackendCommand::Upload => match client.upload().await {
            Ok(_) => {
                let remaining = client.staged_images().await.len();
                while staged_paths.len() > remaining {
                    staged_paths.remove(0);
                }
                send_staged_snapshot(client, ui_tx, staged_paths).await;
            }
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_gallery(
                    UiErrorContext::Upload,
                    &err,
                )));
            }
        },
        BackendCommand::FetchImages => match client.fetch_images().await {
            Ok(images) if images.is_empty() => {
                let _ = ui_tx.try_send(UiEvent::Info(
                    "No images stored for this employee yet".to_string(),
                ));
            }
            Ok(_) => {}
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_gallery(
                    UiErrorContext::Fetch,
                    &err,
                )));
            }
        },
    }
}

fn staged_image_from_path(path: &Path, bytes: Vec<u8>) -> StagedImage {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();
    let mut image = StagedImage::new(file_name, bytes);
    if let Some(mime) = mime_guess::from_path(path).first() {
        image = image.with_mime_type(mime.essence_str());
    }
    image
}

async fn send_staged_snapshot(
    client: &dyn GalleryHandle,
    ui_tx: &Sender<UiEvent>,
    staged_paths: &[PathBuf],
) {
    let staged = client
        .staged_images()
        .await
        .into_iter()
        .zip(staged_paths.iter().cloned())
        .map(|(summary, source_path)| StagedEntryView {
            summary,
            source_path,
        })
        .collect();
    let _ = ui_tx.try_send(UiEvent::StagedChanged { staged });
}
