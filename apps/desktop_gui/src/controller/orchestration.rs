//! Command orchestration helpers from UI actions to backend command queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::BackendCommand;

pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    let cmd_name = match &cmd {
        BackendCommand::Configure { .. } => "configure",
        BackendCommand::StageFiles { .. } => "stage_files",
        BackendCommand::SetStagedTitle { .. } => "set_staged_title",
        BackendCommand::RemoveStaged { .. } => "remove_staged",
        BackendCommand::Upload => "upload",
        BackendCommand::FetchImages => "fetch_images",
    };

    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued ui->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = "Backend is busy; command dropped".to_string();
            tracing::warn!(command = cmd_name, "ui->backend command queue full");
        }
        Err(TrySendError::Disconnected(_)) => {
            *status = "Backend worker stopped; restart the app".to_string();
            tracing::error!(command = cmd_name, "ui->backend command channel disconnected");
        }
    }
}
