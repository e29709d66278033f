mod backend_bridge;
mod controller;
mod ui;

use clap::Parser;
use crossbeam_channel::bounded;

use crate::backend_bridge::{commands::BackendCommand, runtime};
use crate::controller::events::UiEvent;
use crate::ui::{GalleryApp, PersistedGallerySettings};

#[derive(Parser, Debug)]
struct Args {
    /// Server origin to prefill, e.g. http://127.0.0.1:5000
    #[arg(long)]
    server_url: Option<String>,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(256);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(256);
    runtime::launch(cmd_rx, ui_tx);

    let persisted = PersistedGallerySettings::load();
    eframe::run_native(
        "Employee Image Gallery",
        eframe::NativeOptions::default(),
        Box::new(move |_cc| {
            Ok(Box::new(GalleryApp::new(
                cmd_tx,
                ui_rx,
                persisted,
                args.server_url,
            )))
        }),
    )
}
