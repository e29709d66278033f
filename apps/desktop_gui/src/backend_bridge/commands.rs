//! Backend commands queued from UI to backend worker.

use std::path::PathBuf;

pub enum BackendCommand {
    Configure {
        server_url: String,
        employee_id: String,
    },
    StageFiles {
        paths: Vec<PathBuf>,
    },
    SetStagedTitle {
        index: usize,
        title: String,
    },
    RemoveStaged {
        index: usize,
    },
    Upload,
    FetchImages,
}
