// src/exec/runners/cleanup.rs

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::events::TaskEvent;
use crate::exec::backend::StepContext;
use crate::exec::runner::TaskStepRunner;

pub async fn delete_file(runner: &TaskStepRunner, ctx: &StepContext, path: PathBuf) {
    match runner.fs.remove_file(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "deleted temporary file");
            ctx.post(TaskEvent::TemporaryFileDeleted { path });
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not delete temporary file");
            ctx.post(TaskEvent::TemporaryFileDeletionFailed {
                path,
                message: format!("{err:#}"),
            });
        }
    }
}

pub async fn delete_directory(runner: &TaskStepRunner, ctx: &StepContext, path: PathBuf) {
    match runner.fs.remove_dir_all(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "deleted temporary directory");
            ctx.post(TaskEvent::TemporaryDirectoryDeleted { path });
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not delete temporary directory");
            ctx.post(TaskEvent::TemporaryDirectoryDeletionFailed {
                path,
                message: format!("{err:#}"),
            });
        }
    }
}
