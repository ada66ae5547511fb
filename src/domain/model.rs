use std::path::PathBuf;

use super::AppError;

/// One submission from the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub output_dir: PathBuf,
    /// Accepted but not enforced; spotdl decides on its own whether to skip existing tracks.
    pub overwrite: bool,
}

/// Progress reported by a long operation. `total == 0` means the update is text only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub message: Option<String>,
}

impl Progress {
    pub fn new(current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            current,
            total,
            message: Some(message.into()),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(0, 0, message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported,
    Failed(Option<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, Option<String>)>,
}

impl ImportReport {
    pub fn record(&mut self, path: PathBuf, outcome: ImportOutcome) {
        match outcome {
            ImportOutcome::Imported => self.succeeded.push(path),
            ImportOutcome::Failed(reason) => self.failed.push((path, reason)),
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub downloaded: Vec<PathBuf>,
    /// `None` when importing was switched off for the run.
    pub imported: Option<ImportReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Downloading,
    Importing,
    Completed,
    Failed,
}

impl RunPhase {
    pub fn is_running(self) -> bool {
        matches!(self, RunPhase::Downloading | RunPhase::Importing)
    }

    pub fn ensure_idle(&self) -> Result<(), AppError> {
        if self.is_running() {
            return Err(AppError::RunInProgress);
        }
        Ok(())
    }

    /// Starts a new run. Refused while another run is still active.
    pub fn begin(&mut self) -> Result<(), AppError> {
        self.ensure_idle()?;
        *self = RunPhase::Downloading;
        Ok(())
    }

    /// Moves to `next` if that step is legal from the current phase. Returns whether it moved.
    pub fn advance(&mut self, next: RunPhase) -> bool {
        let allowed = match (*self, next) {
            (RunPhase::Downloading, RunPhase::Importing) => true,
            (RunPhase::Downloading | RunPhase::Importing, RunPhase::Completed) => true,
            (RunPhase::Downloading | RunPhase::Importing, RunPhase::Failed) => true,
            (current, next) => current == next,
        };
        if allowed {
            *self = next;
        }
        allowed
    }
}
