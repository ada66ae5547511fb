pub mod music;
pub mod script;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ImportOutcome, ImportReport};

pub use music::AppleMusicImporter;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("osascript not found! Importing into Apple Music requires macOS scripting support")]
    BridgeNotFound,

    #[error("Failed to import to Apple Music: {0}")]
    ScriptFailed(String),

    #[error("Apple Music integration is only available on macOS")]
    UnsupportedPlatform,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ImportObserver<'a> =
    dyn for<'p> Fn(usize, &'p Path, &'p ImportOutcome) + Send + Sync + 'a;

/// A media library that downloaded files can be added to.
#[async_trait]
pub trait LibraryImporter: Send + Sync {
    /// Adds one file. `Ok(false)` means the player refused it without a scripting error.
    async fn import_file(&self, path: &Path) -> Result<bool, ImportError>;

    async fn is_running(&self) -> bool;

    async fn launch(&self) -> bool;

    /// Imports every file in order. A failing file is recorded and the batch moves on.
    /// `on_file` is called after each file with the number processed so far.
    async fn import_files(
        &self,
        paths: &[PathBuf],
        on_file: &ImportObserver<'_>,
    ) -> ImportReport {
        let mut report = ImportReport::default();

        for (index, path) in paths.iter().enumerate() {
            let outcome = match self.import_file(path).await {
                Ok(true) => ImportOutcome::Imported,
                Ok(false) => ImportOutcome::Failed(None),
                Err(e) => {
                    tracing::warn!("Error importing {}: {}", path.display(), e);
                    ImportOutcome::Failed(Some(e.to_string()))
                }
            };
            on_file(index + 1, path, &outcome);
            report.record(path.clone(), outcome);
        }

        report
    }
}
