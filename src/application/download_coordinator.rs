use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    domain::{
        AppError, DownloadRequest, ImportOutcome, ImportReport, Progress, RunPhase, RunSummary,
    },
    downloader::Downloader,
    library::LibraryImporter,
    utils::{file_label, link_kind},
};

/// Share of the progress bar given to the download stage; importing fills the rest.
pub const DOWNLOAD_SHARE: f32 = 50.0;
pub const STARTING_PROGRESS: f32 = 10.0;

#[derive(Debug, Clone)]
pub enum RunEvent {
    Phase(RunPhase),
    Status(String),
    Log(String),
    /// Overall progress, 0 to 100.
    Progress(f32),
    Finished(Result<RunSummary, AppError>),
}

pub type EventSink<'a> = dyn Fn(RunEvent) + Send + Sync + 'a;

/// Maps the downloader's own (current, total) onto the download band.
pub fn download_percent(current: usize, total: usize) -> Option<f32> {
    if total == 0 {
        return None;
    }
    let fraction = (current as f32 / total as f32).clamp(0.0, 1.0);
    Some(fraction * DOWNLOAD_SHARE)
}

/// Maps import progress onto the import band.
pub fn import_percent(done: usize, total: usize) -> f32 {
    if total == 0 {
        return 100.0;
    }
    let fraction = (done as f32 / total as f32).clamp(0.0, 1.0);
    DOWNLOAD_SHARE + fraction * (100.0 - DOWNLOAD_SHARE)
}

/// Runs "download, then import" for one submission.
pub struct DownloadCoordinator<D, I> {
    downloader: Arc<D>,
    importer: Option<Arc<I>>,
}

impl<D, I> Clone for DownloadCoordinator<D, I> {
    fn clone(&self) -> Self {
        Self {
            downloader: Arc::clone(&self.downloader),
            importer: self.importer.clone(),
        }
    }
}

impl<D, I> DownloadCoordinator<D, I>
where
    D: Downloader,
    I: LibraryImporter,
{
    /// `importer` is `None` on platforms without a media library to import into.
    pub fn new(downloader: D, importer: Option<I>) -> Self {
        Self {
            downloader: Arc::new(downloader),
            importer: importer.map(Arc::new),
        }
    }

    pub fn can_import(&self) -> bool {
        self.importer.is_some()
    }

    pub async fn run(
        &self,
        request: DownloadRequest,
        import: bool,
        emit: &EventSink<'_>,
    ) -> Result<RunSummary, AppError> {
        emit(RunEvent::Phase(RunPhase::Downloading));
        emit(RunEvent::Status("Downloading...".to_string()));
        emit(RunEvent::Progress(STARTING_PROGRESS));
        match link_kind(&request.url) {
            Some(kind) => emit(RunEvent::Log(format!(
                "Starting download from: {} ({})",
                request.url,
                kind.label()
            ))),
            None => emit(RunEvent::Log(format!(
                "Starting download from: {}",
                request.url
            ))),
        }
        tracing::info!("Starting run for {}", request.url);

        let on_progress = |progress: Progress| {
            if let Some(message) = progress.message {
                emit(RunEvent::Log(message));
            }
            if let Some(percent) = download_percent(progress.current, progress.total) {
                emit(RunEvent::Progress(percent));
            }
        };
        let files = self
            .downloader
            .download(&request, &on_progress)
            .await
            .map_err(|e| {
                tracing::warn!("Download failed: {}", e);
                AppError::Download(e.to_string())
            })?;

        if files.is_empty() {
            return Err(AppError::NothingDownloaded);
        }
        emit(RunEvent::Log(format!(
            "Successfully downloaded {} file(s)",
            files.len()
        )));

        let imported = if import {
            Some(self.import_all(&files, emit).await?)
        } else {
            None
        };

        emit(RunEvent::Progress(100.0));
        emit(RunEvent::Status("Complete!".to_string()));

        Ok(RunSummary {
            downloaded: files,
            imported,
        })
    }

    async fn import_all(
        &self,
        files: &[PathBuf],
        emit: &EventSink<'_>,
    ) -> Result<ImportReport, AppError> {
        let importer = self.importer.as_ref().ok_or_else(|| {
            AppError::Import("Apple Music integration is only available on macOS".to_string())
        })?;

        emit(RunEvent::Phase(RunPhase::Importing));
        emit(RunEvent::Status("Importing to Apple Music...".to_string()));
        emit(RunEvent::Log("Importing to Apple Music...".to_string()));

        if !importer.is_running().await {
            emit(RunEvent::Log("Music is not running, launching it".to_string()));
            if !importer.launch().await {
                emit(RunEvent::Log("Could not launch Music".to_string()));
            }
        }

        let total = files.len();
        let on_file = |done: usize, path: &Path, outcome: &ImportOutcome| {
            let name = file_label(path);
            let line = match outcome {
                ImportOutcome::Imported => format!("Imported: {}", name),
                ImportOutcome::Failed(Some(reason)) => {
                    format!("Failed to import {}: {}", name, reason)
                }
                ImportOutcome::Failed(None) => format!("Failed to import {}", name),
            };
            emit(RunEvent::Log(line));
            emit(RunEvent::Progress(import_percent(done, total)));
        };
        let report = importer.import_files(files, &on_file).await;

        tracing::info!(
            "Imported {}/{} file(s)",
            report.succeeded_count(),
            report.attempted()
        );
        emit(RunEvent::Log(format!(
            "Imported {}/{} file(s) to Apple Music",
            report.succeeded_count(),
            report.attempted()
        )));

        Ok(report)
    }
}
