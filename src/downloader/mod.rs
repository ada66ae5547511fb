pub mod client;
pub mod file_set;
pub mod models;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{DownloadRequest, Progress};

pub use client::{DownloadError, SpotdlClient};
pub use models::DownloaderConfig;

pub type ProgressFn<'a> = dyn Fn(Progress) + Send + Sync + 'a;

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads everything behind `request.url` and returns the resulting audio files,
    /// most recently modified first.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<Vec<PathBuf>, DownloadError>;
}
