use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Please enter a Spotify URL!")]
    EmptyUrl,

    #[error("Please enter a valid Spotify URL!")]
    InvalidUrl,

    #[error("A download is already in progress!")]
    RunInProgress,

    #[error("No files were downloaded!")]
    NothingDownloaded,

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Import failed: {0}")]
    Import(String),
}
