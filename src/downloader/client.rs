use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::file_set;
use super::models::{DownloaderConfig, ENGINE_NAME, TRANSCODER_NAME};
use super::{Downloader, ProgressFn};
use crate::domain::{DownloadRequest, Progress};
use crate::utils::strip_ansi;

const FALLBACK_PATH: &str = "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";
const MODULE_MISSING_MARKER: &str = "No module named";
const ENGINE_MODULE_MISSING: [&str; 2] = ["No module named spotdl", "No module named 'spotdl'"];
const ALREADY_DOWNLOADED_MARKER: &str = "already downloaded";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(
        "{program} not found! Please install it with: pip install spotdl\n\
         You also need FFmpeg installed: brew install ffmpeg"
    )]
    EngineNotFound { program: String },

    #[error(
        "spotdl module is not available. This is a bundling issue.\n\
         Please report this error to the developer."
    )]
    ModuleMissing,

    #[error("spotdl exited with {}{}", exit_label(.code), error_output(.stderr))]
    ProcessFailed { code: Option<i32>, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by a signal)".to_string(),
    }
}

fn error_output(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\nError output: {}", stderr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Success,
    AlreadyDownloaded,
    ModuleMissing,
    Failed,
}

/// Decides what a finished spotdl process means from its exit status and captured text.
/// A missing Python module is reported even when spotdl exits cleanly.
pub fn classify_exit(success: bool, output: &str) -> ExitClass {
    if output.contains(MODULE_MISSING_MARKER) {
        return ExitClass::ModuleMissing;
    }
    if success {
        return ExitClass::Success;
    }
    if output.to_lowercase().contains(ALREADY_DOWNLOADED_MARKER) {
        ExitClass::AlreadyDownloaded
    } else {
        ExitClass::Failed
    }
}

#[derive(Clone)]
pub struct SpotdlClient {
    config: DownloaderConfig,
}

impl SpotdlClient {
    pub fn new(config: DownloaderConfig) -> Self {
        Self { config }
    }

    pub fn build_args(&self, request: &DownloadRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = self
            .config
            .engine
            .leading_args
            .iter()
            .map(OsString::from)
            .collect();
        args.push(OsString::from(&request.url));
        args.push("--output".into());
        args.push(request.output_dir.clone().into_os_string());
        args.push("--output-format".into());
        args.push(OsString::from(&self.config.output_format));
        args.push("--download-threads".into());
        args.push(self.config.threads.to_string().into());
        if let Some(transcoder) = &self.config.transcoder {
            args.push("--ffmpeg".into());
            args.push(transcoder.path.clone().into_os_string());
            if !transcoder.verified {
                args.push("--ignore-ffmpeg-version".into());
            }
        }
        args
    }

    fn command_line(&self, request: &DownloadRequest) -> String {
        std::iter::once(self.config.engine.program.as_os_str().to_owned())
            .chain(self.build_args(request))
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Names of the external tools that cannot be found.
    pub fn check_dependencies(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if !self.config.engine.is_available() {
            missing.push(ENGINE_NAME.to_string());
        }
        if self.config.transcoder.is_none() {
            missing.push(TRANSCODER_NAME.to_string());
        }

        missing
    }

    /// Through `python3 -m spotdl` a missing spotdl module means spotdl is not installed,
    /// any other missing module points at a broken install.
    fn module_missing_error(&self, output: &str) -> DownloadError {
        let engine = &self.config.engine;
        if engine.is_python_module() && ENGINE_MODULE_MISSING.iter().any(|m| output.contains(*m)) {
            return DownloadError::EngineNotFound {
                program: ENGINE_NAME.to_string(),
            };
        }
        DownloadError::ModuleMissing
    }
}

/// Forwards each non-blank line to `progress` and returns everything read.
async fn relay_lines<R>(
    reader: Option<R>,
    progress: &ProgressFn<'_>,
) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(String::new());
    };

    let mut reader = BufReader::new(reader);
    let mut captured = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let cleaned = strip_ansi(line.trim());
        if !cleaned.is_empty() {
            progress(Progress::message(cleaned));
        }
        captured.push_str(&line);
    }
    Ok(captured)
}

#[async_trait]
impl Downloader for SpotdlClient {
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<Vec<PathBuf>, DownloadError> {
        progress(Progress::message("Fetching song information..."));

        tokio::fs::create_dir_all(&request.output_dir).await?;
        let before = file_set::snapshot(&request.output_dir)?;

        if request.overwrite {
            progress(Progress::message(
                "Checking for existing files to overwrite...",
            ));
        }

        let command_line = self.command_line(request);
        tracing::info!("Running: {}", command_line);
        progress(Progress::message(format!("Running: {}", command_line)));

        let path = std::env::var_os("PATH").unwrap_or_else(|| OsString::from(FALLBACK_PATH));
        let spawned = Command::new(&self.config.engine.program)
            .args(self.build_args(request))
            .current_dir(&request.output_dir)
            .env("PATH", path)
            .env("PYTHONIOENCODING", "utf-8")
            .env("LC_ALL", "en_US.UTF-8")
            .env("LANG", "en_US.UTF-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("{} could not be started: {}", self.config.engine.display(), e);
                return Err(DownloadError::EngineNotFound {
                    program: self.config.engine.display(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let (stdout, stderr) = tokio::try_join!(
            relay_lines(child.stdout.take(), progress),
            relay_lines(child.stderr.take(), progress),
        )?;
        let status = child.wait().await?;
        tracing::debug!("spotdl finished with {}", status);

        let combined = format!("{}\n{}", stdout, stderr);
        match classify_exit(status.success(), &combined) {
            ExitClass::Success => {}
            ExitClass::AlreadyDownloaded => {
                progress(Progress::message(
                    "Files already exist, checking for existing downloads...",
                ));
            }
            ExitClass::ModuleMissing => return Err(self.module_missing_error(&combined)),
            ExitClass::Failed => {
                return Err(DownloadError::ProcessFailed {
                    code: status.code(),
                    stderr: stderr.trim().to_string(),
                });
            }
        }

        let files = file_set::resolve_new_files(&request.output_dir, &before)?;
        tracing::info!(
            "Found {} file(s) in {}",
            files.len(),
            request.output_dir.display()
        );
        progress(Progress::new(
            files.len(),
            files.len(),
            format!("Download complete! Found {} file(s)", files.len()),
        ));

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{EngineCommand, Transcoder};
    use assert_matches::assert_matches;
    use std::path::Path;
    use std::sync::Mutex;

    fn request(dir: &Path) -> DownloadRequest {
        DownloadRequest {
            url: "https://open.spotify.com/track/abc".to_string(),
            output_dir: dir.to_path_buf(),
            overwrite: false,
        }
    }

    /// A client whose "spotdl" is a shell snippet run inside the output directory.
    fn scripted_client(script: &str) -> SpotdlClient {
        SpotdlClient::new(DownloaderConfig {
            engine: EngineCommand {
                program: PathBuf::from("sh"),
                leading_args: vec!["-c".to_string(), script.to_string(), "spotdl".to_string()],
            },
            transcoder: None,
            output_format: "mp3".to_string(),
            threads: 4,
        })
    }

    fn messages(progress: &Mutex<Vec<Progress>>) -> Vec<String> {
        progress
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| p.message.clone())
            .collect()
    }

    #[test]
    fn test_classify_exit() {
        assert_eq!(classify_exit(true, "Downloaded \"Song\""), ExitClass::Success);
        assert_eq!(
            classify_exit(false, "Skipping Song (file already downloaded)"),
            ExitClass::AlreadyDownloaded
        );
        assert_eq!(
            classify_exit(false, "Song: Already Downloaded"),
            ExitClass::AlreadyDownloaded
        );
        assert_eq!(
            classify_exit(false, "ModuleNotFoundError: No module named 'spotdl'"),
            ExitClass::ModuleMissing
        );
        assert_eq!(
            classify_exit(true, "No module named 'yt_dlp'"),
            ExitClass::ModuleMissing
        );
        assert_eq!(classify_exit(false, "network error"), ExitClass::Failed);
    }

    #[test]
    fn test_build_args() {
        let client = SpotdlClient::new(DownloaderConfig {
            engine: EngineCommand {
                program: PathBuf::from("python3"),
                leading_args: vec!["-m".to_string(), "spotdl".to_string()],
            },
            transcoder: None,
            output_format: "mp3".to_string(),
            threads: 4,
        });
        let args = client.build_args(&request(Path::new("/tmp/out")));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            vec![
                "-m",
                "spotdl",
                "https://open.spotify.com/track/abc",
                "--output",
                "/tmp/out",
                "--output-format",
                "mp3",
                "--download-threads",
                "4",
            ]
        );
        assert!(client
            .command_line(&request(Path::new("/tmp/out")))
            .starts_with("python3 -m spotdl https://open.spotify.com/track/abc"));
    }

    #[test]
    fn test_build_args_pass_ffmpeg() {
        let mut config = DownloaderConfig {
            engine: EngineCommand::program("/usr/local/bin/spotdl"),
            transcoder: Some(Transcoder {
                path: PathBuf::from("/opt/homebrew/bin/ffmpeg"),
                verified: true,
            }),
            output_format: "m4a".to_string(),
            threads: 2,
        };
        let tail = |config: &DownloaderConfig| -> Vec<String> {
            SpotdlClient::new(config.clone())
                .build_args(&request(Path::new("/tmp/out")))
                .iter()
                .skip(7)
                .map(|a| a.to_string_lossy().into_owned())
                .collect()
        };

        assert_eq!(tail(&config), vec!["--ffmpeg", "/opt/homebrew/bin/ffmpeg"]);

        config.transcoder = Some(Transcoder {
            path: PathBuf::from("/Applications/App.app/Contents/Resources/bin/ffmpeg"),
            verified: false,
        });
        assert_eq!(
            tail(&config),
            vec![
                "--ffmpeg",
                "/Applications/App.app/Contents/Resources/bin/ffmpeg",
                "--ignore-ffmpeg-version",
            ]
        );
    }

    #[test]
    fn test_missing_spotdl_module_means_not_installed() {
        let fallback = SpotdlClient::new(DownloaderConfig {
            engine: EngineCommand::python_module(),
            transcoder: None,
            output_format: "mp3".to_string(),
            threads: 4,
        });
        let err = fallback.module_missing_error("/usr/bin/python3: No module named spotdl");
        assert_matches!(err, DownloadError::EngineNotFound { .. });
        assert!(err.to_string().contains("pip install spotdl"));
        assert_matches!(
            fallback.module_missing_error("ModuleNotFoundError: No module named 'spotdl'"),
            DownloadError::EngineNotFound { .. }
        );
        assert_matches!(
            fallback.module_missing_error("ModuleNotFoundError: No module named 'yt_dlp'"),
            DownloadError::ModuleMissing
        );

        let bundled = scripted_client("true");
        assert_matches!(
            bundled.module_missing_error("No module named 'spotdl'"),
            DownloadError::ModuleMissing
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_check_dependencies_runs_interpreted_engine() {
        let client = scripted_client("echo 'No module named spotdl' >&2; exit 1");
        assert_eq!(client.check_dependencies(), vec!["spotdl", "ffmpeg"]);

        let mut config = scripted_client("exit 0").config;
        config.transcoder = Some(Transcoder {
            path: PathBuf::from("/usr/bin/ffmpeg"),
            verified: true,
        });
        assert!(SpotdlClient::new(config).check_dependencies().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_runs_with_utf8_environment() {
        let dir = tempfile::tempdir().unwrap();
        let client = scripted_client("echo \"$PYTHONIOENCODING $LC_ALL $LANG\"; echo \"$PATH\"");
        let progress = Mutex::new(Vec::new());
        let record = |p: Progress| progress.lock().unwrap().push(p);

        let _ = client.download(&request(dir.path()), &record).await;

        let lines = messages(&progress);
        assert!(lines.contains(&"utf-8 en_US.UTF-8 en_US.UTF-8".to_string()));
        let expected_path = std::env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string());
        assert!(lines.contains(&expected_path));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_overwrite_only_announces_itself() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("Existing.mp3");
        std::fs::write(&existing, b"x").unwrap();
        let client = scripted_client("true");
        let progress = Mutex::new(Vec::new());
        let record = |p: Progress| progress.lock().unwrap().push(p);
        let request = DownloadRequest {
            overwrite: true,
            ..request(dir.path())
        };

        let files = client.download(&request, &record).await.unwrap();

        assert!(messages(&progress)
            .contains(&"Checking for existing files to overwrite...".to_string()));
        assert!(existing.exists());
        assert_eq!(files, vec![existing]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_reports_new_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.mp3"), b"old").unwrap();
        let client = scripted_client(
            "echo \"Downloading $1\"; printf 'x' > 'New Song.mp3'; printf 'x' > cover.jpg",
        );
        let progress = Mutex::new(Vec::new());
        let record = |p: Progress| progress.lock().unwrap().push(p);

        let files = client.download(&request(dir.path()), &record).await.unwrap();

        assert_eq!(files, vec![dir.path().join("New Song.mp3")]);
        let lines = messages(&progress);
        assert!(lines.contains(&"Downloading https://open.spotify.com/track/abc".to_string()));
        assert_eq!(lines.last().unwrap(), "Download complete! Found 1 file(s)");
        let last = progress.lock().unwrap().last().cloned().unwrap();
        assert_eq!((last.current, last.total), (1, 1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_already_downloaded_falls_back_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Existing.mp3"), b"x").unwrap();
        let client =
            scripted_client("echo 'Skipping Existing (file already downloaded)' >&2; exit 1");
        let progress = Mutex::new(Vec::new());
        let record = |p: Progress| progress.lock().unwrap().push(p);

        let files = client.download(&request(dir.path()), &record).await.unwrap();

        assert_eq!(files, vec![dir.path().join("Existing.mp3")]);
        assert!(messages(&progress)
            .contains(&"Files already exist, checking for existing downloads...".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_module_missing_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let noop = |_: Progress| {};

        let failing = scripted_client("echo \"No module named 'spotdl'\" >&2; exit 1");
        assert_matches!(
            failing.download(&request(dir.path()), &noop).await,
            Err(DownloadError::ModuleMissing)
        );

        let clean_exit = scripted_client("echo \"No module named 'spotdl'\"; exit 0");
        assert_matches!(
            clean_exit.download(&request(dir.path()), &noop).await,
            Err(DownloadError::ModuleMissing)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generic_failure_carries_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let client = scripted_client("echo 'rate limited' >&2; exit 3");
        let noop = |_: Progress| {};

        let err = client
            .download(&request(dir.path()), &noop)
            .await
            .unwrap_err();
        assert_matches!(
            &err,
            DownloadError::ProcessFailed { code: Some(3), stderr } if stderr == "rate limited"
        );
        assert_eq!(
            err.to_string(),
            "spotdl exited with code 3\nError output: rate limited"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_decoded_lossily() {
        let dir = tempfile::tempdir().unwrap();
        let client = scripted_client("printf '\\377caf\\303\\251\\n'");
        let progress = Mutex::new(Vec::new());
        let record = |p: Progress| progress.lock().unwrap().push(p);

        client.download(&request(dir.path()), &record).await.unwrap();

        assert!(messages(&progress).contains(&"\u{FFFD}café".to_string()));
    }

    #[tokio::test]
    async fn test_missing_engine() {
        let dir = tempfile::tempdir().unwrap();
        let client = SpotdlClient::new(DownloaderConfig {
            engine: EngineCommand::program("/definitely/not/here/spotdl"),
            transcoder: None,
            output_format: "mp3".to_string(),
            threads: 4,
        });
        let noop = |_: Progress| {};

        let err = client
            .download(&request(dir.path()), &noop)
            .await
            .unwrap_err();
        assert_matches!(err, DownloadError::EngineNotFound { .. });
        assert!(err.to_string().contains("pip install spotdl"));
        assert!(client.check_dependencies().contains(&"spotdl".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("Music").join("Spotify Downloads");
        let client = scripted_client("printf 'x' > song.opus");
        let noop = |_: Progress| {};

        let files = client.download(&request(&nested), &noop).await.unwrap();
        assert_eq!(files, vec![nested.join("song.opus")]);
    }
}
