use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::AppConfig;

pub const ENGINE_NAME: &str = "spotdl";
pub const TRANSCODER_NAME: &str = "ffmpeg";

/// Where ffmpeg usually lives when the app is started from Finder with a minimal `PATH`.
const TRANSCODER_LOCATIONS: [&str; 3] = [
    "/opt/homebrew/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/usr/bin/ffmpeg",
];

/// Program and leading arguments used to start spotdl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
}

impl EngineCommand {
    pub fn program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Picks the spotdl to run: an explicit path, the copy bundled inside the app,
    /// the one on `PATH`, or `python3 -m spotdl` as a last resort.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::program(path);
        }
        if let Some(bundled) = bundled_tool(ENGINE_NAME) {
            tracing::debug!("Using bundled spotdl at {}", bundled.display());
            return Self::program(bundled);
        }
        if let Ok(found) = which::which(ENGINE_NAME) {
            return Self::program(found);
        }

        tracing::debug!("spotdl not on PATH, falling back to python3 -m spotdl");
        Self::python_module()
    }

    pub fn python_module() -> Self {
        Self {
            program: PathBuf::from("python3"),
            leading_args: vec!["-m".to_string(), ENGINE_NAME.to_string()],
        }
    }

    pub fn is_python_module(&self) -> bool {
        self.leading_args == ["-m", ENGINE_NAME]
    }

    /// Whether spotdl can actually be started. When it runs through an interpreter
    /// the interpreter alone proves nothing, so `--version` is run instead.
    pub fn is_available(&self) -> bool {
        if !self.leading_args.is_empty() {
            let args = self.leading_args.iter().map(String::as_str);
            return runs_successfully(&self.program, args.chain(["--version"]));
        }
        if self.program.components().count() > 1 {
            self.program.is_file()
        } else {
            which::which(&self.program).is_ok()
        }
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.leading_args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The ffmpeg passed to spotdl with `--ffmpeg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoder {
    pub path: PathBuf,
    /// False when the bundled copy is used without having answered `-version`.
    pub verified: bool,
}

impl Transcoder {
    /// Tries the bundled ffmpeg, then the usual install locations, then `PATH`.
    /// A bundled copy that fails the check is still used as a last resort.
    pub fn resolve() -> Option<Self> {
        let bundled = bundled_tool(TRANSCODER_NAME);
        let candidates = bundled
            .iter()
            .cloned()
            .chain(TRANSCODER_LOCATIONS.into_iter().map(PathBuf::from))
            .chain(which::which(TRANSCODER_NAME).ok());

        if let Some(found) = Self::first_working(candidates) {
            tracing::debug!("Using ffmpeg at {}", found.path.display());
            return Some(found);
        }
        bundled.map(|path| {
            tracing::warn!("Falling back to unverified ffmpeg at {}", path.display());
            Self {
                path,
                verified: false,
            }
        })
    }

    pub fn first_working(candidates: impl IntoIterator<Item = PathBuf>) -> Option<Self> {
        candidates
            .into_iter()
            .find(|path| path.is_file() && runs_successfully(path, ["-version"]))
            .map(|path| Self {
                path,
                verified: true,
            })
    }
}

fn runs_successfully<I, S>(program: &Path, args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::debug!("Could not run {}: {}", program.display(), e);
            false
        }
    }
}

/// `<app>.app/Contents/MacOS/<exe>` ships its tools in `<app>.app/Contents/Resources/bin`.
fn bundled_tool(name: &str) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let candidate = exe
        .parent()?
        .parent()?
        .join("Resources")
        .join("bin")
        .join(name);
    candidate.is_file().then_some(candidate)
}

/// Configuration for the spotdl client
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub engine: EngineCommand,
    pub transcoder: Option<Transcoder>,
    pub output_format: String,
    pub threads: u32,
}

impl DownloaderConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            engine: EngineCommand::resolve(config.spotdl_path.as_deref()),
            transcoder: Transcoder::resolve(),
            output_format: config.output_format.clone(),
            threads: config.download_threads,
        }
    }
}
