use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use super::ImportError;

/// Runs inline AppleScript through `osascript -e`.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    program: PathBuf,
    leading_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
}

impl ScriptOutput {
    /// Scripts answer with an AppleScript boolean printed on stdout.
    pub fn is_true(&self) -> bool {
        self.stdout.to_lowercase().contains("true")
    }
}

impl ScriptRunner {
    pub fn osascript() -> Self {
        Self::with_command("osascript", Vec::new())
    }

    pub fn with_command(program: impl Into<PathBuf>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    pub async fn run(&self, script: &str) -> Result<ScriptOutput, ImportError> {
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ImportError::BridgeNotFound,
                _ => ImportError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!("Script failed with {}: {}", output.status, stderr);
            return Err(ImportError::ScriptFailed(stderr));
        }

        Ok(ScriptOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// Quotes `value` as an AppleScript string literal.
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}
