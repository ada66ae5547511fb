use std::path::Path;

use async_trait::async_trait;

use super::script::{quote, ScriptRunner};
use super::{ImportError, LibraryImporter};
use crate::config::AppConfig;

/// Adds files to the Music app (formerly iTunes) on macOS.
#[derive(Debug, Clone)]
pub struct AppleMusicImporter {
    runner: ScriptRunner,
    app_name: String,
    delete_after_import: bool,
}

impl AppleMusicImporter {
    pub fn new(config: &AppConfig) -> Result<Self, ImportError> {
        if !cfg!(target_os = "macos") {
            return Err(ImportError::UnsupportedPlatform);
        }
        Ok(Self::with_runner(
            ScriptRunner::osascript(),
            &config.music_app,
            config.delete_after_import,
        ))
    }

    pub fn with_runner(
        runner: ScriptRunner,
        app_name: impl Into<String>,
        delete_after_import: bool,
    ) -> Self {
        Self {
            runner,
            app_name: app_name.into(),
            delete_after_import,
        }
    }

    fn add_script(&self, path: &Path) -> String {
        format!(
            "tell application {app}\n\
             \ttry\n\
             \t\tset theFile to POSIX file {path} as alias\n\
             \t\tadd theFile\n\
             \t\treturn true\n\
             \ton error errMsg\n\
             \t\treturn false\n\
             \tend try\n\
             end tell",
            app = quote(&self.app_name),
            path = quote(&path.to_string_lossy()),
        )
    }

    fn running_script(&self) -> String {
        format!(
            "tell application \"System Events\"\n\
             \treturn (name of processes) contains {app}\n\
             end tell",
            app = quote(&self.app_name),
        )
    }

    fn launch_script(&self) -> String {
        format!(
            "tell application {app}\n\
             \tactivate\n\
             end tell",
            app = quote(&self.app_name),
        )
    }
}

#[async_trait]
impl LibraryImporter for AppleMusicImporter {
    async fn import_file(&self, path: &Path) -> Result<bool, ImportError> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.to_path_buf()));
        }

        let abs_path = tokio::fs::canonicalize(path).await?;
        let output = self.runner.run(&self.add_script(&abs_path)).await?;
        let imported = output.is_true();

        if imported && self.delete_after_import {
            match tokio::fs::remove_file(&abs_path).await {
                Ok(()) => tracing::info!("Deleted cached file: {}", abs_path.display()),
                Err(e) => tracing::warn!("Could not delete {}: {}", abs_path.display(), e),
            }
        }

        Ok(imported)
    }

    async fn is_running(&self) -> bool {
        match self.runner.run(&self.running_script()).await {
            Ok(output) => output.is_true(),
            Err(e) => {
                tracing::debug!("Could not query running processes: {}", e);
                false
            }
        }
    }

    async fn launch(&self) -> bool {
        match self.runner.run(&self.launch_script()).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Could not launch {}: {}", self.app_name, e);
                false
            }
        }
    }
}
