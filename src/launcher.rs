use std::io;
use std::process::Stdio;

use tokio::process::Command;

pub const SPOTIFY_WEB_PLAYER: &str = "https://open.spotify.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyTarget {
    DesktopApp,
    WebPlayer,
}

impl SpotifyTarget {
    pub fn describe(self) -> &'static str {
        match self {
            SpotifyTarget::DesktopApp => "Opened Spotify desktop app",
            SpotifyTarget::WebPlayer => "Opened Spotify web player",
        }
    }
}

/// Opens the Spotify desktop app on macOS, otherwise the web player in the default browser.
pub async fn open_spotify() -> Result<SpotifyTarget, String> {
    if cfg!(target_os = "macos") {
        match quiet(Command::new("open").args(["-a", "Spotify"])).status().await {
            Ok(status) if status.success() => return Ok(SpotifyTarget::DesktopApp),
            Ok(status) => tracing::debug!("open -a Spotify exited with {}", status),
            Err(e) => tracing::debug!("open -a Spotify failed: {}", e),
        }
    }

    open_url(SPOTIFY_WEB_PLAYER)
        .await
        .map(|()| SpotifyTarget::WebPlayer)
        .map_err(|e| format!("Failed to open Spotify: {}", e))
}

fn quiet(command: &mut Command) -> &mut Command {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
}

/// Platform command that hands a URL to the default browser.
fn opener(url: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "macos") {
        ("open", vec![url.to_string()])
    } else if cfg!(windows) {
        (
            "cmd",
            vec![
                "/C".to_string(),
                "start".to_string(),
                String::new(),
                url.to_string(),
            ],
        )
    } else {
        ("xdg-open", vec![url.to_string()])
    }
}

async fn open_url(url: &str) -> io::Result<()> {
    let (program, args) = opener(url);
    let status = quiet(Command::new(program).args(&args)).status().await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{} exited with {}", program, status)))
    }
}
