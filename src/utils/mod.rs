use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::domain::AppError;

pub const SPOTIFY_DOMAIN: &str = "spotify.com";

/// Checks the URL the way the form does before a run starts.
/// This is a substring check, not a full URL parse.
pub fn validate_spotify_url(input: &str) -> Result<String, AppError> {
    let url = input.trim();
    if url.is_empty() {
        return Err(AppError::EmptyUrl);
    }
    if !url.contains(SPOTIFY_DOMAIN) {
        return Err(AppError::InvalidUrl);
    }
    Ok(url.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Track,
    Album,
    Playlist,
    Artist,
}

impl LinkKind {
    pub fn label(self) -> &'static str {
        match self {
            LinkKind::Track => "track",
            LinkKind::Album => "album",
            LinkKind::Playlist => "playlist",
            LinkKind::Artist => "artist",
        }
    }
}

/// Works out what an `open.spotify.com` link points at, e.g. `/intl-de/album/<id>`.
pub fn link_kind(input: &str) -> Option<LinkKind> {
    let url = Url::parse(input.trim()).ok()?;
    let host = url.host_str()?;
    if !host.ends_with(SPOTIFY_DOMAIN) {
        return None;
    }

    url.path_segments()?
        .find(|segment| !segment.is_empty() && !segment.starts_with("intl-"))
        .and_then(|segment| match segment {
            "track" => Some(LinkKind::Track),
            "album" => Some(LinkKind::Album),
            "playlist" => Some(LinkKind::Playlist),
            "artist" => Some(LinkKind::Artist),
            _ => None,
        })
}

fn ansi_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").ok())
        .as_ref()
}

/// Removes terminal colour codes that spotdl writes even into pipes.
pub fn strip_ansi(line: &str) -> String {
    match ansi_pattern() {
        Some(re) => re.replace_all(line, "").into_owned(),
        None => line.to_string(),
    }
}

/// File name for log lines, falling back to the whole path.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
