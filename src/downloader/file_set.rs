//! Works out which audio files spotdl produced by comparing directory listings
//! taken before and after it ran.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "m4a", "flac", "wav", "ogg", "opus"];

pub type Snapshot = HashSet<PathBuf>;

/// Lists the regular files directly inside `dir`. A missing directory is an empty snapshot.
pub fn snapshot(dir: &Path) -> io::Result<Snapshot> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::new()),
        Err(e) => return Err(e),
    };

    let mut files = Snapshot::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.insert(entry.path());
        }
    }
    Ok(files)
}

pub fn is_audio_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Audio files present in `after` but not in `before`.
pub fn diff(before: &Snapshot, after: &Snapshot) -> Vec<PathBuf> {
    after
        .difference(before)
        .filter(|path| is_audio_file(path))
        .cloned()
        .collect()
}

fn modified_time(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

pub fn sort_newest_first(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|path| Reverse(modified_time(path)));
}

/// Every audio file in `dir`, most recently modified first.
pub fn audio_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = snapshot(dir)?
        .into_iter()
        .filter(|path| is_audio_file(path))
        .collect();
    sort_newest_first(&mut files);
    Ok(files)
}

/// Files spotdl just wrote into `dir`, newest first.
///
/// When nothing new appeared (spotdl skipped a track it already had) this falls back to the
/// single most recently modified audio file in the directory. That guess can pick an unrelated
/// file if something else wrote there concurrently, but it is the only signal available.
pub fn resolve_new_files(dir: &Path, before: &Snapshot) -> io::Result<Vec<PathBuf>> {
    let after = snapshot(dir)?;
    let mut files = diff(before, &after);

    if files.is_empty() {
        files = audio_files(dir)?.into_iter().take(1).collect();
    }

    sort_newest_first(&mut files);
    Ok(files)
}
