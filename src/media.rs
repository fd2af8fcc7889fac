#![forbid(unsafe_code)]

//! Media file helpers: locating the file yt-dlp produced in a scratch
//! directory, mapping extensions to content types, and deriving safe
//! key-value store keys.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "m4v"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "opus", "ogg", "wav", "flac"];

/// Key-value store keys are capped by the platform at 256 characters.
pub const MAX_KEY_LENGTH: usize = 256;

pub fn is_media_extension(extension: &str) -> bool {
    let lowered = extension.to_ascii_lowercase();
    VIDEO_EXTENSIONS.contains(&lowered.as_str()) || AUDIO_EXTENSIONS.contains(&lowered.as_str())
}

/// Locates the most recently modified media file directly inside `directory`.
/// Subdirectories are not searched; `None` means yt-dlp produced nothing.
pub fn find_downloaded_media(directory: &Path) -> io::Result<Option<PathBuf>> {
    let mut candidates: Vec<(PathBuf, SystemTime)> = Vec::new();

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let has_media_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(is_media_extension);
        if !has_media_extension {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|meta| meta.modified()) else {
            continue;
        };
        candidates.push((path, modified));
    }

    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(candidates.into_iter().next().map(|(path, _)| path))
}

/// Infers the content type for storing a downloaded file, mirroring the
/// extension sets above. Unknown extensions fall back to a generic type.
pub fn content_type_for_extension(extension: Option<&str>) -> &'static str {
    let Some(extension) = extension else {
        return "application/octet-stream";
    };
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "m4v" => "video/x-m4v",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "opus" => "audio/ogg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "mp3" => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

/// Builds a `<video_id>.<extension>` store key that satisfies the platform's
/// length and character constraints. Truncation never cuts into the extension.
pub fn storage_key(video_id: &str, extension: &str) -> String {
    let sanitized_id = sanitize_key_component(video_id);
    let sanitized_ext = sanitize_key_component(extension);
    let key = format!("{sanitized_id}.{sanitized_ext}");

    if key.len() <= MAX_KEY_LENGTH {
        return key;
    }

    let id_budget = MAX_KEY_LENGTH - sanitized_ext.len() - 1;
    format!("{}.{sanitized_ext}", &sanitized_id[..id_budget])
}

/// The platform allows `a-zA-Z0-9` plus `!-_.'()` in record keys.
fn sanitize_key_component(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            '!' | '-' | '_' | '.' | '\'' | '(' | ')' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn locator_returns_newest_media_file() -> io::Result<()> {
        let dir = tempdir()?;
        let old = dir.path().join("old.mp4");
        let new = dir.path().join("new.webm");
        let ignored = dir.path().join("notes.txt");
        fs::write(&old, "old")?;
        fs::write(&new, "new")?;
        fs::write(&ignored, "text")?;

        let earlier = SystemTime::now() - Duration::from_secs(120);
        let file = fs::File::options().write(true).open(&old)?;
        file.set_modified(earlier)?;

        let found = find_downloaded_media(dir.path())?;
        assert_eq!(found, Some(new));
        Ok(())
    }

    #[test]
    fn locator_ignores_subdirectories_and_unknown_extensions() -> io::Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("nested"))?;
        fs::write(dir.path().join("nested").join("inner.mp4"), "video")?;
        fs::write(dir.path().join("download.part"), "partial")?;
        assert_eq!(find_downloaded_media(dir.path())?, None);
        Ok(())
    }

    #[test]
    fn locator_handles_empty_directory() -> io::Result<()> {
        let dir = tempdir()?;
        assert_eq!(find_downloaded_media(dir.path())?, None);
        Ok(())
    }

    #[test]
    fn locator_is_case_insensitive_on_extensions() -> io::Result<()> {
        let dir = tempdir()?;
        let upper = dir.path().join("CLIP.MP4");
        fs::write(&upper, "video")?;
        assert_eq!(find_downloaded_media(dir.path())?, Some(upper));
        Ok(())
    }

    #[test]
    fn content_types_cover_known_extensions() {
        assert_eq!(content_type_for_extension(Some("mp4")), "video/mp4");
        assert_eq!(content_type_for_extension(Some(".MP3")), "audio/mpeg");
        assert_eq!(content_type_for_extension(Some("opus")), "audio/ogg");
        assert_eq!(
            content_type_for_extension(Some("xyz")),
            "application/octet-stream"
        );
        assert_eq!(content_type_for_extension(None), "application/octet-stream");
    }

    #[test]
    fn storage_key_joins_id_and_extension() {
        assert_eq!(storage_key("12345", "mp4"), "12345.mp4");
    }

    #[test]
    fn storage_key_replaces_disallowed_characters() {
        assert_eq!(storage_key("a/b c", "mp4"), "a_b_c.mp4");
    }

    #[test]
    fn storage_key_truncation_preserves_extension() {
        let long_id = "x".repeat(500);
        let key = storage_key(&long_id, "webm");
        assert_eq!(key.len(), MAX_KEY_LENGTH);
        assert!(key.ends_with(".webm"));
    }
}
