#![forbid(unsafe_code)]

//! The download operation: one isolated scratch directory per invocation,
//! optional cookie jar, optional mp3 extraction when ffmpeg is present, and a
//! locate-and-read step for the produced file. No partial bytes ever leave
//! this module; failures surface as errors for the processor to convert.

use crate::cookies::normalize_cookies;
use crate::error::ActorError;
use crate::formats::preferred_format;
use crate::input::Quality;
use crate::media::find_downloaded_media;
use crate::ytdlp::{BaseOptions, DownloadOptions, ExtractedItem, YtdlpRunner};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{info, warn};

const COOKIE_JAR_FILE: &str = "cookies.txt";

/// Whether the transcode helper (ffmpeg) is usable. Injected explicitly so
/// download behavior is testable without environment manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeCapability {
    Available,
    Unavailable,
}

/// Probes `ffmpeg -version` once at startup. A missing helper only disables
/// audio conversion; it never fails the run.
pub async fn probe_transcoder(binary: &str) -> TranscodeCapability {
    let status = Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) if status.success() => TranscodeCapability::Available,
        _ => {
            info!("{binary} not available; audio extraction disabled");
            TranscodeCapability::Unavailable
        }
    }
}

#[derive(Debug)]
pub struct DownloadedMedia {
    pub data: Vec<u8>,
    pub extension: String,
    pub file_name: String,
    pub format_used: String,
}

/// Downloads the media for one extracted item and returns its bytes. The
/// scratch directory is removed on every exit path via `TempDir`'s drop.
pub async fn download_media(
    runner: &YtdlpRunner,
    item: &ExtractedItem,
    quality: Quality,
    proxy_url: Option<&str>,
    cookies: Option<&str>,
    transcode: TranscodeCapability,
) -> Result<DownloadedMedia, ActorError> {
    let url = item.page_url().ok_or(ActorError::MissingUrl)?;

    let scratch = TempDir::new()?;

    let format = if quality.is_audio_only() {
        "bestaudio/best"
    } else {
        preferred_format(quality.as_str())
    };

    let cookie_jar = cookies.and_then(|raw| write_cookie_jar(scratch.path(), raw));
    if cookie_jar.is_some() {
        info!("using provided cookies for authenticated download");
    }

    // Retried jobs may reuse a directory; drop anything stale before yt-dlp
    // runs, keeping the jar just written.
    clear_scratch(scratch.path(), cookie_jar.as_deref());

    let extract_audio = quality.is_audio_only() && transcode == TranscodeCapability::Available;
    let output_template = scratch.path().join("%(id)s.%(ext)s");
    let options = DownloadOptions {
        base: BaseOptions {
            proxy: proxy_url,
            cookie_jar: cookie_jar.as_deref(),
            playlist_end: None,
        },
        format,
        output_template: &output_template,
        extract_audio,
    };

    info!("download using format '{format}'");
    runner.download(url, &options).await?;

    let media_path = find_downloaded_media(scratch.path())?.ok_or(ActorError::NoMediaProduced)?;
    let data = fs::read(&media_path)?;
    let extension = media_path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let file_name = media_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    info!("download succeeded with format '{format}' -> {file_name}");
    Ok(DownloadedMedia {
        data,
        extension,
        file_name,
        format_used: format.to_string(),
    })
}

/// Writes the normalized cookie jar into the scratch directory. Failure to
/// write means "proceed without cookies", not a fatal error.
pub fn write_cookie_jar(dir: &Path, raw_cookies: &str) -> Option<PathBuf> {
    let jar_path = dir.join(COOKIE_JAR_FILE);
    let contents = normalize_cookies(raw_cookies);
    match fs::write(&jar_path, contents) {
        Ok(()) => Some(jar_path),
        Err(err) => {
            warn!("could not write cookies file: {err}");
            None
        }
    }
}

/// Removes everything in the scratch directory except the cookie jar that was
/// just written. Per-entry failures are ignored.
fn clear_scratch(dir: &Path, keep: Option<&Path>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if keep.is_some_and(|kept| kept == path) {
            continue;
        }
        let _ = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
    }
}
