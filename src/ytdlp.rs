#![forbid(unsafe_code)]

//! Subprocess boundary around the `yt-dlp` executable: option structs mapped
//! to CLI flags, JSON deserialization of extracted metadata, and error
//! classification from stderr. The binary path is injected so tests can stand
//! in a stub script.

use crate::error::{ActorError, is_auth_required_message};
use anyhow::{Result, bail};
use serde::{Deserialize, Deserializer};
use serde_json::Number;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

const METADATA_TIMEOUT: Duration = Duration::from_secs(180);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(1800);

/// Headers mimicking a real browser; Vimeo throttles bare clients.
const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Accept-Encoding", "gzip, deflate, br"),
    ("DNT", "1"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Cache-Control", "max-age=0"),
];

/// Options shared by every yt-dlp invocation.
#[derive(Debug, Default)]
pub struct BaseOptions<'a> {
    pub proxy: Option<&'a str>,
    pub cookie_jar: Option<&'a Path>,
    pub playlist_end: Option<u32>,
}

/// Options for a media download invocation.
#[derive(Debug)]
pub struct DownloadOptions<'a> {
    pub base: BaseOptions<'a>,
    pub format: &'a str,
    pub output_template: &'a Path,
    /// Post-process into mp3; only set when the transcode helper is present.
    pub extract_audio: bool,
}

/// Metadata payload from `yt-dlp --dump-single-json`. Everything is optional
/// because Vimeo omits fields freely; a present `entries` key marks a
/// playlist/channel, even when its value is JSON null (an empty collection),
/// and its elements may themselves be JSON null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub upload_date: Option<String>,
    pub duration: Option<Number>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
    pub url: Option<String>,
    #[serde(default, deserialize_with = "entries_if_present")]
    pub entries: Option<Vec<Option<ExtractedItem>>>,
}

/// Keeps `"entries": null` distinct from an absent key: null becomes an empty
/// collection rather than falling back to the single-video default.
fn entries_if_present<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<Option<ExtractedItem>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Option<ExtractedItem>>>::deserialize(deserializer)?;
    Ok(Some(entries.unwrap_or_default()))
}

impl ExtractedItem {
    pub fn page_url(&self) -> Option<&str> {
        self.webpage_url.as_deref().or(self.url.as_deref())
    }

    pub fn is_collection(&self) -> bool {
        self.entries.is_some()
    }
}

pub struct YtdlpRunner {
    binary: PathBuf,
    metadata_timeout: Duration,
    download_timeout: Duration,
}

impl YtdlpRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            metadata_timeout: METADATA_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_timeouts(binary: impl Into<PathBuf>, metadata: Duration, download: Duration) -> Self {
        Self {
            binary: binary.into(),
            metadata_timeout: metadata,
            download_timeout: download,
        }
    }

    /// Runs `yt-dlp --version` to fail loudly at startup when the tool is
    /// missing rather than on the first batch item.
    pub async fn ensure_available(&self) -> Result<()> {
        let status = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => bail!(
                "{} is installed but returned a failure status",
                self.binary.display()
            ),
            Err(err) => bail!(
                "{} is not installed or not in PATH: {}",
                self.binary.display(),
                err
            ),
        }
    }

    /// Metadata-only extraction. No format selector is ever passed here to
    /// avoid selector validation rejecting metadata-only runs.
    pub async fn extract(
        &self,
        url: &str,
        options: &BaseOptions<'_>,
    ) -> Result<ExtractedItem, ActorError> {
        let mut args = base_args(options);
        args.push("--dump-single-json".into());
        args.push("--skip-download".into());
        args.push(url.into());

        let stdout = self.run(args, self.metadata_timeout).await?;
        let item: ExtractedItem = serde_json::from_slice(&stdout)?;
        Ok(item)
    }

    /// Downloads media into the caller's scratch directory via the output
    /// template; the produced file is located separately.
    pub async fn download(&self, url: &str, options: &DownloadOptions<'_>) -> Result<(), ActorError> {
        let mut args = base_args(&options.base);
        args.push("--format".into());
        args.push(options.format.into());
        args.push("--output".into());
        args.push(options.output_template.to_string_lossy().into_owned());
        if options.extract_audio {
            args.push("--extract-audio".into());
            args.push("--audio-format".into());
            args.push("mp3".into());
            args.push("--audio-quality".into());
            args.push("192".into());
        }
        args.push(url.into());

        self.run(args, self.download_timeout).await?;
        Ok(())
    }

    async fn run(&self, args: Vec<String>, limit: Duration) -> Result<Vec<u8>, ActorError> {
        let command_future = Command::new(&self.binary).args(&args).output();
        let output = timeout(limit, command_future)
            .await
            .map_err(|_| ActorError::Timeout(limit.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .last()
                .unwrap_or("yt-dlp exited with a failure status")
                .to_string();
            if is_auth_required_message(&message) {
                return Err(ActorError::AuthRequired(message));
            }
            return Err(ActorError::Extraction(message));
        }

        Ok(output.stdout)
    }
}

fn base_args(options: &BaseOptions<'_>) -> Vec<String> {
    let mut args = vec![
        "--quiet".to_string(),
        "--no-warnings".to_string(),
        "--no-colors".to_string(),
        "--retries".to_string(),
        "3".to_string(),
        "--fragment-retries".to_string(),
        "3".to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "--yes-playlist".to_string(),
    ];

    for (name, value) in BROWSER_HEADERS {
        args.push("--add-header".to_string());
        args.push(format!("{name}:{value}"));
    }

    if let Some(end) = options.playlist_end
        && end > 0
    {
        args.push("--playlist-end".to_string());
        args.push(end.to_string());
    }
    if let Some(proxy) = options.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.to_string());
    }
    if let Some(jar) = options.cookie_jar {
        args.push("--cookies".to_string());
        args.push(jar.to_string_lossy().into_owned());
    }

    args
}
