#![forbid(unsafe_code)]

//! Single-item and URL processors. Error-to-record conversion happens at
//! exactly two layers: the item processor converts any failure into an
//! item-level error record, and the URL processor converts any failure that
//! escapes extraction into a single URL-level error record. Neither ever
//! propagates an error to its caller.

use crate::download::{TranscodeCapability, download_media};
use crate::error::ActorError;
use crate::input::{DownloadMode, Quality};
use crate::media::{content_type_for_extension, storage_key};
use crate::records::{ItemErrorRecord, OutputRecord, UrlErrorRecord, VideoRecord};
use crate::storage::KeyValueStore;
use crate::ytdlp::{BaseOptions, ExtractedItem, YtdlpRunner};
use chrono::Utc;
use tempfile::TempDir;
use tracing::{error, info, warn};

/// Everything the processors need that stays constant across the batch.
pub struct ProcessorContext<'a> {
    pub runner: &'a YtdlpRunner,
    pub store: &'a KeyValueStore,
    pub public_api_base: &'a str,
    pub mode: DownloadMode,
    pub quality: Quality,
    pub max_items: u32,
    pub cookies: Option<&'a str>,
    pub transcode: TranscodeCapability,
}

/// Turns one extracted item into one output record, optionally downloading
/// and persisting the media. Never returns an error.
pub async fn process_item(
    ctx: &ProcessorContext<'_>,
    item: &ExtractedItem,
    proxy_url: Option<&str>,
) -> OutputRecord {
    match process_item_inner(ctx, item, proxy_url).await {
        Ok(record) => OutputRecord::Video(record),
        Err(err) => {
            error!(
                "failed to process video {}: {err}",
                item.id.as_deref().unwrap_or("<unknown>")
            );
            OutputRecord::ItemError(ItemErrorRecord {
                video_id: item.id.clone(),
                url: item.page_url().map(str::to_string),
                error: err.to_string(),
                quality_requested: ctx.quality.as_str().to_string(),
                downloaded_format: None,
                download_url: None,
                collected_at: Utc::now(),
            })
        }
    }
}

async fn process_item_inner(
    ctx: &ProcessorContext<'_>,
    item: &ExtractedItem,
    proxy_url: Option<&str>,
) -> Result<VideoRecord, ActorError> {
    let mut record = VideoRecord {
        video_id: item.id.clone(),
        title: item.title.clone(),
        author: item.uploader.clone(),
        publish_date: item.upload_date.clone(),
        duration: item.duration.clone(),
        view_count: item.view_count,
        like_count: item.like_count,
        description: item.description.clone(),
        thumbnail: item.thumbnail.clone(),
        url: item.page_url().map(str::to_string),
        collected_at: Utc::now(),
        quality_requested: ctx.quality.as_str().to_string(),
        file_size: None,
        file_extension: None,
        file_path: None,
        downloaded_format: None,
        download_url: None,
    };

    if ctx.mode != DownloadMode::Videos {
        return Ok(record);
    }

    let media = download_media(
        ctx.runner,
        item,
        ctx.quality,
        proxy_url,
        ctx.cookies,
        ctx.transcode,
    )
    .await?;

    let key = storage_key(item.id.as_deref().unwrap_or("unknown"), &media.extension);
    record.file_size = Some(media.data.len() as u64);
    record.file_extension = Some(media.extension.clone());
    record.file_path = Some(key.clone());
    record.downloaded_format = Some(media.format_used);

    let content_type = content_type_for_extension(Some(&media.extension));
    ctx.store
        .set_value(&key, media.data, content_type)
        .await
        .map_err(|err| ActorError::Storage(format!("storing downloaded media: {err:#}")))?;

    match ctx.store.id() {
        Some(store_id) => {
            let download_url = format!(
                "{}/v2/key-value-stores/{store_id}/records/{key}?raw=1",
                ctx.public_api_base
            );
            info!("download URL: {download_url}");
            record.download_url = Some(download_url);
        }
        None => {
            warn!("key-value store id unavailable, download_url set to null");
        }
    }

    Ok(record)
}

/// Resolves one input URL to one or many items and processes each. A total
/// failure yields a single URL-level error record; the result is never empty.
pub async fn process_url(
    ctx: &ProcessorContext<'_>,
    url: &str,
    proxy_url: Option<&str>,
) -> Vec<OutputRecord> {
    info!("processing: {url}");
    match process_url_inner(ctx, url, proxy_url).await {
        Ok(records) => records,
        Err(err) => {
            error!("failed to process {url}: {err}");
            vec![OutputRecord::UrlError(UrlErrorRecord {
                url: url.to_string(),
                error: err.to_string(),
                quality_requested: ctx.quality.as_str().to_string(),
                collected_at: Utc::now(),
            })]
        }
    }
}

async fn process_url_inner(
    ctx: &ProcessorContext<'_>,
    url: &str,
    proxy_url: Option<&str>,
) -> Result<Vec<OutputRecord>, ActorError> {
    // The extraction cookie jar is independent of the one the download
    // operation writes; both are cleaned up with their directories.
    let mut _jar_dir: Option<TempDir> = None;
    let mut cookie_jar = None;
    if let Some(cookies) = ctx.cookies {
        let dir = TempDir::new()?;
        cookie_jar = crate::download::write_cookie_jar(dir.path(), cookies);
        if cookie_jar.is_some() {
            info!("using provided cookies for authenticated extraction");
        }
        _jar_dir = Some(dir);
    }

    let options = BaseOptions {
        proxy: proxy_url,
        cookie_jar: cookie_jar.as_deref(),
        playlist_end: (ctx.max_items > 0).then_some(ctx.max_items),
    };

    info!("extracting info for {url}");
    let info = match ctx.runner.extract(url, &options).await {
        Ok(info) => info,
        Err(err) => {
            match &err {
                ActorError::AuthRequired(_) => {
                    error!("Vimeo authentication required for {url}; provide cookies");
                }
                other => {
                    error!("failed to extract info for {url}: {other}");
                }
            }
            return Err(err);
        }
    };

    let mut records = Vec::new();
    if let Some(entries) = &info.entries {
        let entries: Vec<&ExtractedItem> = entries.iter().flatten().collect();
        if entries.is_empty() {
            return Err(ActorError::Extraction(format!(
                "no entries found in playlist/channel: {url}"
            )));
        }
        info!("found {} valid items in playlist/channel", entries.len());
        for entry in entries {
            records.push(process_item(ctx, entry, proxy_url).await);
        }
    } else {
        records.push(process_item(ctx, &info, proxy_url).await);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KeyValueStore;
    use crate::ytdlp::testing::install_stub;
    use serde_json::Value;
    use tempfile::{TempDir, tempdir};

    /// Stub that serves a single video, a playlist with a null entry, an
    /// empty collection, or an authentication failure depending on the URL,
    /// and writes a media file when invoked with `--format`.
    const STUB: &str = r#"
url="${@: -1}"
output=""
is_download=0
while [[ $# -gt 0 ]]; do
  case "$1" in
    --output)
      shift
      output="$1"
      ;;
    --format)
      is_download=1
      ;;
  esac
  shift
done

if [[ "$url" == *authwall* ]]; then
  echo 'ERROR: This video requires authentication, pass cookies' >&2
  exit 1
fi

if [[ "$is_download" == 1 ]]; then
  target="${output//%(id)s/12345}"
  target="${target//%(ext)s/mp4}"
  echo "video-bytes" > "$target"
  exit 0
fi

if [[ "$url" == *empty* ]]; then
  echo '{"id":"showcase2","title":"Empty Showcase","entries":null}'
  exit 0
fi

if [[ "$url" == *playlist* ]]; then
  cat <<'JSON'
{
  "id": "showcase1",
  "title": "Showcase",
  "webpage_url": "https://vimeo.com/showcase/1",
  "entries": [
    {"id": "111", "title": "First", "webpage_url": "https://vimeo.com/111"},
    null,
    {"id": "222", "title": "Second", "webpage_url": "https://vimeo.com/222"}
  ]
}
JSON
  exit 0
fi

cat <<'JSON'
{
  "id": "12345",
  "title": "A Clip",
  "uploader": "Maker",
  "upload_date": "20240101",
  "duration": 61,
  "view_count": 10,
  "like_count": 2,
  "description": "desc",
  "thumbnail": "https://i.vimeocdn.com/video/12345.jpg",
  "webpage_url": "https://vimeo.com/12345"
}
JSON
"#;

    struct Fixture {
        _stub_dir: TempDir,
        _store_dir: TempDir,
        runner: YtdlpRunner,
        store: KeyValueStore,
    }

    fn fixture() -> Fixture {
        let stub_dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        let stub = install_stub(stub_dir.path(), STUB);
        let runner = YtdlpRunner::new(stub);
        let store = KeyValueStore::local(store_dir.path()).unwrap();
        Fixture {
            _stub_dir: stub_dir,
            _store_dir: store_dir,
            runner,
            store,
        }
    }

    fn context<'a>(fixture: &'a Fixture, mode: DownloadMode) -> ProcessorContext<'a> {
        ProcessorContext {
            runner: &fixture.runner,
            store: &fixture.store,
            public_api_base: "https://api.apify.com",
            mode,
            quality: Quality::Best,
            max_items: 10,
            cookies: None,
            transcode: TranscodeCapability::Unavailable,
        }
    }

    #[tokio::test]
    async fn metadata_only_yields_one_record_with_null_download_fields() {
        let fixture = fixture();
        let ctx = context(&fixture, DownloadMode::MetadataOnly);
        let records = process_url(&ctx, "https://vimeo.com/12345", None).await;
        assert_eq!(records.len(), 1);

        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["video_id"], "12345");
        assert_eq!(value["author"], "Maker");
        assert_eq!(value["duration"], 61);
        assert!(value.get("error").is_none());
        for field in [
            "file_size",
            "file_extension",
            "file_path",
            "downloaded_format",
            "download_url",
        ] {
            assert!(value[field].is_null(), "field {field}");
        }
    }

    #[tokio::test]
    async fn videos_mode_stores_bytes_and_fills_download_fields() {
        let fixture = fixture();
        let ctx = context(&fixture, DownloadMode::Videos);
        let records = process_url(&ctx, "https://vimeo.com/12345", None).await;
        assert_eq!(records.len(), 1);

        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["file_extension"], "mp4");
        assert_eq!(value["file_path"], "12345.mp4");
        assert_eq!(value["downloaded_format"], "bestvideo*+bestaudio/best");
        // Local store has no id, so no retrieval URL is synthesized.
        assert!(value["download_url"].is_null());

        let stored = fixture.store.get_value("12345.mp4").await.unwrap();
        assert_eq!(stored, Some(b"video-bytes\n".to_vec()));
    }

    #[tokio::test]
    async fn playlist_with_null_entry_yields_one_record_per_valid_entry() {
        let fixture = fixture();
        let ctx = context(&fixture, DownloadMode::MetadataOnly);
        let records = process_url(&ctx, "https://vimeo.com/playlist/1", None).await;
        assert_eq!(records.len(), 2);

        let ids: Vec<Value> = records
            .iter()
            .map(|record| serde_json::to_value(record).unwrap()["video_id"].clone())
            .collect();
        assert_eq!(ids, vec![Value::from("111"), Value::from("222")]);
    }

    #[tokio::test]
    async fn playlist_with_null_entries_yields_url_error_record() {
        let fixture = fixture();
        let ctx = context(&fixture, DownloadMode::MetadataOnly);
        let records = process_url(&ctx, "https://vimeo.com/showcase/empty", None).await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_error());

        let value = serde_json::to_value(&records[0]).unwrap();
        assert!(value["error"].as_str().unwrap().contains("no entries"));
        assert_eq!(value["url"], "https://vimeo.com/showcase/empty");
        assert!(value.get("video_id").is_none());
    }

    #[tokio::test]
    async fn auth_failure_becomes_url_error_record() {
        let fixture = fixture();
        let ctx = context(&fixture, DownloadMode::MetadataOnly);
        let records = process_url(&ctx, "https://vimeo.com/authwall/1", None).await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_error());

        let value = serde_json::to_value(&records[0]).unwrap();
        assert!(
            value["error"]
                .as_str()
                .unwrap()
                .contains("authentication required")
        );
        assert_eq!(value["url"], "https://vimeo.com/authwall/1");
        assert_eq!(value["quality_requested"], "best");
    }

    #[tokio::test]
    async fn item_failure_is_contained_to_an_error_record() {
        // A missing binary makes the download subprocess itself fail.
        let fixture = fixture();
        let bad_runner = YtdlpRunner::new("/nonexistent/yt-dlp");
        let ctx = ProcessorContext {
            runner: &bad_runner,
            store: &fixture.store,
            public_api_base: "https://api.apify.com",
            mode: DownloadMode::Videos,
            quality: Quality::Best,
            max_items: 0,
            cookies: None,
            transcode: TranscodeCapability::Unavailable,
        };
        let item = ExtractedItem {
            id: Some("999".into()),
            webpage_url: Some("https://vimeo.com/999".into()),
            ..ExtractedItem::default()
        };
        let record = process_item(&ctx, &item, None).await;
        assert!(record.is_error());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["video_id"], "999");
        assert!(value["downloaded_format"].is_null());
        assert!(value["download_url"].is_null());
    }
}
