#![forbid(unsafe_code)]

//! Dataset record shapes. Every processed item yields exactly one of these;
//! records are never mutated after creation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Number;

/// Successful item record. Download-related fields are serialized as `null`
/// in metadata-only mode so every record carries the same key set.
#[derive(Debug, Clone, Serialize)]
pub struct VideoRecord {
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<String>,
    pub duration: Option<Number>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub url: Option<String>,
    pub collected_at: DateTime<Utc>,
    pub quality_requested: String,
    pub file_size: Option<u64>,
    pub file_extension: Option<String>,
    pub file_path: Option<String>,
    pub downloaded_format: Option<String>,
    pub download_url: Option<String>,
}

/// A single item that failed during processing or download.
#[derive(Debug, Clone, Serialize)]
pub struct ItemErrorRecord {
    pub video_id: Option<String>,
    pub url: Option<String>,
    pub error: String,
    pub quality_requested: String,
    pub downloaded_format: Option<String>,
    pub download_url: Option<String>,
    pub collected_at: DateTime<Utc>,
}

/// A URL whose extraction failed entirely before any item was produced.
#[derive(Debug, Clone, Serialize)]
pub struct UrlErrorRecord {
    pub url: String,
    pub error: String,
    pub quality_requested: String,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutputRecord {
    Video(VideoRecord),
    ItemError(ItemErrorRecord),
    UrlError(UrlErrorRecord),
}

impl OutputRecord {
    pub fn is_error(&self) -> bool {
        !matches!(self, OutputRecord::Video(_))
    }
}
