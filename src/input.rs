#![forbid(unsafe_code)]

//! Job input parsing. The raw `urls` field arrives in several loose shapes
//! (native array, bare string, JSON array in a string, newline- or
//! comma-separated string); everything normalizes to a typed list before any
//! other component runs. Malformed values fall back to safe defaults rather
//! than failing the job.

use crate::proxy::ProxyConfigurationInput;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

const TARGET_DOMAIN: &str = "vimeo.com";
const DEFAULT_MAX_ITEMS: i64 = 10;
const MAX_ITEMS_CAP: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    Videos,
    MetadataOnly,
}

impl DownloadMode {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("metadata_only") => DownloadMode::MetadataOnly,
            // Unrecognized modes fall back to the default rather than failing.
            _ => DownloadMode::Videos,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DownloadMode::Videos => "videos",
            DownloadMode::MetadataOnly => "metadata_only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Best,
    P720,
    P1080,
    AudioOnly,
}

impl Quality {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("720p") => Quality::P720,
            Some("1080p") => Quality::P1080,
            Some("audio_only") => Quality::AudioOnly,
            _ => Quality::Best,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Best => "best",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::AudioOnly => "audio_only",
        }
    }

    pub fn is_audio_only(self) -> bool {
        matches!(self, Quality::AudioOnly)
    }
}

/// Job input exactly as stored under the input key, before normalization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawActorInput {
    pub urls: Value,
    pub download_mode: Option<String>,
    pub quality: Option<String>,
    pub max_items: Value,
    pub proxy_configuration: Option<ProxyConfigurationInput>,
    pub cookies: Option<String>,
}

/// Fully typed job input. Immutable after parsing.
#[derive(Debug, Clone)]
pub struct ActorInput {
    pub urls: Vec<String>,
    pub mode: DownloadMode,
    pub quality: Quality,
    pub max_items: u32,
    pub proxy_configuration: Option<ProxyConfigurationInput>,
    pub cookies: Option<String>,
}

pub fn parse_input(raw: RawActorInput) -> ActorInput {
    ActorInput {
        urls: normalize_urls(&raw.urls),
        mode: DownloadMode::parse(raw.download_mode.as_deref()),
        quality: Quality::parse(raw.quality.as_deref()),
        max_items: parse_max_items(&raw.max_items),
        proxy_configuration: raw.proxy_configuration,
        cookies: raw.cookies.filter(|cookies| !cookies.is_empty()),
    }
}

/// Flattens every accepted `urls` shape into a plain list. Non-string array
/// elements are coerced to their JSON text so domain validation can drop them
/// with a warning instead of silently losing them.
pub fn normalize_urls(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(values) => values.iter().map(value_to_url).collect(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }

            if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                return match parsed {
                    Value::Array(values) => values.iter().map(value_to_url).collect(),
                    Value::String(single) => vec![single],
                    other => vec![value_to_url(&other)],
                };
            }

            let lines: Vec<String> = trimmed
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            if lines.len() > 1 {
                return lines;
            }

            let parts: Vec<String> = trimmed
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect();
            if parts.len() > 1 {
                return parts;
            }

            vec![trimmed.to_string()]
        }
        _ => Vec::new(),
    }
}

fn value_to_url(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_max_items(raw: &Value) -> u32 {
    let requested = match raw {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|n| n as i64))
            .unwrap_or(DEFAULT_MAX_ITEMS),
        Value::String(text) => text.trim().parse::<i64>().unwrap_or(DEFAULT_MAX_ITEMS),
        _ => DEFAULT_MAX_ITEMS,
    };
    requested.clamp(0, MAX_ITEMS_CAP) as u32
}

/// Keeps only URLs pointing at the target site; everything else is dropped
/// with a warning, never an error.
pub fn valid_vimeo_urls(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .filter(|url| {
            if url.contains(TARGET_DOMAIN) {
                true
            } else {
                warn!("skipping non-Vimeo URL: {url}");
                false
            }
        })
        .collect()
}
