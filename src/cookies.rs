#![forbid(unsafe_code)]

//! Converts JSON-exported browser cookies into the Netscape cookie-jar format
//! that yt-dlp expects. Input that is already a cookie jar passes through
//! untouched, and malformed JSON is treated as already-correct rather than
//! failing the job.

use serde_json::{Map, Value};
use tracing::warn;

pub const NETSCAPE_MARKER: &str = "# Netscape HTTP Cookie File";
const DEFAULT_DOMAIN: &str = ".vimeo.com";
const FAR_FUTURE_EXPIRY: i64 = 2147483647;

/// Normalizes an opaque cookie string into cookie-jar text. Idempotent on
/// jar-format input; never errors.
pub fn normalize_cookies(raw: &str) -> String {
    if raw.contains(NETSCAPE_MARKER) {
        return raw.to_string();
    }

    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            warn!("failed to parse JSON cookies: {err}; assuming Netscape format");
            return raw.to_string();
        }
    };

    let mut lines = vec![
        NETSCAPE_MARKER.to_string(),
        "# https://curl.se/docs/http-cookies.html".to_string(),
        "# This file was generated by the Vimeo downloader actor".to_string(),
        String::new(),
    ];

    match parsed {
        Value::Array(cookies) => {
            for cookie in cookies {
                if let Value::Object(map) = cookie
                    && let Some(line) = cookie_line(&map)
                {
                    lines.push(line);
                }
            }
        }
        Value::Object(map) if map.contains_key("name") => {
            if let Some(line) = cookie_line(&map) {
                lines.push(line);
            }
        }
        _ => {}
    }

    lines.join("\n")
}

/// Formats a single cookie object as one tab-separated jar line. Cookies
/// missing a name or value are skipped.
fn cookie_line(cookie: &Map<String, Value>) -> Option<String> {
    let name = cookie
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())?;
    let value = match cookie.get("value") {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Null) | None => return None,
        Some(other) => other.to_string(),
    };

    let domain = cookie
        .get("domain")
        .and_then(Value::as_str)
        .filter(|domain| !domain.is_empty())
        .unwrap_or(DEFAULT_DOMAIN);
    let include_subdomains = if domain.starts_with('.') {
        "TRUE"
    } else {
        "FALSE"
    };
    let path = cookie
        .get("path")
        .and_then(Value::as_str)
        .filter(|path| !path.is_empty())
        .unwrap_or("/");
    let secure = if is_truthy(cookie.get("secure")) {
        "TRUE"
    } else {
        "FALSE"
    };
    let expiry = expiry_seconds(cookie);
    let http_only = if is_truthy(cookie.get("httpOnly")) || is_truthy(cookie.get("http_only")) {
        "#HttpOnly_"
    } else {
        ""
    };

    Some(format!(
        "{http_only}{domain}\t{include_subdomains}\t{path}\t{secure}\t{expiry}\t{name}\t{value}"
    ))
}

/// Browser exports carry either `expirationDate` (often fractional seconds) or
/// `expires`. Each is tried in turn; absent, zero, or unparsable values fall
/// through to the next, ending at a far-future constant so session cookies
/// survive the jar roundtrip.
fn expiry_seconds(cookie: &Map<String, Value>) -> i64 {
    parse_expiry(cookie.get("expirationDate"))
        .or_else(|| parse_expiry(cookie.get("expires")))
        .unwrap_or(FAR_FUTURE_EXPIRY)
}

fn parse_expiry(value: Option<&Value>) -> Option<i64> {
    let seconds = match value? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|seconds| seconds as i64))?,
        Value::String(text) => text.parse::<i64>().ok()?,
        _ => return None,
    };
    (seconds > 0).then_some(seconds)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        _ => false,
    }
}
