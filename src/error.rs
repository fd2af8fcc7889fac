#![forbid(unsafe_code)]

//! Typed errors for the extraction/download boundary. Binary- and
//! storage-level failures use `anyhow` instead; this enum only covers the
//! conditions the processor layers convert into dataset error records.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActorError {
    /// Vimeo refused the request because the video needs a logged-in session.
    /// Detected from yt-dlp's error output so it can be logged distinctly.
    #[error("authentication required: {0}")]
    AuthRequired(String),
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("yt-dlp timed out after {0} seconds")]
    Timeout(u64),
    #[error("video URL missing from extracted metadata")]
    MissingUrl,
    #[error("download completed but no media file was produced")]
    NoMediaProduced,
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Vimeo signals login walls through free-form messages rather than a stable
/// error code, so classification is by substring.
pub fn is_auth_required_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("logged-in")
        || lowered.contains("authentication")
        || lowered.contains("cookies")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_messages_are_classified() {
        assert!(is_auth_required_message(
            "This video is only available for logged-in users"
        ));
        assert!(is_auth_required_message("Authentication required"));
        assert!(is_auth_required_message(
            "Use --cookies to provide a session"
        ));
        assert!(!is_auth_required_message("HTTP Error 404: Not Found"));
    }
}
