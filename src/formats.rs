#![forbid(unsafe_code)]

//! Maps a quality preference to an ordered list of yt-dlp format selectors,
//! most preferred first and the unqualified `best` always last. Only the head
//! of the chain is consumed by the download path; the rest documents the
//! intended fallback policy.

/// Returns ordered format-selector expressions with graceful fallbacks.
/// Unrecognized or absent qualities behave exactly like `best`.
pub fn format_candidates(quality: &str) -> Vec<&'static str> {
    let candidates: &[&'static str] = match quality.trim().to_lowercase().as_str() {
        "audio_only" | "audio" => &["bestaudio/best", "best"],
        "1080p" | "1080" => &[
            "bestvideo*[height<=1080][fps<=60]+bestaudio/best[height<=1080]",
            "bestvideo*[height<=1080]+bestaudio/best",
            "bestvideo[height<=1440]+bestaudio/best",
            "best",
        ],
        "720p" | "720" => &[
            "bestvideo*[height<=720][fps<=60]+bestaudio/best[height<=720]",
            "bestvideo*[height<=720]+bestaudio/best",
            "bestvideo[height<=1080]+bestaudio/best",
            "best",
        ],
        _ => &[
            "bestvideo*+bestaudio/best",
            "bestvideo+bestaudio/best",
            "best",
        ],
    };

    // Deduplicate while preserving first occurrence.
    let mut ordered = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !ordered.contains(candidate) {
            ordered.push(*candidate);
        }
    }
    ordered
}

/// The single selector actually passed to yt-dlp for a download.
pub fn preferred_format(quality: &str) -> &'static str {
    format_candidates(quality)[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_quality_matches_best_chain() {
        let default_chain = format_candidates("best");
        assert_eq!(format_candidates("4k"), default_chain);
        assert_eq!(format_candidates(""), default_chain);
        assert_eq!(format_candidates("  "), default_chain);
        assert_eq!(format_candidates("ultra"), default_chain);
    }

    #[test]
    fn quality_labels_are_case_insensitive() {
        assert_eq!(format_candidates("AUDIO_ONLY"), format_candidates("audio"));
        assert_eq!(format_candidates("1080P"), format_candidates("1080"));
        assert_eq!(format_candidates("720P"), format_candidates("720p"));
    }

    #[test]
    fn chains_are_duplicate_free_and_end_with_best() {
        for quality in ["best", "720p", "1080p", "audio_only", "whatever"] {
            let chain = format_candidates(quality);
            assert!(!chain.is_empty());
            assert_eq!(*chain.last().unwrap(), "best", "quality {quality}");
            for (index, candidate) in chain.iter().enumerate() {
                assert!(
                    !chain[index + 1..].contains(candidate),
                    "duplicate {candidate} for quality {quality}"
                );
            }
        }
    }

    #[test]
    fn audio_only_prefers_bestaudio() {
        assert_eq!(preferred_format("audio_only"), "bestaudio/best");
        assert_eq!(
            preferred_format("720p"),
            "bestvideo*[height<=720][fps<=60]+bestaudio/best[height<=720]"
        );
    }
}
