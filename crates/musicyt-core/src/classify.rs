//! Mapping of failures to user-facing messages.
//!
//! The extractor only reports failures as free text on stderr, so messages are
//! chosen from an ordered rule table by substring match on the error's
//! diagnostic text. The first matching rule wins. Matching is
//! case-insensitive; upstream wording changes will still fall through to the
//! generic message.

use crate::error::Error;

/// Message used when no rule matches.
pub const GENERIC_FAILURE: &str = "An error occurred during download";

/// One classification rule.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    /// Any of these substrings selects the rule.
    pub patterns: &'static [&'static str],
    /// Friendly message for the user.
    pub message: &'static str,
}

/// Rules evaluated in order.
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        patterns: &["Unsupported URL"],
        message: "Invalid YouTube URL. Please check the link and try again.",
    },
    ClassificationRule {
        patterns: &["Video unavailable"],
        message: "This video is unavailable or private.",
    },
    ClassificationRule {
        patterns: &["Private video"],
        message: "This video is private and cannot be downloaded.",
    },
    ClassificationRule {
        patterns: &["network", "timeout", "timed out"],
        message: "Network error. Please check your connection and try again.",
    },
    ClassificationRule {
        patterns: &["Sign in to confirm"],
        message: "Age-restricted video. Unable to download without authentication.",
    },
];

/// Pick the friendly message for a diagnostic text.
#[must_use]
pub fn classify_message(diagnostic: &str) -> &'static str {
    let haystack = diagnostic.to_lowercase();
    RULES
        .iter()
        .find(|rule| {
            rule.patterns
                .iter()
                .any(|p| haystack.contains(&p.to_lowercase()))
        })
        .map_or(GENERIC_FAILURE, |rule| rule.message)
}

/// Pick the friendly message for an error, looking only at its diagnostic
/// text so program paths, URLs and file names never match a rule.
#[must_use]
pub fn classify(error: &Error) -> &'static str {
    classify_message(&error.diagnostic())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::error::ProcessError;

    fn process_error(stderr: &str) -> Error {
        Error::Process(ProcessError::NonZeroExit {
            program: PathBuf::from("yt-dlp"),
            exit_code: Some(1),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn test_unsupported_url() {
        let err = process_error("ERROR: Unsupported URL: https://example.com/");
        assert_eq!(
            classify(&err),
            "Invalid YouTube URL. Please check the link and try again."
        );
    }

    #[test]
    fn test_unavailable_and_private() {
        assert_eq!(
            classify_message("ERROR: [youtube] abc: Video unavailable"),
            "This video is unavailable or private."
        );
        assert_eq!(
            classify_message("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            "This video is private and cannot be downloaded."
        );
    }

    #[test]
    fn test_first_match_wins() {
        // Mentions both "Video unavailable" and "network"; the earlier rule applies.
        assert_eq!(
            classify_message("Video unavailable due to network policy"),
            "This video is unavailable or private."
        );
    }

    #[test]
    fn test_network_variants() {
        for text in [
            "Unable to download webpage: network is unreachable",
            "Read timeout",
            "The read operation timed out",
        ] {
            assert_eq!(
                classify_message(text),
                "Network error. Please check your connection and try again."
            );
        }
    }

    #[test]
    fn test_age_restricted() {
        assert_eq!(
            classify_message("ERROR: Sign in to confirm your age"),
            "Age-restricted video. Unable to download without authentication."
        );
    }

    #[test]
    fn test_paths_and_urls_do_not_match() {
        let spawn = Error::Process(ProcessError::Spawn {
            program: PathBuf::from("/opt/network-tools/yt-dlp"),
            reason: "No such file or directory (os error 2)".to_string(),
        });
        assert_eq!(classify(&spawn), GENERIC_FAILURE);

        let exit = Error::Process(ProcessError::NonZeroExit {
            program: PathBuf::from("/home/me/network/ffmpeg"),
            exit_code: Some(1),
            stderr: "Conversion failed!".to_string(),
        });
        assert_eq!(classify(&exit), GENERIC_FAILURE);

        let fetch = Error::fetch("https://youtu.be/timeout-song", "HTTP Error 403: Forbidden");
        assert_eq!(classify(&fetch), GENERIC_FAILURE);
    }

    #[test]
    fn test_generic_fallback() {
        assert_eq!(classify_message("something odd"), GENERIC_FAILURE);
        assert_eq!(classify(&Error::Configuration("x".into())), GENERIC_FAILURE);
    }
}
