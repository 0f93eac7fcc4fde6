//! File identifier extraction from share URLs.
//!
//! Accepts the URL shapes the drive service hands out when sharing a file,
//! or a bare identifier.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::trace;

#[allow(clippy::expect_used)]
static FILE_D_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/file/d/([^/?#]+)").expect("file/d regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static ID_QUERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&]id=([^&#]+)").expect("id query regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static D_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/d/([^/?#]+)").expect("d regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static BARE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_-]{25,}$").expect("bare id regex is valid") // Static pattern, safe to panic
});

/// Errors from identifier extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Input is empty after trimming.
    #[error("no file URL or ID provided")]
    Empty,

    /// Input matches no supported URL shape and is not a bare ID.
    #[error("invalid drive URL format: {input}")]
    Unrecognized {
        /// The rejected input.
        input: String,
    },
}

/// Extracts the file identifier from a share URL or bare ID.
///
/// Supported shapes, tried in order:
/// - `https://drive.google.com/file/d/<id>/view`
/// - `https://drive.google.com/open?id=<id>` (also `&id=`)
/// - `https://docs.google.com/.../d/<id>/...`
/// - a bare identifier of at least 25 characters from `[A-Za-z0-9_-]`
///
/// # Errors
///
/// Returns [`IdentifierError`] when no shape matches.
///
/// # Examples
///
/// ```
/// use drivefetch_core::extract_file_id;
///
/// let id = extract_file_id("https://drive.google.com/file/d/1AbC_dEf/view?usp=sharing").unwrap();
/// assert_eq!(id, "1AbC_dEf");
/// ```
pub fn extract_file_id(input: &str) -> Result<String, IdentifierError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IdentifierError::Empty);
    }

    for pattern in [&*FILE_D_PATTERN, &*ID_QUERY_PATTERN, &*D_PATTERN] {
        if let Some(id) = pattern.captures(trimmed).and_then(|c| c.get(1)) {
            let decoded = urlencoding::decode(id.as_str())
                .map_or_else(|_| id.as_str().to_string(), std::borrow::Cow::into_owned);
            trace!(id = %decoded, "extracted file id from URL");
            return Ok(decoded);
        }
    }

    if BARE_ID_PATTERN.is_match(trimmed) {
        return Ok(trimmed.to_string());
    }

    Err(IdentifierError::Unrecognized {
        input: trimmed.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_d_url() {
        assert_eq!(
            extract_file_id("https://drive.google.com/file/d/1a2B3c/view?usp=sharing").unwrap(),
            "1a2B3c"
        );
    }

    #[test]
    fn test_open_id_query() {
        assert_eq!(
            extract_file_id("https://drive.google.com/open?id=XYZ_123&authuser=0").unwrap(),
            "XYZ_123"
        );
        assert_eq!(
            extract_file_id("https://drive.google.com/uc?export=download&id=abc-9").unwrap(),
            "abc-9"
        );
    }

    #[test]
    fn test_short_d_url() {
        assert_eq!(
            extract_file_id("https://docs.google.com/presentation/d/QQQ/edit").unwrap(),
            "QQQ"
        );
    }

    #[test]
    fn test_bare_id_with_whitespace() {
        let id = "1AbCdEfGhIjKlMnOpQrStUvWxYz";
        assert_eq!(extract_file_id(&format!("  {id}\n")).unwrap(), id);
    }

    #[test]
    fn test_short_bare_token_rejected() {
        assert!(matches!(
            extract_file_id("tooShort"),
            Err(IdentifierError::Unrecognized { .. })
        ));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(extract_file_id("   "), Err(IdentifierError::Empty));
    }

    #[test]
    fn test_unrelated_url_rejected() {
        assert!(extract_file_id("https://example.com/video.mp4").is_err());
    }
}
