//! Error types for the fetch pipeline.
//!
//! Every terminal failure of a fetch is a [`FetchError`], and every
//! [`FetchError`] maps onto exactly one [`ErrorCategory`]. The `Display`
//! output of each variant is the actionable message shown to users.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Closed set of terminal failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The file exists but is not shared publicly.
    AccessDenied,
    /// The identifier does not name an existing file.
    NotFound,
    /// The service refused the download because of a quota.
    QuotaExceeded,
    /// Every candidate endpoint was tried without obtaining content.
    AllEndpointsExhausted,
    /// Writing, reading, or renaming the local file failed.
    TransferIoError,
    /// The service answered with something no rule recognises.
    UnexpectedResponse,
}

impl ErrorCategory {
    /// Returns true for categories that are properties of the file rather
    /// than of the endpoint; these stop the candidate loop immediately.
    #[must_use]
    pub fn is_file_level(self) -> bool {
        matches!(self, Self::AccessDenied | Self::NotFound)
    }

    /// Returns the stable label for display and JSON output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::NotFound => "not_found",
            Self::QuotaExceeded => "quota_exceeded",
            Self::AllEndpointsExhausted => "all_endpoints_exhausted",
            Self::TransferIoError => "transfer_io_error",
            Self::UnexpectedResponse => "unexpected_response",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boxed low-level cause preserved inside [`FetchError::TransferIo`].
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classified failure of a single fetch invocation.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The file is not shared with "Anyone with the link".
    #[error(
        "Access denied for file {identifier}. File must be shared with \"Anyone with the link\" permission. \
         Go to file > Share > General access > Anyone with the link."
    )]
    AccessDenied {
        /// The identifier that was refused.
        identifier: String,
    },

    /// The identifier does not resolve to a file.
    #[error(
        "File not found: {identifier}. Please check if the file ID is correct and the file still exists."
    )]
    NotFound {
        /// The identifier that was not found.
        identifier: String,
    },

    /// The service reported its download quota for the file was exceeded.
    #[error("Download quota exceeded for file {identifier}. Please try again later.")]
    QuotaExceeded {
        /// The identifier whose quota was exceeded.
        identifier: String,
    },

    /// No candidate endpoint produced file content.
    #[error(
        "Unable to download file {identifier} after {attempts} endpoint attempt(s). Please ensure: \
         1) File is shared with \"Anyone with the link\", 2) File exists and is not deleted, \
         3) You have copied the full file ID or URL correctly."
    )]
    AllEndpointsExhausted {
        /// The identifier being fetched.
        identifier: String,
        /// Number of candidate endpoints tried.
        attempts: usize,
    },

    /// Local file handling failed after the stream was accepted.
    #[error(
        "Error writing downloaded file {}: {message}{}",
        path.display(),
        source.as_ref().map(|cause| format!(" ({cause})")).unwrap_or_default()
    )]
    TransferIo {
        /// The file path involved.
        path: PathBuf,
        /// Description of what failed.
        message: String,
        /// The underlying cause, when one exists.
        #[source]
        source: Option<BoxedCause>,
    },

    /// The service answered with content no rule recognises.
    #[error(
        "Failed to download file: {detail}. Please make sure the file is shared with \"Anyone with the link\" \
         permission (right-click file > Share > General access > Anyone with the link)."
    )]
    UnexpectedResponse {
        /// What was observed.
        detail: String,
    },
}

impl FetchError {
    /// Creates an access-denied error.
    pub fn access_denied(identifier: impl Into<String>) -> Self {
        Self::AccessDenied {
            identifier: identifier.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }

    /// Creates a quota-exceeded error.
    pub fn quota_exceeded(identifier: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            identifier: identifier.into(),
        }
    }

    /// Creates an exhausted-endpoints error.
    pub fn exhausted(identifier: impl Into<String>, attempts: usize) -> Self {
        Self::AllEndpointsExhausted {
            identifier: identifier.into(),
            attempts,
        }
    }

    /// Creates a transfer error wrapping a low-level cause.
    pub fn transfer_io<E>(path: impl Into<PathBuf>, message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TransferIo {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a transfer error without an underlying cause.
    pub fn transfer_io_message(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TransferIo {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unexpected-response error.
    pub fn unexpected(detail: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            detail: detail.into(),
        }
    }

    /// Returns the category this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AccessDenied { .. } => ErrorCategory::AccessDenied,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::QuotaExceeded { .. } => ErrorCategory::QuotaExceeded,
            Self::AllEndpointsExhausted { .. } => ErrorCategory::AllEndpointsExhausted,
            Self::TransferIo { .. } => ErrorCategory::TransferIoError,
            Self::UnexpectedResponse { .. } => ErrorCategory::UnexpectedResponse,
        }
    }
}

/// Transport-level failures, raised before any classification happens.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response headers arrived within the request timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// DNS, connection, TLS or redirect failure.
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a 5xx status.
    #[error("HTTP {status} requesting {url}")]
    ServerError {
        /// The URL that failed.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL string.
        url: String,
    },
}

/// Failures while constructing a fetcher from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The confirmation base URL does not parse.
    #[error("invalid confirmation base URL: {url}")]
    InvalidBaseUrl {
        /// The offending URL string.
        url: String,
    },

    /// The configured Referer is not a valid header value.
    #[error("invalid Referer header value: {value:?}")]
    InvalidReferer {
        /// The offending value.
        value: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
