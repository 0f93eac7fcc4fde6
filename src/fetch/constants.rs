//! Constants for the fetch module (timeouts, thresholds, fixed headers).

/// Time allowed until response headers arrive (30 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects followed per request.
pub const MAX_REDIRECTS: usize = 10;

/// Declared content length above which a 200 response is accepted as file content.
pub const ACCEPT_LENGTH_THRESHOLD: u64 = 100_000;

/// Files smaller than this are treated as disguised error pages.
pub const MIN_PLAUSIBLE_FILE_SIZE: u64 = 1000;

/// Base URL used to absolutize relative confirmation links.
pub const DEFAULT_CONFIRM_BASE_URL: &str = "https://drive.google.com";

/// Referer sent with every request.
pub const DEFAULT_REFERER: &str = "https://drive.google.com/";

/// Accept-Language sent with every request.
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// MIME type reported for every stored file.
pub const STORED_MIME_TYPE: &str = "video/mp4";

/// Label passed to progress callbacks.
pub const PROGRESS_DISPLAY_NAME: &str = "Google Drive File";

/// Characters of an undersized payload kept in error previews.
pub const PREVIEW_CHARS: usize = 200;
