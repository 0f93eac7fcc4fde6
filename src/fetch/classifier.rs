//! Response classification for the fetch loop.
//!
//! A response is first judged from its status and headers alone. Only when
//! the headers announce HTML is the body buffered and scanned for the known
//! interstitial markers: access denied, file not found, or a download
//! confirmation link.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tracing::{debug, trace};
use url::Url;

use super::constants::PREVIEW_CHARS;
use super::error::FetchError;

#[allow(clippy::expect_used)]
static CONFIRM_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="([^"]*/uc\?[^"]*export=download[^"]*)""#)
        .expect("confirm href regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static DOWNLOAD_FORM_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"id="downloadForm"[^>]*action="([^"]*)""#)
        .expect("download form regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static UUID_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name="uuid"\s+value="([^"]*)""#).expect("uuid regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HIDDEN_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input[^>]*type="hidden"[^>]*name="([^"]+)"[^>]*value="([^"]*)""#)
        .expect("hidden input regex is valid") // Static pattern, safe to panic
});

const ACCESS_DENIED_MARKERS: &[&str] = &["google drive - access denied", "you need permission"];

const NOT_FOUND_MARKERS: &[&str] = &[
    "google drive - file not found",
    "we're sorry",
    "we&#39;re sorry",
    "cannot be found",
];

/// Verdict reached from status and headers alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadVerdict {
    /// The body is file content; stream it without reading.
    Accept,
    /// The body is an HTML page that must be inspected.
    InspectHtml,
    /// Neither content nor a page worth inspecting.
    Reject,
}

/// Verdict reached by scanning a buffered HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageVerdict {
    /// The page says the caller lacks permission.
    AccessDenied,
    /// The page says the file does not exist.
    NotFound,
    /// The page carries a confirmation link to follow once.
    Confirm(String),
    /// No known marker was found.
    Unrecognized,
}

/// Outcome of classifying one response.
#[derive(Debug)]
pub enum Classification {
    /// Live, unread response whose body is the file.
    Accepted(reqwest::Response),
    /// Follow-up URL extracted from a confirmation page.
    Confirm(String),
    /// A file-level failure; no other endpoint can help.
    Fatal(FetchError),
    /// This endpoint did not work; the error is terminal only if no
    /// candidate remains.
    NextCandidate(FetchError),
}

impl Classification {
    /// Wraps a failure: file-level categories end the fetch, anything else
    /// moves on to the next candidate.
    #[must_use]
    pub fn failure(error: FetchError) -> Self {
        if error.category().is_file_level() {
            Self::Fatal(error)
        } else {
            Self::NextCandidate(error)
        }
    }
}

/// Inputs the classifier needs besides the response itself.
#[derive(Debug, Clone)]
pub struct ClassifyContext<'a> {
    /// Identifier being fetched, used in error messages.
    pub identifier: &'a str,
    /// Base for relative confirmation links.
    pub confirm_base: &'a Url,
    /// Declared length above which a 200 response is accepted.
    pub accept_length_threshold: u64,
}

/// Judges a response from status, content type and declared length.
#[must_use]
pub fn classify_head(
    status: u16,
    content_type: &str,
    content_length: Option<u64>,
    accept_length_threshold: u64,
) -> HeadVerdict {
    let content_type = content_type.to_ascii_lowercase();
    if status == 200
        && (is_binary_content_type(&content_type)
            || content_length.is_some_and(|len| len > accept_length_threshold))
    {
        return HeadVerdict::Accept;
    }
    if content_type.contains("text/html") {
        return HeadVerdict::InspectHtml;
    }
    HeadVerdict::Reject
}

fn is_binary_content_type(content_type: &str) -> bool {
    content_type.contains("video") || content_type.contains("octet-stream")
}

/// Scans an HTML page for markers, in precedence order: access denied,
/// not found, confirmation link.
#[must_use]
pub fn scan_confirmation_page(html: &str, confirm_base: &Url) -> PageVerdict {
    let lowered = html.to_lowercase();
    if ACCESS_DENIED_MARKERS.iter().any(|m| lowered.contains(m)) {
        return PageVerdict::AccessDenied;
    }
    if NOT_FOUND_MARKERS.iter().any(|m| lowered.contains(m)) {
        return PageVerdict::NotFound;
    }

    let uuid = UUID_FIELD
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    if let Some(href) = CONFIRM_HREF.captures(html).and_then(|c| c.get(1)) {
        let url = absolutize(&decode_ampersands(href.as_str()), confirm_base);
        return PageVerdict::Confirm(append_query(url, &[], uuid.as_deref()));
    }

    if let Some(captures) = DOWNLOAD_FORM_ACTION.captures(html)
        && let (Some(whole), Some(action)) = (captures.get(0), captures.get(1))
    {
        let url = absolutize(&decode_ampersands(action.as_str()), confirm_base);
        let fields = hidden_form_fields(&html[whole.start()..]);
        return PageVerdict::Confirm(append_query(url, &fields, uuid.as_deref()));
    }

    PageVerdict::Unrecognized
}

/// Hidden inputs of the form starting at `form_html`, excluding `uuid`,
/// which is always appended last.
fn hidden_form_fields(form_html: &str) -> Vec<(String, String)> {
    let end = form_html.find("</form>").unwrap_or(form_html.len());
    HIDDEN_INPUT
        .captures_iter(&form_html[..end])
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .filter(|(name, _)| *name != "uuid")
        .map(|(name, value)| (name.to_string(), decode_ampersands(value)))
        .collect()
}

fn decode_ampersands(raw: &str) -> String {
    raw.replace("&amp;", "&")
}

fn absolutize(link: &str, base: &Url) -> String {
    if link.starts_with("http") {
        return link.to_string();
    }
    base.join(link).map_or_else(
        |_| format!("{}{link}", base.as_str().trim_end_matches('/')),
        |joined| joined.to_string(),
    )
}

fn append_query(mut url: String, fields: &[(String, String)], uuid: Option<&str>) -> String {
    let uuid_pair = uuid.map(|token| ("uuid", token));
    let present: HashSet<String> = Url::parse(&url)
        .map(|parsed| parsed.query_pairs().map(|(name, _)| name.into_owned()).collect())
        .unwrap_or_default();
    let pairs = fields
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .filter(|(name, _)| !present.contains(*name))
        .collect::<Vec<_>>();
    for (name, value) in pairs.into_iter().chain(uuid_pair) {
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str(name);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}

/// Classifies a response, buffering the body only for HTML pages.
pub async fn classify_response(
    response: reqwest::Response,
    ctx: &ClassifyContext<'_>,
) -> Classification {
    let status = response.status().as_u16();
    let content_type = header_str(&response, CONTENT_TYPE).to_string();
    let content_length = declared_length(&response);

    match classify_head(
        status,
        &content_type,
        content_length,
        ctx.accept_length_threshold,
    ) {
        HeadVerdict::Accept => Classification::Accepted(response),
        HeadVerdict::Reject => {
            debug!(status, content_type = %content_type, "response is neither content nor HTML");
            // The attempt count is filled in by the fetch loop if this becomes terminal.
            Classification::failure(FetchError::exhausted(ctx.identifier, 0))
        }
        HeadVerdict::InspectHtml => {
            let html = match response.text().await {
                Ok(html) => html,
                Err(e) => {
                    return Classification::NextCandidate(FetchError::unexpected(format!(
                        "failed to read HTML page: {e}"
                    )));
                }
            };
            trace!(bytes = html.len(), "buffered HTML page");
            match scan_confirmation_page(&html, ctx.confirm_base) {
                PageVerdict::AccessDenied => {
                    Classification::failure(FetchError::access_denied(ctx.identifier))
                }
                PageVerdict::NotFound => {
                    Classification::failure(FetchError::not_found(ctx.identifier))
                }
                PageVerdict::Confirm(url) => Classification::Confirm(url),
                PageVerdict::Unrecognized => {
                    debug!(status, "HTML page without known markers");
                    Classification::failure(FetchError::unexpected(format!(
                        "service returned an unrecognized HTML page (HTTP {status})"
                    )))
                }
            }
        }
    }
}

/// Maps the text of an implausibly small download onto an error.
#[must_use]
pub fn classify_undersized_payload(identifier: &str, content: &str) -> FetchError {
    let lowered = content.to_lowercase();
    if lowered.contains("quota") {
        return FetchError::quota_exceeded(identifier);
    }
    if lowered.contains("access denied") || lowered.contains("403") {
        return FetchError::access_denied(identifier);
    }
    if lowered.contains("404") || lowered.contains("not found") {
        return FetchError::not_found(identifier);
    }
    let preview: String = content.trim().chars().take(PREVIEW_CHARS).collect();
    FetchError::unexpected(format!(
        "downloaded {} bytes that do not look like the file (content preview: {preview:?})",
        content.len()
    ))
}

pub(crate) fn header_str(response: &reqwest::Response, name: reqwest::header::HeaderName) -> &str {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub(crate) fn declared_length(response: &reqwest::Response) -> Option<u64> {
    header_str(response, CONTENT_LENGTH).trim().parse::<u64>().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://drive.google.com").unwrap()
    }

    #[test]
    fn test_failure_routes_by_category() {
        assert!(matches!(
            Classification::failure(FetchError::access_denied("x")),
            Classification::Fatal(_)
        ));
        assert!(matches!(
            Classification::failure(FetchError::not_found("x")),
            Classification::Fatal(_)
        ));
        assert!(matches!(
            Classification::failure(FetchError::quota_exceeded("x")),
            Classification::NextCandidate(_)
        ));
        assert!(matches!(
            Classification::failure(FetchError::unexpected("odd")),
            Classification::NextCandidate(_)
        ));
    }

    #[test]
    fn test_head_accepts_video_content_type() {
        assert_eq!(
            classify_head(200, "video/mp4", None, 100_000),
            HeadVerdict::Accept
        );
        assert_eq!(
            classify_head(200, "application/octet-stream", Some(10), 100_000),
            HeadVerdict::Accept
        );
    }

    #[test]
    fn test_head_accepts_large_declared_length_regardless_of_type() {
        assert_eq!(
            classify_head(200, "text/html", Some(100_001), 100_000),
            HeadVerdict::Accept
        );
        assert_eq!(
            classify_head(200, "text/html", Some(100_000), 100_000),
            HeadVerdict::InspectHtml
        );
    }

    #[test]
    fn test_head_non_200_video_is_not_accepted() {
        assert_eq!(
            classify_head(404, "video/mp4", Some(5_000_000), 100_000),
            HeadVerdict::Reject
        );
    }

    #[test]
    fn test_head_html_is_inspected_for_any_status() {
        assert_eq!(
            classify_head(403, "Text/HTML; charset=utf-8", None, 100_000),
            HeadVerdict::InspectHtml
        );
    }

    #[test]
    fn test_head_rejects_json() {
        assert_eq!(
            classify_head(200, "application/json", Some(50), 100_000),
            HeadVerdict::Reject
        );
    }

    #[test]
    fn test_access_denied_takes_precedence_over_confirm_link() {
        let html = r#"<title>Google Drive - Access Denied</title>
            <a href="/uc?export=download&amp;id=x">Download</a>"#;
        assert_eq!(scan_confirmation_page(html, &base()), PageVerdict::AccessDenied);
    }

    #[test]
    fn test_you_need_permission_is_access_denied() {
        let html = "<p>You need permission</p>";
        assert_eq!(scan_confirmation_page(html, &base()), PageVerdict::AccessDenied);
    }

    #[test]
    fn test_not_found_markers() {
        for html in [
            "<title>Google Drive - File not found</title>",
            "<p>Sorry, the file you have requested cannot be found.</p>",
            "<p>We&#39;re sorry. You can&#39;t access this item</p>",
        ] {
            assert_eq!(
                scan_confirmation_page(html, &base()),
                PageVerdict::NotFound,
                "html: {html}"
            );
        }
    }

    #[test]
    fn test_confirm_anchor_decodes_entities_and_appends_uuid() {
        let html = r#"<a id="uc-download-link" href="/uc?export=download&amp;confirm=AbCd&amp;id=file123">Download anyway</a>
            <input type="hidden" name="uuid" value="1234-abcd">"#;
        let PageVerdict::Confirm(url) = scan_confirmation_page(html, &base()) else {
            panic!("expected confirm");
        };
        assert!(!url.contains("&amp;"), "url: {url}");
        assert!(url.starts_with("https://drive.google.com/uc?"), "url: {url}");
        assert!(url.contains("confirm=AbCd&id=file123"), "url: {url}");
        assert!(url.ends_with("&uuid=1234-abcd"), "url: {url}");
    }

    #[test]
    fn test_confirm_anchor_absolute_link_kept() {
        let html = r#"<a href="https://drive.google.com/uc?export=download&amp;id=z">x</a>"#;
        assert_eq!(
            scan_confirmation_page(html, &base()),
            PageVerdict::Confirm("https://drive.google.com/uc?export=download&id=z".to_string())
        );
    }

    #[test]
    fn test_download_form_action_carries_hidden_fields() {
        let html = r#"<form id="download-form-wrapper"></form>
            <form id="downloadForm" action="https://drive.usercontent.google.com/download" method="get">
              <input type="hidden" name="id" value="file123">
              <input type="hidden" name="export" value="download">
              <input type="hidden" name="confirm" value="t">
              <input type="hidden" name="uuid" value="u-1">
            </form>"#;
        let PageVerdict::Confirm(url) = scan_confirmation_page(html, &base()) else {
            panic!("expected confirm");
        };
        assert_eq!(
            url,
            "https://drive.usercontent.google.com/download?id=file123&export=download&confirm=t&uuid=u-1"
        );
    }

    #[test]
    fn test_hidden_field_dedupe_matches_whole_parameter_names() {
        let html = r#"<form id="downloadForm" action="/download?fileid=9&amp;confirm=x" method="get">
              <input type="hidden" name="id" value="file123">
              <input type="hidden" name="confirm" value="t">
            </form>"#;
        let PageVerdict::Confirm(url) = scan_confirmation_page(html, &base()) else {
            panic!("expected confirm");
        };
        assert_eq!(
            url,
            "https://drive.google.com/download?fileid=9&confirm=x&id=file123"
        );
    }

    #[test]
    fn test_confirm_without_uuid() {
        let html = r#"<a href="/uc?export=download&amp;id=q">x</a>"#;
        assert_eq!(
            scan_confirmation_page(html, &base()),
            PageVerdict::Confirm("https://drive.google.com/uc?export=download&id=q".to_string())
        );
    }

    #[test]
    fn test_plain_page_is_unrecognized() {
        let html = "<html><body>Virus scan in progress</body></html>";
        assert_eq!(scan_confirmation_page(html, &base()), PageVerdict::Unrecognized);
    }

    #[test]
    fn test_anchor_without_export_download_is_ignored() {
        let html = r#"<a href="/uc?id=q">x</a>"#;
        assert_eq!(scan_confirmation_page(html, &base()), PageVerdict::Unrecognized);
    }

    #[test]
    fn test_undersized_quota() {
        let error = classify_undersized_payload("id", "Google Drive: download quota exceeded");
        assert!(matches!(error, FetchError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_undersized_access_denied_and_403() {
        assert!(matches!(
            classify_undersized_payload("id", "Access denied"),
            FetchError::AccessDenied { .. }
        ));
        assert!(matches!(
            classify_undersized_payload("id", "Error 403"),
            FetchError::AccessDenied { .. }
        ));
    }

    #[test]
    fn test_undersized_not_found() {
        assert!(matches!(
            classify_undersized_payload("id", "<h1>404</h1>"),
            FetchError::NotFound { .. }
        ));
        assert!(matches!(
            classify_undersized_payload("id", "Not Found"),
            FetchError::NotFound { .. }
        ));
    }

    #[test]
    fn test_undersized_default_has_truncated_preview() {
        let content = "x".repeat(500);
        let error = classify_undersized_payload("id", &content);
        let FetchError::UnexpectedResponse { detail } = &error else {
            panic!("expected unexpected response, got {error:?}");
        };
        assert!(detail.contains(&"x".repeat(200)));
        assert!(!detail.contains(&"x".repeat(201)));
        assert!(detail.contains("500 bytes"));
    }
}
