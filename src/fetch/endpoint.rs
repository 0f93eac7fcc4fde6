//! Candidate endpoints for a single remote file.
//!
//! The same file can usually be reached through several URL forms. An
//! [`EndpointStrategy`] holds them as templates in fixed priority order and
//! expands them for one identifier.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Placeholder substituted with the (URL-encoded) file identifier.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Placeholder substituted with the configured API key.
pub const KEY_PLACEHOLDER: &str = "{key}";

const UC_TEMPLATE: &str = "https://drive.google.com/uc?export=download&id={id}&confirm=t";
const USERCONTENT_TEMPLATE: &str =
    "https://drive.usercontent.google.com/download?id={id}&export=download&confirm=t";
const API_TEMPLATE: &str = "https://www.googleapis.com/drive/v3/files/{id}?alt=media&key={key}";

/// Replacement for credential values in logged or displayed URLs.
pub const REDACTED: &str = "REDACTED";

#[allow(clippy::expect_used)]
static KEY_QUERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([?&](?:key|access_token)=)[^&#]*").expect("key query regex is valid") // Static pattern, safe to panic
});

/// Masks credential query values (`key`, `access_token`) in `url`.
///
/// Every URL that leaves the fetch loop as text (errors, events, spans)
/// goes through this first.
#[must_use]
pub fn redact_credentials(url: &str) -> String {
    KEY_QUERY_PATTERN
        .replace_all(url, |caps: &regex::Captures<'_>| format!("{}{REDACTED}", &caps[1]))
        .into_owned()
}

/// Distinguishes endpoint styles; used only for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// A public download URL that may answer with confirmation pages.
    Direct,
    /// An authenticated REST API URL.
    Api,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct download"),
            Self::Api => f.write_str("drive api"),
        }
    }
}

/// One URL template in the fallback chain.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointTemplate {
    template: String,
    kind: EndpointKind,
}

impl EndpointTemplate {
    /// Creates a template; `{id}` is replaced by the identifier on expansion.
    pub fn new(template: impl Into<String>, kind: EndpointKind) -> Self {
        Self {
            template: template.into(),
            kind,
        }
    }

    /// Returns the endpoint style.
    #[must_use]
    pub fn kind(&self) -> EndpointKind {
        self.kind
    }
}

impl fmt::Debug for EndpointTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointTemplate")
            .field("template", &redact_credentials(&self.template))
            .field("kind", &self.kind)
            .finish()
    }
}

/// A fully expanded request target for one identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointCandidate {
    /// Zero-based position in the priority order.
    pub index: usize,
    /// The request URL.
    pub url: String,
    /// Endpoint style.
    pub kind: EndpointKind,
}

impl EndpointCandidate {
    /// The request URL with credential values masked.
    #[must_use]
    pub fn display_url(&self) -> String {
        redact_credentials(&self.url)
    }
}

impl fmt::Debug for EndpointCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointCandidate")
            .field("index", &self.index)
            .field("url", &self.display_url())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Ordered, finite list of endpoint templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStrategy {
    templates: Vec<EndpointTemplate>,
}

impl EndpointStrategy {
    /// Creates a strategy from explicit templates, tried in the given order.
    #[must_use]
    pub fn new(templates: Vec<EndpointTemplate>) -> Self {
        Self { templates }
    }

    /// Default chain for the public drive service.
    ///
    /// The API endpoint is appended only when an API key is configured.
    #[must_use]
    pub fn google_drive(api_key: Option<&str>) -> Self {
        let mut templates = vec![
            EndpointTemplate::new(UC_TEMPLATE, EndpointKind::Direct),
            EndpointTemplate::new(USERCONTENT_TEMPLATE, EndpointKind::Direct),
        ];
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            let encoded = urlencoding::encode(key);
            templates.push(EndpointTemplate::new(
                API_TEMPLATE.replace(KEY_PLACEHOLDER, &encoded),
                EndpointKind::Api,
            ));
        }
        Self { templates }
    }

    /// Number of candidates this strategy yields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true when no template is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Expands every template for `identifier`, preserving priority order.
    #[must_use]
    pub fn candidates(&self, identifier: &str) -> Vec<EndpointCandidate> {
        let encoded = urlencoding::encode(identifier);
        self.templates
            .iter()
            .enumerate()
            .map(|(index, template)| EndpointCandidate {
                index,
                url: template.template.replace(ID_PLACEHOLDER, &encoded),
                kind: template.kind,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_without_key_has_two_direct_endpoints() {
        let strategy = EndpointStrategy::google_drive(None);
        let candidates = strategy.candidates("abc123");
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.kind == EndpointKind::Direct));
        assert_eq!(
            candidates[0].url,
            "https://drive.google.com/uc?export=download&id=abc123&confirm=t"
        );
        assert!(candidates[1].url.starts_with("https://drive.usercontent.google.com/"));
    }

    #[test]
    fn test_api_endpoint_added_last_when_key_configured() {
        let strategy = EndpointStrategy::google_drive(Some("secret-key"));
        let candidates = strategy.candidates("abc123");
        assert_eq!(candidates.len(), 3);
        let api = &candidates[2];
        assert_eq!(api.kind, EndpointKind::Api);
        assert_eq!(api.index, 2);
        assert_eq!(
            api.url,
            "https://www.googleapis.com/drive/v3/files/abc123?alt=media&key=secret-key"
        );
    }

    #[test]
    fn test_blank_key_is_ignored() {
        assert_eq!(EndpointStrategy::google_drive(Some("   ")).len(), 2);
    }

    #[test]
    fn test_identifier_is_url_encoded() {
        let strategy = EndpointStrategy::new(vec![EndpointTemplate::new(
            "http://localhost/dl?id={id}",
            EndpointKind::Direct,
        )]);
        let candidates = strategy.candidates("a b&c");
        assert_eq!(candidates[0].url, "http://localhost/dl?id=a%20b%26c");
    }

    #[test]
    fn test_empty_strategy() {
        let strategy = EndpointStrategy::new(Vec::new());
        assert!(strategy.is_empty());
        assert!(strategy.candidates("x").is_empty());
    }

    #[test]
    fn test_redact_masks_key_and_keeps_other_params() {
        assert_eq!(
            redact_credentials("https://x.test/files/a?alt=media&key=SEKRET-1&v=2"),
            "https://x.test/files/a?alt=media&key=REDACTED&v=2"
        );
        assert_eq!(
            redact_credentials("https://x.test/a?access_token=tok#frag"),
            "https://x.test/a?access_token=REDACTED#frag"
        );
        assert_eq!(
            redact_credentials("https://x.test/a?monkey=1&id=2"),
            "https://x.test/a?monkey=1&id=2"
        );
    }

    #[test]
    fn test_debug_output_hides_api_key() {
        let strategy = EndpointStrategy::google_drive(Some("SEKRET-KEY-123"));
        assert!(!format!("{strategy:?}").contains("SEKRET"));
        let candidates = strategy.candidates("abc");
        assert!(!format!("{candidates:?}").contains("SEKRET"));
        assert!(candidates[2].display_url().ends_with("key=REDACTED"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(EndpointKind::Api.to_string(), "drive api");
        assert_eq!(EndpointKind::Direct.to_string(), "direct download");
    }
}
