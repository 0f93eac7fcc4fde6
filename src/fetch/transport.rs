//! HTTP transport used by the fetch loop.
//!
//! Performs GET requests with browser-like headers, a capped redirect
//! policy and a timeout on the wait for response headers. Any status below
//! 500 is returned to the caller so that 4xx pages can still be classified.

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, redirect};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{
    ACCEPT_LANGUAGE as ACCEPT_LANGUAGE_VALUE, DEFAULT_REFERER, MAX_REDIRECTS, REQUEST_TIMEOUT_SECS,
};
use super::endpoint::redact_credentials;
use super::error::{SetupError, TransportError};
use crate::user_agent::BROWSER_USER_AGENT;

/// Settings for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Time allowed until response headers arrive.
    pub request_timeout: Duration,
    /// Maximum redirects followed per request.
    pub max_redirects: usize,
    /// Referer header value.
    pub referer: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            max_redirects: MAX_REDIRECTS,
            referer: DEFAULT_REFERER.to_string(),
        }
    }
}

/// Reusable HTTP transport with connection pooling.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Builds a transport from explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidReferer`] if the Referer value is not a
    /// valid header value, or [`SetupError::Client`] if the client cannot be
    /// constructed.
    pub fn new(settings: &TransportSettings) -> Result<Self, SetupError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE),
        );
        let referer =
            HeaderValue::from_str(&settings.referer).map_err(|_| SetupError::InvalidReferer {
                value: settings.referer.clone(),
            })?;
        headers.insert(REFERER, referer);

        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .redirect(redirect::Policy::limited(settings.max_redirects))
            .connect_timeout(settings.request_timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            request_timeout: settings.request_timeout,
        })
    }

    /// Issues a GET and returns the response once headers have arrived.
    ///
    /// The body is left untouched so that callers can either stream it to
    /// disk or buffer it for inspection. URLs carried by errors and spans
    /// have credential values masked.
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidUrl`] if `url` does not parse
    /// - [`TransportError::Timeout`] if headers do not arrive in time
    /// - [`TransportError::Network`] for connection or redirect failures
    /// - [`TransportError::ServerError`] for any 5xx status
    #[instrument(level = "debug", skip(self, url), fields(url = %redact_credentials(url)))]
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, TransportError> {
        let shown = redact_credentials(url);
        let parsed = Url::parse(url).map_err(|_| TransportError::InvalidUrl { url: shown.clone() })?;

        let response = tokio::time::timeout(self.request_timeout, self.client.get(parsed).send())
            .await
            .map_err(|_| TransportError::Timeout { url: shown.clone() })?
            .map_err(|source| {
                if source.is_timeout() {
                    TransportError::Timeout { url: shown.clone() }
                } else {
                    TransportError::Network {
                        url: shown.clone(),
                        source: source.without_url(),
                    }
                }
            })?;

        let status = response.status();
        debug!(
            status = status.as_u16(),
            final_url = %redact_credentials(response.url().as_str()),
            "response headers received"
        );
        if status.is_server_error() {
            return Err(TransportError::ServerError {
                url: shown,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}
