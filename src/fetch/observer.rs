//! Diagnostic events and progress reporting for a fetch.
//!
//! The fetch loop never logs directly; it reports [`FetchEvent`]s to an
//! injected [`FetchObserver`]. [`TracingObserver`] forwards them to
//! `tracing`, which is what the binary uses.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::endpoint::EndpointKind;
use super::error::ErrorCategory;

/// Progress update passed to the caller's progress callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Identifier being fetched.
    pub identifier: String,
    /// Human-readable label for the transfer.
    pub display_name: String,
    /// Completion percentage, 1 to 100.
    pub percent: u8,
}

/// Caller-supplied progress callback.
pub type ProgressCallback<'a> = &'a (dyn Fn(&ProgressEvent) + Send + Sync);

/// Structured diagnostic emitted by the fetch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// A candidate endpoint is about to be requested.
    CandidateStarted {
        index: usize,
        kind: EndpointKind,
        url: String,
    },
    /// Response headers arrived.
    ResponseReceived {
        status: u16,
        content_type: String,
        content_length: Option<u64>,
    },
    /// A confirmation page yielded a follow-up URL.
    ConfirmationFound { url: String },
    /// The candidate failed; the loop moves on if another remains.
    CandidateFailed { index: usize, reason: String },
    /// A response was accepted as file content.
    StreamAccepted { index: usize },
    /// The stored payload was too small to be the file.
    UndersizedPayload { bytes: u64, preview: String },
    /// The file was committed to its final path.
    TransferCompleted { path: PathBuf, bytes: u64 },
    /// The fetch ended with an error.
    Failed { category: ErrorCategory, message: String },
}

/// Receives diagnostic events; must not influence control flow.
pub trait FetchObserver: Send + Sync {
    /// Called once per event, in order.
    fn on_event(&self, event: &FetchEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FetchObserver for TracingObserver {
    fn on_event(&self, event: &FetchEvent) {
        match event {
            FetchEvent::CandidateStarted { index, kind, url } => {
                info!(method = index + 1, kind = %kind, "attempting download method");
                debug!(url = %url, "candidate url");
            }
            FetchEvent::ResponseReceived {
                status,
                content_type,
                content_length,
            } => debug!(status, content_type = %content_type, ?content_length, "response received"),
            FetchEvent::ConfirmationFound { url } => {
                info!(url = %url, "found download confirmation, following once");
            }
            FetchEvent::CandidateFailed { index, reason } => {
                warn!(method = index + 1, reason = %reason, "download method failed");
            }
            FetchEvent::StreamAccepted { index } => info!(method = index + 1, "download method succeeded"),
            FetchEvent::UndersizedPayload { bytes, preview } => {
                warn!(bytes, preview = %preview, "downloaded file is too small, checking content");
            }
            FetchEvent::TransferCompleted { path, bytes } => {
                info!(path = %path.display(), bytes, "download complete");
            }
            FetchEvent::Failed { category, message } => {
                warn!(category = %category, message = %message, "fetch failed");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl FetchObserver for NoopObserver {
    fn on_event(&self, _event: &FetchEvent) {}
}

/// Turns byte counts into strictly increasing whole percentages.
#[derive(Debug, Clone)]
pub(crate) struct ProgressTracker {
    total: Option<u64>,
    received: u64,
    last_percent: u8,
}

impl ProgressTracker {
    /// A zero or absent total disables percentage reporting.
    pub(crate) fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            received: 0,
            last_percent: 0,
        }
    }

    /// Records `bytes` more and returns a percentage only when it rose.
    pub(crate) fn advance(&mut self, bytes: u64) -> Option<u8> {
        self.received = self.received.saturating_add(bytes);
        let total = self.total?;
        let percent =
            (u128::from(self.received) * 100 + u128::from(total) / 2) / u128::from(total);
        let percent = u8::try_from(percent).ok().filter(|p| *p <= 100)?;
        if percent > self.last_percent {
            self.last_percent = percent;
            Some(percent)
        } else {
            None
        }
    }
}
