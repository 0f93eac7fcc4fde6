//! The fetch loop: endpoints, classification, one-shot confirmation, transfer.
//!
//! Resolution of a byte stream is an explicit state machine:
//!
//! ```text
//! Try(i) --classify--> Accepted            -> transfer
//!                   |-> Confirm(url)        -> ConfirmOnce(i, url)
//!                   |-> Fatal(err)          -> stop
//!                   '-> NextCandidate(err)  -> Advance(i, err)
//! ConfirmOnce(i)    --accepted--> transfer, otherwise Advance(i, err)
//! Advance(i, err)   -> Try(i + 1), or err is terminal when no candidate remains
//! ```
//!
//! Candidates are tried strictly in order, never concurrently.

use std::future::Future;
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;

use super::classifier::{
    Classification, ClassifyContext, HeadVerdict, classify_head, classify_response,
    declared_length, header_str,
};
use super::endpoint::{EndpointCandidate, EndpointStrategy};
use super::error::{ErrorCategory, FetchError, SetupError, TransportError};
use super::observer::{FetchEvent, FetchObserver, ProgressCallback, TracingObserver};
use super::storage::{DirectoryStorage, Storage};
use super::transfer::{TransferContext, TransferResult, transfer};
use super::transport::HttpTransport;
use crate::config::FetchConfig;

/// Fetches files through the endpoint chain and stores them.
///
/// Create once and reuse; the underlying HTTP client pools connections.
/// Concurrent fetches share no mutable state.
#[derive(Clone)]
pub struct DriveFetcher {
    transport: HttpTransport,
    strategy: EndpointStrategy,
    storage: Arc<dyn Storage>,
    observer: Arc<dyn FetchObserver>,
    confirm_base: Url,
    accept_length_threshold: u64,
    min_file_size: u64,
}

impl std::fmt::Debug for DriveFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveFetcher")
            .field("strategy", &self.strategy)
            .field("storage_dir", &self.storage.base_dir())
            .field("confirm_base", &self.confirm_base.as_str())
            .field("accept_length_threshold", &self.accept_length_threshold)
            .field("min_file_size", &self.min_file_size)
            .finish_non_exhaustive()
    }
}

/// States of the stream-resolution loop.
enum Step {
    Try(usize),
    Accepted { index: usize, response: reqwest::Response },
    ConfirmOnce { index: usize, url: String },
    Advance { index: usize, failure: FetchError },
}

/// Why a request produced no response.
enum RequestFailure {
    Cancelled,
    Transport(TransportError),
}

impl DriveFetcher {
    /// Builds a fetcher with the default endpoint chain, directory storage
    /// at `config.output_dir` and a [`TracingObserver`].
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] if the confirmation base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(config: &FetchConfig) -> Result<Self, SetupError> {
        let confirm_base =
            Url::parse(&config.confirm_base_url).map_err(|_| SetupError::InvalidBaseUrl {
                url: config.confirm_base_url.clone(),
            })?;
        let transport = HttpTransport::new(&config.transport_settings())?;
        Ok(Self {
            transport,
            strategy: config.endpoint_strategy(),
            storage: Arc::new(DirectoryStorage::new(config.output_dir.clone())),
            observer: Arc::new(TracingObserver),
            confirm_base,
            accept_length_threshold: config.accept_length_threshold,
            min_file_size: config.min_file_size,
        })
    }

    /// Replaces the endpoint chain.
    #[must_use]
    pub fn with_strategy(mut self, strategy: EndpointStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replaces the storage collaborator.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    /// Replaces the diagnostic observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Fetches `identifier` and stores it, reporting progress if asked.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`]; [`FetchError::category`] names the failure
    /// class and `Display` the actionable message.
    pub async fn fetch_file(
        &self,
        identifier: &str,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<TransferResult, FetchError> {
        self.run(identifier, on_progress, None).await
    }

    /// Like [`fetch_file`](Self::fetch_file), stopping when `cancel` fires.
    ///
    /// Cancellation removes any temporary file and is reported as a
    /// [`FetchError::TransferIo`].
    ///
    /// # Errors
    ///
    /// Same as [`fetch_file`](Self::fetch_file).
    pub async fn fetch_file_with_cancel(
        &self,
        identifier: &str,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: &CancellationToken,
    ) -> Result<TransferResult, FetchError> {
        self.run(identifier, on_progress, Some(cancel)).await
    }

    #[instrument(skip(self, on_progress, cancel), fields(identifier = %identifier))]
    async fn run(
        &self,
        identifier: &str,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> Result<TransferResult, FetchError> {
        let result = async {
            let (index, response) = self.resolve_stream(identifier, cancel).await?;
            self.observer
                .on_event(&FetchEvent::StreamAccepted { index });
            let ctx = TransferContext {
                identifier,
                storage: self.storage.as_ref(),
                min_file_size: self.min_file_size,
                progress: on_progress,
                cancel,
                observer: self.observer.as_ref(),
            };
            transfer(response, &ctx).await
        }
        .await;

        if let Err(error) = &result {
            self.observer.on_event(&FetchEvent::Failed {
                category: error.category(),
                message: error.to_string(),
            });
        }
        result
    }

    /// Walks the candidate chain until a response is accepted or the
    /// chain ends. Returns the index of the accepted candidate.
    async fn resolve_stream(
        &self,
        identifier: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(usize, reqwest::Response), FetchError> {
        let candidates = self.strategy.candidates(identifier);
        if candidates.is_empty() {
            return Err(FetchError::exhausted(identifier, 0));
        }
        let ctx = ClassifyContext {
            identifier,
            confirm_base: &self.confirm_base,
            accept_length_threshold: self.accept_length_threshold,
        };

        let mut step = Step::Try(0);
        loop {
            step = match step {
                Step::Try(index) => {
                    let Some(candidate) = candidates.get(index) else {
                        return Err(FetchError::exhausted(identifier, candidates.len()));
                    };
                    self.try_candidate(candidate, &ctx, cancel).await?
                }
                Step::Accepted { index, response } => return Ok((index, response)),
                Step::ConfirmOnce { index, url } => {
                    self.observer
                        .on_event(&FetchEvent::ConfirmationFound { url: url.clone() });
                    match self.request(&url, cancel).await {
                        Ok(response) if self.is_content(&response) => {
                            Step::Accepted { index, response }
                        }
                        Ok(response) => Step::Advance {
                            index,
                            failure: FetchError::unexpected(format!(
                                "confirmation link did not yield file content (HTTP {}, {})",
                                response.status().as_u16(),
                                header_str(&response, CONTENT_TYPE)
                            )),
                        },
                        Err(RequestFailure::Cancelled) => return Err(self.cancelled()),
                        Err(RequestFailure::Transport(e)) => Step::Advance {
                            index,
                            failure: transport_failure(identifier, &e),
                        },
                    }
                }
                Step::Advance { index, failure } => {
                    let reason = if failure.category() == ErrorCategory::AllEndpointsExhausted {
                        "response was neither file content nor an HTML page".to_string()
                    } else {
                        failure.to_string()
                    };
                    self.observer
                        .on_event(&FetchEvent::CandidateFailed { index, reason });
                    if index + 1 < candidates.len() {
                        Step::Try(index + 1)
                    } else {
                        return Err(finalize(identifier, failure, candidates.len()));
                    }
                }
            };
        }
    }

    /// Requests and classifies one candidate. `Ok` carries the next step;
    /// `Err` ends the fetch.
    async fn try_candidate(
        &self,
        candidate: &EndpointCandidate,
        ctx: &ClassifyContext<'_>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Step, FetchError> {
        let index = candidate.index;
        self.observer.on_event(&FetchEvent::CandidateStarted {
            index,
            kind: candidate.kind,
            url: candidate.display_url(),
        });

        let response = match self.request(&candidate.url, cancel).await {
            Ok(response) => response,
            Err(RequestFailure::Cancelled) => return Err(self.cancelled()),
            Err(RequestFailure::Transport(e)) => {
                return Ok(Step::Advance {
                    index,
                    failure: transport_failure(ctx.identifier, &e),
                });
            }
        };

        let Some(classification) = cancellable(cancel, classify_response(response, ctx)).await
        else {
            return Err(self.cancelled());
        };

        match classification {
            Classification::Accepted(response) => Ok(Step::Accepted { index, response }),
            Classification::Confirm(url) => Ok(Step::ConfirmOnce { index, url }),
            Classification::Fatal(error) => Err(error),
            Classification::NextCandidate(failure) => Ok(Step::Advance { index, failure }),
        }
    }

    async fn request(
        &self,
        url: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<reqwest::Response, RequestFailure> {
        let response = cancellable(cancel, self.transport.get(url))
            .await
            .ok_or(RequestFailure::Cancelled)?
            .map_err(RequestFailure::Transport)?;
        self.observer.on_event(&FetchEvent::ResponseReceived {
            status: response.status().as_u16(),
            content_type: header_str(&response, CONTENT_TYPE).to_string(),
            content_length: declared_length(&response),
        });
        Ok(response)
    }

    /// Header-only acceptance check used for confirmation follow-ups,
    /// whose bodies are never parsed.
    fn is_content(&self, response: &reqwest::Response) -> bool {
        classify_head(
            response.status().as_u16(),
            header_str(response, CONTENT_TYPE),
            declared_length(response),
            self.accept_length_threshold,
        ) == HeadVerdict::Accept
    }

    fn cancelled(&self) -> FetchError {
        FetchError::transfer_io_message(self.storage.base_dir(), "download cancelled")
    }
}

/// Runs `fut` unless `cancel` fires first.
async fn cancellable<F: Future>(cancel: Option<&CancellationToken>, fut: F) -> Option<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => None,
            output = fut => Some(output),
        },
        None => Some(fut.await),
    }
}

fn transport_failure(identifier: &str, error: &TransportError) -> FetchError {
    FetchError::unexpected(format!("request for {identifier} failed: {error}"))
}

/// Fills in the attempt count when the last failure was an exhausted chain.
fn finalize(identifier: &str, failure: FetchError, attempts: usize) -> FetchError {
    if failure.category() == ErrorCategory::AllEndpointsExhausted {
        FetchError::exhausted(identifier, attempts)
    } else {
        failure
    }
}
