//! Resilient fetching of files behind hosted-drive confirmation pages.
//!
//! The drive service answers a download request with either the raw bytes
//! or an HTML interstitial (quota warnings, virus-scan bypass, permission
//! prompts). This module works out which one it got and reacts:
//!
//! - [`endpoint`] lists alternate URL forms for the same file, in priority order
//! - [`classifier`] decides accept, follow a confirmation link once, or fail
//! - `transfer` streams accepted bytes through a temporary file into storage
//! - [`fetcher`] drives the three as a sequential state machine
//!
//! # Example
//!
//! ```no_run
//! use drivefetch_core::{DriveFetcher, FetchConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = DriveFetcher::new(&FetchConfig::with_output_dir("./videos"))?;
//! let stored = fetcher.fetch_file("1AbCdEfGhIjKlMnOpQrStUvWxYz", None).await?;
//! println!("Stored {} ({} bytes)", stored.local_file_path.display(), stored.file_size);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod constants;
pub mod endpoint;
mod error;
pub mod fetcher;
pub mod observer;
pub mod storage;
mod transfer;
mod transport;

pub use endpoint::{EndpointCandidate, EndpointKind, EndpointStrategy, EndpointTemplate};
pub use error::{ErrorCategory, FetchError, SetupError, TransportError};
pub use fetcher::DriveFetcher;
pub use observer::{
    FetchEvent, FetchObserver, NoopObserver, ProgressCallback, ProgressEvent, TracingObserver,
};
pub use storage::{DirectoryStorage, Storage};
pub use transfer::TransferResult;
pub use transport::{HttpTransport, TransportSettings};
