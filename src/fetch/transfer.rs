//! Streaming an accepted response into storage.
//!
//! Bytes go to a uniquely named temporary file first. Only after the
//! stream completes and the size check passes is the file linked under its
//! final name, which never replaces an existing file. The temporary file is
//! deleted on every path before the fetch returns.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::classifier::{classify_undersized_payload, declared_length};
use super::constants::{PREVIEW_CHARS, PROGRESS_DISPLAY_NAME, STORED_MIME_TYPE};
use super::error::FetchError;
use super::observer::{FetchEvent, FetchObserver, ProgressCallback, ProgressEvent, ProgressTracker};
use super::storage::{Storage, canonical_filename, temp_filename};

/// Names tried before giving up on committing the file.
const COMMIT_ATTEMPTS: usize = 16;

/// Terminal success of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    /// Final filename after collision resolution.
    pub filename: String,
    /// Canonical filename derived from the identifier.
    pub original_filename: String,
    /// Absolute or storage-relative path of the stored file.
    pub local_file_path: PathBuf,
    /// MIME type recorded for the file.
    pub mime_type: String,
    /// Size of the stored file in bytes.
    pub file_size: u64,
}

/// Everything the transfer stage needs besides the response.
pub(crate) struct TransferContext<'a> {
    pub(crate) identifier: &'a str,
    pub(crate) storage: &'a dyn Storage,
    pub(crate) min_file_size: u64,
    pub(crate) progress: Option<ProgressCallback<'a>>,
    pub(crate) cancel: Option<&'a CancellationToken>,
    pub(crate) observer: &'a dyn FetchObserver,
}

/// Temporary file that deletes itself when dropped.
///
/// Every completed path calls [`remove`](Self::remove); `Drop` covers a
/// dropped fetch future.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    async fn remove(mut self) {
        self.armed = false;
        if let Err(e) = tokio::fs::remove_file(&self.path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!(path = %self.path.display(), error = %e, "failed to remove temporary file");
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Streams `response` to storage and validates the result.
#[instrument(skip_all, fields(identifier = %ctx.identifier))]
pub(crate) async fn transfer(
    response: reqwest::Response,
    ctx: &TransferContext<'_>,
) -> Result<TransferResult, FetchError> {
    let base_dir = ctx.storage.base_dir();
    tokio::fs::create_dir_all(base_dir)
        .await
        .map_err(|e| FetchError::transfer_io(base_dir, "cannot create storage directory", e))?;

    let temp = TempFile::new(base_dir.join(temp_filename(ctx.identifier)));
    debug!(path = %temp.path.display(), "streaming to temporary file");

    let written = write_stream(response, &temp.path, ctx).await;
    match written {
        Ok(bytes) => debug!(bytes, "stream complete"),
        Err(error) => {
            temp.remove().await;
            return Err(error);
        }
    }

    let file_size = match tokio::fs::metadata(&temp.path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            let error = FetchError::transfer_io(&temp.path, "download failed: file not created", e);
            temp.remove().await;
            return Err(error);
        }
    };

    if file_size < ctx.min_file_size {
        let content = match tokio::fs::read(&temp.path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                let error = FetchError::transfer_io(&temp.path, "cannot read downloaded file", e);
                temp.remove().await;
                return Err(error);
            }
        };
        temp.remove().await;
        ctx.observer.on_event(&FetchEvent::UndersizedPayload {
            bytes: file_size,
            preview: content.chars().take(PREVIEW_CHARS).collect(),
        });
        return Err(classify_undersized_payload(ctx.identifier, &content));
    }

    let original_filename = canonical_filename(ctx.identifier);
    let committed = commit_no_clobber(&temp.path, &original_filename, ctx.storage).await;
    temp.remove().await;
    let (filename, final_path) = committed?;

    ctx.observer.on_event(&FetchEvent::TransferCompleted {
        path: final_path.clone(),
        bytes: file_size,
    });

    Ok(TransferResult {
        filename,
        original_filename,
        local_file_path: final_path,
        mime_type: STORED_MIME_TYPE.to_string(),
        file_size,
    })
}

/// Links `temp` into storage under a fresh unique name without ever
/// replacing an existing file. A name taken between `make_unique` and the
/// link is retried with a new one.
async fn commit_no_clobber(
    temp: &Path,
    candidate: &str,
    storage: &dyn Storage,
) -> Result<(String, PathBuf), FetchError> {
    let base_dir = storage.base_dir();
    let mut last_path = base_dir.join(candidate);
    for _ in 0..COMMIT_ATTEMPTS {
        let filename = storage.make_unique(candidate);
        let final_path = base_dir.join(&filename);
        match tokio::fs::hard_link(temp, &final_path).await {
            Ok(()) => return Ok((filename, final_path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(path = %final_path.display(), "final name taken, choosing another");
                last_path = final_path;
            }
            Err(e) => {
                return Err(FetchError::transfer_io(
                    &final_path,
                    "cannot move file into place",
                    e,
                ));
            }
        }
    }
    Err(FetchError::transfer_io_message(
        last_path,
        "cannot move file into place: no free filename",
    ))
}

/// Writes the body to `path`, reporting progress. The file handle is
/// closed when this returns.
async fn write_stream(
    response: reqwest::Response,
    path: &Path,
    ctx: &TransferContext<'_>,
) -> Result<u64, FetchError> {
    let file = File::create(path)
        .await
        .map_err(|e| FetchError::transfer_io(path, "cannot create temporary file", e))?;
    let mut writer = BufWriter::new(file);
    let mut tracker = ProgressTracker::new(declared_length(&response));
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    loop {
        let next = match ctx.cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => {
                    return Err(FetchError::transfer_io_message(path, "download cancelled"));
                }
                next = stream.next() => next,
            },
            None => stream.next().await,
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk
            .map_err(|e| FetchError::transfer_io(path, "error downloading file", e.without_url()))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::transfer_io(path, "error writing file", e))?;
        bytes_written += chunk.len() as u64;

        if let Some(percent) = tracker.advance(chunk.len() as u64)
            && let Some(callback) = ctx.progress
        {
            callback(&ProgressEvent {
                identifier: ctx.identifier.to_string(),
                display_name: PROGRESS_DISPLAY_NAME.to_string(),
                percent,
            });
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::transfer_io(path, "error writing file", e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_temp_file_remove_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("temp_x");
        std::fs::write(&path, b"partial").unwrap();
        TempFile::new(path.clone()).remove().await;
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_file_drop_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("temp_y");
        std::fs::write(&path, b"partial").unwrap();
        drop(TempFile::new(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_of_missing_file_is_quiet() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("never-created");
        tokio_test::block_on(TempFile::new(path.clone()).remove());
        assert!(!path.exists());
    }

    #[test]
    fn test_transfer_result_serializes_camel_case() {
        let result = TransferResult {
            filename: "gdrive_a_1.mp4".to_string(),
            original_filename: "gdrive_a.mp4".to_string(),
            local_file_path: PathBuf::from("/videos/gdrive_a_1.mp4"),
            mime_type: "video/mp4".to_string(),
            file_size: 4096,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["originalFilename"], "gdrive_a.mp4");
        assert_eq!(json["localFilePath"], "/videos/gdrive_a_1.mp4");
        assert_eq!(json["fileSize"], 4096);
    }
}
