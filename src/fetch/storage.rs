//! Storage collaborators: where files live and how final names are chosen.
//!
//! The fetch loop only needs a base directory and a way to turn a
//! candidate filename into one that does not overwrite an existing file.
//! [`DirectoryStorage`] provides both for a plain directory.

use std::path::{Component, Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of the random suffix in temporary file names.
const TEMP_SUFFIX_LEN: usize = 9;

/// Supplies the storage directory and collision-free final names.
pub trait Storage: Send + Sync {
    /// Directory that holds temporary and final files.
    fn base_dir(&self) -> &Path;

    /// Returns a filename, derived from `candidate`, that does not name an
    /// existing file in [`base_dir`](Self::base_dir).
    fn make_unique(&self, candidate: &str) -> String;
}

/// [`Storage`] backed by a single directory, de-duplicating with numeric
/// suffixes (`name.mp4`, `name_1.mp4`, `name_2.mp4`, ...).
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    dir: PathBuf,
}

impl DirectoryStorage {
    /// Creates storage rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Storage for DirectoryStorage {
    fn base_dir(&self) -> &Path {
        &self.dir
    }

    fn make_unique(&self, candidate: &str) -> String {
        let path = resolve_unique_path(&self.dir, candidate);
        path.file_name()
            .map_or_else(|| sanitize_filename(candidate), |n| n.to_string_lossy().into_owned())
    }
}

/// Canonical stored filename for an identifier.
#[must_use]
pub fn canonical_filename(identifier: &str) -> String {
    format!("gdrive_{}.mp4", sanitize_filename(identifier))
}

/// Temporary filename for one fetch: identifier, millisecond timestamp and
/// a random alphanumeric suffix.
#[must_use]
pub fn temp_filename(identifier: &str) -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMP_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("temp_{}_{millis}_{suffix}", sanitize_filename(identifier))
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

/// Resolves a unique file path, adding a numeric suffix if the file exists.
pub(crate) fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let filename = sanitize_filename(filename);
    let base_path = dir.join(&filename);

    if !base_path.exists() {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    for i in 1..1000 {
        let new_path = dir.join(format!("{stem}_{i}{ext}"));
        if !new_path.exists() {
            return new_path;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("{stem}_{timestamp}{ext}"))
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
