//! Snapshot cache errors

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from opening, reading or writing the snapshot cache
///
/// None of these are fatal to the store: the cache only backs offline
/// reads, so callers log them and carry on without it.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The cache directory could not be created
    #[error("Cannot create cache directory '{path}': {source}")]
    CacheDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied for cache directory '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A cached row no longer decodes as a task
    #[error("Cached task '{id}' is corrupted: {details}")]
    CorruptRecord { id: String, details: String },

    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A task could not be encoded for the cache
    #[error("Failed to encode task for cache: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StorageError {
    /// Classify a failure to create the cache directory
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        if error.kind() == io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied {
                path,
                source: error,
            }
        } else {
            StorageError::CacheDirectory {
                path,
                source: error,
            }
        }
    }

    /// Whether deleting the cache file clears the problem
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::CorruptRecord { .. } | StorageError::Database(_)
        )
    }

    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::PermissionDenied { .. } | StorageError::CacheDirectory { .. } => {
                Some("Point data_dir at a writable directory, or set cache_enabled = false.")
            }
            StorageError::CorruptRecord { .. } | StorageError::Database(_) => {
                Some("Delete tasks.db in the data directory; it is rebuilt on the next sync.")
            }
            StorageError::Encode(_) => None,
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
