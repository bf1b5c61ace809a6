//! File-backed envelope store.
//!
//! Writes go through:
//! 1. Encode to a temp file with a unique PID+TID suffix
//! 2. fsync so the data reaches disk
//! 3. Optional backup of the previous envelope
//! 4. Atomic rename to the target path

use super::{EnvelopeStore, StoreOptions};
use crate::config::PathsConfig;
use crate::error::{AirliftError, Result};
use crate::models::CacheEnvelope;
use crate::serdes;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use tracing::{debug, warn};

/// Stores the encoded envelope in a single file.
#[derive(Debug, Clone)]
pub struct FileEnvelopeStore {
    path: PathBuf,
    options: StoreOptions,
}

impl FileEnvelopeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_options(path, StoreOptions::default())
    }

    pub fn with_options(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    /// Store at `PathsConfig::CACHE_FILE_NAME` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, options: StoreOptions) -> Self {
        Self::with_options(dir.as_ref().join(PathsConfig::CACHE_FILE_NAME), options)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension(PathsConfig::BACKUP_EXTENSION)
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension(format!(
            "json.{}.{}.{}",
            process::id(),
            thread_id(),
            PathsConfig::TEMP_SUFFIX
        ))
    }
}

impl EnvelopeStore for FileEnvelopeStore {
    fn load(&self) -> Result<Option<CacheEnvelope>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No envelope at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(AirliftError::Io {
                    message: format!("Failed to read {}", self.path.display()),
                    path: Some(self.path.clone()),
                    source: Some(e),
                })
            }
        };

        let envelope = serdes::decode(&bytes)?;
        debug!(
            "Loaded envelope with {} dags from {}",
            envelope.dag_datas().len(),
            self.path.display()
        );
        Ok(Some(envelope))
    }

    fn replace(&self, envelope: &CacheEnvelope) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| AirliftError::Io {
                    message: format!("Failed to create directory {}", parent.display()),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let bytes = serdes::encode(envelope)?;
        let temp_path = self.temp_path();

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| AirliftError::Io {
                    message: format!("Failed to create temp file {}", temp_path.display()),
                    path: Some(temp_path.clone()),
                    source: Some(e),
                })?;

            file.write_all(&bytes).map_err(|e| AirliftError::Io {
                message: format!("Failed to write temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;

            file.sync_all().map_err(|e| AirliftError::Io {
                message: format!("Failed to sync temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;
        }

        if self.options.keep_backup && self.path.exists() {
            let backup_path = self.backup_path();
            if let Err(e) = fs::copy(&self.path, &backup_path) {
                // Not fatal: the new envelope is still written.
                warn!("Failed to create backup {}: {}", backup_path.display(), e);
            } else {
                debug!("Created backup: {}", backup_path.display());
            }
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(AirliftError::Io {
                message: format!(
                    "Failed to rename {} to {}",
                    temp_path.display(),
                    self.path.display()
                ),
                path: Some(self.path.clone()),
                source: Some(e),
            });
        }

        debug!("Atomically wrote envelope to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AirliftError::io_with_path(e, &self.path)),
        }
    }
}

/// Numeric identifier for the current thread.
fn thread_id() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    thread::current().id().hash(&mut hasher);
    hasher.finish()
}
