//! JSON file storage.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

use crate::error::CompanionError;

/// A JSON document on disk.
///
/// Writes go to a uniquely named sibling temporary file first and are
/// renamed into place, so a crash never leaves a half-written document and
/// concurrent saves never share a temporary file.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    /// Creates a handle for `path`. Nothing is touched on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the document. Returns `Ok(None)` if the file does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CompanionError::Persistence`] if the file cannot be read
    /// or does not decode as `T`.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, CompanionError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(CompanionError::Persistence(format!(
                    "failed to read {}: {err}",
                    self.path.display()
                )));
            }
        };
        let value = serde_json::from_str(&contents).map_err(|err| {
            CompanionError::Persistence(format!("failed to parse {}: {err}", self.path.display()))
        })?;
        Ok(Some(value))
    }

    /// Encodes and writes the document, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`CompanionError::Persistence`] on encode or I/O failure.
    pub async fn save<T: Serialize>(&self, value: &T) -> Result<(), CompanionError> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|err| CompanionError::Persistence(format!("failed to encode: {err}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|err| {
                CompanionError::Persistence(format!(
                    "failed to create {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, json).await.map_err(|err| {
            CompanionError::Persistence(format!("failed to write {}: {err}", tmp.display()))
        })?;
        if let Err(err) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(CompanionError::Persistence(format!(
                "failed to replace {}: {err}",
                self.path.display()
            )));
        }

        tracing::debug!(path = %self.path.display(), "json document saved");
        Ok(())
    }
}
