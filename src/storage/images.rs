//! Versioned cache for menu item images.
//!
//! One record per menu item, keyed by `mid`. The version the caller asks
//! for is the version the server advertised in the menu listing; a stored
//! entry whose version differs is stale and triggers a refetch. Version
//! and blob are always written together as one record, so a mismatched
//! pair can never be observed.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedImage {
    pub mid: i64,
    pub version: i64,
    /// Base64-encoded image bytes as the server delivers them.
    pub blob: String,
}

#[derive(Clone)]
pub struct ImageCache {
    data_dir: PathBuf,
}

impl ImageCache {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Return the blob for `mid` at `required_version`.
    ///
    /// Cache miss or version mismatch invokes `fetch` and stores the
    /// result under `required_version`; a version match returns the stored
    /// blob with no fetch at all. When `fetch` fails, any existing entry
    /// is left untouched and the error propagates.
    pub async fn get<F, Fut>(&self, mid: i64, required_version: i64, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let path = self.path(mid);
        let cached: Option<CachedImage> = match super::read_json(&path) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(mid, error = %e, "image cache read failed, refetching");
                None
            }
        };

        if let Some(entry) = cached {
            if entry.version == required_version {
                debug!(mid, version = required_version, "image cache hit");
                return Ok(entry.blob);
            }
            debug!(
                mid,
                stored = entry.version,
                required = required_version,
                "image cache stale"
            );
        } else {
            debug!(mid, version = required_version, "image cache miss");
        }

        let blob = fetch().await?;
        super::write_json(
            &path,
            &CachedImage {
                mid,
                version: required_version,
                blob: blob.clone(),
            },
        )?;
        Ok(blob)
    }

    /// Drop every cached image. Idempotent.
    pub fn clear(&self) -> Result<(), StorageError> {
        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.data_dir.clone(),
                    source,
                })
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("image_") && name.ends_with(".json") {
                super::remove_if_exists(&entry.path())?;
            }
        }
        Ok(())
    }

    fn path(&self, mid: i64) -> PathBuf {
        self.data_dir.join(format!("image_{mid}.json"))
    }
}
