//! Object storage abstraction.
//!
//! Provides a unified interface over Amazon S3 and the local filesystem.
//! Callers address objects with plain `/`-separated keys relative to the
//! location the provider was opened on; the provider adds the backend's key
//! prefix. Key segments are stored exactly as given.

mod local;
mod s3;
mod url_parser;

pub use local::LocalConfig;
pub use s3::S3Config;
pub use url_parser::BackendConfig;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::emit;
use crate::error::{InvalidPathSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{RequestStatus, StorageOperation, StorageRequest};

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider bound to one location (bucket plus key prefix, or a
/// local directory).
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with storage options.
    pub fn for_url_with_options(
        url: &str,
        options: &HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let config = BackendConfig::parse_url(url)?;
        let object_store = build_store(&config, options)?;
        Ok(Self::with_shared_store(config, object_store))
    }

    /// Create a storage provider on top of an existing store connection.
    ///
    /// Providers for different prefixes of the same bucket share one client.
    pub(crate) fn with_shared_store(
        config: BackendConfig,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        let canonical_url = config.canonical_url();
        Self {
            config,
            object_store,
            canonical_url,
        }
    }

    /// Canonical URL of the location this provider is bound to.
    pub fn url(&self) -> &str {
        &self.canonical_url
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Convert a relative key into a fully qualified object path.
    ///
    /// Keys are taken as is on both backends: S3 uses the path text as the
    /// object key and the local filesystem uses each segment as the file
    /// name. Callers escape anything a segment must not contain.
    pub fn object_path(&self, key: &str) -> Result<Path, StorageError> {
        let key = key.trim_matches('/');
        let relative = Path::parse(key).context(InvalidPathSnafu { path: key })?;
        Ok(self.qualify_path(&relative))
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path(&self, path: &Path) -> Path {
        match self.config.key() {
            Some(prefix) => prefix.parts().chain(path.parts()).collect(),
            None => path.clone(),
        }
    }

    /// Convert a listed object location back into a relative key.
    ///
    /// Returns `None` for locations outside this provider's prefix.
    fn relative_key(&self, location: &Path) -> Option<String> {
        let parts: Vec<_> = match self.config.key() {
            Some(prefix) => location.prefix_match(prefix)?.collect(),
            None => location.parts().collect(),
        };

        let segments: Vec<&str> = parts.iter().map(|part| part.as_ref()).collect();
        Some(segments.join("/"))
    }

    /// List every object below this location, recursively.
    ///
    /// Returns relative keys in lexicographic order. A location that does
    /// not exist lists as empty.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        self.list_with_prefix("").await
    }

    /// List every object below `prefix` (relative to this location).
    ///
    /// Returns keys relative to this location, not to `prefix`, sorted.
    pub async fn list_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self
            .list_locations(prefix)
            .await?
            .iter()
            .filter_map(|location| self.relative_key(location))
            .collect();
        keys.sort();

        debug!(
            url = %self.canonical_url,
            prefix,
            count = keys.len(),
            "Listed objects"
        );
        Ok(keys)
    }

    /// List the stored locations below `prefix`, unsorted.
    async fn list_locations(&self, prefix: &str) -> Result<Vec<Path>, StorageError> {
        let full_prefix = self.object_path(prefix)?;
        let start = Instant::now();

        let result: Result<Vec<Path>, object_store::Error> = self
            .object_store
            .list(Some(&full_prefix))
            .filter_map(|meta| async move {
                match meta {
                    Ok(meta) => Some(Ok(meta.location)),
                    Err(object_store::Error::NotFound { .. }) => None,
                    Err(err) => Some(Err(err)),
                }
            })
            .try_collect()
            .await;

        emit!(StorageRequest {
            operation: StorageOperation::List,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)
    }

    /// Get the contents of an object.
    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.object_path(key)?;
        let start = Instant::now();

        let result = match self.object_store.get(&path).await {
            Ok(response) => response.bytes().await,
            Err(err) => Err(err),
        };

        emit!(StorageRequest {
            operation: StorageOperation::Get,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)
    }

    /// Put a payload to a key.
    pub async fn put_payload(&self, key: &str, payload: PutPayload) -> Result<(), StorageError> {
        self.put_payload_with_opts(key, payload, PutOptions::default())
            .await
    }

    /// Put a Parquet file to a key with the correct content type.
    ///
    /// Sets `Content-Type: application/vnd.apache.parquet` on S3.
    /// Local filesystem doesn't support attributes, so they are skipped.
    pub async fn put_parquet(&self, key: &str, payload: PutPayload) -> Result<(), StorageError> {
        if matches!(self.config, BackendConfig::Local(_)) {
            return self.put_payload(key, payload).await;
        }

        let opts = PutOptions {
            attributes: Attributes::from_iter([(
                Attribute::ContentType,
                AttributeValue::from("application/vnd.apache.parquet"),
            )]),
            ..Default::default()
        };
        self.put_payload_with_opts(key, payload, opts).await
    }

    async fn put_payload_with_opts(
        &self,
        key: &str,
        payload: PutPayload,
        opts: PutOptions,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let start = Instant::now();
        let result = self.object_store.put_opts(&path, payload, opts).await;

        emit!(StorageRequest {
            operation: StorageOperation::Put,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Delete every object below `prefix`. Returns the number of objects removed.
    ///
    /// Listed locations are deleted as returned by the store, so no key is
    /// re-encoded on the way. Objects that vanish concurrently are skipped.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64, StorageError> {
        let locations = self.list_locations(prefix).await?;
        if locations.is_empty() {
            return Ok(0);
        }

        let start = Instant::now();
        let locations = futures::stream::iter(locations.into_iter().map(Ok)).boxed();
        let result: Result<u64, object_store::Error> = self
            .object_store
            .delete_stream(locations)
            .filter_map(|deleted| async move {
                match deleted {
                    Ok(_) => Some(Ok(1u64)),
                    Err(object_store::Error::NotFound { .. }) => None,
                    Err(err) => Some(Err(err)),
                }
            })
            .try_fold(0u64, |count, n| async move { Ok(count + n) })
            .await;

        emit!(StorageRequest {
            operation: StorageOperation::Delete,
            status: RequestStatus::from_result(&result),
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)
    }
}

/// Build the object store client for a backend.
pub(crate) fn build_store(
    config: &BackendConfig,
    options: &HashMap<String, String>,
) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config {
        BackendConfig::S3(s3_config) => s3::build_s3_store(s3_config, options),
        BackendConfig::Local(_) => Ok(local::build_local_store()),
    }
}
