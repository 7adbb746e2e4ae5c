//! Amazon S3 storage backend implementation.

use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{S3ConfigSnafu, StorageError};

/// Amazon S3 configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
    pub key: Option<Path>,
}

/// Build an S3 client for the bucket in `config`.
///
/// The builder starts empty rather than from the process environment, so
/// credentials reach the client only through `options`. Option keys are the
/// `object_store` S3 keys (`aws_access_key_id`, `aws_region`, ...), matched
/// case-insensitively. Unknown keys are logged and skipped.
pub(super) fn build_s3_store(
    config: &S3Config,
    options: &HashMap<String, String>,
) -> Result<Arc<dyn ObjectStore>, StorageError> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&config.bucket)
        .with_retry(RetryConfig::default());

    if let Some(region) = &config.region {
        builder = builder.with_region(region);
    }

    if let Some(endpoint) = &config.endpoint {
        debug!("Using custom S3 endpoint {endpoint}");
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }

    let mut keys: Vec<_> = options.keys().collect();
    keys.sort();
    for key in keys {
        match AmazonS3ConfigKey::from_str(&key.to_ascii_lowercase()) {
            Ok(config_key) => builder = builder.with_config(config_key, &options[key]),
            Err(_) => warn!(option = %key, "Ignoring unknown S3 storage option"),
        }
    }

    let store = builder.build().context(S3ConfigSnafu)?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> S3Config {
        S3Config {
            endpoint: None,
            region: Some("us-west-2".to_string()),
            bucket: "udacity-dend".to_string(),
            key: None,
        }
    }

    #[test]
    fn test_build_with_explicit_credentials() {
        let options = HashMap::from([
            ("AWS_ACCESS_KEY_ID".to_string(), "AKIAEXAMPLE".to_string()),
            ("aws_secret_access_key".to_string(), "secret".to_string()),
        ]);
        assert!(build_s3_store(&config(), &options).is_ok());
    }

    #[test]
    fn test_unknown_options_are_skipped() {
        let options = HashMap::from([("not_an_s3_option".to_string(), "x".to_string())]);
        assert!(build_s3_store(&config(), &options).is_ok());
    }

    #[test]
    fn test_local_endpoint_allows_http() {
        let mut config = config();
        config.endpoint = Some("http://localhost:9000".to_string());
        assert!(build_s3_store(&config, &HashMap::new()).is_ok());
    }
}
