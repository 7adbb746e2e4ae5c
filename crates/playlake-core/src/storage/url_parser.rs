//! URL parsing for storage backends.
//!
//! Extracts backend configuration from S3 URLs and local filesystem paths.
//! Only the URL itself is consulted; credentials and other settings come
//! from the explicit storage options handed to the provider.

use object_store::path::Path;
use regex::{Captures, Regex};
use snafu::prelude::*;
use std::path::{Component, PathBuf};
use std::sync::LazyLock;

use crate::error::{InvalidUrlSnafu, IoSnafu, StorageError};

use super::{LocalConfig, S3Config};

// URL patterns for the supported backends
const S3_PATH: &str =
    r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";
const S3_VIRTUAL: &str =
    r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com(/(?P<key>.+))?$";
const S3_URL: &str = r"^[sS]3[aAnN]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.*))?$";
const S3_ENDPOINT_URL: &str = r"^[sS]3[aA]?::(?<protocol>https?)://(?P<endpoint>[^:/]+):(?<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$";

const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^(?P<path>/.*)$";
const RELATIVE_PATH: &str = r"^(?P<relative>[^:]+)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    S3,
    Local,
}

static MATCHERS: LazyLock<Vec<(Backend, Regex)>> = LazyLock::new(|| {
    [
        (Backend::S3, S3_PATH),
        (Backend::S3, S3_VIRTUAL),
        (Backend::S3, S3_ENDPOINT_URL),
        (Backend::S3, S3_URL),
        (Backend::Local, FILE_URI),
        (Backend::Local, FILE_URL),
        (Backend::Local, FILE_PATH),
        (Backend::Local, RELATIVE_PATH),
    ]
    .into_iter()
    .map(|(backend, pattern)| (backend, Regex::new(pattern).expect("Invalid regex pattern")))
    .collect()
});

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    ///
    /// `s3://`, `s3a://` and `s3n://` all address S3. Plain paths, relative
    /// ones included, address the local filesystem.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        let found = MATCHERS
            .iter()
            .find_map(|(backend, regex)| regex.captures(url).map(|caps| (*backend, caps)));

        match found {
            Some((Backend::S3, caps)) => Self::parse_s3(url, &caps),
            Some((Backend::Local, caps)) => Self::parse_local(&caps),
            None => InvalidUrlSnafu {
                url: url.to_string(),
            }
            .fail(),
        }
    }

    fn parse_s3(url: &str, matches: &Captures) -> Result<Self, StorageError> {
        let bucket = matches
            .name("bucket")
            .map(|m| m.as_str().to_string())
            .context(InvalidUrlSnafu { url })?;

        let region = matches.name("region").map(|m| m.as_str().to_string());

        let endpoint = matches.name("endpoint").map(|endpoint| {
            let port = matches
                .name("port")
                .and_then(|p| p.as_str().parse::<u16>().ok())
                .unwrap_or(443);
            let protocol = matches
                .name("protocol")
                .map(|p| p.as_str())
                .unwrap_or("https");
            format!("{protocol}://{}:{port}", endpoint.as_str())
        });

        let key = match matches.name("key") {
            Some(key) => {
                let key = key.as_str().trim_matches('/');
                if key.is_empty() {
                    None
                } else {
                    Some(Path::parse(key).map_err(|source| StorageError::InvalidPath {
                        path: key.to_string(),
                        source,
                    })?)
                }
            }
            None => None,
        };

        Ok(BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket,
            key,
        }))
    }

    fn parse_local(matches: &Captures) -> Result<Self, StorageError> {
        let path = match (matches.name("path"), matches.name("relative")) {
            (Some(path), _) => {
                let path = path.as_str();
                if path.starts_with('/') {
                    PathBuf::from(path)
                } else {
                    PathBuf::from(format!("/{path}"))
                }
            }
            (None, Some(relative)) => std::env::current_dir()
                .context(IoSnafu)?
                .join(relative.as_str()),
            (None, None) => PathBuf::from("/"),
        };

        let path = normalize(&path);
        let text = path.to_string_lossy().into_owned();
        let relative = text.trim_start_matches('/');
        let key = if relative.is_empty() {
            None
        } else {
            Some(Path::parse(relative).map_err(|source| StorageError::InvalidPath {
                path: relative.to_string(),
                source,
            })?)
        };

        Ok(BackendConfig::Local(LocalConfig { path: text, key }))
    }

    /// Key prefix every relative path is qualified with.
    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Local(local) => local.key.as_ref(),
        }
    }

    /// Identity of the underlying object store, shared by every prefix in it.
    pub(crate) fn store_id(&self) -> String {
        match self {
            BackendConfig::S3(s3) => format!(
                "s3://{}@{}",
                s3.bucket,
                s3.endpoint.as_deref().unwrap_or("aws")
            ),
            BackendConfig::Local(_) => "file://".to_string(),
        }
    }

    /// Canonical URL of this location.
    pub fn canonical_url(&self) -> String {
        match self {
            BackendConfig::S3(s3) => match &s3.key {
                Some(key) => format!("s3://{}/{key}", s3.bucket),
                None => format!("s3://{}", s3.bucket),
            },
            BackendConfig::Local(local) => format!("file://{}", local.path),
        }
    }
}

/// Remove `.` components and resolve `..` lexically.
fn normalize(path: &std::path::Path) -> PathBuf {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    out
}
