//! Local filesystem storage backend implementation.

use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use std::sync::Arc;

/// Local filesystem configuration.
///
/// All local locations share one store rooted at `/`; `key` holds the
/// location's directory as an object path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    pub path: String,
    pub key: Option<Path>,
}

/// Build the filesystem store. Empty directories left behind by deletes are
/// removed so that overwritten tables do not keep stale partition folders.
pub(super) fn build_local_store() -> Arc<dyn ObjectStore> {
    Arc::new(LocalFileSystem::new().with_automatic_cleanup(true))
}
