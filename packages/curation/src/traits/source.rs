//! Document source seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::evidence::Snapshot;

/// Fetches document content and captures content-addressed snapshots.
///
/// Implementations must be stable: the same snapshot id always yields the
/// same bytes. Lineage verification depends on this.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the document at `url` and capture it as a snapshot.
    async fn fetch(&self, url: &str) -> Result<Snapshot>;
}
