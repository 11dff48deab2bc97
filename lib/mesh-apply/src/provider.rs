//! Provider seam between the applier and the infrastructure it drives

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::resource::{Resource, ResourceId};

/// Idempotent create-or-update access to one infrastructure backend
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str {
        "unnamed"
    }

    /// Fingerprint of the stored resource, `None` when it does not exist
    async fn fingerprint(&self, id: &ResourceId) -> Result<Option<String>, ProviderError>;

    /// Create the resource, or replace it with the given desired state
    async fn upsert(&self, resource: &Resource) -> Result<(), ProviderError>;
}
