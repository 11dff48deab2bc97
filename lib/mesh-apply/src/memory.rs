//! In-memory resource provider for dry runs and tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::ResourceProvider;
use crate::resource::{Resource, ResourceId, ResourceKind};

/// Stored state of one resource
#[derive(Clone, Debug)]
pub struct StoredResource {
    pub fingerprint: String,
    pub body: Value,
}

/// InMemoryProvider keeps resources in a shared map
///
/// Clones share the same store, so a dry run can be inspected after the
/// applier is done with it.
#[derive(Clone, Default)]
pub struct InMemoryProvider {
    resources: Arc<RwLock<HashMap<ResourceId, StoredResource>>>,
    pending_failures: Arc<AtomicU32>,
    rejected: Arc<RwLock<Option<ResourceKind>>>,
    writes: Arc<AtomicU32>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` calls with a transient error
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Permanently reject writes of one resource kind
    pub async fn reject(&self, kind: ResourceKind) {
        *self.rejected.write().await = Some(kind);
    }

    pub async fn get(&self, id: &ResourceId) -> Option<StoredResource> {
        self.resources.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.resources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty()
    }

    /// Number of successful writes since creation
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Result<(), ProviderError> {
        let consumed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(ProviderError::Transient("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl ResourceProvider for InMemoryProvider {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn fingerprint(&self, id: &ResourceId) -> Result<Option<String>, ProviderError> {
        self.take_failure()?;
        let resources = self.resources.read().await;
        Ok(resources.get(id).map(|stored| stored.fingerprint.clone()))
    }

    async fn upsert(&self, resource: &Resource) -> Result<(), ProviderError> {
        self.take_failure()?;
        if *self.rejected.read().await == Some(resource.id.kind) {
            return Err(ProviderError::Permanent(format!(
                "{} resources are not accepted",
                resource.id.kind
            )));
        }

        let mut resources = self.resources.write().await;
        resources.insert(
            resource.id.clone(),
            StoredResource {
                fingerprint: resource.fingerprint.clone(),
                body: resource.body.clone(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);

        debug!("Stored resource: {}", resource.id);
        Ok(())
    }
}
