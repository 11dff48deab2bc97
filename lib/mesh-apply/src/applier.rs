//! Idempotent apply of a synthesized topology
//!
//! Resources are applied one at a time in dependency order. Unchanged
//! resources are skipped, transient provider failures are retried with
//! exponential backoff and jitter, and the first permanent failure aborts the
//! run. Nothing already applied is rolled back.

use chrono::{DateTime, Utc};
use mesh_api::DeploymentTopology;
use rand::Rng;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApplyError, ProviderError, Result};
use crate::provider::ResourceProvider;
use crate::resource::{flatten, Resource, ResourceId};

/// Retry schedule for transient provider failures
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    /// Attempts per provider call, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl BackoffPolicy {
    /// Capped exponential backoff before the given retry (0-based)
    pub fn backoff_duration(&self, retry: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as u64;
        let exponential = 2u64.saturating_pow(retry);
        let backoff_ms = base
            .saturating_mul(exponential)
            .min(self.max_backoff.as_millis() as u64);
        Duration::from_millis(backoff_ms)
    }

    /// Backoff with jitter: uniformly between half and all of the capped delay
    pub fn jittered(&self, retry: u32) -> Duration {
        let capped = self.backoff_duration(retry).as_millis() as u64;
        let half = capped / 2;
        let jitter = if half == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=half)
        };
        Duration::from_millis(capped - half + jitter)
    }
}

/// Outcome of one apply run
#[derive(Clone, Debug, Serialize)]
pub struct ApplyReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Fingerprint of the applied topology
    pub topology: String,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ApplyReport {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

enum Outcome {
    Created,
    Updated,
    Unchanged,
}

pub struct Applier {
    provider: Arc<dyn ResourceProvider>,
    backoff: BackoffPolicy,
}

impl Applier {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        Self {
            provider,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn apply(&self, topology: &DeploymentTopology) -> Result<ApplyReport> {
        let mut report = ApplyReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            topology: topology.fingerprint()?,
            created: 0,
            updated: 0,
            unchanged: 0,
        };
        let resources = flatten(topology)?;
        info!(
            "Apply {} started: {} resources via {} provider",
            report.run_id,
            resources.len(),
            self.provider.name()
        );

        for resource in &resources {
            match self.apply_resource(resource).await? {
                Outcome::Created => report.created += 1,
                Outcome::Updated => report.updated += 1,
                Outcome::Unchanged => report.unchanged += 1,
            }
        }

        info!(
            "Apply {} finished: {} created, {} updated, {} unchanged",
            report.run_id, report.created, report.updated, report.unchanged
        );
        Ok(report)
    }

    async fn apply_resource(&self, resource: &Resource) -> Result<Outcome> {
        let current = self
            .with_retry(&resource.id, || self.provider.fingerprint(&resource.id))
            .await?;

        let outcome = match current {
            Some(fingerprint) if fingerprint == resource.fingerprint => {
                debug!("Unchanged: {}", resource.id);
                return Ok(Outcome::Unchanged);
            }
            Some(_) => Outcome::Updated,
            None => Outcome::Created,
        };

        self.with_retry(&resource.id, || self.provider.upsert(resource))
            .await?;
        debug!("Applied: {}", resource.id);
        Ok(outcome)
    }

    async fn with_retry<T, F, Fut>(&self, id: &ResourceId, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(source) if !source.is_transient() => {
                    return Err(ApplyError::Provider {
                        resource: id.to_string(),
                        source,
                    });
                }
                Err(source) if attempt >= self.backoff.max_attempts => {
                    return Err(ApplyError::RetriesExhausted {
                        resource: id.to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(source) => {
                    let delay = self.backoff.jittered(attempt - 1);
                    warn!(
                        "Attempt {} for {} failed: {}; retrying in {:?}",
                        attempt, id, source, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
