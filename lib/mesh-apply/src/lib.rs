//! Apply layer for synthesized mesh topologies
//!
//! This library provides:
//! - Flattening of a topology into fingerprinted resources in dependency order
//! - The provider seam for create-or-update backends
//! - An applier with skip-unchanged and retry with backoff
//! - An in-memory provider for dry runs

pub mod applier;
pub mod error;
pub mod memory;
pub mod provider;
pub mod resource;

pub use applier::{Applier, ApplyReport, BackoffPolicy};
pub use error::{ApplyError, ProviderError, Result};
pub use memory::InMemoryProvider;
pub use provider::ResourceProvider;
pub use resource::{flatten, Resource, ResourceId, ResourceKind};
