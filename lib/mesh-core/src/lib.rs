//! Multi-region mesh topology synthesis
//!
//! This library provides:
//! - Catalog resolution of the deployment file
//! - Deterministic address allocation and load balancer wiring
//! - Per-service router, gateway and DNS record builders
//! - The per-region pipeline, parallel deployment merge and consistency check

pub mod addressing;
pub mod catalog;
pub mod consistency;
pub mod dns;
pub mod error;
pub mod gateway;
pub mod listeners;
pub mod orchestrator;
pub mod service;
pub mod workload;

pub use catalog::{Catalog, ServiceSpec, SynthSettings};
pub use error::{ConfigError, ConsistencyError, Result, Stage, SynthError};
pub use orchestrator::{synthesize, synthesize_deployment, synthesize_region};
