//! Region pipeline and deployment merge
//!
//! Each region runs allocate, wire-load-balancer, build-services,
//! build-gateway and publish-dns in order. The first failing stage aborts the
//! region. Regions run in parallel on the blocking pool and are merged in
//! configuration order, then checked for cross-region consistency.

use futures::future::join_all;
use mesh_api::topology::PrivateEndpoint;
use mesh_api::{DeploymentTopology, MeshConfig, MeshNamespace, Region, RegionTopology};
use std::sync::Arc;
use tracing::{debug, info};

use crate::addressing::AddressAllocator;
use crate::catalog::{Catalog, ServiceSpec, SynthSettings};
use crate::consistency;
use crate::dns;
use crate::error::{ConfigError, Result, Stage, StageContext, SynthError};
use crate::gateway::build_gateway;
use crate::listeners::{assign_ports, reserved_ports, wire_load_balancer};
use crate::service::ServiceBuilder;

/// Synthesize the complete topology of one region
///
/// Pure: the same inputs always produce the same topology, and nothing is
/// returned unless every stage succeeds.
pub fn synthesize_region(
    region: &Region,
    services: &[ServiceSpec],
    mesh: &MeshNamespace,
    settings: &SynthSettings,
) -> Result<RegionTopology> {
    let id = region.id.as_str();

    if services.is_empty() {
        return Err(ConfigError::EmptyCatalog).at_stage(id, Stage::Catalog);
    }

    info!("Region {}: stage {}", id, Stage::Allocate);
    let subnet_mappings = AddressAllocator::new(settings.address_plan)
        .and_then(|allocator| allocator.allocate(region))
        .at_stage(id, Stage::Allocate)?;

    info!("Region {}: stage {}", id, Stage::WireLoadBalancer);
    let pinned: Vec<(&str, Option<u16>)> =
        services.iter().map(|s| (s.name.as_str(), s.port)).collect();
    let ports = assign_ports(&pinned, settings.base_port, &reserved_ports(settings))
        .at_stage(id, Stage::WireLoadBalancer)?;
    let listeners: Vec<(&str, u16)> = services
        .iter()
        .zip(&ports)
        .map(|(s, port)| (s.name.as_str(), *port))
        .collect();
    let load_balancer = wire_load_balancer(
        id,
        subnet_mappings,
        settings.gateway.listener_port,
        &listeners,
    );

    info!("Region {}: stage {}", id, Stage::BuildServices);
    let builder = ServiceBuilder::new(region, mesh, settings, &load_balancer.name);
    let built = services
        .iter()
        .zip(&ports)
        .map(|(spec, port)| builder.build(spec, *port))
        .collect::<std::result::Result<Vec<_>, ConfigError>>()
        .at_stage(id, Stage::BuildServices)?;

    info!("Region {}: stage {}", id, Stage::BuildGateway);
    let gateway = build_gateway(region, settings, &built).at_stage(id, Stage::BuildGateway)?;

    info!("Region {}: stage {}", id, Stage::PublishDns);
    let dns_records = dns::publish(region, mesh, &load_balancer, &built, settings.dns_ttl_seconds)
        .at_stage(id, Stage::PublishDns)?;

    let private_endpoints = settings
        .private_endpoints
        .iter()
        .map(|endpoint| PrivateEndpoint {
            name: format!("{}-{}", id, endpoint.service),
            service: endpoint.service.clone(),
            kind: endpoint.kind,
        })
        .collect();

    debug!(
        "Region {} synthesized: {} services, {} DNS records",
        id,
        built.len(),
        dns_records.len()
    );

    Ok(RegionTopology {
        region: region.clone(),
        load_balancer,
        gateway: gateway.gateway,
        gateway_target_group: gateway.target_group,
        gateway_workload: gateway.workload,
        services: built,
        dns_records,
        private_endpoints,
    })
}

/// Synthesize every region in parallel and merge the results
pub async fn synthesize_deployment(catalog: Arc<Catalog>) -> Result<DeploymentTopology> {
    info!(
        "Synthesizing {} services across {} regions",
        catalog.services.len(),
        catalog.regions.len()
    );

    let tasks = (0..catalog.regions.len()).map(|index| {
        let catalog = Arc::clone(&catalog);
        tokio::task::spawn_blocking(move || {
            synthesize_region(
                &catalog.regions[index],
                &catalog.services,
                &catalog.mesh,
                &catalog.settings,
            )
        })
    });

    let mut regions = Vec::with_capacity(catalog.regions.len());
    for joined in join_all(tasks).await {
        let region = joined.map_err(|e| SynthError::Internal(format!("Region task failed: {}", e)))??;
        regions.push(region);
    }

    let topology = DeploymentTopology {
        mesh: catalog.mesh.clone(),
        regions,
    };
    consistency::check(&topology)?;

    info!("Synthesized {} regions", topology.regions.len());
    Ok(topology)
}

/// Resolve a deployment file and synthesize it
pub async fn synthesize(config: &MeshConfig) -> Result<DeploymentTopology> {
    let catalog = Catalog::from_config(config)?;
    synthesize_deployment(Arc::new(catalog)).await
}
