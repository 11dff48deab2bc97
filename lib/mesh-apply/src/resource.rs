//! Flattening of a synthesized topology into provider resources
//!
//! Resources are emitted in dependency order: a resource only refers to
//! resources of earlier kinds. Within a kind, regions keep configuration
//! order and entities keep synthesis order.

use mesh_api::DeploymentTopology;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::Result;

/// Resource kinds, declared in apply order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    PrivateEndpoint,
    LoadBalancer,
    TargetGroup,
    Listener,
    RoutingNode,
    Router,
    VirtualService,
    Gateway,
    GatewayRoute,
    Workload,
    ApiRoute,
    DnsRecord,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::PrivateEndpoint => "private-endpoint",
            ResourceKind::LoadBalancer => "load-balancer",
            ResourceKind::TargetGroup => "target-group",
            ResourceKind::Listener => "listener",
            ResourceKind::RoutingNode => "routing-node",
            ResourceKind::Router => "router",
            ResourceKind::VirtualService => "virtual-service",
            ResourceKind::Gateway => "gateway",
            ResourceKind::GatewayRoute => "gateway-route",
            ResourceKind::Workload => "workload",
            ResourceKind::ApiRoute => "api-route",
            ResourceKind::DnsRecord => "dns-record",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceId {
    pub region: String,
    pub kind: ResourceKind,
    pub name: String,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region, self.kind, self.name)
    }
}

/// One provider resource with its desired state
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Resource {
    pub id: ResourceId,
    /// Hex SHA-256 of `body`
    pub fingerprint: String,
    pub body: Value,
}

impl Resource {
    pub fn new<T: Serialize>(region: &str, kind: ResourceKind, name: &str, entity: &T) -> Result<Self> {
        let body = serde_json::to_value(entity)?;
        let fingerprint = hex::encode(Sha256::digest(serde_json::to_vec(&body)?));
        Ok(Self {
            id: ResourceId {
                region: region.to_string(),
                kind,
                name: name.to_string(),
            },
            fingerprint,
            body,
        })
    }
}

pub fn flatten(topology: &DeploymentTopology) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();

    for regional in &topology.regions {
        let region = regional.region.id.as_str();
        let mut push = |kind: ResourceKind, name: &str, body: Value| -> Result<()> {
            resources.push(Resource::new(region, kind, name, &body)?);
            Ok(())
        };

        for endpoint in &regional.private_endpoints {
            push(ResourceKind::PrivateEndpoint, &endpoint.name, serde_json::to_value(endpoint)?)?;
        }

        let lb = &regional.load_balancer;
        push(ResourceKind::LoadBalancer, &lb.name, serde_json::to_value(lb)?)?;

        for target_group in regional.target_groups() {
            push(ResourceKind::TargetGroup, &target_group.name, serde_json::to_value(target_group)?)?;
        }
        for listener in &lb.listeners {
            push(ResourceKind::Listener, &listener.name, serde_json::to_value(listener)?)?;
        }

        for built in &regional.services {
            push(ResourceKind::RoutingNode, &built.node.name, serde_json::to_value(&built.node)?)?;
            push(ResourceKind::Router, &built.router.name, serde_json::to_value(&built.router)?)?;
            push(
                ResourceKind::VirtualService,
                &built.virtual_service.name,
                serde_json::to_value(&built.virtual_service)?,
            )?;
        }

        // Routes are separate resources; the gateway body carries only its listener
        let gateway = &regional.gateway;
        let mut gateway_body = serde_json::to_value(gateway)?;
        if let Value::Object(fields) = &mut gateway_body {
            fields.remove("routes");
        }
        push(ResourceKind::Gateway, &gateway.name, gateway_body)?;
        for route in &gateway.routes {
            push(ResourceKind::GatewayRoute, &route.name, serde_json::to_value(route)?)?;
        }

        push(
            ResourceKind::Workload,
            &regional.gateway_workload.name,
            serde_json::to_value(&regional.gateway_workload)?,
        )?;
        for built in &regional.services {
            push(ResourceKind::Workload, &built.workload.name, serde_json::to_value(&built.workload)?)?;
        }
        for built in &regional.services {
            push(ResourceKind::ApiRoute, &built.service.name, serde_json::to_value(&built.api_route)?)?;
        }

        for record in &regional.dns_records {
            let name = format!("{}:{}", record.name, record.data.record_type());
            push(ResourceKind::DnsRecord, &name, serde_json::to_value(record)?)?;
        }
    }

    // Stable: regions and entities keep their order within a kind
    resources.sort_by_key(|r| r.id.kind);
    Ok(resources)
}
