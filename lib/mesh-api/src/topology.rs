//! Synthesized topology: the output of the synthesizer and the input of the
//! apply layer

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{MeshNamespace, PrivateEndpointKind};
use crate::dns::DnsRecord;
use crate::gateway::Gateway;
use crate::load_balancer::{LoadBalancer, TargetGroup};
use crate::region::Region;
use crate::service::{Router, RoutingNode, Service, VirtualService};
use crate::workload::WorkloadSpec;

/// Every resource built for one service in one region
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceTopology {
    pub service: Service,
    pub node: RoutingNode,
    pub router: Router,
    pub virtual_service: VirtualService,
    pub target_group: TargetGroup,
    pub workload: WorkloadSpec,
    pub api_route: ApiRoute,
}

/// Edge API route forwarding `/{service}/{proxy+}` into the mesh
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ApiRoute {
    pub path: String,
    pub method: String,
    pub integration_uri: String,
    /// Load balancer reached through the private link
    pub link_target: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PrivateEndpoint {
    pub name: String,
    pub service: String,
    pub kind: PrivateEndpointKind,
}

/// Complete, internally consistent topology of one region
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RegionTopology {
    pub region: Region,
    pub load_balancer: LoadBalancer,
    pub gateway: Gateway,
    pub gateway_target_group: TargetGroup,
    pub gateway_workload: WorkloadSpec,
    pub services: Vec<ServiceTopology>,
    pub dns_records: Vec<DnsRecord>,
    pub private_endpoints: Vec<PrivateEndpoint>,
}

impl RegionTopology {
    pub fn service(&self, name: &str) -> Option<&ServiceTopology> {
        self.services.iter().find(|s| s.service.name == name)
    }

    /// Every target group of the region, gateway first
    pub fn target_groups(&self) -> impl Iterator<Item = &TargetGroup> {
        std::iter::once(&self.gateway_target_group)
            .chain(self.services.iter().map(|s| &s.target_group))
    }
}

/// Merged output of every region of a deployment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeploymentTopology {
    pub mesh: MeshNamespace,
    pub regions: Vec<RegionTopology>,
}

impl DeploymentTopology {
    pub fn region(&self, id: &str) -> Option<&RegionTopology> {
        self.regions.iter().find(|r| r.region.id == id)
    }

    /// Canonical JSON encoding; identical input always yields identical bytes
    pub fn to_canonical_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Hex SHA-256 of the canonical encoding
    pub fn fingerprint(&self) -> serde_json::Result<String> {
        let bytes = self.to_canonical_json()?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}
