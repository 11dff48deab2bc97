use ipnetwork::Ipv4Network;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dns::RoutingPolicy;

/// Region is an independent deployment zone with its own private
/// address space, resolved from a `RegionConfig` before synthesis
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    /// Region identifier, also the DNS weighting key
    pub id: String,

    /// Private address space of the region's network
    #[schemars(with = "String")]
    pub address_space: Ipv4Network,

    /// Isolated network partitions, one per availability zone
    pub partitions: Vec<Partition>,

    /// Region-local discovery namespace (e.g. "east.local")
    pub discovery_namespace: String,

    /// How this region participates in multi-region DNS
    pub routing: RoutingPolicy,
}

/// Isolated subnet in one availability zone
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Partition {
    pub zone: String,
    #[schemars(with = "String")]
    pub cidr: Ipv4Network,
}

/// How static load balancer addresses are carved out of a partition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AddressPlan {
    /// Number of equal sub-blocks a partition is split into (power of two)
    #[serde(default = "default_subdivisions")]
    pub subdivisions: u32,

    /// Sub-block whose first address becomes the static address
    #[serde(default = "default_sub_block_index")]
    pub sub_block_index: u32,
}

impl Default for AddressPlan {
    fn default() -> Self {
        Self {
            subdivisions: default_subdivisions(),
            sub_block_index: default_sub_block_index(),
        }
    }
}

fn default_subdivisions() -> u32 {
    2
}

fn default_sub_block_index() -> u32 {
    1
}
