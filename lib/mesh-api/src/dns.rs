use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// DNS record published into the shared mesh zone
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DnsRecord {
    /// Fully qualified record name (e.g. "*.mesh.net")
    pub name: String,
    pub data: RecordData,
    pub ttl_seconds: u32,
    /// Weighting key; always the owning region's identifier
    pub set_identifier: String,
    pub routing: RoutingPolicy,
}

impl DnsRecord {
    pub fn is_wildcard(&self) -> bool {
        self.name.starts_with("*.")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordData {
    A { addresses: Vec<Ipv4Addr> },
    Cname { target: String },
}

impl RecordData {
    pub fn record_type(&self) -> &'static str {
        match self {
            RecordData::A { .. } => "A",
            RecordData::Cname { .. } => "CNAME",
        }
    }
}

/// How a region takes part in multi-region resolution of a record family
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RoutingPolicy {
    /// Share of answers relative to the other regions; 0 drains the region
    Weighted {
        #[serde(default = "default_weight")]
        weight: u8,
    },
    /// Active/passive resolution
    Failover { role: FailoverRole },
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        RoutingPolicy::Weighted { weight: default_weight() }
    }
}

impl RoutingPolicy {
    pub fn kind(&self) -> RoutingPolicyKind {
        match self {
            RoutingPolicy::Weighted { .. } => RoutingPolicyKind::Weighted,
            RoutingPolicy::Failover { .. } => RoutingPolicyKind::Failover,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailoverRole {
    Primary,
    Secondary,
}

impl fmt::Display for FailoverRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailoverRole::Primary => write!(f, "primary"),
            FailoverRole::Secondary => write!(f, "secondary"),
        }
    }
}

/// Weighting key scheme; every region publishing a record family must agree on it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicyKind {
    Weighted,
    Failover,
}

impl fmt::Display for RoutingPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingPolicyKind::Weighted => write!(f, "weighted"),
            RoutingPolicyKind::Failover => write!(f, "failover"),
        }
    }
}

fn default_weight() -> u8 {
    1
}
