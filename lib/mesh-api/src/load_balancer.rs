use ipnetwork::Ipv4Network;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Regional network load balancer with one static address per partition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LoadBalancer {
    pub name: String,
    pub scheme: Scheme,
    pub subnet_mappings: Vec<SubnetMapping>,
    pub listeners: Vec<Listener>,
}

impl LoadBalancer {
    /// Static addresses in partition order
    pub fn static_addresses(&self) -> Vec<Ipv4Addr> {
        self.subnet_mappings.iter().map(|m| m.private_address).collect()
    }

    pub fn listener_on(&self, port: u16) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.port == port)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubnetMapping {
    pub zone: String,
    #[schemars(with = "String")]
    pub cidr: Ipv4Network,
    pub private_address: Ipv4Addr,
}

/// Listener bound to one port, forwarding to one target group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Listener {
    pub name: String,
    pub port: u16,
    pub protocol: TransportProtocol,
    pub target_group: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportProtocol {
    Tcp,
}

/// Backend set for one listener
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TargetGroup {
    pub name: String,
    pub port: u16,
    pub protocol: TransportProtocol,
    pub target_type: TargetType,
    /// Seconds a deregistering target keeps receiving traffic
    pub deregistration_delay_seconds: u32,
    pub health_check: TargetHealthCheck,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Ip,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TargetHealthCheck {
    pub protocol: TransportProtocol,
    pub interval_seconds: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
}
