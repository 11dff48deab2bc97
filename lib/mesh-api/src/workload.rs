//! Parameters handed to the external workload executor
//!
//! The synthesizer never runs containers. It decides the image, ports,
//! environment, health checks and startup ordering; the executor accepts
//! them and reports container health back to its own caller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything needed to run one service (or the gateway) in a region
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkloadSpec {
    pub name: String,
    pub desired_count: u32,
    pub containers: Vec<ContainerSpec>,
    /// Port the workload accepts traffic on
    pub ingress_port: u16,
    /// Transparent proxy interception, for workloads with a sidecar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxySettings>,
}

impl WorkloadSpec {
    pub fn container(&self, name: &str) -> Option<&ContainerSpec> {
        self.containers.iter().find(|c| c.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub env: BTreeMap<String, String>,
    pub health_check: ContainerHealthCheck,
    pub essential: bool,
    pub depends_on: Vec<ContainerDependency>,
    pub logging: LogSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContainerHealthCheck {
    pub command: Vec<String>,
    pub start_period_seconds: u32,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    pub retries: u32,
}

/// Startup ordering between containers of one workload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContainerDependency {
    pub container: String,
    pub condition: DependencyCondition,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyCondition {
    Start,
    Healthy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LogSettings {
    pub stream_prefix: String,
    pub retention_days: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProxySettings {
    pub container_name: String,
    pub ingress_port: u16,
    pub egress_port: u16,
    pub ignored_uid: u32,
    pub app_ports: Vec<u16>,
    pub egress_ignored_ips: Vec<String>,
    pub egress_ignored_ports: Vec<u16>,
}

/// Sidecar proxy defaults shared by every workload of the deployment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProxyConfig {
    /// Image reference; `{region}` is replaced with the region identifier
    #[serde(default = "default_proxy_image")]
    pub image: String,

    /// Admin port used by the proxy liveness check
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    #[serde(default = "default_proxy_ingress_port")]
    pub ingress_port: u16,

    #[serde(default = "default_proxy_egress_port")]
    pub egress_port: u16,

    /// UID the proxy runs as; its own traffic is not intercepted
    #[serde(default = "default_proxy_uid")]
    pub uid: u32,

    #[serde(default = "default_egress_ignored_ips")]
    pub egress_ignored_ips: Vec<String>,

    #[serde(default = "default_egress_ignored_ports")]
    pub egress_ignored_ports: Vec<u16>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            image: default_proxy_image(),
            admin_port: default_admin_port(),
            ingress_port: default_proxy_ingress_port(),
            egress_port: default_proxy_egress_port(),
            uid: default_proxy_uid(),
            egress_ignored_ips: default_egress_ignored_ips(),
            egress_ignored_ports: default_egress_ignored_ports(),
        }
    }
}

impl ProxyConfig {
    pub fn image_for(&self, region: &str) -> String {
        self.image.replace("{region}", region)
    }
}

fn default_proxy_image() -> String {
    "840364872350.dkr.ecr.{region}.amazonaws.com/aws-appmesh-envoy:v1.24.1.0-prod".to_string()
}

fn default_admin_port() -> u16 {
    9901
}

fn default_proxy_ingress_port() -> u16 {
    15000
}

fn default_proxy_egress_port() -> u16 {
    15001
}

fn default_proxy_uid() -> u32 {
    1337
}

fn default_egress_ignored_ips() -> Vec<String> {
    vec!["169.254.170.2".to_string(), "169.254.169.254".to_string()]
}

fn default_egress_ignored_ports() -> Vec<u16> {
    vec![22]
}
