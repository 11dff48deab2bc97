//! Deployment configuration: the regions, the service catalog and the
//! deployment-wide defaults every service inherits unless overridden

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dns::RoutingPolicy;
use crate::region::AddressPlan;
use crate::service::{HealthProbe, HttpRetryEvent, RetryPolicy, TcpRetryEvent};
use crate::workload::ProxyConfig;

/// Top-level deployment file
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct MeshConfig {
    pub mesh: MeshNamespace,

    #[serde(default)]
    pub defaults: Defaults,

    pub services: Vec<ServiceConfig>,

    pub regions: Vec<RegionConfig>,
}

/// Shared cross-region namespace every region publishes into
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MeshNamespace {
    /// DNS zone shared by all regions (e.g. "mesh.net")
    pub zone_name: String,

    /// Provider identifier of the hosted zone, passed through to apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone_id: Option<String>,
}

/// Deployment-wide defaults
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct Defaults {
    /// First service listener port; services get consecutive ports
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub health_check: HealthProbe,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Per-request timeout on routers (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,

    #[serde(default = "default_dns_ttl")]
    pub dns_ttl_seconds: u32,

    #[serde(default)]
    pub address_plan: AddressPlan,

    #[serde(default = "default_log_retention")]
    pub log_retention_days: u32,

    /// Image used by services that do not name one
    #[serde(default = "default_workload_image")]
    pub workload_image: String,

    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Private endpoints the workloads of every region need
    #[serde(default = "default_private_endpoints")]
    pub private_endpoints: Vec<PrivateEndpointConfig>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            base_port: default_base_port(),
            gateway: GatewayConfig::default(),
            health_check: HealthProbe::default(),
            retry: RetryPolicy::default(),
            request_timeout_seconds: default_request_timeout(),
            dns_ttl_seconds: default_dns_ttl(),
            address_plan: AddressPlan::default(),
            log_retention_days: default_log_retention(),
            workload_image: default_workload_image(),
            proxy: ProxyConfig::default(),
            private_endpoints: default_private_endpoints(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GatewayConfig {
    /// Load balancer port fronting the gateway
    #[serde(default = "default_gateway_listener_port")]
    pub listener_port: u16,

    /// Port the gateway proxy listens on inside its workload
    #[serde(default = "default_gateway_container_port")]
    pub container_port: u16,

    #[serde(default = "default_gateway_replicas")]
    pub replicas: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listener_port: default_gateway_listener_port(),
            container_port: default_gateway_container_port(),
            replicas: default_gateway_replicas(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PrivateEndpointConfig {
    pub service: String,
    #[serde(default)]
    pub kind: PrivateEndpointKind,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrivateEndpointKind {
    /// Route-table based endpoint
    Gateway,
    /// Network interface inside the region's partitions
    #[default]
    Interface,
}

/// One catalog entry
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct ServiceConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Explicit listener port instead of `base_port + index`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Explicit public hostname instead of `{name}.{zone}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthProbeOverride>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryOverride>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_seconds: Option<u32>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Partial health probe; unset fields come from the defaults
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HealthProbeOverride {
    pub path: Option<String>,
    pub interval_seconds: Option<u32>,
    pub timeout_seconds: Option<u32>,
    pub unhealthy_threshold: Option<u32>,
    pub healthy_threshold: Option<u32>,
}

impl HealthProbeOverride {
    pub fn apply(&self, base: &HealthProbe) -> HealthProbe {
        HealthProbe {
            path: self.path.clone().unwrap_or_else(|| base.path.clone()),
            interval_seconds: self.interval_seconds.unwrap_or(base.interval_seconds),
            timeout_seconds: self.timeout_seconds.unwrap_or(base.timeout_seconds),
            unhealthy_threshold: self.unhealthy_threshold.unwrap_or(base.unhealthy_threshold),
            healthy_threshold: self.healthy_threshold.unwrap_or(base.healthy_threshold),
        }
    }
}

/// Partial retry policy; unset fields come from the defaults
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RetryOverride {
    pub http_retry_events: Option<Vec<HttpRetryEvent>>,
    pub tcp_retry_events: Option<Vec<TcpRetryEvent>>,
    pub max_retries: Option<u32>,
    pub per_retry_timeout_seconds: Option<u32>,
}

impl RetryOverride {
    pub fn apply(&self, base: &RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            http_retry_events: self
                .http_retry_events
                .clone()
                .unwrap_or_else(|| base.http_retry_events.clone()),
            tcp_retry_events: self
                .tcp_retry_events
                .clone()
                .unwrap_or_else(|| base.tcp_retry_events.clone()),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            per_retry_timeout_seconds: self
                .per_retry_timeout_seconds
                .unwrap_or(base.per_retry_timeout_seconds),
        }
    }
}

/// One region of the deployment
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct RegionConfig {
    pub id: String,

    /// Private IPv4 CIDR of the region's network
    pub address_space: String,

    /// Partitions; a partition without `cidr` is carved from the address space
    pub partitions: Vec<PartitionConfig>,

    /// Region-local discovery namespace, defaults to `{id}.local`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_namespace: Option<String>,

    #[serde(default)]
    pub routing: RoutingPolicy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PartitionConfig {
    pub zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
}

fn default_base_port() -> u16 {
    3001
}

fn default_request_timeout() -> u32 {
    30
}

fn default_dns_ttl() -> u32 {
    60
}

fn default_log_retention() -> u32 {
    1
}

fn default_workload_image() -> String {
    "mesh-echo:latest".to_string()
}

fn default_gateway_listener_port() -> u16 {
    80
}

fn default_gateway_container_port() -> u16 {
    9080
}

fn default_gateway_replicas() -> u32 {
    1
}

fn default_replicas() -> u32 {
    1
}

fn default_private_endpoints() -> Vec<PrivateEndpointConfig> {
    let interface = |service: &str| PrivateEndpointConfig {
        service: service.to_string(),
        kind: PrivateEndpointKind::Interface,
    };
    vec![
        PrivateEndpointConfig {
            service: "s3".to_string(),
            kind: PrivateEndpointKind::Gateway,
        },
        interface("logs"),
        interface("ecr.api"),
        interface("ecr.dkr"),
        interface("appmesh-envoy-management"),
        interface("ssm"),
        interface("ssmmessages"),
        interface("ec2messages"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
mesh:
  zone_name: mesh.net
services:
  - name: orders
  - name: billing
    port: 3100
    retry:
      max_retries: 2
regions:
  - id: east
    address_space: 10.0.0.0/16
    partitions:
      - zone: a
      - zone: b
        cidr: 10.0.64.0/18
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: MeshConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.defaults.base_port, 3001);
        assert_eq!(config.defaults.gateway.listener_port, 80);
        assert_eq!(config.defaults.gateway.container_port, 9080);
        assert_eq!(config.defaults.dns_ttl_seconds, 60);
        assert_eq!(config.defaults.request_timeout_seconds, 30);
        assert_eq!(config.services[0].replicas, 1);
        assert_eq!(config.services[1].port, Some(3100));
        assert_eq!(config.regions[0].routing, RoutingPolicy::Weighted { weight: 1 });
        assert_eq!(config.regions[0].partitions[0].cidr, None);
    }

    #[test]
    fn test_retry_override_keeps_unset_fields() {
        let config: MeshConfig = serde_yaml::from_str(MINIMAL).unwrap();
        let base = RetryPolicy::default();
        let merged = config.services[1].retry.as_ref().unwrap().apply(&base);
        assert_eq!(merged.max_retries, 2);
        assert_eq!(merged.http_retry_events, base.http_retry_events);
        assert_eq!(merged.tcp_retry_events, base.tcp_retry_events);
    }

    #[test]
    fn test_health_override() {
        let base = HealthProbe::default();
        let over = HealthProbeOverride {
            path: Some("/ready".to_string()),
            healthy_threshold: Some(5),
            ..Default::default()
        };
        let merged = over.apply(&base);
        assert_eq!(merged.path, "/ready");
        assert_eq!(merged.healthy_threshold, 5);
        assert_eq!(merged.interval_seconds, base.interval_seconds);
    }

    #[test]
    fn test_failover_region() {
        let yaml = r#"
id: west
address_space: 10.1.0.0/16
partitions: [{ zone: a }]
routing:
  policy: failover
  role: secondary
"#;
        let region: RegionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            region.routing,
            RoutingPolicy::Failover { role: crate::dns::FailoverRole::Secondary }
        );
    }
}
