//! Service router builder
//!
//! Builds everything one service needs in one region: routing node, router
//! with its retry policy, virtual service, backend target group, workload
//! parameters and edge API route. Builds share no state and can run in any
//! order; each returns a new, independently owned `ServiceTopology`.

use mesh_api::service::{
    DnsResponseType, NodeListener, Protocol, ServiceDiscovery, WeightedTarget,
};
use mesh_api::topology::ApiRoute;
use mesh_api::{
    HealthProbe, MeshNamespace, Region, RetryPolicy, Router, RoutingNode, Service,
    ServiceTopology, VirtualService,
};
use tracing::{debug, warn};

use crate::catalog::{ServiceSpec, SynthSettings};
use crate::error::ConfigError;
use crate::listeners;
use crate::workload;

const ACCESS_LOG_PATH: &str = "/dev/stdout";

pub struct ServiceBuilder<'a> {
    region: &'a Region,
    mesh: &'a MeshNamespace,
    settings: &'a SynthSettings,
    load_balancer: &'a str,
}

impl<'a> ServiceBuilder<'a> {
    pub fn new(
        region: &'a Region,
        mesh: &'a MeshNamespace,
        settings: &'a SynthSettings,
        load_balancer: &'a str,
    ) -> Self {
        Self {
            region,
            mesh,
            settings,
            load_balancer,
        }
    }

    /// Public hostname of a service in the shared zone
    pub fn hostname(&self, spec: &ServiceSpec) -> String {
        spec.hostname
            .clone()
            .unwrap_or_else(|| format!("{}.{}", spec.name, self.mesh.zone_name))
    }

    /// Region-local name the routing node discovers endpoints under
    pub fn discovery_name(&self, spec: &ServiceSpec) -> String {
        format!("{}.{}", spec.name, self.region.discovery_namespace)
    }

    pub fn build(&self, spec: &ServiceSpec, port: u16) -> Result<ServiceTopology, ConfigError> {
        validate_health_check(&spec.name, &spec.health_check)?;
        validate_retry_policy(&spec.name, &spec.retry, spec.request_timeout_seconds)?;
        let hostname = self.hostname(spec);
        validate_hostname(&spec.name, &hostname, &self.mesh.zone_name)?;

        if spec.replicas == 0 {
            warn!(
                "Service {} has zero replicas in region {}; routing will report no healthy targets",
                spec.name, self.region.id
            );
        }

        let service = Service {
            name: spec.name.clone(),
            hostname,
            discovery_name: self.discovery_name(spec),
            port,
            replicas: spec.replicas,
        };

        let node = RoutingNode {
            name: spec.name.clone(),
            service: spec.name.clone(),
            listener: NodeListener {
                port,
                protocol: Protocol::Http,
                health_check: spec.health_check.clone(),
            },
            discovery: ServiceDiscovery::Dns {
                hostname: service.discovery_name.clone(),
                response_type: DnsResponseType::Endpoints,
            },
            access_log_path: ACCESS_LOG_PATH.to_string(),
        };

        let router = Router {
            name: format!("{}-router", spec.name),
            service: spec.name.clone(),
            port,
            protocol: Protocol::Http,
            targets: vec![WeightedTarget {
                node: node.name.clone(),
                weight: 1,
            }],
            request_timeout_seconds: spec.request_timeout_seconds,
            retry_policy: spec.retry.clone(),
        };

        let virtual_service = VirtualService {
            name: service.hostname.clone(),
            router: router.name.clone(),
        };

        let target_group = listeners::target_group(&spec.name, port, &spec.health_check);
        let workload = workload::service_workload(self.region, self.settings, spec, &service, &node);

        let api_route = ApiRoute {
            path: format!("/{}/{{proxy+}}", spec.name),
            method: "ANY".to_string(),
            integration_uri: format!("http://{}/{{proxy}}", service.hostname),
            link_target: self.load_balancer.to_string(),
        };

        debug!(
            "Built service {} in region {}: port {}, hostname {}, discovery {}",
            service.name, self.region.id, port, service.hostname, service.discovery_name
        );

        Ok(ServiceTopology {
            service,
            node,
            router,
            virtual_service,
            target_group,
            workload,
            api_route,
        })
    }
}

fn validate_health_check(service: &str, probe: &HealthProbe) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidHealthCheck {
        service: service.to_string(),
        reason: reason.to_string(),
    };

    if !probe.path.starts_with('/') {
        return Err(invalid("path must start with '/'"));
    }
    if probe.interval_seconds == 0 || probe.timeout_seconds == 0 {
        return Err(invalid("interval and timeout must be positive"));
    }
    if probe.timeout_seconds > probe.interval_seconds {
        return Err(invalid("timeout must not exceed the interval"));
    }
    if probe.healthy_threshold == 0 || probe.unhealthy_threshold == 0 {
        return Err(invalid("thresholds must be positive"));
    }
    Ok(())
}

/// Hostnames must sit strictly below the zone the records are published in
fn validate_hostname(service: &str, hostname: &str, zone: &str) -> Result<(), ConfigError> {
    let host = hostname.trim_end_matches('.').to_ascii_lowercase();
    let suffix = format!(".{}", zone.trim_end_matches('.').to_ascii_lowercase());
    match host.strip_suffix(&suffix) {
        Some(label) if !label.is_empty() => Ok(()),
        _ => Err(ConfigError::HostnameOutsideZone {
            service: service.to_string(),
            hostname: hostname.to_string(),
            zone: zone.to_string(),
        }),
    }
}

fn validate_retry_policy(
    service: &str,
    policy: &RetryPolicy,
    request_timeout_seconds: u32,
) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidRetryPolicy {
        service: service.to_string(),
        reason: reason.to_string(),
    };

    if policy.is_empty() {
        return Err(invalid("no retryable events configured"));
    }
    if policy.max_retries == 0 {
        return Err(invalid("max retries must be positive"));
    }
    if request_timeout_seconds == 0 || policy.per_retry_timeout_seconds == 0 {
        return Err(invalid("timeouts must be positive"));
    }
    if policy.per_retry_timeout_seconds > request_timeout_seconds {
        return Err(invalid("per-retry timeout exceeds the request timeout"));
    }
    Ok(())
}
