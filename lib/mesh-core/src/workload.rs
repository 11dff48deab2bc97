//! Workload executor parameters for services and the gateway

use mesh_api::workload::{
    ContainerDependency, ContainerHealthCheck, DependencyCondition, LogSettings, ProxySettings,
};
use mesh_api::{ContainerSpec, Gateway, Region, RoutingNode, Service, WorkloadSpec};
use std::collections::BTreeMap;

use crate::catalog::{ServiceSpec, SynthSettings};

pub const APP_CONTAINER: &str = "app";
pub const PROXY_CONTAINER: &str = "envoy";

const START_PERIOD_SECONDS: u32 = 10;
const CHECK_INTERVAL_SECONDS: u32 = 5;
const CHECK_TIMEOUT_SECONDS: u32 = 2;
const CHECK_RETRIES: u32 = 3;

/// Mesh that owns a region's nodes, routers and gateway
pub fn mesh_name(region: &Region) -> String {
    format!("{}-mesh", region.id)
}

/// Service workload: the app container gated on a healthy proxy sidecar
pub fn service_workload(
    region: &Region,
    settings: &SynthSettings,
    spec: &ServiceSpec,
    service: &Service,
    node: &RoutingNode,
) -> WorkloadSpec {
    let mut env = spec.env.clone();
    env.insert("SERVER_PORT".to_string(), service.port.to_string());

    let app = ContainerSpec {
        name: APP_CONTAINER.to_string(),
        image: spec.image.clone(),
        port: Some(service.port),
        user: None,
        env,
        health_check: shell_check(format!(
            "curl -s http://localhost:{}{} | grep status | grep -q OK",
            service.port, spec.health_check.path
        )),
        essential: true,
        depends_on: vec![ContainerDependency {
            container: PROXY_CONTAINER.to_string(),
            condition: DependencyCondition::Healthy,
        }],
        logging: log_settings(settings, &service.name),
    };

    let proxy = proxy_container(
        region,
        settings,
        format!("mesh/{}/virtualNode/{}", mesh_name(region), node.name),
        None,
        Some(settings.proxy.uid.to_string()),
        &service.name,
    );

    WorkloadSpec {
        name: service.name.clone(),
        desired_count: service.replicas,
        containers: vec![app, proxy],
        ingress_port: service.port,
        proxy: Some(ProxySettings {
            container_name: PROXY_CONTAINER.to_string(),
            ingress_port: settings.proxy.ingress_port,
            egress_port: settings.proxy.egress_port,
            ignored_uid: settings.proxy.uid,
            app_ports: vec![service.port],
            egress_ignored_ips: settings.proxy.egress_ignored_ips.clone(),
            egress_ignored_ports: settings.proxy.egress_ignored_ports.clone(),
        }),
    }
}

/// Gateway workload: a standalone proxy listening on the gateway port
pub fn gateway_workload(region: &Region, settings: &SynthSettings, gateway: &Gateway) -> WorkloadSpec {
    let port = gateway.listener.port;
    let proxy = proxy_container(
        region,
        settings,
        format!("mesh/{}/virtualGateway/{}", mesh_name(region), gateway.name),
        Some(port),
        None,
        &gateway.name,
    );

    WorkloadSpec {
        name: gateway.name.clone(),
        desired_count: settings.gateway.replicas,
        containers: vec![proxy],
        ingress_port: port,
        proxy: None,
    }
}

fn proxy_container(
    region: &Region,
    settings: &SynthSettings,
    resource: String,
    port: Option<u16>,
    user: Option<String>,
    log_prefix: &str,
) -> ContainerSpec {
    let mut env = BTreeMap::new();
    env.insert("APPMESH_VIRTUAL_NODE_NAME".to_string(), resource);

    ContainerSpec {
        name: PROXY_CONTAINER.to_string(),
        image: settings.proxy.image_for(&region.id),
        port,
        user,
        env,
        health_check: shell_check(format!(
            "curl -s http://localhost:{}/server_info | grep state | grep -q LIVE",
            settings.proxy.admin_port
        )),
        essential: true,
        depends_on: Vec::new(),
        logging: log_settings(settings, log_prefix),
    }
}

fn shell_check(script: String) -> ContainerHealthCheck {
    ContainerHealthCheck {
        command: vec!["CMD-SHELL".to_string(), script],
        start_period_seconds: START_PERIOD_SECONDS,
        interval_seconds: CHECK_INTERVAL_SECONDS,
        timeout_seconds: CHECK_TIMEOUT_SECONDS,
        retries: CHECK_RETRIES,
    }
}

fn log_settings(settings: &SynthSettings, prefix: &str) -> LogSettings {
    LogSettings {
        stream_prefix: prefix.to_string(),
        retention_days: settings.log_retention_days,
    }
}
