//! Gateway builder
//!
//! Runs after every service of the region is built. Emits one exact hostname
//! rule per service, plus the gateway's target group and workload.

use mesh_api::gateway::GatewayListener;
use mesh_api::service::Protocol;
use mesh_api::{
    Gateway, GatewayRoute, HealthProbe, HostnameMatch, Region, ServiceTopology, TargetGroup,
    WorkloadSpec,
};
use std::collections::HashMap;
use tracing::debug;

use crate::catalog::SynthSettings;
use crate::error::ConfigError;
use crate::listeners::{self, GATEWAY};
use crate::workload;

/// Gateway of one region with the resources that expose it
#[derive(Clone, Debug)]
pub struct GatewayBuild {
    pub gateway: Gateway,
    pub target_group: TargetGroup,
    pub workload: WorkloadSpec,
}

pub fn build_gateway(
    region: &Region,
    settings: &SynthSettings,
    services: &[ServiceTopology],
) -> Result<GatewayBuild, ConfigError> {
    let mut claimed: HashMap<String, &str> = HashMap::new();
    let mut routes = Vec::with_capacity(services.len());

    for built in services {
        let hostname = &built.service.hostname;
        if let Some(first) = claimed.insert(hostname.to_ascii_lowercase(), &built.service.name) {
            return Err(ConfigError::DuplicateHostname {
                hostname: hostname.clone(),
                first: first.to_string(),
                second: built.service.name.clone(),
            });
        }

        routes.push(GatewayRoute {
            name: built.service.name.clone(),
            hostname: HostnameMatch::Exact(hostname.clone()),
            virtual_service: built.virtual_service.name.clone(),
        });
    }

    let gateway = Gateway {
        name: GATEWAY.to_string(),
        region: region.id.clone(),
        listener: GatewayListener {
            port: settings.gateway.container_port,
            protocol: Protocol::Http,
        },
        access_log_path: "/dev/stdout".to_string(),
        routes,
    };
    debug!(
        "Built gateway for region {} with {} routes",
        region.id,
        gateway.routes.len()
    );

    let target_group = listeners::target_group(
        GATEWAY,
        settings.gateway.container_port,
        &HealthProbe::default(),
    );
    let workload = workload::gateway_workload(region, settings, &gateway);

    Ok(GatewayBuild {
        gateway,
        target_group,
        workload,
    })
}
