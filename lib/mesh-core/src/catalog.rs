//! Resolution of a deployment file into synthesis inputs
//!
//! Defaults are merged into every service, partitions are parsed or carved,
//! and catalog-wide mistakes (duplicate names, empty catalog) are rejected
//! before any region starts.

use mesh_api::config::{Defaults, GatewayConfig, PrivateEndpointConfig};
use mesh_api::{
    AddressPlan, HealthProbe, MeshConfig, MeshNamespace, Partition, ProxyConfig, Region,
    RegionConfig, RetryPolicy, ServiceConfig,
};
use std::collections::{BTreeMap, HashSet};

use crate::addressing::{carve_partitions, parse_cidr};
use crate::error::{ConfigError, Result, Stage, StageContext};
use crate::listeners::GATEWAY;

/// One service with every default resolved
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub image: String,
    pub replicas: u32,
    /// Explicit port; `None` means `base_port + index`
    pub port: Option<u16>,
    /// Explicit public hostname; `None` means `{name}.{zone}`
    pub hostname: Option<String>,
    pub health_check: HealthProbe,
    pub retry: RetryPolicy,
    pub request_timeout_seconds: u32,
    pub env: BTreeMap<String, String>,
}

impl ServiceSpec {
    /// Service with deployment defaults and no overrides
    pub fn new(name: impl Into<String>, defaults: &Defaults) -> Self {
        let name = name.into();
        Self {
            image: defaults.workload_image.clone(),
            name,
            replicas: 1,
            port: None,
            hostname: None,
            health_check: defaults.health_check.clone(),
            retry: defaults.retry.clone(),
            request_timeout_seconds: defaults.request_timeout_seconds,
            env: BTreeMap::new(),
        }
    }

    fn from_config(config: &ServiceConfig, defaults: &Defaults) -> Self {
        Self {
            name: config.name.clone(),
            image: config
                .image
                .clone()
                .unwrap_or_else(|| defaults.workload_image.clone()),
            replicas: config.replicas,
            port: config.port,
            hostname: config.hostname.clone(),
            health_check: match &config.health_check {
                Some(over) => over.apply(&defaults.health_check),
                None => defaults.health_check.clone(),
            },
            retry: match &config.retry {
                Some(over) => over.apply(&defaults.retry),
                None => defaults.retry.clone(),
            },
            request_timeout_seconds: config
                .request_timeout_seconds
                .unwrap_or(defaults.request_timeout_seconds),
            env: config.env.clone(),
        }
    }
}

/// Deployment-wide settings every region shares
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthSettings {
    pub base_port: u16,
    pub gateway: GatewayConfig,
    pub dns_ttl_seconds: u32,
    pub address_plan: AddressPlan,
    pub log_retention_days: u32,
    pub proxy: ProxyConfig,
    pub private_endpoints: Vec<PrivateEndpointConfig>,
}

impl From<&Defaults> for SynthSettings {
    fn from(defaults: &Defaults) -> Self {
        Self {
            base_port: defaults.base_port,
            gateway: defaults.gateway.clone(),
            dns_ttl_seconds: defaults.dns_ttl_seconds,
            address_plan: defaults.address_plan,
            log_retention_days: defaults.log_retention_days,
            proxy: defaults.proxy.clone(),
            private_endpoints: defaults.private_endpoints.clone(),
        }
    }
}

impl Default for SynthSettings {
    fn default() -> Self {
        Self::from(&Defaults::default())
    }
}

/// Fully resolved deployment: immutable input of every regional synthesis
#[derive(Clone, Debug)]
pub struct Catalog {
    pub mesh: MeshNamespace,
    pub settings: SynthSettings,
    pub services: Vec<ServiceSpec>,
    pub regions: Vec<Region>,
}

impl Catalog {
    pub fn from_config(config: &MeshConfig) -> Result<Self> {
        if config.services.is_empty() {
            return Err(ConfigError::EmptyCatalog.into());
        }
        if config.regions.is_empty() {
            return Err(ConfigError::NoRegions.into());
        }

        let mut names = HashSet::new();
        for service in &config.services {
            if service.name == GATEWAY {
                return Err(ConfigError::ReservedServiceName(service.name.clone()).into());
            }
            if !names.insert(service.name.as_str()) {
                return Err(ConfigError::DuplicateService(service.name.clone()).into());
            }
        }

        let mut ids = HashSet::new();
        for region in &config.regions {
            if !ids.insert(region.id.as_str()) {
                return Err(ConfigError::DuplicateRegion(region.id.clone()).into());
            }
        }

        let services = config
            .services
            .iter()
            .map(|s| ServiceSpec::from_config(s, &config.defaults))
            .collect();

        let regions = config
            .regions
            .iter()
            .map(|r| resolve_region(r).at_stage(&r.id, Stage::Catalog))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mesh: config.mesh.clone(),
            settings: SynthSettings::from(&config.defaults),
            services,
            regions,
        })
    }
}

/// Parse the address space and resolve every partition's block
pub fn resolve_region(config: &RegionConfig) -> std::result::Result<Region, ConfigError> {
    let address_space = parse_cidr(&format!("region {}", config.id), &config.address_space)?;

    let zones: Vec<String> = config.partitions.iter().map(|p| p.zone.clone()).collect();
    let needs_carving = config.partitions.iter().any(|p| p.cidr.is_none());
    let carved = if needs_carving {
        carve_partitions(&config.id, address_space, &zones)?
    } else {
        Vec::new()
    };

    let partitions = config
        .partitions
        .iter()
        .enumerate()
        .map(|(i, p)| match &p.cidr {
            Some(cidr) => Ok(Partition {
                zone: p.zone.clone(),
                cidr: parse_cidr(&format!("zone {}", p.zone), cidr)?,
            }),
            None => Ok(carved[i].clone()),
        })
        .collect::<std::result::Result<Vec<_>, ConfigError>>()?;

    Ok(Region {
        id: config.id.clone(),
        address_space,
        partitions,
        discovery_namespace: config
            .discovery_namespace
            .clone()
            .unwrap_or_else(|| format!("{}.local", config.id)),
        routing: config.routing,
    })
}
