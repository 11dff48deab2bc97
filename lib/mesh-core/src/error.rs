use mesh_api::{FailoverRole, RoutingPolicyKind};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SynthError>;

/// Invalid input detected while synthesizing a region. Always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid CIDR `{value}` for {subject}: {reason}")]
    InvalidCidr {
        subject: String,
        value: String,
        reason: String,
    },

    #[error("Address space too small: {subject} ({cidr}) cannot be split into {blocks} blocks")]
    AddressSpaceTooSmall {
        subject: String,
        cidr: String,
        blocks: u32,
    },

    #[error("Partition {zone} ({cidr}) lies outside address space {address_space}")]
    PartitionOutsideAddressSpace {
        zone: String,
        cidr: String,
        address_space: String,
    },

    #[error("Partitions {first} and {second} overlap")]
    OverlappingPartitions { first: String, second: String },

    #[error("Region {0} has no network partitions")]
    NoPartitions(String),

    #[error("Invalid address plan: {0}")]
    InvalidAddressPlan(String),

    #[error("Service catalog is empty")]
    EmptyCatalog,

    #[error("No regions configured")]
    NoRegions,

    #[error("Duplicate region: {0}")]
    DuplicateRegion(String),

    #[error("Duplicate service name: {0}")]
    DuplicateService(String),

    #[error("Service name `{0}` is reserved for the regional gateway")]
    ReservedServiceName(String),

    #[error("Duplicate hostname {hostname} claimed by services {first} and {second}")]
    DuplicateHostname {
        hostname: String,
        first: String,
        second: String,
    },

    #[error("Port {port} of {second} collides with {first}")]
    PortCollision {
        port: u16,
        first: String,
        second: String,
    },

    #[error("Port {port} for service {service} is out of range")]
    PortOutOfRange { service: String, port: u32 },

    #[error("Hostname {hostname} of service {service} is outside zone {zone}")]
    HostnameOutsideZone {
        service: String,
        hostname: String,
        zone: String,
    },

    #[error("Missing weighting key for region `{0}`")]
    MissingWeightingKey(String),

    #[error("Invalid retry policy for service {service}: {reason}")]
    InvalidRetryPolicy { service: String, reason: String },

    #[error("Invalid health check for service {service}: {reason}")]
    InvalidHealthCheck { service: String, reason: String },
}

impl ConfigError {
    /// The service the error is about, when there is one
    pub fn offending_service(&self) -> Option<&str> {
        match self {
            ConfigError::DuplicateService(service) | ConfigError::ReservedServiceName(service) => {
                Some(service)
            }
            ConfigError::DuplicateHostname { second, .. } => Some(second),
            ConfigError::PortCollision { second, .. } => Some(second),
            ConfigError::PortOutOfRange { service, .. }
            | ConfigError::HostnameOutsideZone { service, .. }
            | ConfigError::InvalidRetryPolicy { service, .. }
            | ConfigError::InvalidHealthCheck { service, .. } => Some(service),
            _ => None,
        }
    }
}

/// Cross-region violation found in the merged topology, before any apply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("Record {record} uses {first_kind} routing in {first_region} but {second_kind} in {second_region}")]
    MixedRoutingPolicies {
        record: String,
        first_region: String,
        first_kind: RoutingPolicyKind,
        second_region: String,
        second_kind: RoutingPolicyKind,
    },

    #[error("Record {record} is an {first_type} record in {first_region} but {second_type} in {second_region}")]
    MixedRecordTypes {
        record: String,
        first_region: String,
        first_type: String,
        second_region: String,
        second_type: String,
    },

    #[error("Record {record} carries set identifier {set_identifier} in region {region}")]
    SetIdentifierMismatch {
        record: String,
        region: String,
        set_identifier: String,
    },

    #[error("Record {record} has duplicate set identifier {set_identifier}")]
    DuplicateSetIdentifier { record: String, set_identifier: String },

    #[error("Record {record} has more than one {role} region: {first_region} and {second_region}")]
    DuplicateFailoverRole {
        record: String,
        role: FailoverRole,
        first_region: String,
        second_region: String,
    },
}

/// Pipeline stage of a regional synthesis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Catalog,
    Allocate,
    WireLoadBalancer,
    BuildServices,
    BuildGateway,
    PublishDns,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Catalog => "catalog",
            Stage::Allocate => "allocate",
            Stage::WireLoadBalancer => "wire-load-balancer",
            Stage::BuildServices => "build-services",
            Stage::BuildGateway => "build-gateway",
            Stage::PublishDns => "publish-dns",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Region {region}: stage {stage} failed{}: {source}", service_suffix(.service))]
    Stage {
        region: String,
        stage: Stage,
        service: Option<String>,
        #[source]
        source: ConfigError,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SynthError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SynthError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn config_error(&self) -> Option<&ConfigError> {
        match self {
            SynthError::Stage { source, .. } | SynthError::Config(source) => Some(source),
            _ => None,
        }
    }
}

fn service_suffix(service: &Option<String>) -> String {
    match service {
        Some(service) => format!(" for service {}", service),
        None => String::new(),
    }
}

/// Attach region and stage to a stage-local error
pub(crate) trait StageContext<T> {
    fn at_stage(self, region: &str, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for std::result::Result<T, ConfigError> {
    fn at_stage(self, region: &str, stage: Stage) -> Result<T> {
        self.map_err(|source| SynthError::Stage {
            region: region.to_string(),
            stage,
            service: source.offending_service().map(str::to_string),
            source,
        })
    }
}
