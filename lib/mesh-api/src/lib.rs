//! Mesh topology types for the multi-region synthesizer
//!
//! This library defines both sides of the synthesizer:
//! - MeshConfig: the deployment file (regions, service catalog, defaults)
//! - RegionTopology / DeploymentTopology: the synthesized resources handed
//!   to the apply layer (routing nodes, routers, gateway, load balancer,
//!   DNS records and workload parameters)

pub mod config;
pub mod dns;
pub mod gateway;
pub mod load_balancer;
pub mod region;
pub mod service;
pub mod topology;
pub mod workload;

pub use config::{MeshConfig, MeshNamespace, ServiceConfig, RegionConfig};
pub use dns::{DnsRecord, RecordData, RoutingPolicy, RoutingPolicyKind, FailoverRole};
pub use gateway::{Gateway, GatewayRoute, HostnameMatch};
pub use load_balancer::{LoadBalancer, Listener, SubnetMapping, TargetGroup};
pub use region::{AddressPlan, Partition, Region};
pub use service::{HealthProbe, RetryPolicy, Router, RoutingNode, Service, VirtualService};
pub use topology::{DeploymentTopology, RegionTopology, ServiceTopology};
pub use workload::{ContainerSpec, ProxyConfig, WorkloadSpec};
