//! DNS publisher
//!
//! Two record families per region, both keyed by the region identifier:
//! a wildcard A record on the load balancer's static addresses, and one
//! CNAME per service aliasing its public hostname to the regional
//! discovery name.

use mesh_api::{
    DnsRecord, LoadBalancer, MeshNamespace, RecordData, Region, RoutingPolicy, ServiceTopology,
};
use tracing::{debug, warn};

use crate::error::ConfigError;

pub fn wildcard_name(mesh: &MeshNamespace) -> String {
    format!("*.{}", mesh.zone_name)
}

pub fn publish(
    region: &Region,
    mesh: &MeshNamespace,
    load_balancer: &LoadBalancer,
    services: &[ServiceTopology],
    ttl_seconds: u32,
) -> Result<Vec<DnsRecord>, ConfigError> {
    if region.id.trim().is_empty() {
        return Err(ConfigError::MissingWeightingKey(region.id.clone()));
    }

    let addresses = load_balancer.static_addresses();
    if addresses.is_empty() {
        return Err(ConfigError::NoPartitions(region.id.clone()));
    }

    if let RoutingPolicy::Weighted { weight: 0 } = region.routing {
        warn!("Region {} is drained: published with weight 0", region.id);
    }

    let record = |name: String, data: RecordData| DnsRecord {
        name,
        data,
        ttl_seconds,
        set_identifier: region.id.clone(),
        routing: region.routing,
    };

    let mut records = Vec::with_capacity(services.len() + 1);
    records.push(record(wildcard_name(mesh), RecordData::A { addresses }));
    records.extend(services.iter().map(|built| {
        record(
            built.service.hostname.clone(),
            RecordData::Cname {
                target: built.service.discovery_name.clone(),
            },
        )
    }));

    debug!("Published {} DNS records for region {}", records.len(), region.id);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ServiceSpec, SynthSettings};
    use crate::listeners::wire_load_balancer;
    use crate::service::ServiceBuilder;
    use mesh_api::config::Defaults;
    use mesh_api::{FailoverRole, SubnetMapping};
    use std::net::Ipv4Addr;

    fn mesh() -> MeshNamespace {
        MeshNamespace {
            zone_name: "mesh.net".to_string(),
            hosted_zone_id: None,
        }
    }

    fn region(id: &str, routing: RoutingPolicy) -> Region {
        Region {
            id: id.to_string(),
            address_space: "10.0.0.0/16".parse().unwrap(),
            partitions: vec![],
            discovery_namespace: format!("{}.local", id),
            routing,
        }
    }

    fn load_balancer() -> LoadBalancer {
        let mappings = vec![
            SubnetMapping {
                zone: "a".to_string(),
                cidr: "10.0.0.0/18".parse().unwrap(),
                private_address: Ipv4Addr::new(10, 0, 32, 0),
            },
            SubnetMapping {
                zone: "b".to_string(),
                cidr: "10.0.64.0/18".parse().unwrap(),
                private_address: Ipv4Addr::new(10, 0, 96, 0),
            },
        ];
        wire_load_balancer("east", mappings, 80, &[("orders", 3001)])
    }

    fn services(region: &Region) -> Vec<ServiceTopology> {
        let mesh = mesh();
        let settings = SynthSettings::default();
        let builder = ServiceBuilder::new(region, &mesh, &settings, "lb");
        vec![builder
            .build(&ServiceSpec::new("orders", &Defaults::default()), 3001)
            .unwrap()]
    }

    #[test]
    fn test_wildcard_and_service_records() {
        let east = region("east", RoutingPolicy::default());
        let records = publish(&east, &mesh(), &load_balancer(), &services(&east), 60).unwrap();
        assert_eq!(records.len(), 2);

        let wildcard = &records[0];
        assert!(wildcard.is_wildcard());
        assert_eq!(wildcard.name, "*.mesh.net");
        assert_eq!(
            wildcard.data,
            RecordData::A {
                addresses: vec![Ipv4Addr::new(10, 0, 32, 0), Ipv4Addr::new(10, 0, 96, 0)]
            }
        );
        assert_eq!(wildcard.ttl_seconds, 60);
        assert_eq!(wildcard.routing, RoutingPolicy::Weighted { weight: 1 });

        let orders = &records[1];
        assert_eq!(orders.name, "orders.mesh.net");
        assert_eq!(
            orders.data,
            RecordData::Cname {
                target: "orders.east.local".to_string()
            }
        );

        assert!(records.iter().all(|r| r.set_identifier == "east"));
    }

    #[test]
    fn test_drained_region_keeps_records() {
        let east = region("east", RoutingPolicy::Weighted { weight: 0 });
        let records = publish(&east, &mesh(), &load_balancer(), &services(&east), 60).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.routing == RoutingPolicy::Weighted { weight: 0 }));
    }

    #[test]
    fn test_failover_policy_is_carried() {
        let west = region("west", RoutingPolicy::Failover { role: FailoverRole::Secondary });
        let records = publish(&west, &mesh(), &load_balancer(), &services(&west), 60).unwrap();
        assert!(records.iter().all(|r| r.set_identifier == "west"));
        assert!(records.iter().all(|r| r.routing
            == RoutingPolicy::Failover { role: FailoverRole::Secondary }));
    }

    #[test]
    fn test_set_identifier_is_region_id_verbatim() {
        let padded = region("east ", RoutingPolicy::default());
        let records = publish(&padded, &mesh(), &load_balancer(), &services(&padded), 60).unwrap();
        assert!(records.iter().all(|r| r.set_identifier == "east "));
    }

    #[test]
    fn test_missing_weighting_key() {
        let blank = region("  ", RoutingPolicy::default());
        let err = publish(&blank, &mesh(), &load_balancer(), &[], 60).unwrap_err();
        assert!(matches!(err, ConfigError::MissingWeightingKey(_)));
    }
}
