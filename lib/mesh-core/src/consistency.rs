//! Cross-region checks over the merged topology
//!
//! Records with the same name across regions form one family. A family must
//! agree on record type and routing-policy kind, use every set identifier
//! once, and name at most one primary and one secondary when failing over.

use mesh_api::{DeploymentTopology, DnsRecord, FailoverRole, RoutingPolicy};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use crate::error::ConsistencyError;

struct Member<'a> {
    region: &'a str,
    record: &'a DnsRecord,
}

pub fn check(topology: &DeploymentTopology) -> Result<(), ConsistencyError> {
    let mut families: BTreeMap<&str, Vec<Member<'_>>> = BTreeMap::new();

    for regional in &topology.regions {
        let region = regional.region.id.as_str();
        for record in &regional.dns_records {
            if record.set_identifier != region {
                return Err(ConsistencyError::SetIdentifierMismatch {
                    record: record.name.clone(),
                    region: region.to_string(),
                    set_identifier: record.set_identifier.clone(),
                });
            }
            families
                .entry(record.name.as_str())
                .or_default()
                .push(Member { region, record });
        }
    }

    for (name, members) in &families {
        check_family(name, members)?;
    }

    debug!("Checked {} record families", families.len());
    Ok(())
}

fn check_family(name: &str, members: &[Member<'_>]) -> Result<(), ConsistencyError> {
    let Some(first) = members.first() else {
        return Ok(());
    };

    let mut set_identifiers = HashSet::new();
    let mut roles: HashMap<FailoverRole, &str> = HashMap::new();

    for member in members {
        let record = member.record;

        if record.data.record_type() != first.record.data.record_type() {
            return Err(ConsistencyError::MixedRecordTypes {
                record: name.to_string(),
                first_region: first.region.to_string(),
                first_type: first.record.data.record_type().to_string(),
                second_region: member.region.to_string(),
                second_type: record.data.record_type().to_string(),
            });
        }

        if record.routing.kind() != first.record.routing.kind() {
            return Err(ConsistencyError::MixedRoutingPolicies {
                record: name.to_string(),
                first_region: first.region.to_string(),
                first_kind: first.record.routing.kind(),
                second_region: member.region.to_string(),
                second_kind: record.routing.kind(),
            });
        }

        if !set_identifiers.insert(record.set_identifier.as_str()) {
            return Err(ConsistencyError::DuplicateSetIdentifier {
                record: name.to_string(),
                set_identifier: record.set_identifier.clone(),
            });
        }

        if let RoutingPolicy::Failover { role } = record.routing {
            if let Some(previous) = roles.insert(role, member.region) {
                return Err(ConsistencyError::DuplicateFailoverRole {
                    record: name.to_string(),
                    role,
                    first_region: previous.to_string(),
                    second_region: member.region.to_string(),
                });
            }
        }
    }

    let drained = members
        .iter()
        .all(|m| matches!(m.record.routing, RoutingPolicy::Weighted { weight: 0 }));
    if drained {
        warn!("Every region of record {} has weight 0; resolution will fail", name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_api::dns::RecordData;
    use mesh_api::gateway::GatewayListener;
    use mesh_api::load_balancer::Scheme;
    use mesh_api::service::Protocol;
    use mesh_api::{
        Gateway, HealthProbe, LoadBalancer, MeshNamespace, Region, RegionTopology, WorkloadSpec,
    };
    use std::net::Ipv4Addr;

    use crate::listeners::target_group;

    fn record(name: &str, region: &str, routing: RoutingPolicy) -> DnsRecord {
        DnsRecord {
            name: name.to_string(),
            data: RecordData::A {
                addresses: vec![Ipv4Addr::new(10, 0, 32, 0)],
            },
            ttl_seconds: 60,
            set_identifier: region.to_string(),
            routing,
        }
    }

    fn regional(id: &str, records: Vec<DnsRecord>) -> RegionTopology {
        let routing = records.first().map(|r| r.routing).unwrap_or_default();
        RegionTopology {
            region: Region {
                id: id.to_string(),
                address_space: "10.0.0.0/16".parse().unwrap(),
                partitions: vec![],
                discovery_namespace: format!("{}.local", id),
                routing,
            },
            load_balancer: LoadBalancer {
                name: format!("{}-mesh-endpoints", id),
                scheme: Scheme::Internal,
                subnet_mappings: vec![],
                listeners: vec![],
            },
            gateway: Gateway {
                name: "gateway".to_string(),
                region: id.to_string(),
                listener: GatewayListener {
                    port: 9080,
                    protocol: Protocol::Http,
                },
                access_log_path: "/dev/stdout".to_string(),
                routes: vec![],
            },
            gateway_target_group: target_group("gateway", 9080, &HealthProbe::default()),
            gateway_workload: WorkloadSpec {
                name: "gateway".to_string(),
                desired_count: 1,
                containers: vec![],
                ingress_port: 9080,
                proxy: None,
            },
            services: vec![],
            dns_records: records,
            private_endpoints: vec![],
        }
    }

    fn deployment(regions: Vec<RegionTopology>) -> DeploymentTopology {
        DeploymentTopology {
            mesh: MeshNamespace {
                zone_name: "mesh.net".to_string(),
                hosted_zone_id: None,
            },
            regions,
        }
    }

    #[test]
    fn test_weighted_regions_are_consistent() {
        let weighted = RoutingPolicy::Weighted { weight: 1 };
        let topology = deployment(vec![
            regional("east", vec![record("*.mesh.net", "east", weighted)]),
            regional("west", vec![record("*.mesh.net", "west", weighted)]),
        ]);
        assert!(check(&topology).is_ok());
    }

    #[test]
    fn test_weighted_and_failover_mix_is_rejected() {
        let topology = deployment(vec![
            regional(
                "east",
                vec![record("*.mesh.net", "east", RoutingPolicy::Weighted { weight: 1 })],
            ),
            regional(
                "west",
                vec![record(
                    "*.mesh.net",
                    "west",
                    RoutingPolicy::Failover {
                        role: FailoverRole::Secondary,
                    },
                )],
            ),
        ]);

        let err = check(&topology).unwrap_err();
        assert!(matches!(
            err,
            ConsistencyError::MixedRoutingPolicies { ref first_region, ref second_region, .. }
                if first_region == "east" && second_region == "west"
        ));
    }

    #[test]
    fn test_primary_and_secondary_are_consistent() {
        let topology = deployment(vec![
            regional(
                "east",
                vec![record(
                    "*.mesh.net",
                    "east",
                    RoutingPolicy::Failover { role: FailoverRole::Primary },
                )],
            ),
            regional(
                "west",
                vec![record(
                    "*.mesh.net",
                    "west",
                    RoutingPolicy::Failover { role: FailoverRole::Secondary },
                )],
            ),
        ]);
        assert!(check(&topology).is_ok());
    }

    #[test]
    fn test_two_primaries_are_rejected() {
        let primary = RoutingPolicy::Failover { role: FailoverRole::Primary };
        let topology = deployment(vec![
            regional("east", vec![record("*.mesh.net", "east", primary)]),
            regional("west", vec![record("*.mesh.net", "west", primary)]),
        ]);

        assert_eq!(
            check(&topology).unwrap_err(),
            ConsistencyError::DuplicateFailoverRole {
                record: "*.mesh.net".to_string(),
                role: FailoverRole::Primary,
                first_region: "east".to_string(),
                second_region: "west".to_string(),
            }
        );
    }

    #[test]
    fn test_set_identifier_must_match_region() {
        let topology = deployment(vec![regional(
            "east",
            vec![record("*.mesh.net", "west", RoutingPolicy::default())],
        )]);
        assert!(matches!(
            check(&topology),
            Err(ConsistencyError::SetIdentifierMismatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_set_identifier() {
        let weighted = RoutingPolicy::default();
        let topology = deployment(vec![regional(
            "east",
            vec![
                record("*.mesh.net", "east", weighted),
                record("*.mesh.net", "east", weighted),
            ],
        )]);
        assert!(matches!(
            check(&topology),
            Err(ConsistencyError::DuplicateSetIdentifier { .. })
        ));
    }

    #[test]
    fn test_mixed_record_types() {
        let weighted = RoutingPolicy::default();
        let mut alias = record("orders.mesh.net", "west", weighted);
        alias.data = RecordData::Cname {
            target: "orders.west.local".to_string(),
        };
        let topology = deployment(vec![
            regional("east", vec![record("orders.mesh.net", "east", weighted)]),
            regional("west", vec![alias]),
        ]);
        assert!(matches!(
            check(&topology),
            Err(ConsistencyError::MixedRecordTypes { .. })
        ));
    }

    #[test]
    fn test_fully_drained_family_is_only_a_warning() {
        let drained = RoutingPolicy::Weighted { weight: 0 };
        let topology = deployment(vec![
            regional("east", vec![record("*.mesh.net", "east", drained)]),
            regional("west", vec![record("*.mesh.net", "west", drained)]),
        ]);
        assert!(check(&topology).is_ok());
    }
}
