//! Load balancer and listener wiring
//!
//! One internal network load balancer per region, one listener per service
//! plus one for the gateway. Listener ports never collide: the gateway and the
//! sidecar proxy own fixed ports and services take consecutive ports from the
//! base port unless they pin one explicitly.

use mesh_api::load_balancer::{Scheme, TargetHealthCheck, TargetType, TransportProtocol};
use mesh_api::{HealthProbe, Listener, LoadBalancer, SubnetMapping, TargetGroup};
use std::collections::HashMap;

use crate::catalog::SynthSettings;
use crate::error::ConfigError;

/// Name the gateway uses in listener and target group names
pub const GATEWAY: &str = "gateway";

/// Ports no service may take, with the owner reported on collision
pub fn reserved_ports(settings: &SynthSettings) -> Vec<(u16, &'static str)> {
    vec![
        (settings.gateway.listener_port, GATEWAY),
        (settings.proxy.ingress_port, "proxy-ingress"),
        (settings.proxy.egress_port, "proxy-egress"),
        (settings.proxy.admin_port, "proxy-admin"),
    ]
}

pub fn target_group_name(owner: &str) -> String {
    format!("{}-tg", owner)
}

pub fn listener_name(owner: &str) -> String {
    format!("{}-listener", owner)
}

/// Assign one listener port per service, in catalog order
///
/// `pinned` holds each service's explicit port, if any. Unpinned services get
/// `base_port + index`. `reserved` ports are owned before any service.
pub fn assign_ports(
    services: &[(&str, Option<u16>)],
    base_port: u16,
    reserved: &[(u16, &str)],
) -> Result<Vec<u16>, ConfigError> {
    let mut owners: HashMap<u16, String> = reserved
        .iter()
        .map(|(port, owner)| (*port, owner.to_string()))
        .collect();

    let mut ports = Vec::with_capacity(services.len());
    for (index, (name, pinned)) in services.iter().enumerate() {
        if *name == GATEWAY {
            return Err(ConfigError::ReservedServiceName(name.to_string()));
        }
        let port = match pinned {
            Some(port) => *port as u32,
            None => base_port as u32 + index as u32,
        };
        if port == 0 || port > u16::MAX as u32 {
            return Err(ConfigError::PortOutOfRange {
                service: name.to_string(),
                port,
            });
        }

        let port = port as u16;
        if let Some(owner) = owners.get(&port) {
            return Err(ConfigError::PortCollision {
                port,
                first: owner.clone(),
                second: name.to_string(),
            });
        }
        owners.insert(port, name.to_string());
        ports.push(port);
    }

    Ok(ports)
}

/// Target group with immediate deregistration, health-checked like the node
pub fn target_group(owner: &str, port: u16, probe: &HealthProbe) -> TargetGroup {
    TargetGroup {
        name: target_group_name(owner),
        port,
        protocol: TransportProtocol::Tcp,
        target_type: TargetType::Ip,
        deregistration_delay_seconds: 0,
        health_check: TargetHealthCheck {
            protocol: TransportProtocol::Tcp,
            interval_seconds: probe.interval_seconds,
            healthy_threshold: probe.healthy_threshold,
            unhealthy_threshold: probe.unhealthy_threshold,
        },
    }
}

/// Wire the regional load balancer: gateway listener first, then services
pub fn wire_load_balancer(
    region: &str,
    subnet_mappings: Vec<SubnetMapping>,
    gateway_port: u16,
    services: &[(&str, u16)],
) -> LoadBalancer {
    let mut listeners = Vec::with_capacity(services.len() + 1);
    listeners.push(Listener {
        name: listener_name(GATEWAY),
        port: gateway_port,
        protocol: TransportProtocol::Tcp,
        target_group: target_group_name(GATEWAY),
    });
    listeners.extend(services.iter().map(|(name, port)| Listener {
        name: listener_name(name),
        port: *port,
        protocol: TransportProtocol::Tcp,
        target_group: target_group_name(name),
    }));

    LoadBalancer {
        name: format!("{}-mesh-endpoints", region),
        scheme: Scheme::Internal,
        subnet_mappings,
        listeners,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const GATEWAY_ONLY: &[(u16, &str)] = &[(80, GATEWAY)];

    #[test]
    fn test_consecutive_ports_from_base() {
        let ports = assign_ports(&[("orders", None), ("billing", None)], 3000, GATEWAY_ONLY).unwrap();
        assert_eq!(ports, vec![3000, 3001]);
    }

    #[test]
    fn test_pinned_port_collides_with_assigned() {
        let err = assign_ports(&[("orders", None), ("billing", Some(3000))], 3000, GATEWAY_ONLY).unwrap_err();
        assert_eq!(
            err,
            ConfigError::PortCollision {
                port: 3000,
                first: "orders".to_string(),
                second: "billing".to_string(),
            }
        );
    }

    #[test]
    fn test_service_port_collides_with_gateway() {
        let err = assign_ports(&[("orders", None), ("billing", None)], 79, GATEWAY_ONLY).unwrap_err();
        assert!(matches!(err, ConfigError::PortCollision { port: 80, .. }));
        assert_eq!(err.offending_service(), Some("billing"));
    }

    #[test]
    fn test_port_overflow() {
        let err = assign_ports(&[("orders", None), ("billing", None)], u16::MAX, GATEWAY_ONLY).unwrap_err();
        assert_eq!(
            err,
            ConfigError::PortOutOfRange {
                service: "billing".to_string(),
                port: 65536,
            }
        );
    }

    #[test]
    fn test_zero_port_rejected() {
        let err = assign_ports(&[("orders", Some(0))], 3000, GATEWAY_ONLY).unwrap_err();
        assert!(matches!(err, ConfigError::PortOutOfRange { port: 0, .. }));
    }

    #[test]
    fn test_service_port_collides_with_sidecar_proxy() {
        let reserved = reserved_ports(&SynthSettings {
            base_port: 15000,
            ..SynthSettings::default()
        });
        let err = assign_ports(&[("orders", None)], 15000, &reserved).unwrap_err();
        assert_eq!(
            err,
            ConfigError::PortCollision {
                port: 15000,
                first: "proxy-ingress".to_string(),
                second: "orders".to_string(),
            }
        );

        let err = assign_ports(&[("orders", Some(9901))], 3000, &reserved).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::PortCollision { port: 9901, ref first, .. } if first == "proxy-admin"
        ));
    }

    #[test]
    fn test_reserved_ports_follow_settings() {
        let reserved = reserved_ports(&SynthSettings::default());
        let ports: Vec<u16> = reserved.iter().map(|(port, _)| *port).collect();
        assert_eq!(ports, vec![80, 15000, 15001, 9901]);
    }

    #[test]
    fn test_gateway_service_name_rejected() {
        let err = assign_ports(&[("gateway", None), ("orders", None)], 3000, GATEWAY_ONLY)
            .unwrap_err();
        assert_eq!(err, ConfigError::ReservedServiceName("gateway".to_string()));
        assert_eq!(err.offending_service(), Some("gateway"));
    }

    #[test]
    fn test_target_group_drains_immediately() {
        let tg = target_group("orders", 3000, &HealthProbe::default());
        assert_eq!(tg.name, "orders-tg");
        assert_eq!(tg.deregistration_delay_seconds, 0);
        assert_eq!(tg.health_check.healthy_threshold, 3);
    }

    #[test]
    fn test_wire_load_balancer() {
        let lb = wire_load_balancer("east", vec![], 80, &[("orders", 3000), ("billing", 3001)]);
        assert_eq!(lb.scheme, Scheme::Internal);
        assert_eq!(lb.listeners.len(), 3);
        assert_eq!(lb.listener_on(80).unwrap().target_group, "gateway-tg");
        assert_eq!(lb.listener_on(3001).unwrap().target_group, "billing-tg");
    }

    proptest! {
        #[test]
        fn prop_assigned_ports_are_distinct(
            base in 1u16..60000,
            count in 1usize..32,
            gateway in 1u16..=u16::MAX,
        ) {
            let names: Vec<String> = (0..count).map(|i| format!("svc{}", i)).collect();
            let services: Vec<(&str, Option<u16>)> =
                names.iter().map(|n| (n.as_str(), None)).collect();

            match assign_ports(&services, base, &[(gateway, GATEWAY)]) {
                Ok(ports) => {
                    let distinct: HashSet<u16> = ports.iter().copied().collect();
                    prop_assert_eq!(distinct.len(), count);
                    prop_assert!(!distinct.contains(&gateway));
                }
                Err(ConfigError::PortCollision { port, .. }) => prop_assert_eq!(port, gateway),
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }
        }
    }
}
