//! Deterministic static address allocation for regional load balancers
//!
//! Addresses are a pure function of each partition's block: the block is
//! split into `subdivisions` equal sub-blocks and the first address of the
//! designated sub-block is taken. Nothing is persisted between runs.

use ipnetwork::Ipv4Network;
use mesh_api::{AddressPlan, Partition, Region, SubnetMapping};
use std::net::Ipv4Addr;
use tracing::debug;

use crate::error::ConfigError;

/// Smallest partition (prefix length) carved out of an address space
const MAX_PARTITION_PREFIX: u8 = 28;

/// Parse an IPv4 CIDR and normalise it to its network address
pub fn parse_cidr(subject: &str, value: &str) -> Result<Ipv4Network, ConfigError> {
    let network: Ipv4Network = value.parse().map_err(|e: ipnetwork::IpNetworkError| {
        ConfigError::InvalidCidr {
            subject: subject.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ipv4Network::new(network.network(), network.prefix()).map_err(|e| ConfigError::InvalidCidr {
        subject: subject.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Split an address space into equal partitions, one per zone, in zone order
pub fn carve_partitions(
    region: &str,
    address_space: Ipv4Network,
    zones: &[String],
) -> Result<Vec<Partition>, ConfigError> {
    if zones.is_empty() {
        return Err(ConfigError::NoPartitions(region.to_string()));
    }

    let blocks = zones.len().next_power_of_two() as u32;
    let prefix = address_space.prefix() as u32 + blocks.trailing_zeros();
    if prefix > MAX_PARTITION_PREFIX as u32 {
        return Err(ConfigError::AddressSpaceTooSmall {
            subject: format!("region {}", region),
            cidr: address_space.to_string(),
            blocks,
        });
    }

    let size = 1u64 << (32 - prefix);
    let base = u32::from(address_space.network()) as u64;

    zones
        .iter()
        .enumerate()
        .map(|(i, zone)| {
            let network = Ipv4Addr::from((base + i as u64 * size) as u32);
            let cidr = Ipv4Network::new(network, prefix as u8).map_err(|e| {
                ConfigError::InvalidCidr {
                    subject: format!("zone {}", zone),
                    value: format!("{}/{}", network, prefix),
                    reason: e.to_string(),
                }
            })?;
            Ok(Partition {
                zone: zone.clone(),
                cidr,
            })
        })
        .collect()
}

/// Allocates one static address per partition of a region
#[derive(Clone, Debug)]
pub struct AddressAllocator {
    plan: AddressPlan,
    bits: u32,
}

impl AddressAllocator {
    pub fn new(plan: AddressPlan) -> Result<Self, ConfigError> {
        if plan.subdivisions < 2 || !plan.subdivisions.is_power_of_two() {
            return Err(ConfigError::InvalidAddressPlan(format!(
                "subdivisions must be a power of two of at least 2, got {}",
                plan.subdivisions
            )));
        }
        if plan.sub_block_index >= plan.subdivisions {
            return Err(ConfigError::InvalidAddressPlan(format!(
                "sub-block index {} is outside {} sub-blocks",
                plan.sub_block_index, plan.subdivisions
            )));
        }

        Ok(Self {
            plan,
            bits: plan.subdivisions.trailing_zeros(),
        })
    }

    /// Static address for a single partition
    pub fn address_for(&self, partition: &Partition) -> Result<Ipv4Addr, ConfigError> {
        let sub_prefix = partition.cidr.prefix() as u32 + self.bits;
        if sub_prefix > 31 {
            return Err(ConfigError::AddressSpaceTooSmall {
                subject: format!("partition {}", partition.zone),
                cidr: partition.cidr.to_string(),
                blocks: self.plan.subdivisions,
            });
        }

        let size = 1u64 << (32 - sub_prefix);
        let base = u32::from(partition.cidr.network()) as u64;
        let mut address = base + self.plan.sub_block_index as u64 * size;
        // the partition's own network address is never assignable
        if self.plan.sub_block_index == 0 {
            address += 1;
        }

        Ok(Ipv4Addr::from(address as u32))
    }

    /// One subnet mapping per partition, in partition order
    pub fn allocate(&self, region: &Region) -> Result<Vec<SubnetMapping>, ConfigError> {
        if region.partitions.is_empty() {
            return Err(ConfigError::NoPartitions(region.id.clone()));
        }

        for partition in &region.partitions {
            if !contains_block(&region.address_space, &partition.cidr) {
                return Err(ConfigError::PartitionOutsideAddressSpace {
                    zone: partition.zone.clone(),
                    cidr: partition.cidr.to_string(),
                    address_space: region.address_space.to_string(),
                });
            }
        }

        for (i, first) in region.partitions.iter().enumerate() {
            for second in &region.partitions[i + 1..] {
                if overlaps(&first.cidr, &second.cidr) {
                    return Err(ConfigError::OverlappingPartitions {
                        first: format!("{} ({})", first.zone, first.cidr),
                        second: format!("{} ({})", second.zone, second.cidr),
                    });
                }
            }
        }

        region
            .partitions
            .iter()
            .map(|partition| {
                let address = self.address_for(partition)?;
                debug!(
                    "Allocated {} in partition {} ({}) of region {}",
                    address, partition.zone, partition.cidr, region.id
                );
                Ok(SubnetMapping {
                    zone: partition.zone.clone(),
                    cidr: partition.cidr,
                    private_address: address,
                })
            })
            .collect()
    }
}

fn contains_block(outer: &Ipv4Network, inner: &Ipv4Network) -> bool {
    inner.prefix() >= outer.prefix()
        && outer.contains(inner.network())
        && outer.contains(inner.broadcast())
}

fn overlaps(a: &Ipv4Network, b: &Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_api::RoutingPolicy;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn net(s: &str) -> Ipv4Network {
        parse_cidr("test", s).unwrap()
    }

    fn region(space: &str, partitions: &[(&str, &str)]) -> Region {
        Region {
            id: "east".to_string(),
            address_space: net(space),
            partitions: partitions
                .iter()
                .map(|(zone, cidr)| Partition {
                    zone: zone.to_string(),
                    cidr: net(cidr),
                })
                .collect(),
            discovery_namespace: "east.local".to_string(),
            routing: RoutingPolicy::default(),
        }
    }

    fn zones(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("zone-{}", i)).collect()
    }

    #[test]
    fn test_parse_cidr_normalises_host_bits() {
        assert_eq!(net("10.0.1.7/24").to_string(), "10.0.1.0/24");
        assert!(matches!(
            parse_cidr("east", "10.0.0.0/33"),
            Err(ConfigError::InvalidCidr { .. })
        ));
        assert!(parse_cidr("east", "fd00::/64").is_err());
    }

    #[test]
    fn test_three_partitions_in_east() {
        let space = net("10.0.0.0/16");
        let partitions = carve_partitions("east", space, &zones(3)).unwrap();
        let cidrs: Vec<String> = partitions.iter().map(|p| p.cidr.to_string()).collect();
        assert_eq!(cidrs, vec!["10.0.0.0/18", "10.0.64.0/18", "10.0.128.0/18"]);

        let mut east = region("10.0.0.0/16", &[]);
        east.partitions = partitions;
        let allocator = AddressAllocator::new(AddressPlan::default()).unwrap();
        let addresses: Vec<Ipv4Addr> = allocator
            .allocate(&east)
            .unwrap()
            .iter()
            .map(|m| m.private_address)
            .collect();

        assert_eq!(
            addresses,
            vec![
                Ipv4Addr::new(10, 0, 32, 0),
                Ipv4Addr::new(10, 0, 96, 0),
                Ipv4Addr::new(10, 0, 160, 0),
            ]
        );
    }

    #[test]
    fn test_first_sub_block_skips_network_address() {
        let plan = AddressPlan { subdivisions: 4, sub_block_index: 0 };
        let allocator = AddressAllocator::new(plan).unwrap();
        let partition = Partition { zone: "a".to_string(), cidr: net("10.0.0.0/24") };
        assert_eq!(allocator.address_for(&partition).unwrap(), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn test_allocation_is_stable() {
        let east = region("10.0.0.0/16", &[("a", "10.0.0.0/20"), ("b", "10.0.16.0/20")]);
        let allocator = AddressAllocator::new(AddressPlan::default()).unwrap();
        assert_eq!(allocator.allocate(&east).unwrap(), allocator.allocate(&east).unwrap());
    }

    #[test]
    fn test_partition_too_small() {
        let east = region("10.0.0.0/16", &[("a", "10.0.0.0/32")]);
        let allocator = AddressAllocator::new(AddressPlan::default()).unwrap();
        assert!(matches!(
            allocator.allocate(&east),
            Err(ConfigError::AddressSpaceTooSmall { .. })
        ));
    }

    #[test]
    fn test_address_space_too_small_to_carve() {
        let space = net("10.0.0.0/27");
        assert!(matches!(
            carve_partitions("east", space, &zones(3)),
            Err(ConfigError::AddressSpaceTooSmall { .. })
        ));
    }

    #[test]
    fn test_partition_outside_address_space() {
        let east = region("10.0.0.0/16", &[("a", "10.1.0.0/20")]);
        let allocator = AddressAllocator::new(AddressPlan::default()).unwrap();
        assert!(matches!(
            allocator.allocate(&east),
            Err(ConfigError::PartitionOutsideAddressSpace { .. })
        ));
    }

    #[test]
    fn test_overlapping_partitions() {
        let east = region("10.0.0.0/16", &[("a", "10.0.0.0/20"), ("b", "10.0.8.0/21")]);
        let allocator = AddressAllocator::new(AddressPlan::default()).unwrap();
        assert!(matches!(
            allocator.allocate(&east),
            Err(ConfigError::OverlappingPartitions { .. })
        ));
    }

    #[test]
    fn test_no_partitions() {
        let east = region("10.0.0.0/16", &[]);
        let allocator = AddressAllocator::new(AddressPlan::default()).unwrap();
        assert_eq!(
            allocator.allocate(&east),
            Err(ConfigError::NoPartitions("east".to_string()))
        );
    }

    #[test]
    fn test_invalid_plans() {
        assert!(AddressAllocator::new(AddressPlan { subdivisions: 3, sub_block_index: 1 }).is_err());
        assert!(AddressAllocator::new(AddressPlan { subdivisions: 1, sub_block_index: 0 }).is_err());
        assert!(AddressAllocator::new(AddressPlan { subdivisions: 4, sub_block_index: 4 }).is_err());
    }

    proptest! {
        #[test]
        fn prop_one_distinct_address_per_partition(
            base in any::<u32>(),
            prefix in 8u8..=24,
            count in 1usize..=8,
            subdivisions in prop_oneof![Just(2u32), Just(4), Just(8)],
            index_seed in any::<u32>(),
        ) {
            let space = Ipv4Network::new(Ipv4Addr::from(base), prefix).unwrap();
            let space = Ipv4Network::new(space.network(), prefix).unwrap();
            let partitions = carve_partitions("east", space, &zones(count)).unwrap();

            let plan = AddressPlan { subdivisions, sub_block_index: index_seed % subdivisions };
            let allocator = AddressAllocator::new(plan).unwrap();
            let mut east = region("10.0.0.0/16", &[]);
            east.address_space = space;
            east.partitions = partitions;

            let mappings = allocator.allocate(&east).unwrap();
            prop_assert_eq!(mappings.len(), count);

            let distinct: HashSet<Ipv4Addr> = mappings.iter().map(|m| m.private_address).collect();
            prop_assert_eq!(distinct.len(), count);

            for (mapping, partition) in mappings.iter().zip(&east.partitions) {
                prop_assert!(partition.cidr.contains(mapping.private_address));
                prop_assert!(mapping.private_address != partition.cidr.network());
            }
        }

        #[test]
        fn prop_address_is_pure_function_of_block(
            base in any::<u32>(),
            prefix in 0u8..=32,
        ) {
            let cidr = Ipv4Network::new(Ipv4Addr::from(base), prefix).unwrap();
            let partition = Partition { zone: "a".to_string(), cidr };
            let allocator = AddressAllocator::new(AddressPlan::default()).unwrap();
            match allocator.address_for(&partition) {
                Ok(address) => {
                    prop_assert!(cidr.contains(address));
                    prop_assert_eq!(Ok(address), allocator.address_for(&partition));
                }
                Err(e) => {
                    let is_too_small = matches!(e, ConfigError::AddressSpaceTooSmall { .. });
                    prop_assert!(is_too_small);
                    prop_assert!(prefix > 30);
                }
            }
        }
    }
}
