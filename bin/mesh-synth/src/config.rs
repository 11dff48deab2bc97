//! Deployment file loading

use anyhow::{Context, Result};
use mesh_api::MeshConfig;
use std::path::Path;
use tracing::debug;

pub fn load(path: &Path) -> Result<MeshConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read deployment file {}", path.display()))?;
    let config = parse(&raw).with_context(|| format!("Invalid deployment file {}", path.display()))?;
    debug!(
        "Loaded {} services and {} regions from {}",
        config.services.len(),
        config.regions.len(),
        path.display()
    );
    Ok(config)
}

pub fn parse(raw: &str) -> Result<MeshConfig> {
    Ok(serde_yaml::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../../../demos/mesh.yaml");

    #[test]
    fn test_parse_demo() {
        let config = parse(DEMO).unwrap();
        assert_eq!(config.mesh.zone_name, "mesh.net");
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[1].replicas, 2);
        assert_eq!(config.regions[1].partitions[2].cidr.as_deref(), Some("10.1.32.0/20"));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load(Path::new("/nonexistent/mesh.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/mesh.yaml"));
    }

    #[tokio::test]
    async fn test_demo_synthesizes() {
        let topology = mesh_core::synthesize(&parse(DEMO).unwrap()).await.unwrap();
        assert_eq!(topology.regions.len(), 2);

        let hnd = topology.region("ap-northeast-1").unwrap();
        assert_eq!(hnd.service("srv1").unwrap().service.port, 3001);
        assert_eq!(hnd.service("srv2").unwrap().service.discovery_name, "srv2.hnd.local");
        assert_eq!(hnd.load_balancer.static_addresses().len(), 3);
    }
}
