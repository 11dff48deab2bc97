//! mesh-synth
//!
//! Synthesizes the multi-region mesh topology from a deployment file.
//!
//! ```bash
//! mesh-synth -c demos/mesh.yaml check
//! mesh-synth -c demos/mesh.yaml plan -o topology.json
//! mesh-synth schema config
//! mesh-synth -c demos/mesh.yaml apply --dry-run
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mesh_api::{DeploymentTopology, MeshConfig};
use mesh_apply::{Applier, InMemoryProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser)]
#[command(name = "mesh-synth")]
#[command(version)]
#[command(about = "Multi-region mesh topology synthesizer", long_about = None)]
struct Cli {
    /// Deployment file
    #[arg(long, short, env = "MESH_CONFIG", default_value = "mesh.yaml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, env = "MESH_LOG_JSON")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize and print the topology as JSON
    Plan {
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Validate the deployment and print a summary
    Check,
    /// Print a JSON schema
    Schema {
        #[arg(value_enum, default_value = "config")]
        target: SchemaTarget,
    },
    /// Apply the topology
    Apply {
        /// Apply against the in-memory provider
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaTarget {
    Config,
    Topology,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Plan { output } => {
            let topology = synthesize(&cli.config).await?;
            let json = topology.to_canonical_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Topology written to {}", path.display());
                }
                None => println!("{}", String::from_utf8(json)?),
            }
        }
        Commands::Check => {
            let topology = synthesize(&cli.config).await?;
            print_summary(&topology)?;
        }
        Commands::Schema { target } => {
            let schema = match target {
                SchemaTarget::Config => schemars::schema_for!(MeshConfig),
                SchemaTarget::Topology => schemars::schema_for!(DeploymentTopology),
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::Apply { dry_run } => {
            if !dry_run {
                bail!("No infrastructure provider is configured; rerun with --dry-run");
            }
            let topology = synthesize(&cli.config).await?;
            let applier = Applier::new(Arc::new(InMemoryProvider::new()));
            let report = applier.apply(&topology).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn synthesize(path: &Path) -> Result<DeploymentTopology> {
    let config = config::load(path)?;
    let topology = mesh_core::synthesize(&config)
        .await
        .with_context(|| format!("Synthesis of {} failed", path.display()))?;
    Ok(topology)
}

fn print_summary(topology: &DeploymentTopology) -> Result<()> {
    println!("zone: {}", topology.mesh.zone_name);
    for regional in &topology.regions {
        let addresses: Vec<String> = regional
            .load_balancer
            .static_addresses()
            .iter()
            .map(ToString::to_string)
            .collect();
        println!(
            "region {} ({}): {} services, {} DNS records, addresses [{}]",
            regional.region.id,
            regional.region.routing.kind(),
            regional.services.len(),
            regional.dns_records.len(),
            addresses.join(", ")
        );
        for built in &regional.services {
            println!(
                "  {} -> port {}, {} -> {}",
                built.service.name,
                built.service.port,
                built.service.hostname,
                built.service.discovery_name
            );
        }
    }
    println!("fingerprint: {}", topology.fingerprint()?);
    Ok(())
}
