//! Operator tool for the LINSTOR volume translation layer.
//!
//! Runs the same code paths a CSI driver uses against a live controller:
//! name canonicalization, allocation sizing, parameter translation and
//! volume lookups.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgGroup, Parser, Subcommand};
use liblinstor::config::LogFormat;
use liblinstor::{
    CliClient, DeploymentConfig, HostFilesystem, LinstorConfig, Volume, VolumeAttacher,
    VolumeProvisioner, VolumeQuerier, VolumeStore, logging,
};
use serde::Serialize;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "linstor-csi", version, about = "LINSTOR volume translation layer")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Comma separated LINSTOR controller URIs
    #[arg(long, global = true, value_name = "URIS")]
    controllers: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Turn debug logging on
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive an unused legal resource name from a suggested volume name
    Canonicalize { name: String },
    /// Compute the KiB allocation for a capacity request
    Allocate {
        /// Required bytes
        #[arg(long)]
        required: i64,
        /// Limit in bytes, 0 for unlimited
        #[arg(long, default_value_t = 0)]
        limit: i64,
    },
    /// Print the deployment configuration a volume translates to
    Translate {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_name = "BYTES")]
        size: i64,
        /// Volume parameter (format: KEY=VALUE), can be set multiple times
        #[arg(short, long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
    /// List every volume created by this driver
    List,
    /// Look a volume up by name or ID
    #[command(group(ArgGroup::new("key").required(true).args(["name", "id"])))]
    Get {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    /// Show the device a volume is reachable through on a node
    Assignment {
        #[arg(long)]
        id: String,
        #[arg(long)]
        node: String,
    },
}

fn parse_param(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid parameter {raw:?}, expected KEY=VALUE"))?;
    if key.is_empty() {
        bail!("invalid parameter {raw:?}, empty key");
    }
    Ok((key.to_owned(), value.to_owned()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<LinstorConfig> {
    let mut config =
        LinstorConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(controllers) = &cli.controllers {
        config.controllers = controllers.clone();
    }
    if cli.json_logs {
        config.log.format = LogFormat::Json;
    }
    if cli.debug {
        config.log.debug = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init(&config.log)?;
    debug!(?config, "configuration loaded");

    let store = VolumeStore::new(
        CliClient::from_config(&config),
        HostFilesystem::new(),
        &config,
    )?;

    match cli.command {
        Command::Canonicalize { name } => {
            println!("{}", store.canonicalize_volume_name(&name).await);
        }
        Command::Allocate { required, limit } => {
            let kib = store.allocation_size_kib(required, limit)?;
            println!("{kib}");
        }
        Command::Translate {
            id,
            name,
            size,
            params,
        } => {
            let mut volume = Volume::new(id, name, size);
            for raw in &params {
                let (key, value) = parse_param(raw)?;
                volume.parameters.insert(key, value);
            }
            let cfg: DeploymentConfig = store.deployment_config(&volume)?;
            print_json(&cfg)?;
        }
        Command::List => {
            print_json(&store.list_all().await?)?;
        }
        Command::Get { name, id } => {
            let found = match (name, id) {
                (Some(name), _) => store.get_by_name(&name).await?,
                (None, Some(id)) => store.get_by_id(&id).await?,
                (None, None) => bail!("one of --name or --id is required"),
            };
            match found {
                Some(volume) => print_json(&volume)?,
                None => bail!("volume not found"),
            }
        }
        Command::Assignment { id, node } => {
            let volume = store
                .get_by_id(&id)
                .await?
                .with_context(|| format!("volume {id} not found"))?;
            let assignment = store
                .get_assignment_on_node(&volume, &node)
                .await?
                .with_context(|| format!("volume {id} has no assignment on {node}"))?;
            print_json(&assignment)?;
        }
    }
    Ok(())
}
