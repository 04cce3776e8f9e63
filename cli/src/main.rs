use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use clap::{Args, Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;
use log::{debug, error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use fleet_rs::api::inventory::{
    resource_name, Asset, AssetInfo, AssetType, Location, Rack, Zone, ASSET_COLLECTION,
    RACK_COLLECTION,
};
use fleet_rs::config::FleetConfig;
use fleet_rs::deploy::{session_tag, session_url, DeployDispatcher, DeployParams, TaskName};
use fleet_rs::dut::DutArgs;
use fleet_rs::inventory::InventoryClient;
use fleet_rs::prpc::PrpcClient;

mod auth;
mod config;

#[derive(Parser, Debug)]
#[command(
    name = "fleet",
    version,
    author = "Lab Fleet Developers <lab-fleet-dev@chromium.org>",
    about = "Lab Fleet CLI",
    long_about = "A command-line interface for the lab fleet inventory and for dispatching deploy and repair jobs."
)]
struct Cli {
    /// Sets a custom config file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Inventory namespace, overriding the configured one
    #[arg(short = 'n', long = "namespace", value_name = "NS")]
    namespace: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a bearer token for later invocations
    Login {
        token: String,
    },
    Get {
        #[command(subcommand)]
        get_command: GetCommands,
    },
    Add {
        #[command(subcommand)]
        add_command: AddCommands,
    },
    Update {
        #[command(subcommand)]
        update_command: UpdateCommands,
    },
    /// Schedule deploy jobs
    Deploy {
        #[command(subcommand)]
        job_command: JobCommands,
    },
    /// Schedule repair jobs
    Repair {
        #[command(subcommand)]
        job_command: JobCommands,
    },
}

/// Print an entity as JSON. Nothing is printed if it does not exist.
#[derive(Subcommand, Debug)]
enum GetCommands {
    Rack { name: String },
    Asset { name: String },
    Dut { name: String },
}

#[derive(Subcommand, Debug)]
enum AddCommands {
    Rack {
        #[arg(long)]
        name: String,
        #[arg(long)]
        zone: String,
        #[arg(long, default_value = "")]
        realm: String,
    },
    Asset {
        #[arg(long)]
        name: String,
        #[arg(long)]
        rack: String,
        #[arg(long)]
        zone: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        board: String,
        #[arg(long = "type", default_value = "dut")]
        kind: String,
    },
    Dut(DutArgs),
}

#[derive(Subcommand, Debug)]
enum UpdateCommands {
    /// Update the given fields of an existing DUT
    Dut(DutArgs),
}

#[derive(Subcommand, Debug)]
enum JobCommands {
    Dut(JobArgs),
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Hostnames of the DUTs
    #[arg(required = true)]
    names: Vec<String>,

    /// Comma-separated key:value tags added to every job
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Recipe configuration file, forwarded base64-encoded
    #[arg(long, value_name = "FILE")]
    configuration: Option<PathBuf>,

    /// Job priority, overriding the configured one
    #[arg(long)]
    priority: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        Builder::new().filter(None, LevelFilter::Debug).init();
    } else {
        Builder::new().filter(None, LevelFilter::Info).init();
    }

    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(namespace) = cli.namespace {
        config.inventory.namespace = namespace;
    }

    match cli.command {
        // fleet login <TOKEN>
        Commands::Login { token } => {
            let path = auth::save_token(&token)?;
            println!("Token saved to {}", path.display());
        }

        // fleet get rack|asset|dut <NAME>
        Commands::Get { get_command } => {
            let client = inventory_client(&config)?;
            match get_command {
                GetCommands::Rack { name } => print_entity(client.get_rack(&name).await?)?,
                GetCommands::Asset { name } => print_entity(client.get_asset(&name).await?)?,
                GetCommands::Dut { name } => {
                    print_entity(client.get_machine_lse(&name).await?)?
                }
            }
        }

        // fleet add rack|asset|dut ...
        Commands::Add { add_command } => {
            let client = inventory_client(&config)?;
            match add_command {
                AddCommands::Rack { name, zone, realm } => {
                    let zone: Zone = zone.parse()?;
                    info!("Adding rack {name} in zone {zone}");
                    let rack = Rack {
                        name: resource_name(RACK_COLLECTION, &name),
                        location: Some(Location {
                            rack: String::new(),
                            zone: Some(zone),
                        }),
                        realm,
                    };
                    print_json(&client.add_rack(rack).await?)?;
                }
                AddCommands::Asset {
                    name,
                    rack,
                    zone,
                    model,
                    board,
                    kind,
                } => {
                    let zone: Zone = zone.parse()?;
                    let kind: AssetType = kind.parse()?;
                    info!("Adding {kind} asset {name} to rack {rack}");
                    let asset = Asset {
                        name: resource_name(ASSET_COLLECTION, &name),
                        kind: Some(kind),
                        model: model.clone(),
                        location: Some(Location {
                            rack,
                            zone: Some(zone),
                        }),
                        info: Some(AssetInfo {
                            model,
                            build_target: board,
                        }),
                    };
                    print_json(&client.add_asset(asset).await?)?;
                }
                AddCommands::Dut(dut) => {
                    dut.validate()?;
                    info!("Adding DUT {} on asset {}", dut.name, dut.asset);
                    let lse = dut.to_machine_lse()?;
                    print_json(&client.create_machine_lse(lse).await?)?;
                }
            }
        }

        // fleet update dut --name <NAME> ...
        Commands::Update { update_command } => match update_command {
            UpdateCommands::Dut(dut) => {
                if dut.name.is_empty() {
                    bail!("need hostname to update a DUT");
                }
                dut.validate_fields()?;
                let mask = dut.update_mask();
                if mask.is_empty() {
                    bail!("nothing to update for DUT {}", dut.name);
                }
                debug!("Updating DUT {} with mask {:?}", dut.name, mask);
                let client = inventory_client(&config)?;
                let lse = dut.to_machine_lse()?;
                print_json(&client.update_machine_lse(lse, &mask).await?)?;
            }
        },

        // fleet deploy dut <NAME>...
        Commands::Deploy { job_command } => {
            let JobCommands::Dut(args) = job_command;
            schedule_jobs(&config, TaskName::Deploy, args).await?;
        }

        // fleet repair dut <NAME>...
        Commands::Repair { job_command } => {
            let JobCommands::Dut(args) = job_command;
            schedule_jobs(&config, TaskName::Recovery, args).await?;
        }
    }

    Ok(())
}

fn inventory_client(config: &FleetConfig) -> Result<InventoryClient> {
    let token = auth::get_token(&config.auth)?;
    let prpc = PrpcClient::new(&config.inventory.host, token, config.inventory.timeout)
        .context("Failed to create inventory client")?
        .with_namespace(&config.inventory.namespace);
    Ok(InventoryClient::new(prpc))
}

fn print_json<T: Serialize>(entity: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(entity)?);
    Ok(())
}

fn print_entity<T: Serialize>(entity: Option<T>) -> Result<()> {
    match entity {
        Some(entity) => print_json(&entity),
        None => {
            debug!("Entity not found");
            Ok(())
        }
    }
}

/// Schedule one job per DUT, all tagged with a shared admin session.
async fn schedule_jobs(config: &FleetConfig, task: TaskName, args: JobArgs) -> Result<()> {
    let token = auth::get_token(&config.auth)?;
    let prpc = PrpcClient::new(&config.build.host, token, config.build.timeout)
        .context("Failed to create build service client")?;
    let dispatcher = DeployDispatcher::new(Arc::new(prpc), config.build.clone());

    let configuration = args
        .configuration
        .as_ref()
        .map(|path| -> Result<String> {
            let raw = std::fs::read(path)
                .with_context(|| format!("Failed to read configuration {:?}", path))?;
            Ok(general_purpose::STANDARD.encode(raw))
        })
        .transpose()?;

    let session = Uuid::new_v4().to_string();
    let mut failures = 0;
    for name in &args.names {
        let mut params = DeployParams::new(name, task, &config.services);
        params.extra_tags = std::iter::once(session_tag(&session))
            .chain(args.tags.iter().cloned())
            .collect();
        params.configuration = configuration.clone();
        params.priority = args.priority;

        match dispatcher.schedule_deploy(&params).await {
            Ok(job) => println!("{name}: {} {}", job.id, job.url),
            Err(e) => {
                error!("Failed to schedule {task} for {name}: {e}");
                failures += 1;
            }
        }
    }

    println!(
        "Batch: {}",
        session_url(&config.build.ci_host, &config.build.builder_id(), &session)
    );
    if failures > 0 {
        bail!("{failures} of {} jobs failed to schedule", args.names.len());
    }
    Ok(())
}
