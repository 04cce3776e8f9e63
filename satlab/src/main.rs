use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{event, Level};
use tracing_subscriber::EnvFilter;

use satlab::add_dut::{AddDutReport, AddDutRequest, Satlab};
use satlab::config::load_config;
use satlab::summary::Summary;

#[derive(Parser, Debug)]
#[command(
    name = "satlab",
    version,
    author = "Lab Fleet Developers <lab-fleet-dev@chromium.org>",
    about = "Satlab appliance CLI",
    long_about = "Registers DUTs of a satlab appliance in the fleet inventory and in the appliance's DNS."
)]
struct Cli {
    /// Sets a custom config file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Add {
        #[command(subcommand)]
        add_command: AddCommands,
    },
    Get {
        #[command(subcommand)]
        get_command: GetCommands,
    },
}

#[derive(Subcommand, Debug)]
enum AddCommands {
    /// Add a DUT, its rack and asset, and deploy it
    Dut(AddDutRequest),
}

#[derive(Subcommand, Debug)]
enum GetCommands {
    Rack {
        name: String,
        #[arg(long = "satlab-id", default_value_t)]
        satlab_id: String,
    },
    /// Asset tags are not site qualified
    Asset { name: String },
    Dut {
        name: String,
        #[arg(long = "satlab-id", default_value_t)]
        satlab_id: String,
    },
    /// Print the DNS host records
    Dns,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn connect(config: Option<&Path>) -> Result<Satlab> {
    let config = load_config(config).context("Failed to load configuration")?;
    let token =
        fleet_rs::auth::load_token(&config.fleet.auth).context("Failed to load credentials")?;
    Ok(Satlab::from_config(config, token)?)
}

/// Setup failures return before any stage is recorded in `summary`.
async fn add_dut(
    config: Option<&Path>,
    request: &AddDutRequest,
    summary: &mut Summary,
) -> Result<AddDutReport> {
    let satlab = connect(config)?;
    satlab
        .add_dut(request, summary)
        .await
        .context("Failed to add DUT")
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        // satlab add dut ...
        Commands::Add {
            add_command: AddCommands::Dut(request),
        } => {
            let mut summary = Summary::new();
            let result = add_dut(cli.config.as_deref(), &request, &mut summary).await;
            summary.print();
            let report = result?;
            match report.job {
                Some(job) => println!("Deploy job for {}: {}", report.hostname, job.url),
                None => println!("Added {} without deploying", report.hostname),
            }
        }

        // satlab get rack|asset|dut <NAME> / satlab get dns
        Commands::Get { get_command } => {
            let satlab = connect(cli.config.as_deref())?;
            let namespace = &satlab.config().site.namespace;
            let (kind, id) = match get_command {
                GetCommands::Rack { name, satlab_id } => {
                    ("rack", satlab.site(&satlab_id).await?.qualify(&name))
                }
                GetCommands::Asset { name } => ("asset", name),
                GetCommands::Dut { name, satlab_id } => {
                    ("dut", satlab.site(&satlab_id).await?.qualify(&name))
                }
                GetCommands::Dns => {
                    let snapshot = satlab.dns().read().await?;
                    if !snapshot.existed {
                        event!(Level::WARN, "DNS host records do not exist");
                    }
                    print!("{}", snapshot.content);
                    return Ok(());
                }
            };
            let out = satlab.inventory().get(kind, &id, namespace).await?;
            if !out.is_empty() {
                println!("{out}");
            }
        }
    }

    Ok(())
}
