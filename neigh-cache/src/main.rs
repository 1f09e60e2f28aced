use std::net::IpAddr;
use std::process::exit;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use neigh_cache::config::Config;
use neigh_cache::pinned::{ObjectSource, PinnedEngine};
use neigh_cache::{Family, TableRegistry, dump, init_tables, retire_addr};

#[derive(Parser)]
#[command(name = "neigh-cache")]
#[command(about = "Nodeport neighbor cache map management", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the neighbor maps of the enabled families
    Init,
    /// Evict cached neighbors so the datapath resolves them again
    Retire(RetireCommand),
    /// Print the cached neighbors
    List(ListCommand),
}

#[derive(Args)]
struct RetireCommand {
    /// Addresses whose entries should be dropped
    #[arg(value_name = "IP", required = true)]
    ips: Vec<IpAddr>,
}

#[derive(Args)]
struct ListCommand {
    /// Only list one address family
    #[arg(long, value_enum)]
    family: Option<FamilyArg>,
    /// Print a JSON array instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum FamilyArg {
    Ipv4,
    Ipv6,
}

impl From<FamilyArg> for Family {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Ipv4 => Family::Ipv4,
            FamilyArg::Ipv6 => Family::Ipv6,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        error!("neigh-cache error: {err:#}");
        exit(1);
    }
}

fn run() -> Result<()> {
    execute(Cli::parse())
}

fn execute(cli: Cli) -> Result<()> {
    let config = cli.config;

    let Some(command) = cli.command else {
        Cli::command().print_help().ok();
        println!();
        return Ok(());
    };

    config.validate()?;
    let engine = PinnedEngine::new(
        config.bpf_root.clone(),
        ObjectSource::resolve(config.datapath_object.as_deref()),
    );
    let registry = TableRegistry::new(engine, config.max_entries);

    match command {
        Commands::Init => {
            config.validate_init()?;
            init_tables(&registry, config.enable_ipv4, config.enable_ipv6)?;
        }
        Commands::Retire(cmd) => {
            for ip in cmd.ips {
                retire_addr(&registry, ip);
            }
        }
        Commands::List(cmd) => {
            let families = match cmd.family {
                Some(family) => vec![family.into()],
                None => enabled_families(&config),
            };
            let entries = dump::collect(&registry, &families)?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&dump::to_json(&entries)?)?);
            } else {
                print!("{}", dump::to_text(&entries));
            }
        }
    }

    Ok(())
}

fn enabled_families(config: &Config) -> Vec<Family> {
    let mut families = Vec::new();
    if config.enable_ipv4 {
        families.push(Family::Ipv4);
    }
    if config.enable_ipv6 {
        families.push(Family::Ipv6);
    }
    families
}
