use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::fs;
use std::path::PathBuf;

use subnetpool::config::Config;
use subnetpool::config_loader;
use subnetpool::ip::PoolRegistry;
use subnetpool::orchestrator;

/// Subnet pool allocator for container network address assignment
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the address pool configuration YAML file (defaults to the
    /// built-in local and global pools)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and print each pool
    Check,

    /// Allocate subnets from a pool and print them
    Allocate {
        /// Pool to allocate from
        #[arg(short, long)]
        pool: String,

        /// Number of subnets to allocate
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Owner recorded for the allocated subnets
        #[arg(long, default_value = "cli")]
        owner: String,
    },

    /// Run an operations script and write a JSON report
    Run {
        /// Path to the operations YAML file
        #[arg(long)]
        ops: PathBuf,

        /// Output file for the report (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging. Without RUST_LOG the level is "info" until the
    // configuration's general.log_level is known.
    env_logger::Builder::from_env(Env::default().default_filter_or("trace")).init();
    let level_from_env = std::env::var_os("RUST_LOG").is_some();
    if !level_from_env {
        log::set_max_level(log::LevelFilter::Info);
    }

    let config = config_loader::load_config_or_default(args.config.as_deref())?;
    if !level_from_env {
        if let Some(level) = config.log_level() {
            log::set_max_level(level);
        }
    }

    let mut registry = PoolRegistry::from_config(&config).wrap_err("Failed to build address pools")?;

    match args.command {
        Command::Check => check(&config, &registry),
        Command::Allocate { pool, count, owner } => {
            for _ in 0..count {
                let prefix = registry.allocate(&pool, &owner)?;
                println!("{}", prefix);
            }
            Ok(())
        }
        Command::Run { ops, output } => {
            let operations = orchestrator::load_operations(&ops)?;
            let report = orchestrator::run_operations(&mut registry, &operations)?;
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .wrap_err_with(|| format!("Failed to write report '{}'", path.display()))?;
                    info!("Report written to: {:?}", path);
                }
                None => println!("{}", json),
            }
            Ok(())
        }
    }
}

fn check(config: &Config, registry: &PoolRegistry) -> Result<()> {
    for name in registry.pool_names() {
        let Some(pool) = registry.pool(name) else {
            continue;
        };
        println!("{} ({} subnets)", name, pool.capacity());
        for block in pool.blocks() {
            println!("  {} split into /{} ({} subnets)", block.base(), block.subnet_bits(), block.capacity());
        }
    }
    info!("Configuration OK: {} pool(s)", config.pools.len());
    Ok(())
}
