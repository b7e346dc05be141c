//! Tessera command-line interface
//!
//! Loads an enforcer from a TOML config and answers questions about the policy
//! it holds: counts, decisions, stored tuples and role membership.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera_core::EnforcerConfig;
use tessera_rbac::Enforcer;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera - domain-scoped RBAC enforcement", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "tessera.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the model and policy, then print what was loaded
    Check,

    /// Decide one request
    Enforce {
        /// Request field values, in request definition order
        #[arg(required = true)]
        fields: Vec<String>,

        /// Print the decision and every matched rule as JSON
        #[arg(long)]
        explain: bool,
    },

    /// Print stored rules or grouping tuples
    List {
        /// List grouping tuples instead of policy rules
        #[arg(long)]
        grouping: bool,

        /// Policy type or relation name (defaults to `p` or `g`)
        #[arg(long)]
        ptype: Option<String>,
    },

    /// Print the roles of a user
    Roles {
        /// User (or role) to inspect
        user: String,

        /// Domain, for domain-scoped models
        #[arg(short, long)]
        domain: Option<String>,

        /// Include roles inherited through the hierarchy
        #[arg(long)]
        implicit: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let enforcer = load_enforcer(&cli.config)?;

    match cli.command {
        Commands::Check => commands::check(&enforcer)?,
        Commands::Enforce { fields, explain } => commands::enforce(&enforcer, &fields, explain)?,
        Commands::List { grouping, ptype } => {
            commands::list(&enforcer, grouping, ptype.as_deref())?;
        }
        Commands::Roles {
            user,
            domain,
            implicit,
        } => commands::roles(&enforcer, &user, domain.as_deref(), implicit)?,
    }

    Ok(())
}

fn load_enforcer(path: &std::path::Path) -> Result<Enforcer> {
    let mut config = EnforcerConfig::load_from_file(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    config
        .merge_with_env()
        .context("applying TESSERA_* environment overrides")?;
    Enforcer::from_config(&config).context("building enforcer")
}
