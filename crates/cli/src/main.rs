mod config;
mod error;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use policy::{Authorizer, Identity, MemoryProvider, Mutation, Role, Verdict};
use storage::Store;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{Error, Result};

const CONFIG_FILE: &str = "warden.toml";

/// Exit status of `check` when the mutation is denied.
const DENIED: u8 = 2;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Row-level authorization for table mutations", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "WARDEN_CONFIG", default_value = CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the policy and report phases that deny implicitly
    Validate,
    /// Print the expanded rule sets as JSON
    Rules {
        /// Show only this table
        #[arg(short, long)]
        table: Option<String>,
    },
    /// Authorize a mutation read from a JSON file
    Check {
        /// Caller subject; omit for an anonymous caller
        #[arg(short, long)]
        subject: Option<String>,
        /// Caller role
        #[arg(short, long, value_enum, default_value_t = RoleArg::Standard)]
        role: RoleArg,
        /// Mutation file (`-` for stdin)
        #[arg(short, long)]
        mutation: PathBuf,
        /// Evaluate without the database; relationships resolve to nothing
        #[arg(long)]
        no_db: bool,
    },
    /// Create the policy's tables in the database
    InitDb,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Standard,
    Elevated,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Standard => Role::Standard,
            RoleArg::Elevated => Role::Elevated,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("WARDEN_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Validate => cmd_validate(&config),
        Commands::Rules { table } => cmd_rules(&config, table.as_deref()),
        Commands::Check {
            subject,
            role,
            mutation,
            no_db,
        } => {
            let identity = Identity {
                subject,
                role: role.into(),
            };
            cmd_check(&config, &identity, &mutation, no_db)
        }
        Commands::InitDb => cmd_init_db(&config),
    }
}

fn cmd_validate(config: &Config) -> Result<ExitCode> {
    let policy = config.policy()?;

    let mut implicit = 0;
    for (table, phase) in policy.rules.undeclared(&policy.schema) {
        tracing::warn!(table, %phase, "no rule set declared; phase denies implicitly");
        println!("implicit deny: {table}.{phase}");
        implicit += 1;
    }

    println!(
        "ok: {} tables, {} named predicates, {implicit} implicit denials",
        policy.schema.tables().count(),
        policy.library.names().count(),
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_rules(config: &Config, table: Option<&str>) -> Result<ExitCode> {
    let policy = config.policy()?;

    let json = match table {
        Some(name) => {
            if policy.schema.table(name).is_err() {
                return Err(Error::UnknownTable(name.to_string()));
            }
            let phases: serde_json::Map<_, _> = policy
                .rules
                .table(name)
                .map(|(phase, rules)| -> Result<_> {
                    Ok((phase.to_string(), serde_json::to_value(rules)?))
                })
                .collect::<Result<_>>()?;
            serde_json::to_string_pretty(&phases)?
        }
        None => serde_json::to_string_pretty(&policy.rules)?,
    };

    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(config: &Config, identity: &Identity, path: &Path, no_db: bool) -> Result<ExitCode> {
    let mutation = read_mutation(path)?;
    let auth = Authorizer::new(config.policy()?.into_evaluator()?);

    let verdict = if no_db {
        auth.authorize(identity, &mutation, &MemoryProvider::new())?
    } else {
        let mut store = open_store(&config.database.path)?;
        let snapshot = store.snapshot(auth.evaluator().schema())?;
        auth.authorize(identity, &mutation, &snapshot)?
    };

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(match verdict {
        Verdict::Commit { .. } => ExitCode::SUCCESS,
        Verdict::Denied { .. } => ExitCode::from(DENIED),
    })
}

fn cmd_init_db(config: &Config) -> Result<ExitCode> {
    let policy = config.policy()?;
    let store = Store::open(&config.database.path)?;
    store.apply_schema(&policy.schema)?;

    tracing::info!(path = %config.database.path.display(), "database initialized");
    println!(
        "Created {} tables in {}",
        policy.schema.tables().count(),
        config.database.path.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn read_mutation(path: &Path) -> Result<Mutation> {
    let content = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path)?
    };

    serde_json::from_str(&content).map_err(|e| Error::MutationFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn open_store(path: &Path) -> Result<Store> {
    if !path.exists() {
        return Err(Error::DatabaseNotFound {
            path: path.to_path_buf(),
        });
    }

    Ok(Store::open(path)?)
}
