mod connect;
mod console;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docshift_config::ConfigLoader;
use docshift_core::{Direction, FileStore, Migrator, Reporter, RunOptions, Scaffolder, init};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::connect::{migrating_banner, open_store, resolve_target};
use crate::console::{ConsoleReporter, print_status};

/// Schema migrations for document databases: create migration files, then
/// apply or roll them back while a ledger collection tracks what has run.
#[derive(Parser, Debug)]
#[command(name = "docshift", version, about, arg_required_else_help = true)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the migrations folder in the current directory
    Init,
    /// Create a new migration file from the template
    Create(CreateArgs),
    /// Apply pending migrations, or roll back applied ones with --rollback
    Migrate(MigrateArgs),
    /// List applied and pending migrations
    Status(ConnectArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CreateKind {
    Migration,
}

#[derive(Args, Debug)]
struct CreateArgs {
    /// Kind of object to create
    #[arg(long = "type", value_enum, default_value_t = CreateKind::Migration)]
    kind: CreateKind,

    /// Migration name: letters and digits, words joined by single underscores
    #[arg(long)]
    name: Option<String>,

    /// Collection the new migration targets
    #[arg(long)]
    collection: Option<String>,
}

#[derive(Args, Debug, Default)]
struct ConnectArgs {
    /// Path to a credentials file (defaults to $DOCSHIFT_CREDENTIALS)
    #[arg(short, long)]
    credentials: Option<PathBuf>,

    /// Project whose database is migrated
    #[arg(short, long)]
    project: Option<String>,
}

#[derive(Args, Debug)]
struct MigrateArgs {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Undo applied migrations, newest first
    #[arg(short, long)]
    rollback: bool,

    /// Show the plan without running anything
    #[arg(long)]
    dry_run: bool,

    /// Fail if the ledger records migrations whose files are gone
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("failed to resolve the working directory")?;
    let config = ConfigLoader::load(&cwd)?;
    let migrations_dir = cwd.join(&config.migrations_dir);
    debug!("migrations directory: {}", migrations_dir.display());

    let reporter = ConsoleReporter;
    match cli.command {
        Command::Init => {
            reporter.info("Initialising migrator");
            if init(&migrations_dir)? {
                reporter.info(&format!(
                    "Created migrations folder {}",
                    migrations_dir.display()
                ));
            }
            reporter.success("Successfully initialised migrator");
        }
        Command::Create(args) => {
            let CreateKind::Migration = args.kind;
            let path = Scaffolder::new(&migrations_dir)
                .create(args.name.as_deref(), args.collection.as_deref())?;
            let filename = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            reporter.success(&format!(
                "Successfully created migration '{filename}' for the '{}' collection",
                args.collection.as_deref().unwrap_or_default().trim()
            ));
        }
        Command::Migrate(args) => {
            let target = resolve_target(
                &config,
                args.connect.project.as_deref(),
                args.connect.credentials.as_deref(),
            )?;
            reporter.info(&migrating_banner(&target));
            let store = open_store(&target)?;
            let options = RunOptions {
                direction: if args.rollback {
                    Direction::Revert
                } else {
                    Direction::Apply
                },
                ledger_collection: config.ledger_collection.clone(),
                strict: args.strict || config.strict,
                dry_run: args.dry_run,
            };

            Migrator::new(store, Arc::new(FileStore::new(migrations_dir)))
                .with_reporter(Arc::new(ConsoleReporter))
                .run(options)
                .await?;
        }
        Command::Status(args) => {
            let target =
                resolve_target(&config, args.project.as_deref(), args.credentials.as_deref())?;
            let store = open_store(&target)?;
            let status = Migrator::new(store, Arc::new(FileStore::new(migrations_dir)))
                .status(&config.ledger_collection)
                .await?;
            print_status(&status);
        }
    }

    Ok(())
}
