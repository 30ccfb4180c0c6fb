use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rsv_config::EngineConfig;

mod commands;

#[derive(Parser)]
#[command(name = "rsv")]
#[command(about = "Reservation CSV reconciliation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Reconcile one export file now
    Ingest {
        /// CSV file to ingest
        #[arg(long)]
        file: PathBuf,

        /// Site controller that produced the file (e.g. lincoln)
        #[arg(long)]
        sc: String,

        /// Correlation token (YYYYMMDDhhmmss); empty for ad-hoc ingests
        #[arg(long, default_value = "")]
        token: String,
    },

    /// Execution error ledger
    Errors {
        #[command(subcommand)]
        cmd: ErrorsCmd,
    },

    /// Upload transactions
    Uploads {
        #[command(subcommand)]
        cmd: UploadsCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply SQL migrations
    Migrate,
}

#[derive(Subcommand)]
enum ErrorsCmd {
    /// Print unresolved errors as JSON
    List,
    /// Mark every unresolved error resolved
    Resolve,
}

#[derive(Subcommand)]
enum UploadsCmd {
    /// Status of the upload carrying this token
    Status {
        #[arg(long)]
        token: String,
    },
    /// Most recent token, rendered as a timestamp
    Latest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = EngineConfig::from_env()?;
    init_tracing();
    for w in &loaded.warnings {
        tracing::warn!("config: {w}");
    }
    let cfg = loaded.config;

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = rsv_db::connect(cfg.require_database_url()?).await?;
            match cmd {
                DbCmd::Status => {
                    let s = rsv_db::status(&pool).await?;
                    println!("db_ok={} has_upload_table={}", s.ok, s.has_upload_table);
                }
                DbCmd::Migrate => {
                    rsv_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::Ingest { file, sc, token } => {
            commands::ingest::run(&cfg, &file, &sc, &token).await?;
        }

        Commands::Errors { cmd } => {
            let store = commands::connect_store(&cfg).await?;
            match cmd {
                ErrorsCmd::List => commands::ledger::list(store).await?,
                ErrorsCmd::Resolve => commands::ledger::resolve(store).await?,
            }
        }

        Commands::Uploads { cmd } => {
            let store = commands::connect_store(&cfg).await?;
            match cmd {
                UploadsCmd::Status { token } => commands::uploads::status(store, &token).await?,
                UploadsCmd::Latest => commands::uploads::latest(store).await?,
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
