//! Cafe CLI Entry Point
//!
//! Connects to the cafe database and runs one interactive session on the
//! terminal:
//!
//! ```text
//! cafe <dbname> <port> <user>                      # PostgreSQL
//! cafe --engine sqlite --init-schema cafe.db 0 me  # SQLite file, tables created if missing
//! ```
//!
//! The menus are written to stdout. Logs go to stderr (`RUST_LOG` to adjust).

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cafe::config::{Overrides, Settings};
use cafe::engine::{DatabaseType, Store};
use cafe::schema::install_schema;
use cafe::session::{screens, Session, StdConsole};

/// Cafe - menu-driven front end for the cafe ordering database
#[derive(Parser)]
#[command(name = "cafe")]
#[command(about = "Menu-driven front end for the cafe ordering database")]
#[command(version)]
struct Cli {
    /// Database name (path of the database file with --engine sqlite)
    dbname: String,

    /// Database server port
    port: u16,

    /// Database user
    user: String,

    /// Database engine
    #[arg(long, value_enum, default_value_t = DatabaseType::Postgres)]
    engine: DatabaseType,

    /// Database host [default: localhost]
    #[arg(long)]
    host: Option<String>,

    /// Per-statement timeout in milliseconds [default: 30000]
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Match menu searches regardless of letter case
    #[arg(long)]
    case_insensitive_search: bool,

    /// Create the Users, Menu and Orders tables if they do not exist
    #[arg(long)]
    init_schema: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let overrides = Overrides {
        host: cli.host,
        timeout_ms: cli.timeout_ms,
        case_insensitive_search: cli.case_insensitive_search,
    };
    let settings = Settings::load(&overrides).context("failed to load configuration")?;
    let config = settings
        .connection_config(cli.engine, &cli.dbname, cli.port, &cli.user)
        .context("failed to build connection settings")?;

    println!("{}", screens::GREETING);
    print!("Connecting to database...");
    std::io::stdout().flush().context("failed to write to stdout")?;

    let store = match Store::connect(&config).await {
        Ok(store) => {
            println!("Done");
            store
        }
        Err(e) => {
            println!();
            eprintln!("Error - Unable to Connect to Database: {}", e.message());
            if cli.engine == DatabaseType::Postgres {
                println!("Make sure you started postgres on this machine");
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    if cli.init_schema {
        if let Err(e) = install_schema(&store).await {
            store.close().await;
            return Err(e).context("failed to install schema");
        }
    }

    {
        let mut session = Session::new(&store, StdConsole::new(), settings);
        session.run().await;
    }

    print!("Disconnecting from database...");
    store.close().await;
    println!("Done\n\nBye !");

    Ok(ExitCode::SUCCESS)
}
