//! Administrative reset tool: provisions the inventory schema.
//!
//! Usage: `inventory-core <create|drop|reset>`

use dotenvy::dotenv;
use inventory_core::{
    config::{database, settings},
    core::schema::SchemaRegistry,
    errors::{Error, Result},
};
use std::str::FromStr;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Provisioning action to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Create,
    Drop,
    Reset,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "drop" => Ok(Self::Drop),
            "reset" => Ok(Self::Reset),
            other => Err(Error::Config {
                message: format!("unknown command `{other}`; expected create, drop or reset"),
            }),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Load .env and settings (DATABASE_URL may come from either)
    dotenv().ok();
    let settings = settings::load_default_settings()?;

    // 2. Initialize tracing, RUST_LOG wins over the settings file
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    // 3. Parse the command before touching the database
    let command: Command = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "create".to_string())
        .parse()
        .inspect_err(|e| error!("{}", e))?;

    let registry = SchemaRegistry::inventory()?;
    let db = database::create_connection(&settings)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;

    match command {
        Command::Create => database::create_all(&db, &registry).await?,
        Command::Drop => database::drop_all(&db, &registry).await?,
        Command::Reset => database::reset(&db, &registry).await?,
    }

    info!("{:?} finished", command);
    Ok(())
}
