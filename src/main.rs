//! `racine` command line: run the API server and its maintenance jobs.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use jiff::civil::Date;
use racine::{ConfigLoader, DbHandle, Error, Overrides, Role};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "racine", version, about = "Family-tree API server")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Database URL (file path, `:memory:` or `libsql://...`).
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Token signing secret; prefer RACINE_JWT_SECRET.
        #[arg(long, value_name = "SECRET")]
        jwt_secret: Option<String>,
    },
    /// Create the Viewer, Editor and Admin role groups if missing.
    SeedRoles,
    /// Send today's birthday notifications.
    Birthdays {
        /// Run as if today were this date (YYYY-MM-DD).
        #[arg(long, value_name = "DATE")]
        date: Option<Date>,
    },
    /// Create a user account.
    CreateUser {
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Grant staff status, bypassing every role and ownership check.
        #[arg(long)]
        staff: bool,
        /// Role groups to assign; may be repeated.
        #[arg(long = "role", value_name = "ROLE")]
        roles: Vec<Role>,
    },
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("racine=info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> racine::Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let mut overrides = Overrides {
        database_url: cli.database_url.as_deref(),
        ..Default::default()
    };

    match &cli.command {
        Command::Serve {
            host,
            port,
            jwt_secret,
        } => {
            overrides.host = host.as_deref();
            overrides.port = *port;
            overrides.jwt_secret = jwt_secret.as_deref();
            let config = ConfigLoader::default().load(cli.config.as_deref(), &overrides)?;

            let db = DbHandle::open(&config.database.url).await?;
            racine::roles::seed(&*db.lock().await).await?;
            info!(database = %config.database.url, "database ready");

            let router = racine::resources::api();
            racine::server::run(Arc::new(config), Some(db), router.into_handle()).await
        }
        Command::SeedRoles => {
            let config = ConfigLoader::default()
                .without_jwt_secret()
                .load(cli.config.as_deref(), &overrides)?;
            let db = DbHandle::open(&config.database.url).await?;
            let created = racine::roles::seed(&*db.lock().await).await?;
            info!(created = created.len(), "roles seeded");
            Ok(())
        }
        Command::Birthdays { date } => {
            let config = ConfigLoader::default()
                .without_jwt_secret()
                .load(cli.config.as_deref(), &overrides)?;
            let db = DbHandle::open(&config.database.url).await?;
            let today = date.unwrap_or_else(|| jiff::Zoned::now().date());
            let sent = racine::notify::send_birthday_notifications(&*db.lock().await, today).await?;
            println!("Birthday notifications sent: {sent}");
            Ok(())
        }
        Command::CreateUser {
            username,
            password,
            email,
            staff,
            roles,
        } => {
            if password.len() < racine::auth::MIN_PASSWORD_LENGTH {
                return Err(Error::BadRequest(format!(
                    "password must be at least {} characters",
                    racine::auth::MIN_PASSWORD_LENGTH
                )));
            }
            let config = ConfigLoader::default()
                .without_jwt_secret()
                .load(cli.config.as_deref(), &overrides)?;
            let db = DbHandle::open(&config.database.url).await?;
            let hash = racine::auth::hash_password_async(password.clone()).await?;

            let conn = db.lock().await;
            racine::roles::seed(&conn).await?;
            let account = racine::account::create(&conn, username, email, &hash, *staff).await?;
            if !roles.is_empty() {
                racine::roles::assign(&conn, account.id, roles).await?;
            }
            println!("{}", account.id);
            Ok(())
        }
    }
}
