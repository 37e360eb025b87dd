use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use larder::services::bootstrap;
use larder::services::database::traits::types::{DATABASE_URL_ENV, DB_PATH_ENV, ENVIRONMENT_ENV};
use larder::services::migrations::{MigrationRunner, TableVersionStore};
use larder::{BackendKind, Catalog, DatabaseConfig};

#[derive(Debug, Parser)]
#[command(author, version, about = "Open the larder store and manage its schema")]
struct Cli {
    /// PostgreSQL connection string; selects the networked store when set
    #[arg(long, env = DATABASE_URL_ENV, hide_env_values = true)]
    database_url: Option<String>,

    /// Embedded store file, used when no connection string is set
    #[arg(long, env = DB_PATH_ENV)]
    db_path: Option<PathBuf>,

    /// Deployment environment; `production` enforces full TLS verification
    #[arg(long, env = ENVIRONMENT_ENV)]
    environment: Option<String>,

    /// Shorthand for `--environment production`
    #[arg(long)]
    production: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Apply every pending migration (default)
    Migrate,
    /// Print the recorded schema version
    Status,
    /// List the migrations a `migrate` would apply
    Plan,
}

impl Cli {
    fn config(&self) -> DatabaseConfig {
        let config = DatabaseConfig::from_settings(
            self.database_url.clone(),
            self.db_path.clone(),
            self.environment.as_deref(),
        );
        if self.production {
            config.with_production(true)
        } else {
            config
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match smol::block_on(run(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.config();
    let catalog = Catalog::application().context("migration catalog is invalid")?;

    match cli.command.unwrap_or(Command::Migrate) {
        Command::Migrate => {
            let (db, report) = bootstrap::open_and_migrate(&config, &catalog)
                .await
                .context("startup aborted")?;
            println!(
                "{} store at version {} (applied {:?})",
                report.backend, report.to_version, report.applied
            );
            db.close().await;
        }
        Command::Status => {
            let db = bootstrap::open(&config).await?;
            let version = db.version().await?;
            println!(
                "{} store at {}: version {version} of {}",
                db.backend_kind(),
                config.display_target(),
                catalog.latest_version()
            );
            let pending: Vec<i64> = catalog.pending(version).map(|step| step.id).collect();
            println!("pending: {pending:?}");
            if db.backend_kind() == BackendKind::Networked {
                for applied in TableVersionStore.applied(db.connection()).await? {
                    match applied.applied_at {
                        Some(at) => println!("  {:>4}  {}", applied.version, at.to_rfc3339()),
                        None => println!("  {:>4}", applied.version),
                    }
                }
            }
            db.close().await;
        }
        Command::Plan => {
            let db = bootstrap::open(&config).await?;
            let pending = MigrationRunner::new(db.connection(), &catalog).plan().await?;
            if pending.is_empty() {
                println!("nothing to apply");
            }
            for id in pending {
                if let Some(step) = catalog.get(id) {
                    println!("{:>4}  {}", step.id, step.name);
                }
            }
            db.close().await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_production_flag_selects_verify_full() {
        let cli = Cli::try_parse_from([
            "larder",
            "--database-url",
            "postgres://u:p@db/larder",
            "--production",
            "status",
        ])
        .unwrap();
        let config = cli.config();
        assert_eq!(config.backend_kind(), BackendKind::Networked);
        assert_eq!(config.tls_mode(), larder::services::database::TlsMode::VerifyFull);
        assert!(matches!(cli.command, Some(Command::Status)));
    }

    #[test]
    fn test_db_path_flag_and_default_command() {
        let cli = Cli::try_parse_from(["larder", "--db-path", "/tmp/x.db"]).unwrap();
        let config = cli.config();
        assert_eq!(config.sqlite_path(), std::path::Path::new("/tmp/x.db"));
        assert!(cli.command.is_none());
    }
}
