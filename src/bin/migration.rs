use bookstore_api::{
    db::{establish_connection_with_config, DbConfig},
    migrator::Migrator,
};
use clap::{Parser, Subcommand};
use sea_orm_migration::prelude::*;
use tracing::info;

#[derive(Parser)]
#[command(name = "migration", about = "Apply or roll back the bookstore schema")]
struct Cli {
    /// Database URL; falls back to DATABASE_URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://bookstore.db?mode=rwc")]
    database_url: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up,
    /// Roll back the last migration
    Down,
    /// Print applied and pending migrations
    Status,
    /// Drop everything and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), DbErr> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    info!("Connecting to database");

    let db = establish_connection_with_config(&DbConfig {
        url: cli.database_url,
        max_connections: 5,
        sqlx_logging: true,
        ..Default::default()
    })
    .await?;

    match cli.command.unwrap_or(Command::Up) {
        Command::Up => Migrator::up(&db, None).await?,
        Command::Down => Migrator::down(&db, Some(1)).await?,
        Command::Status => Migrator::status(&db).await?,
        Command::Fresh => Migrator::fresh(&db).await?,
    }

    info!("Migration command completed successfully");
    Ok(())
}
