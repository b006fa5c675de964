//! Loads a JSON array of books into the catalog
//!
//! Run with: cargo run --bin seed-books -- --file books.json
//!
//! Each entry takes the same fields as `POST /api/books`. Entries whose id
//! already exists are skipped, so the command can be re-run safely.

use anyhow::Context;
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};

use bookstore_api::{
    db::{establish_connection_with_config, run_migrations, DbConfig},
    errors::ServiceError,
    services::catalog::{CatalogService, CreateBookRequest},
};

#[derive(Parser)]
#[command(name = "seed-books", about = "Seed the book catalog from a JSON file")]
struct Cli {
    /// JSON file holding an array of books
    #[arg(long, short)]
    file: PathBuf,

    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://bookstore.db?mode=rwc")]
    database_url: String,

    /// Apply migrations before seeding
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("failed to read {}", cli.file.display()))?;
    let books: Vec<CreateBookRequest> =
        serde_json::from_str(&raw).context("books file must hold a JSON array of books")?;

    let db = establish_connection_with_config(&DbConfig {
        url: cli.database_url,
        max_connections: 5,
        ..Default::default()
    })
    .await?;
    if cli.migrate {
        run_migrations(&db).await?;
    }

    let catalog = CatalogService::new(Arc::new(db));
    let (mut created, mut skipped) = (0usize, 0usize);

    for book in books {
        let title = book.title.clone();
        match catalog.create_book(book).await {
            Ok(model) => {
                info!(book_id = %model.id, %title, "seeded");
                created += 1;
            }
            Err(ServiceError::Conflict(reason)) => {
                warn!(%title, %reason, "skipped");
                skipped += 1;
            }
            Err(e) => return Err(anyhow::anyhow!("failed to seed '{}': {}", title, e)),
        }
    }

    info!(created, skipped, "Seeding finished");
    Ok(())
}
