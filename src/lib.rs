//! Bookshelf application library
//!
//! Wires the book module onto the kernel, database and HTTP crates.

pub mod modules;

use anyhow::Context;
use axum::Router;
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// A fully initialized application: database open, migrations applied,
/// modules started.
pub struct App {
    pub settings: Settings,
    pub db: Database,
    pub registry: ModuleRegistry,
}

impl App {
    /// Open the database, register modules, migrate, then init and start them.
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let (db, registry, _) = open_and_migrate(&settings).await?;

        let ctx = InitCtx {
            settings: &settings,
        };
        registry.init_all(&ctx).await?;
        registry.start_all(&ctx).await?;

        Ok(Self {
            settings,
            db,
            registry,
        })
    }

    pub fn router(&self) -> Router {
        bookshelf_http::build_router(&self.registry, &self.settings)
    }

    /// Serve until a shutdown signal arrives, then stop modules and close the database.
    pub async fn serve(self) -> anyhow::Result<()> {
        bookshelf_http::start_server(&self.registry, &self.settings).await?;
        self.shutdown().await
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.registry.stop_all().await?;
        // Module routers hold connection handles, drop them first.
        drop(self.registry);
        self.db.close().await.context("failed to close database")?;
        tracing::info!("bookshelf shut down");
        Ok(())
    }
}

/// Apply pending migrations without starting anything.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let (db, registry, applied) = open_and_migrate(settings).await?;
    drop(registry);
    db.close().await.context("failed to close database")?;
    Ok(applied)
}

async fn open_and_migrate(
    settings: &Settings,
) -> anyhow::Result<(Database, ModuleRegistry, usize)> {
    let db = Database::open(&settings.database)
        .await
        .with_context(|| format!("failed to open database '{}'", settings.database.path))?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &db);

    let migrations = registry.collect_migrations();
    let applied = db
        .run_migrations(&migrations)
        .await
        .context("failed to apply migrations")?;
    tracing::info!(applied, total = migrations.len(), "database schema up to date");

    Ok((db, registry, applied))
}
