use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub mod cache;
pub mod config;
pub mod data;
pub mod errors;
pub mod operators;
pub mod storage;

pub use data::models::Pool;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

pub fn run_migrations(
    conn: &mut impl MigrationHarness<diesel::pg::Pg>,
) -> Result<(), errors::DefaultError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|_migration_error| errors::DefaultError {
            message: "Error running pending migrations",
        })?;

    Ok(())
}

pub fn create_pool(database_url: &str) -> Result<Pool, errors::DefaultError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    diesel::r2d2::Pool::builder()
        .build(manager)
        .map_err(|_pool_error| errors::DefaultError {
            message: "Failed to create database connection pool",
        })
}
