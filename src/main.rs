use portfolio_chat_store::config::Settings;
use portfolio_chat_store::errors::DefaultError;
use portfolio_chat_store::storage::memory::MemoryStorage;
use portfolio_chat_store::storage::pg::PgStorage;
use portfolio_chat_store::storage::Storage;
use portfolio_chat_store::{create_pool, run_migrations};

fn main() {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::from_env();

    let storage: Box<dyn Storage> = match settings.database_url.clone() {
        Some(database_url) => {
            log::info!("provisioning postgres storage");

            let pool = create_pool(&database_url).expect("Failed to create pool.");
            let mut conn = pool.get().expect("Failed to get connection from pool.");
            run_migrations(&mut conn).expect("Failed to run pending migrations.");
            drop(conn);

            Box::new(PgStorage::new(pool, settings))
        }
        None => {
            log::warn!("DATABASE_URL is not set, falling back to in-memory storage");
            Box::new(MemoryStorage::new(settings))
        }
    };

    if let Err(err) = provision(storage.as_ref()) {
        log::error!("provisioning failed: {}", err);
        std::process::exit(1);
    }
}

fn provision(storage: &dyn Storage) -> Result<(), DefaultError> {
    if storage.seed_smoke_test()? {
        log::info!("inserted smoke test conversation");
    } else {
        log::info!("smoke test conversation already present, skipping");
    }

    let report = storage.verification_report()?;
    log::info!(
        "embeddings: {} rows, conversations: {} rows, sessions: {} rows",
        report.embeddings,
        report.conversations,
        report.sessions
    );

    let stats = storage.get_stats()?;
    log::info!(
        "total conversations: {}, active sessions: {}, conversations in the last 7 days: {}",
        stats.total_conversations,
        stats.active_sessions,
        stats.recent_conversations
    );

    Ok(())
}
