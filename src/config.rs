use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub session_timeout_minutes: i64,
    pub conversation_history_limit: i64,
    pub conversation_retention_days: i64,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    pub enable_cache: bool,
}

fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            session_timeout_minutes: env_var_or("SESSION_TIMEOUT_MINUTES", 60),
            conversation_history_limit: env_var_or("CONVERSATION_HISTORY_LIMIT", 50),
            conversation_retention_days: env_var_or("CONVERSATION_RETENTION_DAYS", 30),
            cache_ttl_seconds: env_var_or("CACHE_TTL_SECONDS", 3600),
            cache_max_entries: env_var_or("CACHE_MAX_ENTRIES", 1000),
            enable_cache: env_var_or("ENABLE_CACHE", true),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            session_timeout_minutes: 60,
            conversation_history_limit: 50,
            conversation_retention_days: 30,
            cache_ttl_seconds: 3600,
            cache_max_entries: 1000,
            enable_cache: true,
        }
    }
}
