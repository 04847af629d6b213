//! Environment-driven configuration shared by the binaries

use std::env;
use std::time::Duration;

/// Redis list carrying serialized screener jobs
pub const JOB_QUEUE_KEY: &str = "screener_jobs";

/// Prefix of result store keys, followed by the job id
pub const RESULT_KEY_PREFIX: &str = "screener_result:";

pub const DEFAULT_RESULT_TTL_SECONDS: u64 = 600;

pub fn get_environment() -> String {
    env::var("APP_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_redis_url() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string())
}

/// Postgres connection string, `DATABASE_URL` or the legacy `DB_URL`
pub fn get_database_url() -> String {
    env::var("DATABASE_URL")
        .or_else(|_| env::var("DB_URL"))
        .unwrap_or_else(|_| {
            "host=localhost user=postgres password=postgres dbname=stockscreener".to_string()
        })
}

pub fn get_port() -> u16 {
    parse_var("PORT").unwrap_or(8080)
}

pub fn get_result_ttl() -> Duration {
    Duration::from_secs(parse_var("RESULT_TTL_SECONDS").unwrap_or(DEFAULT_RESULT_TTL_SECONDS))
}

pub fn get_stock_universe_path() -> Option<String> {
    env::var("STOCK_UNIVERSE_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
}

pub fn result_key(job_id: &uuid::Uuid) -> String {
    format!("{}{}", RESULT_KEY_PREFIX, job_id)
}

/// Parse an environment variable, `None` if unset or malformed
pub fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
