//! Logging initialization with environment-based formatters
//!
//! - Production: Structured JSON logs, one object per event
//! - Sandbox: Colorful, human-readable logs for development

use crate::config::get_environment;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset; driver chatter stays at warn
const DEFAULT_FILTER: &str = "info,tokio_postgres=warn,redis=warn,tower_http=info";

/// Whether the environment name selects structured JSON output
pub fn is_production(env: &str) -> bool {
    matches!(env, "production" | "prod")
}

/// Initialize logging for the current `APP_ENV`
///
/// Job lifecycle events carry `job_id`/`user_id` fields; the JSON layer
/// flattens them to top-level keys. Calling this twice is a no-op.
pub fn init_logging() {
    let env = get_environment();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if is_production(&env) {
        registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_target(true)
                    .with_writer(std::io::stdout),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {}", e);
    }
}
