use tracing_subscriber::{EnvFilter, FmtSubscriber};

const LOG_ENV: &str = "HATCHERY_LOG";
const FALLBACK_LOG_ENV: &str = "RUST_LOG";

/// Installs the global `tracing` subscriber. `HATCHERY_LOG` wins over
/// `RUST_LOG`; without either the level is `info`, or `debug` when verbose.
pub fn init_logging(verbose: bool) {
    let hatchery = std::env::var(LOG_ENV).ok();
    let fallback = std::env::var(FALLBACK_LOG_ENV).ok();
    let filter = build_filter(verbose, hatchery.as_deref(), fallback.as_deref());

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}

fn build_filter(verbose: bool, hatchery: Option<&str>, fallback: Option<&str>) -> EnvFilter {
    match hatchery.or(fallback) {
        Some(directives) => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
        }
        None if verbose => EnvFilter::new("debug"),
        None => EnvFilter::new("info"),
    }
}
