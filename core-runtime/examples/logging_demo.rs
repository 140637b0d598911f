//! Logging system demonstration
//!
//! Run with:
//! ```bash
//! cargo run -p core-runtime --example logging_demo
//! cargo run -p core-runtime --example logging_demo -- json
//! cargo run -p core-runtime --example logging_demo -- compact "core_sync=trace"
//! ```

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use std::env;
use tracing::{debug, info, instrument, warn};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace);
    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    if let Err(e) = init_logging(config) {
        eprintln!("Failed to initialize logging: {}", e);
        return;
    }

    info!(format = ?format, "Logging initialized");
    simulate_chunk(3, 20).await;
    warn!(header = "X-RateLimit-Remaining", value = "abc", "Ignoring malformed quota header");
    debug!(
        authorization = %redact_if_sensitive("authorization", "Bearer secret"),
        "Request headers prepared"
    );
}

#[instrument]
async fn simulate_chunk(chunk: usize, size: usize) {
    info!("Fetching media chunk");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    info!(media_done = chunk * size, "Chunk persisted");
}
