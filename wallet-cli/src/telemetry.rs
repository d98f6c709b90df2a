use std::sync::Once;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "info,light_wallet_client=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Logs to stderr and, when the directory is writable, to hourly files
/// under `log_dir`. Stdout is left to command output.
pub fn setup_telemetry(log_dir: &str) {
    INIT.call_once(|| {
        let file_appender = match RollingFileAppender::builder()
            .rotation(Rotation::HOURLY)
            .filename_prefix("light-wallet")
            .filename_suffix("log")
            .max_log_files(48)
            .build(log_dir)
        {
            Ok(appender) => Some(appender),
            Err(e) => {
                eprintln!(
                    "Warning: Failed to create log file appender: {}. Logging to stderr only.",
                    e
                );
                None
            }
        };

        let stderr_layer = fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_filter(env_filter());

        if let Some(file_appender) = file_appender {
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter());

            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .init();

            std::mem::forget(guard);
        } else {
            tracing_subscriber::registry().with(stderr_layer).init();
        }
    });
}
