use crate::config::{ensure_logs_dir, get_logs_dir};
use crate::error::Result;
use std::sync::{LazyLock, Mutex};
use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

static LOGGER_INITIALIZED: std::sync::Once = std::sync::Once::new();

// Keep the guard alive for the lifetime of the program
static FILE_APPENDER_GUARD: LazyLock<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> =
    LazyLock::new(|| Mutex::new(None));

pub fn init_logging() -> Result<()> {
    ensure_logs_dir()?;

    LOGGER_INITIALIZED.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        // Console logging for development - compact format
        let console_layer = fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_filter(env_filter);

        let file_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        // File logging for all application output
        let logs_dir = get_logs_dir().expect("Failed to get logs directory");
        let file_appender = tracing_appender::rolling::daily(&logs_dir, "core.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Store the guard to keep the writer alive
        if let Ok(mut guard_mutex) = FILE_APPENDER_GUARD.lock() {
            *guard_mutex = Some(guard);
        }

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_filter(file_filter);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .init();
    });

    Ok(())
}
