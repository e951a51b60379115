use std::fs::File;
use std::sync::Mutex;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use atv::domain::AtvError;

const DEFAULT_FILTER: &str = "atv=info";

/// Logs go to `log_file`, the terminal is owned by the ui. `RUST_LOG`
/// overrides the default filter.
pub fn init(log_file: &str) -> Result<(), AtvError> {
    let path = shellexpand::full(log_file)
        .map_err(|e| AtvError::LoadingFailed(format!("invalid log file path: {e}")))?;
    let file = File::create(path.as_ref())?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let file_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();
    Ok(())
}
