//! Logging setup shared by the citas binaries.
//!
//! Installs a `tracing_subscriber` registry with an `EnvFilter` (honours `RUST_LOG`),
//! a console `fmt` layer, and optionally a daily rolling file and journald.

use citas_config::LoggingConfig;
use tracing::{error, info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize console logging at INFO.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize console logging at the given level.
pub fn init_with_level(level: Level) {
    let config = LoggingConfig {
        level: level.to_string(),
        ..LoggingConfig::default()
    };
    // Console-only, so there is no file guard to keep.
    let _ = init_from_config(&config);
}

/// Initialize logging from the `[logging]` config section.
///
/// The returned guard flushes the file writer; the binary must hold it until exit.
/// Calling this twice keeps the first subscriber.
pub fn init_from_config(config: &LoggingConfig) -> Option<WorkerGuard> {
    let directive = format!("citas={}", config.level.to_lowercase());
    let filter = EnvFilter::from_default_env();
    let filter = match directive.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };

    let mut layers: Vec<BoxedLayer> = vec![fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .boxed()];

    let mut guard = None;
    if let Some(directory) = config.directory.as_deref() {
        let appender = tracing_appender::rolling::daily(directory, "citas.log");
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
        guard = Some(file_guard);
    }

    #[cfg(target_os = "linux")]
    let journald_error = if config.journald {
        match tracing_journald::layer() {
            Ok(layer) => {
                layers.push(layer.boxed());
                None
            }
            Err(err) => Some(err),
        }
    } else {
        None
    };

    let result = tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", config.level);
        #[cfg(target_os = "linux")]
        if let Some(err) = journald_error {
            error!("journald logging unavailable: {}", err);
        }
    }

    guard
}
