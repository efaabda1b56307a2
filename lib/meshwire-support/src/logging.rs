//! Process-wide diagnostic sink. Components never reach for a static logger;
//! a `Logger` handle is constructed once at startup and threaded into every
//! constructor, exactly as `flux::logging` does it upstream.

pub use slog::{debug, error, info, o, trace, warn, Discard, Logger};
use sloggers::{Build, LoggerConfig};
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#;

/// Build a `Logger` from a sloggers TOML config file (see `flux::logging::init`,
/// which hard-coded the equivalent terminal config inline). A missing or
/// unparsable file falls back to a sane terminal default rather than
/// panicking, since logging setup should never be the reason the fabric
/// fails to start.
pub fn init<P: AsRef<Path>>(config_path: P) -> Logger {
    match serdeconv::from_toml_file::<LoggerConfig, _>(config_path) {
        Ok(config) => config.build_logger().unwrap_or_else(|_| default_logger()),
        Err(_) => default_logger(),
    }
}

/// A root logger with no sinks, for tests and standalone component use.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}

fn default_logger() -> Logger {
    let config: LoggerConfig =
        serdeconv::from_toml_str(DEFAULT_CONFIG).expect("built-in logger fallback config must parse");
    config.build_logger().unwrap_or_else(|_| discard())
}
