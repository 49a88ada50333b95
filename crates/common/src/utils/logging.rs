use std::io;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "info,service::keystore=debug,tower_http=info,sqlx=warn";

/// Output flavour of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// Parse `LOG_FORMAT`-style values; anything other than `json` is compact.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Compact
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT").map(|v| Self::parse(&v)).unwrap_or_default()
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize a compact stdout subscriber.
/// - Respects `RUST_LOG` if set
/// - Falls back to `info` with store debug output and quiet sqlx
pub fn init_logging_default() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

/// Initialize a JSON stdout subscriber for container log collectors.
pub fn init_logging_json() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .json()
        .with_writer(io::stdout)
        .try_init();
}

/// Initialize logging in the requested format. Safe to call more than once.
pub fn init_logging(format: LogFormat) {
    match format {
        LogFormat::Compact => init_logging_default(),
        LogFormat::Json => init_logging_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_format() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse(""), LogFormat::Compact);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(LogFormat::Compact);
        init_logging(LogFormat::Json);
    }
}
