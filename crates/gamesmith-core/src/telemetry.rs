//! Tracing initialisation for gamesmith binaries.
//!
//! Logs always go to stderr: stdout carries the validation event lines that
//! callers parse. Filtering reads `GAMESMITH_LOG`, then `RUST_LOG`, then falls
//! back to the requested level with the HTTP stack held at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "GAMESMITH_LOG";

/// Crates whose debug output drowns the pipeline's own events.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Directives used when neither environment variable is set.
pub fn default_directives(level: Level) -> String {
    let mut directives = level.as_str().to_ascii_lowercase();
    if level > Level::WARN {
        for target in QUIET_TARGETS {
            directives.push_str(&format!(",{target}=warn"));
        }
    }
    directives
}

fn log_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber; only the first call in a process wins.
///
/// With `json`, each line is one flattened object carrying the enclosing
/// validation span, so a whole run can be grepped by `run_id`.
pub fn init_tracing(json: bool, level: Level) {
    let filter = log_filter(level);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_quiet_http_stack() {
        let d = default_directives(Level::DEBUG);
        assert!(d.starts_with("debug,"));
        assert!(d.contains("reqwest=warn"));
        assert!(d.contains("hyper=warn"));
    }

    #[test]
    fn test_default_directives_at_warn_and_above_are_plain() {
        assert_eq!(default_directives(Level::WARN), "warn");
        assert_eq!(default_directives(Level::ERROR), "error");
    }

    #[test]
    fn test_default_directives_parse() {
        for level in [Level::ERROR, Level::INFO, Level::TRACE] {
            assert!(EnvFilter::try_new(default_directives(level)).is_ok());
        }
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
