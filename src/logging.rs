//! Tracing setup for the binary.
//!
//! Logs go to stderr so stdout stays clean for command output and dump
//! streams. Filter precedence: `LIBRARIAN_LOG`, then `RUST_LOG`, then the
//! verbosity default.

use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "LIBRARIAN_LOG";

/// Default directive for a verbosity level (`-v` count).
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "librarian=info",
        1 => "librarian=debug",
        _ => "librarian=trace",
    }
}

/// Build the filter from the environment, falling back to `verbose`.
pub fn build_filter(verbose: u8, lookup: &dyn Fn(&str) -> Option<String>) -> EnvFilter {
    let from_env = lookup(ENV_LOG)
        .or_else(|| lookup("RUST_LOG"))
        .filter(|s| !s.trim().is_empty());
    match from_env {
        Some(directives) => EnvFilter::try_new(&directives)
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose))),
        None => EnvFilter::new(default_directive(verbose)),
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbose: u8) {
    let filter = build_filter(verbose, &|key| std::env::var(key).ok());
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_defaults() {
        assert_eq!(default_directive(0), "librarian=info");
        assert_eq!(default_directive(1), "librarian=debug");
        assert_eq!(default_directive(5), "librarian=trace");
    }

    #[test]
    fn test_env_takes_precedence() {
        let filter = build_filter(0, &|key| (key == ENV_LOG).then(|| "librarian=warn".to_string()));
        assert_eq!(filter.to_string(), "librarian=warn");

        let filter = build_filter(1, &|key| (key == "RUST_LOG").then(|| "debug".to_string()));
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_invalid_env_falls_back() {
        let filter = build_filter(1, &|_| Some("=[".to_string()));
        assert_eq!(filter.to_string(), "librarian=debug");
    }
}
