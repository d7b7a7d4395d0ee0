//! Logging setup.
//!
//! Everything logs through `tracing`. The CLI picks a [`Verbosity`]; a
//! `RUST_LOG` variable, when set, replaces it entirely.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much the crate logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Transitions and pass summaries.
    #[default]
    Normal,
    /// Per-source resolution and persistence details.
    Verbose,
    /// Request URLs and everything else.
    Trace,
}

impl Verbosity {
    /// Map `-q` and the `-v` count onto a verbosity.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// The most detailed level emitted.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directive used when `RUST_LOG` is not set.
    ///
    /// Dependencies stay at `warn` so HTTP client chatter does not drown the
    /// pass summaries.
    #[must_use]
    pub fn directive(self) -> String {
        format!("warn,flightwatch={}", self.level())
    }
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are ignored.
///
/// ```no_run
/// use flightwatch::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(verbosity >= Verbosity::Verbose))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 5), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
    }

    #[test]
    fn test_directive() {
        assert_eq!(Verbosity::Normal.directive(), "warn,flightwatch=INFO");
        assert_eq!(Verbosity::Quiet.directive(), "warn,flightwatch=ERROR");
        assert!(EnvFilter::try_new(Verbosity::Trace.directive()).is_ok());
    }

    #[test]
    fn test_ordering() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Normal < Verbosity::Verbose);
        assert!(Verbosity::Verbose < Verbosity::Trace);
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(Verbosity::Normal);
        init_logging(Verbosity::Trace);
    }
}
