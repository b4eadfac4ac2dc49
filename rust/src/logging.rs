//! Verbosity-gated logging for the scheduling and simulation passes.
//!
//! Events go through `tracing`, so the embedding service decides where they
//! end up. The verbosity knob travels in each pass's configuration:
//! - 0: SILENT (nothing beyond returned errors)
//! - 1: CHANGES (run summaries, fallbacks taken)
//! - 2: CHECKS (per-task decisions, slot search outcomes)
//! - 3: DEBUG (per-iteration internals)

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log at CHANGES level (verbosity >= 1).
///
/// Used for: run summaries, horizon fallbacks, aborted simulations.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            ::tracing::info!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2).
///
/// Used for: slot search results, per-task scheduling decisions.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            ::tracing::debug!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3).
///
/// Used for: individual trial results and sampled durations.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            ::tracing::trace!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_ordering() {
        assert!(VERBOSITY_SILENT < VERBOSITY_CHANGES);
        assert!(VERBOSITY_CHANGES < VERBOSITY_CHECKS);
        assert!(VERBOSITY_CHECKS < VERBOSITY_DEBUG);
    }

    #[test]
    fn test_log_macros_expand_at_every_level() {
        for verbosity in VERBOSITY_SILENT..=VERBOSITY_DEBUG {
            log_changes!(verbosity, "changes {}", verbosity);
            log_checks!(verbosity, "checks {}", verbosity);
            log_debug!(verbosity, task = "T001", "debug {}", verbosity);
        }
    }
}
