//! Global subscriber setup

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Output format and default verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output for development
    Development,
    /// JSON structured output for production
    Production,
    /// Bare registry; tests add their own capture layer
    Test,
}

static INIT_ONCE: Once = Once::new();

impl Profile {
    /// Filter used when `RUST_LOG` is unset
    ///
    /// Operation start and end events are `debug`, so production keeps
    /// retries and errors.
    pub fn default_filter(self) -> &'static str {
        match self {
            Profile::Development => "sqlmapper_core=debug,sqlmapper_store=debug",
            Profile::Production | Profile::Test => "sqlmapper_core=info,sqlmapper_store=info",
        }
    }

    fn filter(self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_filter()))
    }
}

/// Install the global subscriber for `profile`
///
/// Only the first call in a process has an effect, and a subscriber
/// installed elsewhere first is left alone. `RUST_LOG` overrides
/// [`Profile::default_filter`].
///
/// ```
/// use sqlmapper_core::logging_facility::{init, Profile};
///
/// init(Profile::Production);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let installed = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(profile.filter())
                .try_init()
                .is_ok(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_current_span(false)
                .with_env_filter(profile.filter())
                .try_init()
                .is_ok(),
            Profile::Test => tracing_subscriber::registry().try_init().is_ok(),
        };
        if !installed {
            tracing::debug!(?profile, "subscriber already installed");
        }
    });
}
