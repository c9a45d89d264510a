//! Logging setup
//!
//! The toolkit logs through `tracing`. Native calls are traced under the
//! [`NATIVE_TARGET`] target, which stays silent unless the diagnostics
//! toggle is set.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Target used for native call tracing
pub const NATIVE_TARGET: &str = "tether_ui::native";

/// Build the filter for the given settings
///
/// `RUST_LOG` wins when present; otherwise `info` plus any configured
/// directives.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(extra) = config.filter.as_deref() {
        for directive in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("tether: ignoring log directive {directive:?}: {e}"),
            }
        }
    }

    if config.trace_native_enabled() {
        if let Ok(d) = format!("{NATIVE_TARGET}=trace").parse() {
            filter = filter.add_directive(d);
        }
    }

    filter
}

/// Install the global subscriber
///
/// Safe to call more than once; later calls are ignored.
pub fn init(config: &LoggingConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config))
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init();
}
