//! cli::logging
//!
//! Tracing subscriber setup for the binary.
//!
//! Logs go to stderr so that `get` can stream file content on stdout.
//! `RUST_LOG` wins when set; otherwise only warnings are shown, or debug
//! output for this crate with `--debug`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
fn default_directive(debug: bool) -> &'static str {
    if debug {
        "warn,ghcommit=debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber.
///
/// Installing twice is not an error; the first subscriber stays.
pub fn init(debug: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_level(true)
        .compact();

    let filter_layer =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive(debug)))?;

    if tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }

    Ok(())
}
