//! Tracing subscriber setup for hosts embedding a tutor session.

use std::env;

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Installs a stderr fmt subscriber.
///
/// `directives` (usually `TUTOR_LOG`) wins over `RUST_LOG`. With neither set,
/// nothing is installed and `Ok(false)` is returned. An already installed
/// global subscriber is kept.
pub fn init_tracing(directives: Option<&str>) -> Result<bool, ParseError> {
    let filter = match directives {
        Some(directives) => EnvFilter::try_new(directives)?,
        None if env::var_os(EnvFilter::DEFAULT_ENV).is_some() => EnvFilter::from_default_env(),
        None => return Ok(false),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let init_result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();

    if let Err(err) = init_result {
        tracing::warn!(error = %err, "tracing already initialized; skipping tutor tracing setup");
        return Ok(false);
    }

    Ok(true)
}
