//! Log setup for the `rdbsplit` binary.
//!
//! The filter comes from the `RDBSPLIT_LOG` environment variable when it is
//! set (e.g. `RDBSPLIT_LOG=rdbsplit=trace`), otherwise from the level given on
//! the command line.

use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "RDBSPLIT_LOG";

/// Installs the global subscriber. Later calls are ignored.
pub fn init(default_level: &str) {
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

  let subscriber = fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_thread_ids(false)
    .with_file(false)
    .with_line_number(false)
    .compact();

  let _ = subscriber.try_init();
}
