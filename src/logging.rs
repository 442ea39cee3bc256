//! stderr diagnostics for `denv`.
//!
//! The library emits `tracing` events for allocation, session and removal
//! decisions. Only the binary installs a subscriber, and it writes to stderr
//! because `prepare` and `export` print machine-read output on stdout.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber.
///
/// `RUST_LOG` selects the level (`RUST_LOG=denv_cli=debug denv prepare dev`
/// shows every port and session decision); warnings only otherwise. Calling
/// this again after a subscriber is set is a no-op.
pub fn init() {
	let filter = EnvFilter::builder()
		.with_default_directive(LevelFilter::WARN.into())
		.from_env_lossy();

	let _ = tracing_subscriber::registry()
		.with(filter)
		.with(
			fmt::layer()
				.with_writer(std::io::stderr)
				.with_target(false)
				.without_time()
				.compact(),
		)
		.try_init();
}
