/// Logger setup shared by the binary and the tests
use log::LevelFilter;
use std::sync::Once;

static INIT: Once = Once::new();

/// Default level `info`; `RUST_LOG` takes precedence when set
pub fn init_log() {
  init_log_with(LevelFilter::Info);
}

/// Quiet runs only show warnings and errors
pub fn init_log_quiet(quiet: bool) {
  init_log_with(if quiet { LevelFilter::Warn } else { LevelFilter::Info });
}

fn init_log_with(level: LevelFilter) {
  INIT.call_once(|| {
    let _ = env_logger::Builder::new()
      .filter_level(level)
      .parse_default_env()
      .format_timestamp(None)
      .try_init();
  });
}
