//! Log output for test runs.

use tracing::Level;
use tracing_subscriber::fmt;

/// Install a subscriber that writes through the test harness's captured
/// output, at `debug` level. Calling this more than once is harmless.
pub fn init_test_logging() {
    init_test_logging_at(Level::DEBUG);
}

/// As [`init_test_logging`], with an explicit maximum level.
pub fn init_test_logging_at(level: Level) {
    let format = fmt::format()
        .with_level(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_thread_names(true)
        .without_time()
        .compact();

    let installed = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(level)
        .event_format(format)
        .try_init();
    if installed.is_err() {
        tracing::trace!("log subscriber already installed");
    }
}
