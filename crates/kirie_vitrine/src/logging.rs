//! Tracing subscriber setup.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `KIRIE_LOG=debug`.
pub const LOG_ENV: &str = "KIRIE_LOG";

/// Install a stderr subscriber once per process. Defaults to `warn`.
///
/// Does nothing when the host already installed a global subscriber.
pub fn init_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}
