use std::sync::OnceLock;

use verdade_common::observability::{LogConfig, LogFormat};

static INIT: OnceLock<()> = OnceLock::new();

pub fn init_test_tracing() {
    INIT.get_or_init(|| {
        let config = LogConfig {
            app_name: "verdade-tests",
            emit_stderr: true,
            format: if std::env::var("VERDADE_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug".to_string(),
            ..LogConfig::default()
        };

        // Another test binary may already own the global subscriber.
        let _ = verdade_common::observability::init_logging(config);
    });
}
