use serde::{Deserialize, Serialize};

/// Logging configuration for `tracing`/`tracing-subscriber` init.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info,habctl=debug"`.
    #[serde(default = "d_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: d_level() }
    }
}

fn d_level() -> String {
    "info,habctl=debug".into()
}
