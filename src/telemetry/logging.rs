use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub struct LogConfig {
    /// An `EnvFilter` directive such as `info` or `otwire::net=trace`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Installs the global fmt subscriber. Later calls leave the first one in
/// place.
pub fn init(config: &LogConfig) -> Result<(), String> {
    let filter = build_filter(config)?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

fn build_filter(config: &LogConfig) -> Result<EnvFilter, String> {
    EnvFilter::try_new(&config.level)
        .map_err(|err| format!("invalid log level '{}': {}", config.level, err))
}
