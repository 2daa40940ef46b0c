use std::time::Duration;


pub const DEFAULT_NAME_PATTERN: &str = "Polar H10";
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause between the settings request and the start command.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Substring the advertised device name must contain.
    pub name_pattern: String,
    pub scan_timeout: Duration,
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name_pattern: DEFAULT_NAME_PATTERN.to_string(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}
