use serde::Deserialize;

/// Configuration for background processing (payment reminders).
#[derive(Debug, Deserialize)]
pub struct BackgroundProcessingConfig {
    /// Whether background processing is enabled.
    #[serde(default = "default_background_enabled")]
    pub enabled: bool,
    /// How often to look for overdue orders of payment (seconds).
    #[serde(default = "default_reminder_interval")]
    pub reminder_interval_seconds: u64,
}

impl Default for BackgroundProcessingConfig {
    fn default() -> Self {
        Self {
            enabled: default_background_enabled(),
            reminder_interval_seconds: default_reminder_interval(),
        }
    }
}

fn default_background_enabled() -> bool {
    true
}

fn default_reminder_interval() -> u64 {
    3600
}
