use std::time::Duration;

use tracing::warn;

/// Tunables for a chat session.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Messages requested per history page.
    pub page_size: usize,
    /// Scroll offset from the top below which an older page is requested.
    pub near_top_px: f32,
    /// Distance from the bottom within which new messages auto-scroll.
    pub near_bottom_px: f32,
    /// Wait before re-fetching a message whose uploads have settled.
    pub reconcile_delay: Duration,
    /// Re-fetch attempts before falling back to the upload responses.
    pub reconcile_attempts: u32,
    /// Largest file the uploader will hand to the storage service.
    pub max_file_size: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            near_top_px: 100.0,
            near_bottom_px: 150.0,
            reconcile_delay: Duration::from_millis(500),
            reconcile_attempts: 3,
            max_file_size: 50 * 1024 * 1024,
        }
    }
}

impl ChatConfig {
    /// Load overrides from `INTRANET_CHAT_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            page_size: env_or("INTRANET_CHAT_PAGE_SIZE", defaults.page_size).max(1),
            near_top_px: env_or("INTRANET_CHAT_NEAR_TOP_PX", defaults.near_top_px),
            near_bottom_px: env_or("INTRANET_CHAT_NEAR_BOTTOM_PX", defaults.near_bottom_px),
            reconcile_delay: Duration::from_millis(env_or(
                "INTRANET_CHAT_RECONCILE_DELAY_MS",
                defaults.reconcile_delay.as_millis() as u64,
            )),
            reconcile_attempts: env_or(
                "INTRANET_CHAT_RECONCILE_ATTEMPTS",
                defaults.reconcile_attempts,
            )
            .max(1),
            max_file_size: env_or("INTRANET_CHAT_MAX_FILE_SIZE", defaults.max_file_size),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}='{}'", key, raw);
            default
        }),
        Err(_) => default,
    }
}
