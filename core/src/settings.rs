//! Fixed runtime settings.
//!
//! Nothing here is read from disk or the command line; the defaults are the
//! product. The structs stay deserializable so tests (and embedders) can
//! override single fields from a JSON snippet.

use std::time::Duration;

use serde::Deserialize;

use crate::composite::CompositeStyle;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub schedule: ScheduleSettings,
    pub composite: CompositeStyle,
    pub surface: SurfaceSettings,
}

/// Where images come from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Origin of the post listing API
    pub base_url: String,
    /// Tag filter applied to every page query
    pub tag: String,
    /// Assumed depth of the collection; pages are drawn from `0..max_page`
    pub max_page: u32,
    /// Posts requested per page (the API caps this at 100)
    pub page_size: u32,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            base_url: "https://yande.re".to_string(),
            tag: "feet".to_string(),
            max_page: 500,
            page_size: 100,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl SourceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// When refresh ticks fire
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Delay before the first tick, lets window creation settle
    pub initial_delay_ms: u64,
    pub interval_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            interval_secs: 60,
        }
    }
}

impl ScheduleSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Presentation of the overlay windows
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SurfaceSettings {
    /// Opacity of the whole overlay window (0.0 - 1.0)
    pub opacity: f32,
    /// How often window attributes (topmost, click-through) are re-applied
    pub reassert_interval_ms: u64,
    /// Sleep between iterations of a surface thread's loop
    pub poll_interval_ms: u64,
    /// Composites queued for a surface before producers wait
    pub install_queue: usize,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            opacity: 0.1,
            reassert_interval_ms: 1000,
            poll_interval_ms: 100,
            install_queue: 2,
        }
    }
}

impl SurfaceSettings {
    pub fn reassert_interval(&self) -> Duration {
        Duration::from_millis(self.reassert_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
