//! Cache configuration.
//!
//! Controls the resident entity cache, the export bundle cache, and the
//! session store adapter via `songstudio.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_SONG_CONTENT_LIMIT: usize = 200;
const DEFAULT_BUNDLE_TTL_SECS: u64 = 300;
const DEFAULT_SESSION_TTL_SECS: u64 = 300;
const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 600;

/// Cache configuration from `songstudio.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Warm entity collections eagerly at startup.
    pub warmup_on_start: bool,
    /// Maximum hydrated song-content entries kept resident.
    pub song_content_limit: usize,
    /// Freshness window for assembled export bundles, in seconds.
    pub bundle_ttl_secs: u64,
    /// Freshness window for session read-cache entries, in seconds.
    pub session_ttl_secs: u64,
    /// Cadence of the background session sweep, in seconds.
    pub session_sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            warmup_on_start: true,
            song_content_limit: DEFAULT_SONG_CONTENT_LIMIT,
            bundle_ttl_secs: DEFAULT_BUNDLE_TTL_SECS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            session_sweep_interval_secs: DEFAULT_SESSION_SWEEP_INTERVAL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            warmup_on_start: settings.warmup_on_start,
            song_content_limit: settings.song_content_limit,
            bundle_ttl_secs: settings.bundle_ttl_secs,
            session_ttl_secs: settings.session_ttl_secs,
            session_sweep_interval_secs: settings.session_sweep_interval_secs,
        }
    }
}

impl CacheConfig {
    /// Returns the song content limit as NonZeroUsize, clamping to 1 if zero.
    pub fn song_content_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.song_content_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn bundle_ttl(&self) -> Duration {
        Duration::from_secs(self.bundle_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.warmup_on_start);
        assert_eq!(config.song_content_limit, 200);
        assert_eq!(config.bundle_ttl_secs, 300);
        assert_eq!(config.session_ttl_secs, 300);
        assert_eq!(config.session_sweep_interval_secs, 600);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            song_content_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.song_content_limit_non_zero().get(), 1);
    }

    #[test]
    fn ttl_durations() {
        let config = CacheConfig {
            bundle_ttl_secs: 10,
            session_ttl_secs: 20,
            ..Default::default()
        };
        assert_eq!(config.bundle_ttl(), Duration::from_secs(10));
        assert_eq!(config.session_ttl(), Duration::from_secs(20));
    }
}
