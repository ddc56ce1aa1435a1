//! Process-wide tunables.
//!
//! Constructed once at startup and shared via `Arc` by every node and the service loop.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// How often a `mutDir` is allowed to re-populate its children from describe.
    pub populate_interval: Duration,
    /// How long a locally-created child remains visible in a `mutDir` before describe
    /// is trusted to have caught up.
    pub deletion_refresh_window: Duration,
    /// How often the `recent` directory re-fetches its listing.
    pub recent_search_interval: Duration,
    /// TTL reported to the kernel for both entry and attribute caching.
    pub entry_ttl: Duration,
    /// `max_write` advertised at Init time.
    pub max_write: u32,
    /// Whether statistics-counter increments are real or no-ops (`CAMLI_TRACK_FS_STATS`).
    pub track_stats: bool,
    /// Forces every node under the root to behave as if permanently under an `at/<t>` scope:
    /// all mutation capabilities return EPERM. Set by `--read-only`.
    pub read_only: bool,
    /// Reserved bound on concurrent per-member fetches when listing a static-set directory.
    /// `None` means unlimited.
    pub max_concurrent_fetches: Option<usize>,
    /// Base URL for the blob store / describe / signing endpoints (`--blob-server` or
    /// `CAMLI_BLOBSERVER`). Threaded through as configuration data only; nothing in this
    /// crate speaks the wire protocol to it.
    pub blob_server: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            populate_interval: Duration::from_secs(30),
            deletion_refresh_window: Duration::from_secs(60),
            recent_search_interval: Duration::from_secs(10),
            entry_ttl: Duration::from_secs(60),
            max_write: 4096,
            track_stats: std::env::var_os("CAMLI_TRACK_FS_STATS").is_some(),
            read_only: false,
            max_concurrent_fetches: None,
            blob_server: std::env::var("CAMLI_BLOBSERVER").ok(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.populate_interval, Duration::from_secs(30));
        assert_eq!(c.deletion_refresh_window, Duration::from_secs(60));
        assert_eq!(c.recent_search_interval, Duration::from_secs(10));
        assert_eq!(c.max_write, 4096);
        assert_eq!(c.max_concurrent_fetches, None);
    }
}
