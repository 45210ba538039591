//! Validated runtime settings for the acquisition coordinator.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Base pacing delay between consecutive requester wakes.
pub const REQUEST_INTERVAL: Duration = Duration::from_millis(500);

/// Overlay-message pacing on platforms with a tight file-descriptor budget.
pub const CONSTRAINED_MESSAGE_INTERVAL: Duration = Duration::from_secs(1);

/// Magnet and thumbnail pacing on platforms with a tight file-descriptor
/// budget.
pub const CONSTRAINED_SLOW_INTERVAL: Duration = Duration::from_secs(15);

const fn default_max_num_torrents() -> u64 {
    50_000
}

const fn default_true() -> bool {
    true
}

const fn default_overflow_check_interval() -> Duration {
    Duration::from_secs(30 * 60)
}

const fn default_magnet_pre_delay() -> Duration {
    Duration::from_secs(5)
}

const fn default_magnet_retrieve_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Runtime knobs for the coordinator and its requesters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorSettings {
    /// Flat directory holding collected descriptors and thumbnails.
    pub collection_dir: PathBuf,
    /// Quota target for collected descriptors.
    #[serde(default = "default_max_num_torrents")]
    pub max_num_torrents: u64,
    /// Whether magnet/DHT collection is enabled.
    #[serde(default = "default_true")]
    pub dht_collecting: bool,
    /// Whether the host platform has a tight file-descriptor ceiling and
    /// needs the slower pacing overrides.
    #[serde(default)]
    pub constrained_fd_budget: bool,
    /// Cadence of the collection-quota overflow check.
    #[serde(default = "default_overflow_check_interval")]
    pub overflow_check_interval: Duration,
    /// Pre-delay scaling factor applied per priority before a magnet attempt
    /// is enqueued.
    #[serde(default = "default_magnet_pre_delay")]
    pub magnet_pre_delay: Duration,
    /// Per-attempt deadline handed to the magnet resolver.
    #[serde(default = "default_magnet_retrieve_timeout")]
    pub magnet_retrieve_timeout: Duration,
}

impl CollectorSettings {
    /// Settings rooted at `collection_dir` with every other knob at its
    /// default.
    pub fn new(collection_dir: impl Into<PathBuf>) -> Self {
        Self {
            collection_dir: collection_dir.into(),
            max_num_torrents: default_max_num_torrents(),
            dht_collecting: true,
            constrained_fd_budget: false,
            overflow_check_interval: default_overflow_check_interval(),
            magnet_pre_delay: default_magnet_pre_delay(),
            magnet_retrieve_timeout: default_magnet_retrieve_timeout(),
        }
    }

    /// Reject unusable settings before the coordinator starts.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] naming the offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.collection_dir.as_os_str().is_empty() {
            return Err(SettingsError::Invalid {
                field: "collection_dir",
                reason: "must not be empty",
            });
        }
        if self.max_num_torrents == 0 {
            return Err(SettingsError::Invalid {
                field: "max_num_torrents",
                reason: "must be positive",
            });
        }
        if self.overflow_check_interval.is_zero() {
            return Err(SettingsError::Invalid {
                field: "overflow_check_interval",
                reason: "must be positive",
            });
        }
        if self.magnet_retrieve_timeout.is_zero() {
            return Err(SettingsError::Invalid {
                field: "magnet_retrieve_timeout",
                reason: "must be positive",
            });
        }
        Ok(())
    }

    /// Pacing interval for file-transfer descriptor requesters.
    #[must_use]
    pub const fn transfer_interval(&self) -> Duration {
        REQUEST_INTERVAL
    }

    /// Pacing interval for overlay-message requesters.
    #[must_use]
    pub const fn message_interval(&self) -> Duration {
        if self.constrained_fd_budget {
            CONSTRAINED_MESSAGE_INTERVAL
        } else {
            REQUEST_INTERVAL
        }
    }

    /// Pacing interval for magnet requesters.
    #[must_use]
    pub const fn magnet_interval(&self) -> Duration {
        if self.constrained_fd_budget {
            CONSTRAINED_SLOW_INTERVAL
        } else {
            REQUEST_INTERVAL
        }
    }

    /// Pacing interval for the thumbnail requester.
    #[must_use]
    pub const fn thumbnail_interval(&self) -> Duration {
        if self.constrained_fd_budget {
            CONSTRAINED_SLOW_INTERVAL
        } else {
            REQUEST_INTERVAL
        }
    }

    /// Concurrent in-flight magnet resolutions allowed per requester.
    #[must_use]
    pub const fn magnet_max_concurrent(&self) -> usize {
        if self.constrained_fd_budget { 1 } else { 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn defaults_validate() -> Result<()> {
        let settings = CollectorSettings::new("/var/lib/magpie/collected");
        settings.validate()?;
        assert!(settings.dht_collecting);
        assert_eq!(settings.max_num_torrents, 50_000);
        assert_eq!(settings.magnet_pre_delay, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn zero_quota_is_rejected() {
        let mut settings = CollectorSettings::new("/tmp/collected");
        settings.max_num_torrents = 0;
        let err = settings.validate().expect_err("expected rejection");
        assert!(matches!(
            err,
            SettingsError::Invalid {
                field: "max_num_torrents",
                ..
            }
        ));
    }

    #[test]
    fn empty_collection_dir_is_rejected() {
        let settings = CollectorSettings::new("");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn constrained_platforms_slow_the_socket_heavy_queues() {
        let mut settings = CollectorSettings::new("/tmp/collected");
        assert_eq!(settings.message_interval(), REQUEST_INTERVAL);
        assert_eq!(settings.magnet_interval(), REQUEST_INTERVAL);
        assert_eq!(settings.magnet_max_concurrent(), 3);

        settings.constrained_fd_budget = true;
        assert_eq!(settings.message_interval(), CONSTRAINED_MESSAGE_INTERVAL);
        assert_eq!(settings.magnet_interval(), CONSTRAINED_SLOW_INTERVAL);
        assert_eq!(settings.thumbnail_interval(), CONSTRAINED_SLOW_INTERVAL);
        assert_eq!(settings.magnet_max_concurrent(), 1);
    }

    #[test]
    fn settings_deserialize_with_defaults() -> Result<()> {
        let settings: CollectorSettings =
            serde_json::from_str(r#"{"collection_dir": "/tmp/collected"}"#)?;
        settings.validate()?;
        assert_eq!(
            settings.overflow_check_interval,
            Duration::from_secs(1_800)
        );
        Ok(())
    }
}
