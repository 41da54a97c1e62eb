//! Retention Sweeper
//!
//! Deletes files older than a per-directory maximum age. One unreadable or
//! undeletable entry is logged and counted; it never stops the sweep.

use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, MaintenanceEvent};
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::RetentionConfig;
use crate::error::Result;
use crate::identity::ArtworkCategory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub directory: PathBuf,
    pub max_age: Duration,
}

impl RetentionPolicy {
    pub fn new(directory: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            directory: directory.into(),
            max_age,
        }
    }

    /// Policies for the derived cache and each canonical store directory.
    pub fn defaults(cache_root: &Path, data_root: &Path, retention: &RetentionConfig) -> Vec<Self> {
        let mut policies = vec![Self::new(cache_root, retention.derived)];
        for category in [ArtworkCategory::Album, ArtworkCategory::Artist, ArtworkCategory::Web] {
            let max_age = match category {
                ArtworkCategory::Album => retention.albums,
                ArtworkCategory::Artist => retention.artists,
                _ => retention.web,
            };
            if let Some(dir) = category.store_dir() {
                policies.push(Self::new(data_root.join(dir), max_age));
            }
        }
        policies
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: u64,
    pub removed: u64,
    pub failed: u64,
}

impl SweepReport {
    pub fn merge(&mut self, other: SweepReport) {
        self.scanned += other.scanned;
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

pub struct RetentionSweeper {
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
}

impl RetentionSweeper {
    pub fn new(fs: Arc<dyn FileSystemAccess>, clock: Arc<dyn Clock>) -> Self {
        Self {
            fs,
            clock,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Remove files in `directory` last modified more than `max_age` ago.
    /// Subdirectories are left alone. A missing directory is an empty sweep.
    #[instrument(skip(self, directory), fields(directory = %strip_path(directory)))]
    pub async fn sweep(&self, directory: &Path, max_age: Duration) -> Result<SweepReport> {
        let entries = match self.fs.list_directory(directory).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                debug!("Nothing to sweep");
                return Ok(SweepReport::default());
            }
            Err(e) => return Err(e.into()),
        };

        let now = self.clock.unix_timestamp();
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let mut report = SweepReport::default();

        for path in entries {
            let metadata = match self.fs.metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(file = %strip_path(&path), error = %e, "Skipping unreadable entry");
                    report.failed += 1;
                    continue;
                }
            };
            if metadata.is_directory {
                continue;
            }
            report.scanned += 1;

            let Some(modified) = metadata.modified_at else {
                warn!(file = %strip_path(&path), "Skipping entry without modification time");
                report.failed += 1;
                continue;
            };
            if now.saturating_sub(modified) <= max_age {
                continue;
            }

            match self.fs.delete_file(&path).await {
                Ok(()) => {
                    debug!(file = %strip_path(&path), "Removed expired entry");
                    report.removed += 1;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(file = %strip_path(&path), error = %e, "Failed to remove expired entry");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Retention sweep finished"
        );

        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Maintenance(MaintenanceEvent::SweepCompleted {
                directory: strip_path(directory),
                scanned: report.scanned,
                removed: report.removed,
                failed: report.failed,
            }))
            .ok();
        }

        Ok(report)
    }

    /// Sweep every directory. A directory that cannot be listed counts as
    /// one failure and the remaining policies still run.
    pub async fn sweep_all(&self, policies: &[RetentionPolicy]) -> SweepReport {
        let mut total = SweepReport::default();
        for policy in policies {
            match self.sweep(&policy.directory, policy.max_age).await {
                Ok(report) => total.merge(report),
                Err(e) => {
                    warn!(directory = %strip_path(&policy.directory), error = %e, "Sweep failed");
                    total.failed += 1;
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::storage::FileMetadata;
    use bridge_traits::time::FixedClock;
    use crate::test_support::{not_found, MockFs};

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 24 * 60 * 60;

    fn file(modified_days_ago: i64) -> FileMetadata {
        FileMetadata {
            size: 10,
            created_at: None,
            modified_at: Some(NOW - modified_days_ago * DAY),
            is_directory: false,
        }
    }

    fn sweeper(fs: MockFs) -> RetentionSweeper {
        RetentionSweeper::new(Arc::new(fs), Arc::new(FixedClock::at_unix(NOW)))
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_files() {
        let mut fs = MockFs::new();
        fs.expect_list_directory().returning(|_| {
            Ok(vec![
                PathBuf::from("/cache/old.jpg"),
                PathBuf::from("/cache/new.jpg"),
                PathBuf::from("/cache/nested"),
            ])
        });
        fs.expect_metadata().returning(|path| {
            if path.ends_with("old.jpg") {
                Ok(file(400))
            } else if path.ends_with("new.jpg") {
                Ok(file(10))
            } else {
                Ok(FileMetadata {
                    size: 0,
                    created_at: None,
                    modified_at: Some(0),
                    is_directory: true,
                })
            }
        });
        fs.expect_delete_file()
            .withf(|path| path == Path::new("/cache/old.jpg"))
            .times(1)
            .returning(|_| Ok(()));

        let report = sweeper(fs)
            .sweep(Path::new("/cache"), Duration::from_secs(365 * DAY as u64))
            .await
            .unwrap();

        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                removed: 1,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_sweep_continues_past_unreadable_entries() {
        let mut fs = MockFs::new();
        fs.expect_list_directory().returning(|_| {
            Ok(vec![
                PathBuf::from("/cache/locked.jpg"),
                PathBuf::from("/cache/stuck.jpg"),
                PathBuf::from("/cache/expired.jpg"),
            ])
        });
        fs.expect_metadata().returning(|path| {
            if path.ends_with("locked.jpg") {
                Err(BridgeError::OperationFailed("permission denied".to_string()))
            } else {
                Ok(file(30))
            }
        });
        fs.expect_delete_file().returning(|path| {
            if path.ends_with("stuck.jpg") {
                Err(BridgeError::OperationFailed("busy".to_string()))
            } else {
                Ok(())
            }
        });

        let report = sweeper(fs)
            .sweep(Path::new("/cache"), Duration::from_secs(DAY as u64))
            .await
            .unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 2);
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty_sweep() {
        let mut fs = MockFs::new();
        fs.expect_list_directory().returning(|_| Err(not_found()));

        let report = sweeper(fs)
            .sweep(Path::new("/cache"), Duration::from_secs(DAY as u64))
            .await
            .unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_sweep_emits_completion_event() {
        let mut fs = MockFs::new();
        fs.expect_list_directory().returning(|_| Ok(Vec::new()));

        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        sweeper(fs)
            .with_event_bus(bus)
            .sweep(Path::new("/cache/artwork"), Duration::from_secs(DAY as u64))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            CoreEvent::Maintenance(MaintenanceEvent::SweepCompleted { directory, scanned, .. }) => {
                assert_eq!(directory, "artwork");
                assert_eq!(scanned, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sweep_all_survives_listing_failure() {
        let mut fs = MockFs::new();
        fs.expect_list_directory().returning(|path| {
            if path == Path::new("/broken") {
                Err(BridgeError::OperationFailed("io".to_string()))
            } else {
                Ok(vec![PathBuf::from("/ok/a.jpg")])
            }
        });
        fs.expect_metadata().returning(|_| Ok(file(5)));

        let policies = vec![
            RetentionPolicy::new("/broken", Duration::from_secs(DAY as u64)),
            RetentionPolicy::new("/ok", Duration::from_secs(30 * DAY as u64)),
        ];
        let report = sweeper(fs).sweep_all(&policies).await;

        assert_eq!(report.scanned, 1);
        assert_eq!(report.removed, 0);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_default_policies() {
        let policies = RetentionPolicy::defaults(
            Path::new("/cache/artwork"),
            Path::new("/data/artwork"),
            &RetentionConfig::default(),
        );
        let retention = RetentionConfig::default();

        assert_eq!(policies.len(), 4);
        assert_eq!(policies[0], RetentionPolicy::new("/cache/artwork", retention.derived));
        assert_eq!(policies[1], RetentionPolicy::new("/data/artwork/albums", retention.albums));
        assert_eq!(policies[2], RetentionPolicy::new("/data/artwork/artists", retention.artists));
        assert_eq!(policies[3], RetentionPolicy::new("/data/artwork/albums_web", retention.web));
    }
}
