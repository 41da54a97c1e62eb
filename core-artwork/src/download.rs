//! Remote Artwork Downloads
//!
//! When a lookup finds no canonical source and the store has never heard of
//! the identity, it is queued here. A background task asks the host
//! [`ArtworkDownloader`] for candidates and keeps the first one that decodes.
//! When none does, the known-absent marker is written so the providers are
//! not asked again until the marker expires or is cleared.
//!
//! Album art found remotely is stored in the web store, which album lookups
//! fall back to.

use bridge_traits::download::{ArtworkDownloader, ArtworkQuery};
use core_runtime::events::{ArtworkEvent, CoreEvent, EventBus};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::error::{ArtworkError, Result};
use crate::identity::{ArtworkCategory, ArtworkIdentity};
use crate::store::ArtworkStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A candidate was decoded and stored.
    Stored,
    /// No usable candidate; the known-absent marker was written.
    NotFound,
}

/// Where remotely found artwork for `identity` is stored.
pub fn storage_identity(identity: &ArtworkIdentity) -> Result<ArtworkIdentity> {
    match identity.category {
        ArtworkCategory::Album | ArtworkCategory::Web => {
            Ok(identity.with_category(ArtworkCategory::Web))
        }
        ArtworkCategory::Artist => Ok(identity.clone()),
        ArtworkCategory::Rounded => Err(ArtworkError::NoCanonicalStore(
            identity.prefix().to_string(),
        )),
    }
}

pub struct DownloadQueue {
    downloader: Arc<dyn ArtworkDownloader>,
    store: Arc<ArtworkStore>,
    permits: Arc<Semaphore>,
    in_flight: Mutex<HashSet<ArtworkIdentity>>,
    event_bus: Option<EventBus>,
}

impl DownloadQueue {
    pub fn new(
        downloader: Arc<dyn ArtworkDownloader>,
        store: Arc<ArtworkStore>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            downloader,
            store,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Mutex::new(HashSet::new()),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Queue a lookup on a background task. Returns `false` when the
    /// identity cannot be downloaded or a lookup for it is already running.
    pub fn enqueue(self: &Arc<Self>, identity: ArtworkIdentity) -> bool {
        let Ok(target) = storage_identity(&identity) else {
            return false;
        };

        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(target.clone()) {
                debug!(identity = %identity, "Download already queued");
                return false;
            }
        }

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let _permit = queue.permits.acquire().await;
            match queue.fetch_and_store(&identity).await {
                Ok(outcome) => debug!(identity = %identity, ?outcome, "Download finished"),
                Err(e) => warn!(identity = %identity, error = %e, "Download failed"),
            }
            queue
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&target);
        });
        true
    }

    /// Number of lookups queued or running.
    pub fn pending(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Ask the downloader for candidates and store the first that decodes.
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn fetch_and_store(&self, identity: &ArtworkIdentity) -> Result<DownloadOutcome> {
        let target = storage_identity(identity)?;
        let Some(subject) = identity.category.subject() else {
            return Err(ArtworkError::NoCanonicalStore(identity.prefix().to_string()));
        };
        let query = ArtworkQuery::new(subject, identity.name.clone());

        let candidates = match self.downloader.fetch_candidates(&query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                if let Some(bus) = &self.event_bus {
                    bus.emit(CoreEvent::Artwork(ArtworkEvent::DownloadFailed {
                        name: identity.name.clone(),
                        category: identity.prefix().to_string(),
                        message: e.to_string(),
                    }))
                    .ok();
                }
                return Err(e.into());
            }
        };

        debug!(count = candidates.len(), "Received candidates");
        for (index, candidate) in candidates.into_iter().enumerate() {
            if candidate.is_empty() {
                continue;
            }
            match self.store.put(&target, Some(candidate), None).await {
                Ok(()) => {
                    info!(candidate = index, "Stored downloaded artwork");
                    return Ok(DownloadOutcome::Stored);
                }
                Err(e) if e.is_source_problem() => {
                    debug!(candidate = index, error = %e, "Rejected candidate");
                }
                Err(e) => return Err(e),
            }
        }

        self.store.put(&target, None, None).await?;
        info!("No usable artwork found");
        Ok(DownloadOutcome::NotFound)
    }
}
