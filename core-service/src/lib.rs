//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (filesystem, image
//! codec, clock, optional artwork downloader) into the artwork core. Desktop
//! apps typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so only the two directories have to be supplied.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_artwork::{ArtworkService, SweepReport};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    event_bus: EventBus,
    artwork: Arc<ArtworkService>,
}

impl CoreService {
    /// Build the service graph from a validated configuration.
    pub fn new(config: CoreConfig) -> Result<Self> {
        let event_bus = EventBus::new(config.event_buffer_size);
        let artwork = ArtworkService::from_core(&config, event_bus.clone())?;

        Ok(Self {
            config: Arc::new(config),
            event_bus,
            artwork: Arc::new(artwork),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn artwork(&self) -> Arc<ArtworkService> {
        Arc::clone(&self.artwork)
    }

    /// Every core event, including maintenance notifications.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Run the retention sweep over every artwork directory.
    pub async fn run_maintenance(&self) -> SweepReport {
        self.artwork.sweep_expired().await
    }
}

/// Create the service and run the startup sweep when it is enabled.
///
/// ```ignore
/// use core_runtime::config::CoreConfig;
///
/// let config = CoreConfig::builder()
///     .cache_dir("/tmp/artwork/cache")
///     .data_dir("/tmp/artwork/data")
///     .sweep_on_startup(true)
///     .build()?;
/// let core = core_service::bootstrap(config).await?;
/// let covers = core.artwork();
/// ```
#[instrument(skip(config))]
pub async fn bootstrap(config: CoreConfig) -> Result<CoreService> {
    let sweep = config.features.sweep_on_startup;
    let service = CoreService::new(config)?;

    if sweep {
        let report = service.run_maintenance().await;
        info!(
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Startup sweep finished"
        );
    }

    Ok(service)
}

/// Bootstrap with the desktop bridges and default settings.
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub async fn bootstrap_desktop(
    cache_dir: impl Into<std::path::PathBuf>,
    data_dir: impl Into<std::path::PathBuf>,
) -> Result<CoreService> {
    let config = CoreConfig::builder()
        .cache_dir(cache_dir.into())
        .data_dir(data_dir.into())
        .file_system(Arc::new(bridge_desktop::TokioFileSystem::new()))
        .image_codec(Arc::new(bridge_desktop::ImageRsCodec::new()))
        .build()?;
    bootstrap(config).await
}
