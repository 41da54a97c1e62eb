//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the artwork core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be implemented differently per platform.
//!
//! ## Traits
//!
//! ### I/O
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O, atomic writes, directory listing
//!
//! ### Media
//! - [`ImageCodec`](image::ImageCodec) - Decode, encode, scale, crop and blur pixel buffers
//! - [`ArtworkDownloader`](download::ArtworkDownloader) - Candidate artwork from remote providers
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! let codec = config.image_codec
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "ImageCodec".to_string(),
//!         message: "No image codec provided. \
//!                  Desktop: enable the desktop-shims feature. \
//!                  Mobile: inject platform-native adapter.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError`
//! and include context such as file paths.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks and blocking worker threads.

pub mod download;
pub mod error;
pub mod image;
pub mod logging;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use download::{ArtworkDownloader, ArtworkQuery, ArtworkSubject};
pub use image::{EncodeFormat, ImageCodec, PixelBuffer, ScaleFilter};
pub use storage::{FileMetadata, FileSystemAccess};
pub use logging::{LogEntry, LogLevel, LoggerSink};
pub use time::{Clock, FixedClock, SystemClock};
