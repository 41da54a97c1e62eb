//! # Artwork Cache Module
//!
//! Stores canonical cover art and serves resized, cropped, blurred and
//! composited renditions of it through a two-level cache.
//!
//! ## Overview
//!
//! This module handles:
//! - Canonical artwork per album, artist and remote lookup (`store`)
//! - Deterministic cache keys for derived renditions (`key`)
//! - Bounded in-memory and on-disk rendition caching (`derived`, `cache`)
//! - Four-tile composites with rounded corners (`composite`)
//! - Age-based cleanup of every artwork directory (`sweeper`)
//! - Remote artwork lookups (optional, feature-gated)

pub mod cache;
pub mod composite;
pub mod config;
pub mod derived;
#[cfg(feature = "artwork-remote")]
pub mod download;
pub mod error;
pub mod identity;
pub mod key;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod transform;
pub mod workers;

#[cfg(test)]
mod test_support;

pub use cache::{ArtworkCache, ArtworkLookup, ArtworkRequest};
pub use composite::{CompositeOutcome, CompositeRenderer, CompositeRequest};
pub use config::{ArtworkConfig, RetentionConfig, SizeTiers};
pub use derived::{DerivedCache, MemoryStats};
#[cfg(feature = "artwork-remote")]
pub use download::{DownloadOutcome, DownloadQueue};
pub use error::{ArtworkError, Result};
pub use identity::{ArtworkCategory, ArtworkIdentity};
pub use key::{CacheKey, CacheKeyEncoder, ParsedKey};
pub use service::{ArtworkDependencies, ArtworkService};
pub use store::{ArtworkStore, CanonicalState};
pub use sweeper::{RetentionPolicy, RetentionSweeper, SweepReport};
pub use transform::{ArtBehaviour, BlurStrength, CropMode, TransformFlags};
pub use workers::TransformPool;
