//! Remote Artwork Lookup
//!
//! Hosts that can reach artwork providers implement [`ArtworkDownloader`].
//! The core only asks for candidate payloads and decides what to keep.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What kind of subject is being searched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtworkSubject {
    Album,
    Artist,
}

/// Search request handed to an [`ArtworkDownloader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkQuery {
    pub subject: ArtworkSubject,
    /// Identity name the result will be stored under.
    pub name: String,
}

impl ArtworkQuery {
    pub fn new(subject: ArtworkSubject, name: impl Into<String>) -> Self {
        Self {
            subject,
            name: name.into(),
        }
    }
}

/// Artwork downloader trait
///
/// Returns raw encoded images in preference order. An empty list means no
/// provider had anything for the query.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::download::{ArtworkDownloader, ArtworkQuery, ArtworkSubject};
///
/// async fn first(downloader: &dyn ArtworkDownloader) -> Option<bytes::Bytes> {
///     let query = ArtworkQuery::new(ArtworkSubject::Artist, "Nina Simone");
///     downloader.fetch_candidates(&query).await.ok()?.into_iter().next()
/// }
/// ```
#[async_trait]
pub trait ArtworkDownloader: Send + Sync {
    async fn fetch_candidates(&self, query: &ArtworkQuery) -> Result<Vec<Bytes>>;
}
