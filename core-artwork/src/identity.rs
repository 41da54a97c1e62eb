//! Artwork identities
//!
//! An identity is a stable logical name plus a category. Names survive
//! database rebuilds, so they are what the disk layout is keyed on.

use bridge_traits::download::ArtworkSubject;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of artwork an identity refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtworkCategory {
    /// Album art supplied by the user or extracted from tags
    Album,
    /// Artist portrait
    Artist,
    /// Album art fetched from a remote provider
    Web,
    /// Synthetic mosaic built from several albums
    Rounded,
}

impl ArtworkCategory {
    pub const ALL: [ArtworkCategory; 4] = [
        ArtworkCategory::Album,
        ArtworkCategory::Artist,
        ArtworkCategory::Web,
        ArtworkCategory::Rounded,
    ];

    /// Prefix used in derived cache filenames.
    pub fn prefix(&self) -> &'static str {
        match self {
            ArtworkCategory::Album => "ALBUM",
            ArtworkCategory::Artist => "ARTIST",
            ArtworkCategory::Web => "WEB",
            ArtworkCategory::Rounded => "ROUNDED",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.prefix() == prefix)
    }

    /// Directory of the canonical store, relative to the data root.
    ///
    /// Composites only ever exist as derived entries.
    pub fn store_dir(&self) -> Option<&'static str> {
        match self {
            ArtworkCategory::Album => Some("albums"),
            ArtworkCategory::Artist => Some("artists"),
            ArtworkCategory::Web => Some("albums_web"),
            ArtworkCategory::Rounded => None,
        }
    }

    /// Subject to ask a downloader for.
    pub fn subject(&self) -> Option<ArtworkSubject> {
        match self {
            ArtworkCategory::Album | ArtworkCategory::Web => Some(ArtworkSubject::Album),
            ArtworkCategory::Artist => Some(ArtworkSubject::Artist),
            ArtworkCategory::Rounded => None,
        }
    }

    /// Prefixes whose renditions are built from this category's canonical file.
    ///
    /// Album lookups fall back to the web store, so a web change also
    /// invalidates album renditions of the same name.
    pub fn derived_prefixes(&self) -> &'static [&'static str] {
        match self {
            ArtworkCategory::Album => &["ALBUM"],
            ArtworkCategory::Artist => &["ARTIST"],
            ArtworkCategory::Web => &["WEB", "ALBUM"],
            ArtworkCategory::Rounded => &["ROUNDED"],
        }
    }
}

impl fmt::Display for ArtworkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A named piece of artwork.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtworkIdentity {
    pub name: String,
    pub category: ArtworkCategory,
}

impl ArtworkIdentity {
    pub fn new(name: impl Into<String>, category: ArtworkCategory) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }

    pub fn album(name: impl Into<String>) -> Self {
        Self::new(name, ArtworkCategory::Album)
    }

    pub fn artist(name: impl Into<String>) -> Self {
        Self::new(name, ArtworkCategory::Artist)
    }

    pub fn web(name: impl Into<String>) -> Self {
        Self::new(name, ArtworkCategory::Web)
    }

    /// Composite identity, e.g. `genre_jazz`.
    pub fn rounded(name: impl Into<String>) -> Self {
        Self::new(name, ArtworkCategory::Rounded)
    }

    pub fn prefix(&self) -> &'static str {
        self.category.prefix()
    }

    /// Same name, different category.
    pub fn with_category(&self, category: ArtworkCategory) -> Self {
        Self::new(self.name.clone(), category)
    }
}

impl fmt::Display for ArtworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category.prefix(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_round_trip() {
        for category in ArtworkCategory::ALL {
            assert_eq!(ArtworkCategory::from_prefix(category.prefix()), Some(category));
        }
        assert_eq!(ArtworkCategory::from_prefix("album"), None);
    }

    #[test]
    fn test_rounded_has_no_store() {
        assert!(ArtworkCategory::Rounded.store_dir().is_none());
        assert!(ArtworkCategory::Rounded.subject().is_none());
        assert_eq!(ArtworkCategory::Web.store_dir(), Some("albums_web"));
    }

    #[test]
    fn test_web_invalidates_album_renditions() {
        assert!(ArtworkCategory::Web.derived_prefixes().contains(&"ALBUM"));
        assert!(!ArtworkCategory::Album.derived_prefixes().contains(&"WEB"));
    }

    #[test]
    fn test_display() {
        let id = ArtworkIdentity::rounded("genre_jazz");
        assert_eq!(id.to_string(), "ROUNDED:genre_jazz");
        assert_eq!(id.with_category(ArtworkCategory::Album).prefix(), "ALBUM");
    }
}
