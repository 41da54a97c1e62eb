//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-artwork`). Host applications can
//! depend on `artwork-workspace` and enable the documented features without
//! needing to wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{bootstrap, bootstrap_desktop, CoreError, CoreService};

#[cfg(feature = "artwork-remote")]
pub use core_artwork::DownloadQueue;
