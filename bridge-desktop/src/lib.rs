//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `FileSystemAccess` using `tokio::fs`, rooted in the platform cache/data directories
//! - `ImageCodec` using the pure-Rust `image` crate
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ImageRsCodec, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fs = TokioFileSystem::new();
//!     let codec = ImageRsCodec::new();
//!
//!     // Use in core configuration
//! }
//! ```

mod filesystem;
mod image_codec;

pub use filesystem::TokioFileSystem;
pub use image_codec::ImageRsCodec;
