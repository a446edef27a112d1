//! Finds the images to recognize under a directory
//!
//! Include and exclude globs are matched with `globset`; without include
//! patterns the default image extensions are used.

mod extensions;
mod filter;
mod walker;

pub use extensions::{DEFAULT_IMAGE_EXTENSIONS, is_image_path};
pub use filter::FileFilter;
pub use walker::{FileDiscovery, FileDiscoveryOptions, discover_files};

use std::path::PathBuf;

/// A file found by discovery
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, DiscoveryError>;
