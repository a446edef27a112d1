//! Directory walking with pattern filtering

use std::path::Path;
use walkdir::{DirEntry, WalkDir};

use super::{
    DiscoveredFile, DiscoveryError, Result,
    extensions::{DEFAULT_IMAGE_EXTENSIONS, extensions_to_patterns},
    filter::FileFilter,
};

#[derive(Debug, Clone)]
pub struct FileDiscoveryOptions {
    pub include_patterns: Vec<String>,
    /// Override includes
    pub exclude_patterns: Vec<String>,
    /// Fall back to the image extensions when there are no include patterns
    pub use_defaults: bool,
    pub recursive: bool,
    pub follow_links: bool,
}

impl Default for FileDiscoveryOptions {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            use_defaults: true,
            recursive: false,
            follow_links: false,
        }
    }
}

impl FileDiscoveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Self {
        self.include_patterns = patterns;
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn with_use_defaults(mut self, use_defaults: bool) -> Self {
        self.use_defaults = use_defaults;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

/// Streaming iterator over matching files
pub struct FileDiscovery {
    walker: walkdir::IntoIter,
    filter: FileFilter,
}

impl FileDiscovery {
    pub fn new(path: &Path, options: FileDiscoveryOptions) -> Result<Self> {
        if !path.exists() {
            return Err(DiscoveryError::PathNotFound(path.to_path_buf()));
        }

        let include_patterns = if options.use_defaults && options.include_patterns.is_empty() {
            extensions_to_patterns(DEFAULT_IMAGE_EXTENSIONS)
        } else {
            options.include_patterns
        };
        let filter = FileFilter::new(&include_patterns, &options.exclude_patterns)?;

        let mut walker = WalkDir::new(path)
            .follow_links(options.follow_links)
            .sort_by_file_name();
        if !options.recursive {
            walker = walker.max_depth(1);
        }

        Ok(Self {
            walker: walker.into_iter(),
            filter,
        })
    }

    fn wanted(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_file() && self.filter.should_include(entry.path())
    }
}

impl Iterator for FileDiscovery {
    type Item = Result<DiscoveredFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Walk error: {e}");
                    continue;
                }
            };
            if !self.wanted(&entry) {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) => {
                    return Some(Ok(DiscoveredFile {
                        path: entry.into_path(),
                        size: metadata.len(),
                    }));
                }
                Err(e) => log::warn!("Skipping {}: {e}", entry.path().display()),
            }
        }
    }
}

/// Collect every matching file, in file-name order
pub fn discover_files(path: &Path, options: FileDiscoveryOptions) -> Result<Vec<DiscoveredFile>> {
    FileDiscovery::new(path, options)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn photo_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let base = dir.path();

        fs::write(base.join("agra.jpg"), b"x").unwrap();
        fs::write(base.join("delhi.PNG"), b"x").unwrap();
        fs::write(base.join("itinerary.txt"), b"x").unwrap();

        let nested = base.join("day2");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("fort.webp"), b"x").unwrap();
        fs::write(nested.join("fort.raw"), b"x").unwrap();

        dir
    }

    fn names(files: &[DiscoveredFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_defaults_pick_images_non_recursively() {
        let dir = photo_tree();
        let files = discover_files(dir.path(), FileDiscoveryOptions::new()).unwrap();
        assert_eq!(names(&files), vec!["agra.jpg", "delhi.PNG"]);
    }

    #[test]
    fn test_recursive() {
        let dir = photo_tree();
        let files =
            discover_files(dir.path(), FileDiscoveryOptions::new().with_recursive(true)).unwrap();
        // entries sort by file name, so day2/ is walked before delhi.PNG
        assert_eq!(names(&files), vec!["agra.jpg", "fort.webp", "delhi.PNG"]);
    }

    #[test]
    fn test_custom_include_and_exclude() {
        let dir = photo_tree();
        let options = FileDiscoveryOptions::new()
            .with_recursive(true)
            .with_include_patterns(vec!["*.raw".to_string(), "*.jpg".to_string()])
            .with_exclude_patterns(vec!["**/day2/*".to_string()]);
        let files = discover_files(dir.path(), options).unwrap();
        assert_eq!(names(&files), vec!["agra.jpg"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = discover_files(&dir.path().join("nope"), FileDiscoveryOptions::new()).unwrap_err();
        assert!(matches!(err, DiscoveryError::PathNotFound(_)));
    }
}
