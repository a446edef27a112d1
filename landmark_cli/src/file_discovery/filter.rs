//! Include/exclude filtering over glob patterns

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;

use super::{DiscoveryError, Result};

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| DiscoveryError::InvalidPattern(format!("{pattern}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| DiscoveryError::InvalidPattern(e.to_string()))
}

/// Include and exclude glob sets; excludes always win
#[derive(Debug)]
pub struct FileFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl FileFilter {
    pub fn new(include_patterns: &[String], exclude_patterns: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_set(include_patterns)?,
            exclude: build_set(exclude_patterns)?,
        })
    }

    /// Excluded paths are dropped; otherwise a path passes when there are no
    /// include patterns or one of them matches
    pub fn should_include(&self, path: &Path) -> bool {
        if self.exclude.as_ref().is_some_and(|set| set.is_match(path)) {
            return false;
        }
        self.include.as_ref().is_none_or(|set| set.is_match(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_include_only() {
        let filter = FileFilter::new(&patterns(&["*.jpg", "*.png"]), &[]).unwrap();

        assert!(filter.should_include(Path::new("taj.jpg")));
        assert!(filter.should_include(Path::new("/trips/agra/fort.png")));
        assert!(!filter.should_include(Path::new("notes.txt")));
    }

    #[test]
    fn test_exclude_overrides_include() {
        let filter = FileFilter::new(&patterns(&["*.jpg"]), &patterns(&["thumbs/*.jpg"])).unwrap();

        assert!(filter.should_include(Path::new("gate.jpg")));
        assert!(!filter.should_include(Path::new("thumbs/gate.jpg")));
    }

    #[test]
    fn test_no_patterns_includes_everything() {
        let filter = FileFilter::new(&[], &[]).unwrap();
        assert!(filter.should_include(Path::new("anything.xyz")));
    }

    #[test]
    fn test_exclude_only() {
        let filter = FileFilter::new(&[], &patterns(&["*.raw"])).unwrap();
        assert!(filter.should_include(Path::new("a.jpg")));
        assert!(!filter.should_include(Path::new("a.raw")));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = FileFilter::new(&patterns(&["[unclosed"]), &[]).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidPattern(_)));
    }
}
