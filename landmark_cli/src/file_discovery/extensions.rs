//! Image extensions picked up when no include pattern is given

/// Extensions the recognizer accepts
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tif", "tiff"];

/// Convert extensions to case-insensitive-ish glob patterns (`*.jpg`, `*.JPG`)
pub fn extensions_to_patterns(extensions: &[&str]) -> Vec<String> {
    extensions
        .iter()
        .flat_map(|ext| [format!("*.{ext}"), format!("*.{}", ext.to_uppercase())])
        .collect()
}

/// Whether `path` has one of the default image extensions
pub fn is_image_path(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_extensions_are_unique() {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        for ext in DEFAULT_IMAGE_EXTENSIONS {
            assert!(seen.insert(ext), "Duplicate extension found: {ext}");
        }
    }

    #[test]
    fn test_extensions_to_patterns() {
        let patterns = extensions_to_patterns(&["jpg", "png"]);
        assert_eq!(patterns, vec!["*.jpg", "*.JPG", "*.png", "*.PNG"]);
    }

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("holiday/taj.JPG")));
        assert!(is_image_path(Path::new("scan.tiff")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("no_extension")));
    }
}
