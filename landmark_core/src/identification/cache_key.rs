//! Cache keys for image sources
//!
//! URLs are keyed by the URL itself. Files and in-memory images are keyed
//! by `name|size|mtime_millis`, so the key is cheap to compute but two
//! different images with identical metadata collide.

use super::types::ImageSource;
use crate::error::{IoError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use std::path::Path;

const URL_PREFIX: &str = "url:";
const FILE_PREFIX: &str = "file:";

/// Key for a remote image
pub fn url_key(url: &str) -> String {
    format!("{URL_PREFIX}{}", STANDARD.encode(url))
}

/// Key for an image identified by name, size and modification time
pub fn metadata_key(name: &str, size: u64, modified: Option<DateTime<Utc>>) -> String {
    let mtime = modified.map(|m| m.timestamp_millis()).unwrap_or(0);
    format!("{FILE_PREFIX}{}", STANDARD.encode(format!("{name}|{size}|{mtime}")))
}

async fn file_key(path: &Path) -> Result<String> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| IoError::from_std(e).with_path(path))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
    Ok(metadata_key(&name, metadata.len(), modified))
}

/// Cache key for `source`; files are stat'ed but not read
pub async fn cache_key(source: &ImageSource) -> Result<String> {
    match source {
        ImageSource::Url(url) => Ok(url_key(url)),
        ImageSource::File(path) => file_key(path).await,
        ImageSource::Bytes {
            name,
            data,
            modified,
        } => Ok(metadata_key(name, data.len() as u64, *modified)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_url_key() {
        assert_eq!(url_key("https://a.b/c.jpg"), "url:aHR0cHM6Ly9hLmIvYy5qcGc=");
    }

    #[test]
    fn test_metadata_key_encodes_name_size_mtime() {
        let modified = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let key = metadata_key("taj.jpg", 2048, Some(modified));
        let encoded = key.strip_prefix("file:").unwrap();
        let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, "taj.jpg|2048|1700000000123");
    }

    #[tokio::test]
    async fn test_same_metadata_same_key() {
        let a = ImageSource::Bytes {
            name: "a.jpg".into(),
            data: vec![1, 2, 3],
            modified: None,
        };
        let b = ImageSource::Bytes {
            name: "a.jpg".into(),
            data: vec![9, 9, 9],
            modified: None,
        };
        assert_eq!(cache_key(&a).await.unwrap(), cache_key(&b).await.unwrap());
    }

    #[tokio::test]
    async fn test_file_key_uses_metadata() {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(b"not really a jpeg").unwrap();

        let key = cache_key(&ImageSource::File(file.path().to_path_buf()))
            .await
            .unwrap();
        let decoded =
            String::from_utf8(STANDARD.decode(key.strip_prefix("file:").unwrap()).unwrap()).unwrap();
        let name = file.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(decoded.starts_with(&format!("{name}|17|")));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let result = cache_key(&ImageSource::File("/definitely/not/here.jpg".into())).await;
        assert!(result.is_err());
    }

    proptest! {
        #[test]
        fn test_metadata_keys_differ_by_size(name in "[a-z]{1,12}\\.jpg", size in 0u64..1 << 40) {
            let a = metadata_key(&name, size, None);
            let b = metadata_key(&name, size + 1, None);
            prop_assert_ne!(&a, &b);
            prop_assert_eq!(a, metadata_key(&name, size, None));
        }

        #[test]
        fn test_url_and_file_keys_never_collide(text in ".{0,64}") {
            prop_assert_ne!(url_key(&text), metadata_key(&text, 0, None));
        }
    }
}
