//! Store photo uploads.
//!
//! Photos are written under the configured uploads directory with a random
//! UUID file name and served back from `/uploads`.

use std::path::{Path, PathBuf};

use axum::extract::multipart::MultipartError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while accepting an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The multipart body could not be read.
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    /// The file is not an image.
    #[error("That filetype isn't allowed! ({0})")]
    UnsupportedType(String),

    /// Writing the file failed.
    #[error("could not store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes uploaded photos to disk.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    /// Create a photo store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory photos are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save an uploaded photo, returning its file name.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnsupportedType` unless `content_type` is a JPEG,
    /// PNG, GIF, or WebP image.
    /// Returns `UploadError::Io` if the file cannot be written.
    pub async fn save(&self, content_type: &str, bytes: &[u8]) -> Result<String, UploadError> {
        let extension = image_extension(content_type)
            .ok_or_else(|| UploadError::UnsupportedType(content_type.to_string()))?;
        let file_name = format!("{}.{extension}", Uuid::new_v4());

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;

        tracing::info!(file = %file_name, size = bytes.len(), "Stored photo upload");
        Ok(file_name)
    }
}

/// File extension for a raster image MIME type, or `None` for anything else.
///
/// Uploads are served from the site's own origin, so scriptable formats
/// such as SVG are refused.
fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("image/PNG"), Some("png"));
        assert_eq!(image_extension("image/webp; charset=binary"), Some("webp"));
        assert_eq!(image_extension("image/svg+xml"), None);
        assert_eq!(image_extension("image/x-icon"), None);
        assert_eq!(image_extension("text/plain"), None);
        assert_eq!(image_extension("application/octet-stream"), None);
        assert_eq!(image_extension("image/"), None);
    }

    #[tokio::test]
    async fn test_save_writes_uuid_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let photos = PhotoStore::new(dir.path().join("nested"));

        let name = photos.save("image/png", b"\x89PNG").await.unwrap();
        assert!(name.ends_with(".png"));
        assert!(Uuid::parse_str(name.trim_end_matches(".png")).is_ok());
        assert_eq!(std::fs::read(photos.dir().join(&name)).unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn test_save_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let photos = PhotoStore::new(dir.path());
        assert!(matches!(
            photos.save("text/html", b"<p>").await,
            Err(UploadError::UnsupportedType(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_save_rejects_svg() {
        let dir = tempfile::tempdir().unwrap();
        let photos = PhotoStore::new(dir.path());
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><script>alert(1)</script></svg>"#;
        assert!(matches!(
            photos.save("image/svg+xml", svg).await,
            Err(UploadError::UnsupportedType(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
