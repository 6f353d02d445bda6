//! QR code rendering and the on-disk artifact

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use tracing::{debug, error};

use crate::error::{EmailError, Result};

/// Smallest side of the rendered image, in pixels
const MIN_SIZE: u32 = 300;

/// Render `payload` as a PNG-encoded QR code
pub fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| EmailError::Render(e.to_string()))?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_SIZE, MIN_SIZE)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| EmailError::Render(e.to_string()))?;

    Ok(png)
}

/// Rendered QR image on disk; the file is removed when this is dropped
#[derive(Debug)]
pub struct QrArtifact {
    path: PathBuf,
}

impl QrArtifact {
    /// Write `png` to `path`, replacing any previous image
    pub async fn create(path: &Path, png: &[u8]) -> Result<Self> {
        // Guard first so a partial write is cleaned up too
        let artifact = Self {
            path: path.to_path_buf(),
        };
        tokio::fs::write(&artifact.path, png).await?;
        debug!("QR code written to {}", artifact.path.display());
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for QrArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed QR code file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                let err = wa_core::Error::ArtifactCleanup(format!("{}: {}", self.path.display(), e));
                error!("Failed to delete QR code file: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_png_signature() {
        let png = render_png("2@abcdef,ghijkl,mnopqr==,stuvwx==").unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_render_png_dimensions() {
        let png = render_png("ref").unwrap();
        let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert!(decoded.width() >= MIN_SIZE);
        assert_eq!(decoded.width(), decoded.height());
    }

    #[tokio::test]
    async fn test_artifact_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrcode.png");

        let artifact = QrArtifact::create(&path, b"png").await.unwrap();
        assert!(artifact.path().exists());

        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_artifact_create_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("qrcode.png");

        let err = QrArtifact::create(&path, b"png").await.unwrap_err();
        assert!(matches!(err, EmailError::Io(_)));
    }
}
