//! PNG icon loading for platform icon conversion.
//!
//! A single PNG is scaled to every size the target format carries:
//!
//! | Platform | Output Format | Sizes |
//! |----------|---------------|-------|
//! | macOS | ICNS | 16, 32, 64, 128, 256, 512, 1024 |
//! | Windows | ICO | 16, 24, 32, 48, 64, 128, 256 |
//!
//! Sizes larger than the source are left out instead of upscaled.

use crate::bundler::error::{ErrorExt, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// A decoded source icon.
#[derive(Debug, Clone)]
pub struct SourceIcon {
    /// Path the icon was read from.
    pub path: PathBuf,
    image: DynamicImage,
}

impl SourceIcon {
    /// Decodes the PNG at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .fs_context("reading icon", path)?;
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
        log::debug!(
            "Loaded icon: {}x{} from {}",
            image.width(),
            image.height(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            image,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The subset of `sizes` this icon can provide without upscaling.
    ///
    /// When the icon is smaller than every size, the smallest size is kept
    /// so the output is never empty.
    pub fn usable_sizes(&self, sizes: &[u32]) -> Vec<u32> {
        let edge = self.width().min(self.height());
        let usable: Vec<u32> = sizes.iter().copied().filter(|size| *size <= edge).collect();
        if usable.is_empty() {
            sizes.iter().copied().min().into_iter().collect()
        } else {
            usable
        }
    }

    /// RGBA pixels scaled to `size`x`size` with Lanczos3 filtering.
    pub fn resized(&self, size: u32) -> image::RgbaImage {
        self.image
            .resize_exact(size, size, image::imageops::FilterType::Lanczos3)
            .to_rgba8()
    }
}

#[cfg(test)]
pub(crate) fn write_test_png(path: &Path, size: u32) {
    let image = image::RgbaImage::from_pixel(size, size, image::Rgba([200, 40, 40, 255]));
    image.save(path).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sizes_never_upscale() {
        let tmp = tempfile::tempdir().unwrap();
        let png = tmp.path().join("icon.png");
        write_test_png(&png, 64);

        let icon = SourceIcon::open(&png).await.unwrap();
        assert_eq!(icon.usable_sizes(&[16, 32, 64, 128]), vec![16, 32, 64]);
        assert_eq!(icon.usable_sizes(&[128, 256]), vec![128]);
        assert_eq!(icon.resized(32).dimensions(), (32, 32));
    }
}
