//! ICNS icon creation for macOS bundles.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::resources::icons::SourceIcon;
use icns::{IconFamily, IconType, Image as IcnsImage, PixelFormat};
use std::path::Path;

const ICON_TYPES: &[(IconType, u32, &str)] = &[
    (IconType::RGBA32_16x16, 16, "16x16"),
    (IconType::RGBA32_16x16_2x, 32, "16x16@2x"),
    (IconType::RGBA32_32x32, 32, "32x32"),
    (IconType::RGBA32_32x32_2x, 64, "32x32@2x"),
    (IconType::RGBA32_64x64, 64, "64x64"),
    (IconType::RGBA32_128x128, 128, "128x128"),
    (IconType::RGBA32_128x128_2x, 256, "128x128@2x"),
    (IconType::RGBA32_256x256, 256, "256x256"),
    (IconType::RGBA32_256x256_2x, 512, "256x256@2x"),
    (IconType::RGBA32_512x512, 512, "512x512"),
    (IconType::RGBA32_512x512_2x, 1024, "512x512@2x"),
];

/// Converts a PNG into an ICNS file at `output`.
pub async fn png_to_icns(png: &Path, output: &Path) -> Result<()> {
    let source = SourceIcon::open(png).await?;
    let sizes: Vec<u32> = ICON_TYPES.iter().map(|(_, size, _)| *size).collect();
    let usable = source.usable_sizes(&sizes);

    let mut family = IconFamily::new();
    for (icon_type, size, name) in ICON_TYPES {
        if !usable.contains(size) {
            log::debug!("Skipping {} for {}", name, source.path.display());
            continue;
        }
        let rgba = source.resized(*size);
        let image = IcnsImage::from_data(PixelFormat::RGBA, *size, *size, rgba.into_raw())
            .map_err(|e| Error::GenericError(format!("creating ICNS image for {name}: {e}")))?;
        family
            .add_icon_with_type(&image, *icon_type)
            .map_err(|e| Error::GenericError(format!("adding {name} to icon family: {e}")))?;
    }

    let file = tokio::fs::File::create(output)
        .await
        .fs_context("creating ICNS output file", output)?
        .into_std()
        .await;
    tokio::task::spawn_blocking(move || {
        family
            .write(file)
            .map_err(|e| Error::GenericError(format!("writing ICNS data: {e}")))
    })
    .await??;

    log::debug!("Created ICNS file: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::resources::icons::write_test_png;

    #[tokio::test]
    async fn writes_readable_family() {
        let tmp = tempfile::tempdir().unwrap();
        let png = tmp.path().join("icon.png");
        let icns = tmp.path().join("icon.icns");
        write_test_png(&png, 128);

        png_to_icns(&png, &icns).await.unwrap();

        let family = IconFamily::read(std::fs::File::open(&icns).unwrap()).unwrap();
        assert!(family.has_icon_with_type(IconType::RGBA32_128x128));
        assert!(!family.has_icon_with_type(IconType::RGBA32_256x256));
    }
}
