//! ICO icon creation for Windows executables.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::resources::icons::SourceIcon;
use ico::{IconDir, IconDirEntry, IconImage, ResourceType};
use std::path::Path;

/// Sizes Windows picks from for title bars, Explorer views and the taskbar.
const SIZES: &[u32] = &[16, 24, 32, 48, 64, 128, 256];

/// Converts a PNG into an ICO file at `output`.
pub async fn png_to_ico(png: &Path, output: &Path) -> Result<()> {
    let source = SourceIcon::open(png).await?;

    let mut icon_dir = IconDir::new(ResourceType::Icon);
    for size in source.usable_sizes(SIZES) {
        let image = IconImage::from_rgba_data(size, size, source.resized(size).into_raw());
        let entry = IconDirEntry::encode(&image)
            .map_err(|e| Error::GenericError(format!("encoding {size}x{size} icon: {e}")))?;
        icon_dir.add_entry(entry);
    }

    let file = tokio::fs::File::create(output)
        .await
        .fs_context("creating ICO output file", output)?
        .into_std()
        .await;
    tokio::task::spawn_blocking(move || icon_dir.write(file)).await??;

    log::debug!("Created ICO file: {}", output.display());
    Ok(())
}
