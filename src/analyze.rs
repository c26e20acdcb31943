//! Marker and gutter suggestions for scanned document images.
//!
//! Each function runs the image tool once on a cropped region, reduces its
//! native output to the line-record format, and hands that to the pure
//! detectors in [`crate::detect`].

use crate::config::{ConversionConfig, CropRegion};
use crate::detect::{self, records, GutterPosition};
use crate::error::Pdf2ImgError;
use crate::pipeline::{command, exec, input};
use std::path::Path;
use tracing::{debug, info};

/// Horizontal marker lines (y positions, ascending) inside `crop`.
///
/// `crop` defaults to the whole image, which requires a raster input the
/// `image` crate can size; pass an explicit region for PDF input.
pub async fn suggest_markers(
    input_str: impl AsRef<str>,
    crop: Option<CropRegion>,
    config: &ConversionConfig,
) -> Result<Vec<i64>, Pdf2ImgError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let crop = crop_or_full(resolved.path(), crop)?;

    let cmd = command::markers(config, resolved.path(), &crop);
    let out = exec::run(&cmd, "Failed to get markers").await?;
    let lines = records::component_lines(&out.stdout);
    debug!("{} component lines in {}", lines.lines().count(), crop);

    let markers = detect::parse_marker_output(&lines, &config.markers);
    info!("Found {} markers in {}", markers.len(), resolved.path().display());
    Ok(markers)
}

/// Vertical gutter position inside `crop`.
///
/// Every row of the crop is scanned, so the row count is the crop height and
/// the fallback is taken as a share of the crop width.
pub async fn suggest_margin(
    input_str: impl AsRef<str>,
    crop: Option<CropRegion>,
    config: &ConversionConfig,
) -> Result<GutterPosition, Pdf2ImgError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let crop = crop_or_full(resolved.path(), crop)?;

    let cmd = command::margin(config, resolved.path(), &crop);
    let out = exec::run(&cmd, "Failed to run command").await?;
    let lines = records::black_pixel_lines(&out.stdout);
    debug!("{} black pixels in {}", lines.lines().count(), crop);

    let position =
        detect::parse_vertical_position_output(&lines, crop.height, crop.width, &config.gutter);
    info!("Gutter for {}: {:?}", resolved.path().display(), position);
    Ok(position)
}

fn crop_or_full(path: &Path, crop: Option<CropRegion>) -> Result<CropRegion, Pdf2ImgError> {
    match crop {
        Some(c) => Ok(c),
        None => CropRegion::full_image(path),
    }
}
