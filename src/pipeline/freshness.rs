//! Decide whether a page image must be (re)generated.

use crate::error::Pdf2ImgError;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

/// State of an output image relative to its source PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No image yet.
    Missing,
    /// Image exists but is older than the PDF.
    Stale,
    /// Image is at least as new as the PDF; reuse it.
    Fresh,
}

impl Freshness {
    pub fn needs_conversion(self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

/// Compare modification times of `image` and `pdf`.
pub async fn check(image: &Path, pdf: &Path) -> Result<Freshness, Pdf2ImgError> {
    let image_mtime = match modified(image).await {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Freshness::Missing),
        Err(source) => {
            return Err(Pdf2ImgError::StatFailed {
                path: image.to_path_buf(),
                source,
            })
        }
    };
    let pdf_mtime = modified(pdf)
        .await
        .map_err(|source| Pdf2ImgError::StatFailed {
            path: pdf.to_path_buf(),
            source,
        })?;

    Ok(if image_mtime < pdf_mtime {
        Freshness::Stale
    } else {
        Freshness::Fresh
    })
}

async fn modified(path: &Path) -> std::io::Result<SystemTime> {
    tokio::fs::metadata(path).await?.modified()
}
