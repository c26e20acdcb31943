//! Eager (full-document) conversion entry points.
//!
//! This module provides the simpler API: wait for all selected pages, then
//! return one [`ConversionOutput`]. Use [`crate::stream::convert_stream`]
//! instead to receive page results as each child process finishes.

use crate::config::{ConversionConfig, PageSelection};
use crate::error::{PageError, Pdf2ImgError};
use crate::output::{ConversionOutput, ConversionStats, DocumentInfo, PageResult};
use crate::pipeline::command::{self, OutputLayout};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::{exec, freshness, info};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

static RE_PAGE_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(-\d+)?(,\d+(-\d+)?)*$").unwrap());

/// Convert a PDF file or URL into page images.
///
/// Pages whose image already exists and is newer than the PDF are reused
/// rather than regenerated.
///
/// # Returns
/// `Ok(ConversionOutput)` even if some pages failed (check
/// `output.stats.failed_pages`, or call [`ConversionOutput::into_result`]).
///
/// # Errors
/// Returns `Err(Pdf2ImgError)` only for fatal errors:
/// - File not found / not a PDF / download failed
/// - `pdfinfo` missing or unusable
/// - All selected pages failed
/// - `combined_image` was requested but a page failed, or combining failed
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2ImgError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_resolved(resolved, config).await
}

async fn convert_resolved(
    resolved: ResolvedInput,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2ImgError> {
    let total_start = Instant::now();

    // ── Step 1: Validate input ───────────────────────────────────────────
    resolved.ensure_pdf()?;
    let pdf_path = resolved.path();

    // ── Step 2: Document info ────────────────────────────────────────────
    let doc_info = info::get_info(pdf_path, config).await?;
    let total_pages = info::require_page_count(&doc_info, pdf_path)?;
    info!("PDF has {} pages", total_pages);

    // ── Step 3: Page selection and output layout ─────────────────────────
    let page_indices = selected_indices(&config.pages, total_pages)?;
    let layout = prepare_layout(&resolved, config).await?;
    debug!(
        "Selected {} pages, writing to {}",
        page_indices.len(),
        layout.directory.display()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(page_indices.len());
    }

    // ── Step 4: Convert pages concurrently ───────────────────────────────
    let mut pages = convert_pages(pdf_path, &page_indices, &layout, config).await;
    // Numeric page order; sorting paths would put "-10" before "-2".
    pages.sort_by_key(|p| p.page);

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let failed = pages.iter().filter(|p| !p.is_ok()).count();
    let succeeded = pages.len() - failed;
    let converted = pages.iter().filter(|p| p.is_ok() && p.regenerated).count();

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(page_indices.len(), succeeded);
    }

    if succeeded == 0 {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Pdf2ImgError::AllPagesFailed {
            total: pages.len(),
            first_error,
        });
    }

    // ── Step 6: Optional combined image ──────────────────────────────────
    let combined = if config.combined_image {
        if failed > 0 {
            return Err(Pdf2ImgError::PartialFailure {
                success: succeeded,
                failed,
                total: pages.len(),
            });
        }
        let images: Vec<PathBuf> = pages.iter().map(|p| p.path.clone()).collect();
        let out = layout.file_path();
        combine_images(&images, &out, config).await?;
        remove_images(&images).await;
        Some(out)
    } else {
        None
    };

    let stats = ConversionStats {
        total_pages,
        selected_pages: page_indices.len(),
        converted_pages: converted,
        reused_pages: succeeded - converted,
        failed_pages: failed,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {}/{} pages ({} reused), {}ms total",
        succeeded,
        page_indices.len(),
        stats.reused_pages,
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        pages,
        combined,
        info: doc_info,
        stats,
    })
}

/// Convert one page (0-based frame index) of a local PDF.
///
/// Images go to `config.output_directory` or next to the PDF. Unlike
/// [`convert`], any failure is returned as an error.
pub async fn convert_page(
    pdf: impl AsRef<Path>,
    page: usize,
    config: &ConversionConfig,
) -> Result<PageResult, Pdf2ImgError> {
    let resolved = ResolvedInput::Local(pdf.as_ref().to_path_buf());
    let layout = prepare_layout(&resolved, config).await?;
    render_page(resolved.path(), page, &layout, config).await
}

/// Convert a PDF into a single combined image written to `output_path`.
///
/// Forces `combined_image` and derives the output directory, base name and
/// extension from `output_path`.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2ImgError> {
    let path = output_path.as_ref();
    let mut config = config.clone();
    config.combined_image = true;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        config.output_directory = Some(parent.to_path_buf());
    }
    if let Some(stem) = path.file_stem() {
        config.base_name = Some(stem.to_string_lossy().into_owned());
    }
    if let Some(ext) = path.extension() {
        config.extension = ext.to_string_lossy().into_owned();
    }

    let output = convert(input_str, &config).await?;
    debug!("Combined image written to {}", path.display());
    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2ImgError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2ImgError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Convert PDF bytes in memory.
///
/// The bytes are written to a temporary directory that is deleted on
/// return, so `config.output_directory` must be set.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2img::{convert_from_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::builder()
///     .output_directory("/tmp/pages")
///     .base_name("document")
///     .build()?;
/// let output = convert_from_bytes(&bytes, &config).await?;
/// println!("{:?}", output.image_paths());
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2ImgError> {
    require_output_directory(config)?;
    convert_resolved(input::from_bytes(bytes)?, config).await
}

/// Read document info without converting anything.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<DocumentInfo, Pdf2ImgError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    resolved.ensure_pdf()?;
    info::get_info(resolved.path(), config).await
}

/// Page count as reported by `pdfinfo`.
pub async fn number_of_pages(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<usize, Pdf2ImgError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    resolved.ensure_pdf()?;
    let doc_info = info::get_info(resolved.path(), config).await?;
    info::require_page_count(&doc_info, resolved.path())
}

/// Extract a subset of pages into one output file with the image tool.
///
/// `page_list` uses the tool's frame syntax: `"1,3,7"` for disjoint pages or
/// `"3-6"` for a range. The output is the page path for `page_number` when
/// given, otherwise the whole-file path, so with `extension("pdf")` this
/// splits a PDF into a smaller PDF. An output newer than the PDF is reused.
pub async fn split_pages(
    input_str: impl AsRef<str>,
    page_list: &str,
    page_number: Option<usize>,
    config: &ConversionConfig,
) -> Result<PathBuf, Pdf2ImgError> {
    let page_list = page_list.trim();
    if !RE_PAGE_LIST.is_match(page_list) {
        return Err(Pdf2ImgError::InvalidPageList(page_list.to_string()));
    }

    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    resolved.ensure_pdf()?;
    let layout = prepare_layout(&resolved, config).await?;
    let out = match page_number {
        Some(n) => layout.page_path(n),
        None => layout.file_path(),
    };

    let state = freshness::check(&out, resolved.path()).await?;
    if state.needs_conversion() {
        let cmd = command::convert_page_list(config, resolved.path(), page_list, &out);
        exec::run(&cmd, "Failed to convert page to image").await?;
        info!("Split pages [{}] into {}", page_list, out.display());
    } else {
        debug!("{} is up to date", out.display());
    }
    Ok(out)
}

/// Append images top-to-bottom into `out`.
pub async fn combine_images(
    images: &[PathBuf],
    out: &Path,
    config: &ConversionConfig,
) -> Result<(), Pdf2ImgError> {
    let cmd = command::combine(config, images, out);
    exec::run(&cmd, "Failed to combine images").await?;
    info!("Combined {} images into {}", images.len(), out.display());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Byte inputs live in a temp directory, so their images need a real home.
pub(crate) fn require_output_directory(config: &ConversionConfig) -> Result<(), Pdf2ImgError> {
    match config.output_directory {
        Some(_) => Ok(()),
        None => Err(Pdf2ImgError::InvalidConfig(
            "Byte input needs an output directory".into(),
        )),
    }
}

/// Expand the selection, failing when nothing remains.
pub(crate) fn selected_indices(
    selection: &PageSelection,
    total_pages: usize,
) -> Result<Vec<usize>, Pdf2ImgError> {
    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        let page = match selection {
            PageSelection::All => 1,
            PageSelection::Single(p) | PageSelection::Range(p, _) => *p,
            PageSelection::Set(pages) => pages.first().copied().unwrap_or(0),
        };
        return Err(Pdf2ImgError::PageOutOfRange {
            page,
            total: total_pages,
        });
    }
    Ok(indices)
}

/// Resolve the output layout and make sure its directory exists.
pub(crate) async fn prepare_layout(
    resolved: &ResolvedInput,
    config: &ConversionConfig,
) -> Result<OutputLayout, Pdf2ImgError> {
    let layout = OutputLayout::resolve(resolved.path(), resolved.default_output_dir(), config);
    tokio::fs::create_dir_all(&layout.directory)
        .await
        .map_err(|e| Pdf2ImgError::OutputWriteFailed {
            path: layout.directory.clone(),
            source: e,
        })?;
    Ok(layout)
}

/// Freshness check, then run the tool when the image is missing or stale.
async fn render_page(
    pdf: &Path,
    page: usize,
    layout: &OutputLayout,
    config: &ConversionConfig,
) -> Result<PageResult, Pdf2ImgError> {
    let start = Instant::now();
    let out = layout.page_path(page);

    let state = freshness::check(&out, pdf).await?;
    if state.needs_conversion() {
        let cmd = command::convert_page(config, pdf, page, &out);
        exec::run(&cmd, "Failed to convert page to image").await?;
        debug!("Page {} converted ({:?})", page, state);
    } else {
        debug!("Page {} reused: {} is up to date", page, out.display());
    }

    let (width, height) = image_size(&out).await;
    Ok(PageResult {
        page,
        path: out,
        regenerated: state.needs_conversion(),
        width,
        height,
        duration_ms: start.elapsed().as_millis() as u64,
        error: None,
    })
}

/// Convert one page, demoting any error into the result.
pub(crate) async fn convert_one(
    pdf: &Path,
    page: usize,
    total: usize,
    layout: &OutputLayout,
    config: &ConversionConfig,
) -> PageResult {
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page, total);
    }

    let result = match render_page(pdf, page, layout, config).await {
        Ok(r) => r,
        Err(e) => {
            warn!("Page {} failed: {}", page, e);
            PageResult::failed(
                page,
                layout.page_path(page),
                start.elapsed().as_millis() as u64,
                PageError::from_fatal(page, &e),
            )
        }
    };

    if let Some(ref cb) = config.progress_callback {
        match &result.error {
            None => cb.on_page_complete(page, total, &result.path, result.regenerated),
            Some(e) => cb.on_page_error(page, total, &e.to_string()),
        }
    }
    result
}

/// Run `convert_one` over every index with bounded concurrency.
async fn convert_pages(
    pdf: &Path,
    page_indices: &[usize],
    layout: &OutputLayout,
    config: &ConversionConfig,
) -> Vec<PageResult> {
    let total = page_indices.len();
    stream::iter(
        page_indices
            .iter()
            .map(|&page| convert_one(pdf, page, total, layout, config)),
    )
    .buffer_unordered(config.concurrency)
    .collect()
    .await
}

/// Dimensions from the image header; `None` for formats the `image` crate
/// cannot read (e.g. when splitting into PDF).
async fn image_size(path: &Path) -> (Option<u32>, Option<u32>) {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || image::image_dimensions(&owned)).await {
        Ok(Ok((w, h))) => (Some(w), Some(h)),
        _ => (None, None),
    }
}

async fn remove_images(images: &[PathBuf]) {
    for path in images {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}
