//! Streaming conversion API: emit pages as they complete.
//!
//! Unlike the eager [`crate::convert::convert`] which returns only after
//! all pages finish, [`convert_stream`] yields `PageResult` items via a
//! `Stream` as each child process exits. Pages arrive in completion order
//! (sort by `page` if order matters). Combining is not available here; use
//! [`crate::convert::combine_images`] on the collected paths.
//!
//! A progress callback sees the same events as with the eager API;
//! `on_conversion_complete` fires after the last page is yielded, so a
//! stream dropped early never completes.

use crate::config::ConversionConfig;
use crate::convert::{convert_one, prepare_layout, require_output_directory, selected_indices};
use crate::error::{PageError, Pdf2ImgError};
use crate::output::PageResult;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::info;
use futures::future;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page results.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<PageResult, PageError>> + Send>>;

/// Convert a PDF to images, streaming pages as they are ready.
///
/// # Returns
/// - `Ok(PageStream)`: a stream of `Result<PageResult, PageError>`
/// - `Err(Pdf2ImgError)`: fatal error (file not found, not a PDF, etc.)
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<PageStream, Pdf2ImgError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming conversion: {}", input_str);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    stream_resolved(resolved, config).await
}

/// Streaming equivalent of [`crate::convert::convert_from_bytes`].
///
/// The temporary PDF is deleted once the returned stream is dropped.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2img::{convert_stream_from_bytes, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("document.pdf")?;
/// let config = ConversionConfig::builder().output_directory("pages").build()?;
/// let mut stream = convert_stream_from_bytes(&bytes, &config).await?;
/// while let Some(page) = stream.next().await {
///     match page {
///         Ok(p) => println!("Page {}: {}", p.page, p.path.display()),
///         Err(e) => eprintln!("Error: {e}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<PageStream, Pdf2ImgError> {
    require_output_directory(config)?;
    stream_resolved(input::from_bytes(bytes)?, config).await
}

async fn stream_resolved(
    resolved: ResolvedInput,
    config: &ConversionConfig,
) -> Result<PageStream, Pdf2ImgError> {
    resolved.ensure_pdf()?;
    let doc_info = info::get_info(resolved.path(), config).await?;
    let total_pages = info::require_page_count(&doc_info, resolved.path())?;
    let page_indices = selected_indices(&config.pages, total_pages)?;
    let layout = Arc::new(prepare_layout(&resolved, config).await?);

    // Every page future holds the input, so a downloaded PDF outlives the
    // last child process.
    let resolved = Arc::new(resolved);
    let config = Arc::new(config.clone());
    let total = page_indices.len();
    let concurrency = config.concurrency;

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total);
    }

    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&succeeded);
    let callback = config.progress_callback.clone();

    let pages = stream::iter(page_indices.into_iter().map(move |page| {
        let resolved = Arc::clone(&resolved);
        let layout = Arc::clone(&layout);
        let config = Arc::clone(&config);
        async move {
            let mut result = convert_one(resolved.path(), page, total, &layout, &config).await;
            match result.error.take() {
                None => Ok(result),
                Some(e) => Err(e),
            }
        }
    }))
    .buffer_unordered(concurrency)
    .inspect(move |item| {
        if item.is_ok() {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    // Fires once the last page has been yielded.
    let finish = stream::once(async move {
        if let Some(cb) = callback {
            cb.on_conversion_complete(total, succeeded.load(Ordering::Relaxed));
        }
        None::<Result<PageResult, PageError>>
    });

    let s = pages.map(Some).chain(finish).filter_map(future::ready);

    Ok(Box::pin(s))
}
