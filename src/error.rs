//! Error types for the edgequake-pdf2img library.
//!
//! Two error types, two failure modes:
//!
//! * [`Pdf2ImgError`]: **fatal**, the operation cannot proceed (bad input,
//!   missing external tool, unreadable `pdfinfo` output). Returned as
//!   `Err(Pdf2ImgError)` from the top-level `convert*` / `suggest*` functions.
//!
//! * [`PageError`]: **Non-fatal**, one page failed to convert while the
//!   others went through. Stored inside [`crate::output::PageResult`].
//!
//! The detection parsers in [`crate::detect`] never fail; malformed tool
//! output is skipped line by line.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2img library.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a file path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but the download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists but does not start with `%PDF`.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── External tool errors ──────────────────────────────────────────────
    /// The external binary could not be spawned because it is not installed.
    #[error("External tool '{program}' not found in PATH.\n{hint}")]
    ToolNotFound { program: String, hint: String },

    /// The external binary ran but exited unsuccessfully.
    #[error("{message}: `{command}` exited with {}\n{stderr}", describe_status(.status))]
    ToolFailed {
        message: String,
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// `pdfinfo` ran but did not report a usable page count.
    #[error("Could not read document info for '{path}': {detail}")]
    InfoUnavailable { path: PathBuf, detail: String },

    /// Stat on the PDF or an existing output image failed for a reason other
    /// than the file being absent.
    #[error("Failed to stat '{path}': {source}")]
    StatFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Selection errors ──────────────────────────────────────────────────
    /// Selected page numbers exceed the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// A page list for splitting is not of the form `1,3,7` or `3-6`.
    #[error("Invalid page list '{0}': expected e.g. \"1,3,7\" or \"3-6\"")]
    InvalidPageList(String),

    /// Crop geometry is not of the form `WxH+X+Y`.
    #[error("Invalid crop geometry '{0}': expected WIDTHxHEIGHT+X+Y")]
    InvalidGeometry(String),

    // ── Conversion outcome errors ─────────────────────────────────────────
    /// Every selected page failed; nothing was produced.
    #[error("All {total} pages failed to convert.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::output::ConversionOutput::into_result`], and by
    /// `convert` when a combined image was requested but a page is missing.
    #[error("{failed}/{total} pages failed during conversion")]
    PartialFailure {
        success: usize,
        failed: usize,
        total: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The image tool failed on this page.
    #[error("Page {page}: conversion failed: {detail}")]
    ConvertFailed { page: usize, detail: String },

    /// Stat on the page image or the PDF failed.
    #[error("Page {page}: could not check output freshness: {detail}")]
    StatFailed { page: usize, detail: String },
}

impl PageError {
    /// Demote a fatal error raised while converting one page.
    pub fn from_fatal(page: usize, err: &Pdf2ImgError) -> Self {
        match err {
            Pdf2ImgError::StatFailed { .. } => PageError::StatFailed {
                page,
                detail: err.to_string(),
            },
            _ => PageError::ConvertFailed {
                page,
                detail: err.to_string(),
            },
        }
    }

    /// 0-based page index this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::ConvertFailed { page, .. } | PageError::StatFailed { page, .. } => *page,
        }
    }
}
