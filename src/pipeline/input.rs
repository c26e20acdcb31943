//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! The image tools only read from the file system, so URL inputs are
//! streamed into a `TempDir` that lives exactly as long as the
//! [`ResolvedInput`]. Because that directory disappears afterwards, page
//! images for downloaded inputs default to the current directory rather
//! than to the PDF's location.

use crate::error::Pdf2ImgError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// The resolved input: either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL or raw bytes; the file sits in a temp directory kept
    /// alive here.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path of the local file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// Where outputs go when the config names no directory.
    pub fn default_output_dir(&self) -> PathBuf {
        match self {
            ResolvedInput::Local(p) => p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
            ResolvedInput::Downloaded { .. } => PathBuf::from("."),
        }
    }

    /// Fail with [`Pdf2ImgError::NotAPdf`] unless the file starts with `%PDF`.
    pub fn ensure_pdf(&self) -> Result<(), Pdf2ImgError> {
        let path = self.path();
        let mut magic = [0u8; 4];
        let mut file = std::fs::File::open(path).map_err(|e| open_error(path, e))?;
        match file.read_exact(&mut magic) {
            Ok(()) if &magic == b"%PDF" => Ok(()),
            // Shorter than four bytes: report whatever was there.
            _ => Err(Pdf2ImgError::NotAPdf {
                path: path.to_path_buf(),
                magic,
            }),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local file.
///
/// Any readable file is accepted; PDF-only operations call
/// [`ResolvedInput::ensure_pdf`] on top, while marker/gutter analysis also
/// runs on raster scans.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2ImgError> {
    if input.trim().is_empty() {
        return Err(Pdf2ImgError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, Pdf2ImgError> {
    let path = PathBuf::from(path_str);
    if !path.is_file() {
        return Err(Pdf2ImgError::FileNotFound { path });
    }
    std::fs::File::open(&path).map_err(|e| open_error(&path, e))?;
    debug!("Resolved local input: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

fn open_error(path: &Path, e: std::io::Error) -> Pdf2ImgError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => Pdf2ImgError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Pdf2ImgError::FileNotFound {
            path: path.to_path_buf(),
        },
    }
}

/// Write in-memory PDF bytes to a temporary directory.
pub fn from_bytes(bytes: &[u8]) -> Result<ResolvedInput, Pdf2ImgError> {
    let temp_dir = TempDir::new().map_err(|e| Pdf2ImgError::Internal(format!("tempdir: {e}")))?;
    let path = temp_dir.path().join("input.pdf");
    std::fs::write(&path, bytes)
        .map_err(|e| Pdf2ImgError::Internal(format!("Failed to write temp file: {e}")))?;
    debug!("Wrote {} input bytes to {}", bytes.len(), path.display());
    Ok(ResolvedInput::Downloaded {
        path,
        _temp_dir: temp_dir,
    })
}

/// Stream a URL into a temporary directory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2ImgError> {
    info!("Downloading input from: {}", url);

    let failed = |reason: String| Pdf2ImgError::DownloadFailed {
        url: url.to_string(),
        reason,
    };
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            Pdf2ImgError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let mut response = client.get(url).send().await.map_err(classify)?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let temp_dir = TempDir::new().map_err(|e| Pdf2ImgError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(filename_from_url(url));
    let mut file = tokio::fs::File::create(&file_path)
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Failed to create temp file: {e}")))?;

    let mut written = 0usize;
    while let Some(chunk) = response.chunk().await.map_err(classify)? {
        file.write_all(&chunk)
            .await
            .map_err(|e| Pdf2ImgError::Internal(format!("Failed to write temp file: {e}")))?;
        written += chunk.len();
    }
    file.flush()
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to {}", written, file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()?
                .next_back()
                .filter(|s| !s.is_empty() && s.contains('.'))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
