//! Result types returned by the conversion entry points.

use crate::error::{PageError, Pdf2ImgError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Key/value document info as reported by `pdfinfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Every `Key: value` line, keyed verbatim (`"Pages"`, `"Title"`, …).
    pub entries: BTreeMap<String, String>,
}

impl DocumentInfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Number of pages, if `pdfinfo` reported a parsable `Pages` entry.
    pub fn page_count(&self) -> Option<usize> {
        self.get("Pages")?.trim().parse().ok()
    }

    pub fn title(&self) -> Option<&str> {
        self.get("Title")
    }

    pub fn producer(&self) -> Option<&str> {
        self.get("Producer")
    }

    pub fn pdf_version(&self) -> Option<&str> {
        self.get("PDF version")
    }

    pub fn is_encrypted(&self) -> bool {
        self.get("Encrypted").is_some_and(|v| v.starts_with("yes"))
    }
}

/// Outcome of converting one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 0-based frame index, as used in the image file name.
    pub page: usize,
    /// Path of the page image.
    pub path: PathBuf,
    /// `true` when the tool ran; `false` when an up-to-date image was reused.
    pub regenerated: bool,
    /// Image size, when the output format is one the `image` crate can read.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_ms: u64,
    pub error: Option<PageError>,
}

impl PageResult {
    pub(crate) fn failed(page: usize, path: PathBuf, duration_ms: u64, error: PageError) -> Self {
        Self {
            page,
            path,
            regenerated: false,
            width: None,
            height: None,
            duration_ms,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for one `convert` run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub selected_pages: usize,
    pub converted_pages: usize,
    pub reused_pages: usize,
    pub failed_pages: usize,
    pub total_duration_ms: u64,
}

/// Everything produced by [`crate::convert::convert`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Per-page results, sorted by page index. When a combined image was
    /// produced the page files have been deleted.
    pub pages: Vec<PageResult>,
    /// The appended single image, when `combined_image` was set.
    pub combined: Option<PathBuf>,
    pub info: DocumentInfo,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Paths of the images the caller should use: the combined image alone,
    /// or every successful page image in page order.
    pub fn image_paths(&self) -> Vec<PathBuf> {
        match self.combined {
            Some(ref path) => vec![path.clone()],
            None => self
                .pages
                .iter()
                .filter(|p| p.is_ok())
                .map(|p| p.path.clone())
                .collect(),
        }
    }

    /// Treat any page failure as an error.
    pub fn into_result(self) -> Result<Self, Pdf2ImgError> {
        if self.stats.failed_pages > 0 {
            return Err(Pdf2ImgError::PartialFailure {
                success: self.pages.len() - self.stats.failed_pages,
                failed: self.stats.failed_pages,
                total: self.pages.len(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_page(page: usize) -> PageResult {
        PageResult {
            page,
            path: PathBuf::from(format!("/out/doc-{page}.png")),
            regenerated: true,
            width: None,
            height: None,
            duration_ms: 1,
            error: None,
        }
    }

    #[test]
    fn document_info_accessors() {
        let mut info = DocumentInfo::default();
        info.entries.insert("Pages".into(), "  12".into());
        info.entries.insert("Title".into(), String::new());
        info.entries.insert("Encrypted".into(), "no".into());
        assert_eq!(info.page_count(), Some(12));
        assert_eq!(info.title(), None);
        assert!(!info.is_encrypted());
    }

    #[test]
    fn image_paths_prefer_combined() {
        let output = ConversionOutput {
            pages: vec![ok_page(0), ok_page(1)],
            combined: Some(PathBuf::from("/out/doc.png")),
            info: DocumentInfo::default(),
            stats: ConversionStats::default(),
        };
        assert_eq!(output.image_paths(), vec![PathBuf::from("/out/doc.png")]);
    }

    #[test]
    fn into_result_flags_partial_failure() {
        let failed = PageResult::failed(
            1,
            PathBuf::from("/out/doc-1.png"),
            3,
            PageError::ConvertFailed {
                page: 1,
                detail: "boom".into(),
            },
        );
        let output = ConversionOutput {
            pages: vec![ok_page(0), failed],
            combined: None,
            info: DocumentInfo::default(),
            stats: ConversionStats {
                failed_pages: 1,
                ..Default::default()
            },
        };
        assert_eq!(output.image_paths().len(), 1);
        let err = output.into_result().unwrap_err();
        assert!(err.to_string().contains("1/2"));
    }
}
