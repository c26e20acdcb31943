//! Document info via `pdfinfo`.

use super::{command, exec};
use crate::config::ConversionConfig;
use crate::error::Pdf2ImgError;
use crate::output::DocumentInfo;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

static RE_INFO_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?):[ \t]*(.*)$").unwrap());

/// Parse `Key:   value` lines. Lines without a colon are skipped; the first
/// colon separates key from value, so `CreationDate` values keep theirs.
pub fn parse_info_output(output: &str) -> DocumentInfo {
    let entries = output
        .lines()
        .filter_map(|line| {
            let caps = RE_INFO_LINE.captures(line)?;
            let key = caps[1].trim();
            (!key.is_empty()).then(|| (key.to_string(), caps[2].trim_end().to_string()))
        })
        .collect();
    DocumentInfo { entries }
}

/// Run the info tool on `pdf` and parse its output.
pub async fn get_info(pdf: &Path, config: &ConversionConfig) -> Result<DocumentInfo, Pdf2ImgError> {
    let cmd = command::info(&config.info_tool, pdf);
    let out = exec::run(&cmd, "Failed to get document info").await?;
    let info = parse_info_output(&out.stdout);
    debug!("{} info entries for {}", info.entries.len(), pdf.display());
    Ok(info)
}

/// The `Pages` entry, or [`Pdf2ImgError::InfoUnavailable`].
pub fn require_page_count(info: &DocumentInfo, pdf: &Path) -> Result<usize, Pdf2ImgError> {
    info.page_count().ok_or_else(|| Pdf2ImgError::InfoUnavailable {
        path: pdf.to_path_buf(),
        detail: "no 'Pages' entry in output".into(),
    })
}
