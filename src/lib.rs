//! # edgequake-pdf2img
//!
//! Convert PDF documents into page images by driving ImageMagick or
//! GraphicsMagick, and find marker lines and gutters in scanned forms.
//!
//! The rasterisation and morphology work stays with the external tools. This
//! crate builds their command lines, runs them without a shell, skips pages
//! whose images are already up to date, and turns their text output into
//! typed results.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Info       `pdfinfo` → page count and document entries
//!  ├─ 3. Freshness  reuse page images newer than the PDF
//!  ├─ 4. Convert    one `convert file.pdf[N] out-N.png` per page, concurrently
//!  └─ 5. Combine    optional `convert pages… -append out.png`
//! ```
//!
//! Analysis runs the tool once on a crop region and parses what it prints:
//!
//! ```text
//! scan ──▶ connected components ──▶ detect::markers ──▶ [y, y, …]
//!      └─▶ txt:- pixel listing  ──▶ detect::gutter  ──▶ x | fallback | -1
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .convert_option("-density", Some("200"))
//!         .build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     for path in output.image_paths() {
//!         println!("{}", path.display());
//!     }
//!     eprintln!("{} converted, {} reused",
//!         output.stats.converted_pages,
//!         output.stats.reused_pages);
//!     Ok(())
//! }
//! ```
//!
//! The detectors are plain functions and need no tool at all:
//!
//! ```rust
//! use edgequake_pdf2img::{detect, MarkerConfig};
//!
//! let markers = detect::parse_marker_output("50 10 100\n50 10 120\n50 10 200\n", &MarkerConfig::default());
//! assert_eq!(markers, vec![100, 200]);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdf2img = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! | Tool | Used for | Package |
//! |------|----------|---------|
//! | `convert` | conversion, analysis (default) | ImageMagick 6 |
//! | `gm convert` | same, via [`ExternalTool::graphicsmagick`] | GraphicsMagick |
//! | `pdfinfo` | page count, document info | poppler-utils |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod convert;
pub mod detect;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{suggest_margin, suggest_markers};
pub use config::{
    ConversionConfig, ConversionConfigBuilder, ConvertOptions, CropRegion, ExternalTool,
    GutterConfig, MarkerConfig, PageSelection,
};
pub use convert::{
    combine_images, convert, convert_from_bytes, convert_page, convert_sync, convert_to_file,
    inspect, number_of_pages, split_pages,
};
pub use detect::GutterPosition;
pub use error::{PageError, Pdf2ImgError};
pub use output::{ConversionOutput, ConversionStats, DocumentInfo, PageResult};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, convert_stream_from_bytes, PageStream};
