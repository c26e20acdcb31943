//! Configuration types for PDF-to-image conversion and line detection.
//!
//! Conversion behaviour is controlled through [`ConversionConfig`], built via
//! [`ConversionConfigBuilder`]. The two detectors take their own small,
//! immutable configs ([`MarkerConfig`], [`GutterConfig`]) so they can be used
//! on already-captured tool output without a conversion config at all.

use crate::error::Pdf2ImgError;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration for converting a PDF into page images.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::{ConversionConfig, ExternalTool};
///
/// let config = ConversionConfig::builder()
///     .convert_option("-density", Some("300"))
///     .extension("jpg")
///     .image_tool(ExternalTool::graphicsmagick())
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory that receives page images. Default: the PDF's own directory.
    ///
    /// For URL inputs the PDF lives in a temporary directory, so the current
    /// working directory is used instead.
    pub output_directory: Option<PathBuf>,

    /// Base name of generated images. Default: PDF file name without `.pdf`.
    pub base_name: Option<String>,

    /// Output image extension; selects the tool's encoder. Default: `png`.
    pub extension: String,

    /// Extra options passed to the image tool before the input file.
    pub convert_options: ConvertOptions,

    /// Image tool used for conversion and analysis. Default: ImageMagick `convert`.
    pub image_tool: ExternalTool,

    /// Tool used to read document info. Default: poppler `pdfinfo`.
    pub info_tool: ExternalTool,

    /// Append all pages into a single image and delete the page images.
    /// Default: false.
    pub combined_image: bool,

    /// Maximum number of tool processes running at once. Default: 4.
    ///
    /// Each page is one `convert` child process; rasterisation is CPU-bound,
    /// so going far beyond the core count only adds contention.
    pub concurrency: usize,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Marker clustering parameters for [`crate::analyze::suggest_markers`].
    pub markers: MarkerConfig,

    /// Gutter detection parameters for [`crate::analyze::suggest_margin`].
    pub gutter: GutterConfig,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_directory: None,
            base_name: None,
            extension: "png".to_string(),
            convert_options: ConvertOptions::default(),
            image_tool: ExternalTool::imagemagick(),
            info_tool: ExternalTool::pdfinfo(),
            combined_image: false,
            concurrency: 4,
            pages: PageSelection::default(),
            markers: MarkerConfig::default(),
            gutter: GutterConfig::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_directory", &self.output_directory)
            .field("base_name", &self.base_name)
            .field("extension", &self.extension)
            .field("convert_options", &self.convert_options)
            .field("image_tool", &self.image_tool)
            .field("info_tool", &self.info_tool)
            .field("combined_image", &self.combined_image)
            .field("concurrency", &self.concurrency)
            .field("pages", &self.pages)
            .field("markers", &self.markers)
            .field("gutter", &self.gutter)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_directory = Some(dir.into());
        self
    }

    pub fn base_name(mut self, name: impl Into<String>) -> Self {
        self.config.base_name = Some(name.into());
        self
    }

    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        let ext = ext.into();
        self.config.extension = ext.trim_start_matches('.').to_string();
        self
    }

    /// Add one tool option, e.g. `("-density", Some("300"))` or `("-flatten", None)`.
    pub fn convert_option(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.config.convert_options.set(name, value);
        self
    }

    pub fn convert_options(mut self, options: ConvertOptions) -> Self {
        self.config.convert_options = options;
        self
    }

    pub fn image_tool(mut self, tool: ExternalTool) -> Self {
        self.config.image_tool = tool;
        self
    }

    pub fn info_tool(mut self, tool: ExternalTool) -> Self {
        self.config.info_tool = tool;
        self
    }

    pub fn combined_image(mut self, v: bool) -> Self {
        self.config.combined_image = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn markers(mut self, markers: MarkerConfig) -> Self {
        self.config.markers = markers;
        self
    }

    pub fn gutter(mut self, gutter: GutterConfig) -> Self {
        self.config.gutter = gutter;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2ImgError> {
        let c = &self.config;
        if c.extension.is_empty() {
            return Err(Pdf2ImgError::InvalidConfig(
                "Output extension must not be empty".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let Some(ref name) = c.base_name {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(Pdf2ImgError::InvalidConfig(format!(
                    "Base name must be a plain file name, got {name:?}"
                )));
            }
        }
        c.markers.validate()?;
        c.gutter.validate()?;
        Ok(self.config)
    }
}

// ── External tools ───────────────────────────────────────────────────────

/// An external program plus the arguments that always precede the
/// operation-specific ones (e.g. `gm` + `convert`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTool {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
}

impl ExternalTool {
    /// ImageMagick 6 `convert`.
    pub fn imagemagick() -> Self {
        Self::custom("convert", Vec::<String>::new())
    }

    /// GraphicsMagick, invoked as `gm convert`.
    pub fn graphicsmagick() -> Self {
        Self::custom("gm", ["convert"])
    }

    /// poppler-utils `pdfinfo`.
    pub fn pdfinfo() -> Self {
        Self::custom("pdfinfo", Vec::<String>::new())
    }

    pub fn custom<I, S>(program: impl Into<PathBuf>, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            leading_args: leading_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Installation hint shown when the program cannot be spawned.
    pub fn install_hint(&self) -> &'static str {
        match self.program.file_name().and_then(|n| n.to_str()) {
            Some("convert") | Some("magick") => "Install ImageMagick (e.g. apt install imagemagick).",
            Some("gm") => "Install GraphicsMagick (e.g. apt install graphicsmagick).",
            Some("pdfinfo") => "Install poppler-utils (e.g. apt install poppler-utils).",
            _ => "Check the configured tool path.",
        }
    }
}

/// Options passed to the image tool, emitted sorted by name.
///
/// An option with a value contributes `name value`; one without contributes
/// just `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertOptions(BTreeMap<String, Option<String>>);

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<&str>) {
        self.0.insert(name.into(), value.map(str::to_string));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flatten into argv order.
    pub fn to_args(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|(name, value)| std::iter::once(name.clone()).chain(value.clone()))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for ConvertOptions {
    fn from_iter<T: IntoIterator<Item = (K, Option<String>)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// ── Detection configs ────────────────────────────────────────────────────

/// Marker clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Merge radius: a marker within this many pixels below an accepted
    /// marker joins its cluster. Default: 50.
    pub merge_margin: i64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self { merge_margin: 50 }
    }
}

impl MarkerConfig {
    pub fn validate(&self) -> Result<(), Pdf2ImgError> {
        if self.merge_margin < 0 {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Merge margin must be ≥ 0, got {}",
                self.merge_margin
            )));
        }
        Ok(())
    }
}

/// Gutter detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GutterConfig {
    /// Columns at or left of this x are treated as edge artefacts. Default: 50.
    pub ghost_margin: i64,

    /// Fraction of rows a column must appear in. Range (0, 1]. Default: 1.0.
    pub fuzz_margin: f64,

    /// Fallback position as a fraction of the image width when no column
    /// qualifies. Range [0, 1]. Default: disabled.
    pub override_fraction: Option<f64>,
}

impl Default for GutterConfig {
    fn default() -> Self {
        Self {
            ghost_margin: 50,
            fuzz_margin: 1.0,
            override_fraction: None,
        }
    }
}

impl GutterConfig {
    pub fn validate(&self) -> Result<(), Pdf2ImgError> {
        if self.ghost_margin < 0 {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Ghost margin must be ≥ 0, got {}",
                self.ghost_margin
            )));
        }
        if !(self.fuzz_margin > 0.0 && self.fuzz_margin <= 1.0) {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Fuzz margin must be in (0, 1], got {}",
                self.fuzz_margin
            )));
        }
        if let Some(f) = self.override_fraction {
            if !(0.0..=1.0).contains(&f) {
                return Err(Pdf2ImgError::InvalidConfig(format!(
                    "Override fraction must be in [0, 1], got {f}"
                )));
            }
        }
        Ok(())
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
///
/// Page numbers here are 1-indexed as a reader counts them; generated files
/// use the tool's 0-based frame index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand into sorted, deduplicated 0-based frame indices, dropping
    /// pages beyond the document.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => vec![*p],
            PageSelection::Range(start, end) => ((*start).max(1)..=(*end).min(total_pages)).collect(),
            PageSelection::Set(pages) => pages.clone(),
        };
        pages.retain(|p| (1..=total_pages).contains(p));
        pages.sort_unstable();
        pages.dedup();
        pages.into_iter().map(|p| p - 1).collect()
    }
}

// ── Crop geometry ────────────────────────────────────────────────────────

static RE_GEOMETRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)x(\d+)(?:([+-]\d+)([+-]\d+))?$").unwrap());

/// A crop rectangle in ImageMagick geometry form `WxH+X+Y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
}

impl CropRegion {
    pub fn new(width: u32, height: u32, x: i64, y: i64) -> Self {
        Self { width, height, x, y }
    }

    /// The whole of a raster image, sized from its header.
    pub fn full_image(path: &Path) -> Result<Self, Pdf2ImgError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            Pdf2ImgError::InvalidGeometry(format!(
                "no crop given and size of '{}' is unknown: {e}",
                path.display()
            ))
        })?;
        Ok(Self::new(width, height, 0, 0))
    }
}

impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}{:+}{:+}", self.width, self.height, self.x, self.y)
    }
}

impl FromStr for CropRegion {
    type Err = Pdf2ImgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Pdf2ImgError::InvalidGeometry(s.to_string());
        let caps = RE_GEOMETRY.captures(s.trim()).ok_or_else(invalid)?;
        let num = |i: usize| caps.get(i).map_or("0", |m| m.as_str());
        Ok(Self {
            width: num(1).parse().map_err(|_| invalid())?,
            height: num(2).parse().map_err(|_| invalid())?,
            x: num(3).parse().map_err(|_| invalid())?,
            y: num(4).parse().map_err(|_| invalid())?,
        })
    }
}
