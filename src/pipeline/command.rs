//! Command construction for every external-tool invocation.
//!
//! Commands are built as argv vectors and executed without a shell, so file
//! names never need escaping. [`ToolCommand::display`] renders a shell-like
//! string for logs and error messages only.
//!
//! Pages are addressed with the tool's 0-based frame syntax, `file.pdf[3]`,
//! and page images are named `<base>-<frame>.<ext>` after that same index.

use crate::config::{ConversionConfig, CropRegion, ExternalTool};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Morphology pipeline isolating long horizontal and vertical strokes,
/// then listing the connected components of the result.
const MARKER_PIPELINE: &[&str] = &[
    "-strip",
    "(", "+clone", "-threshold", "70%", "-write", "mpr:ORG", "+delete", ")",
    "(", "mpr:ORG", "-negate",
    "-morphology", "Erode", "rectangle:200x1",
    "-mask", "mpr:ORG", "-morphology", "Dilate", "rectangle:200x1", "+mask",
    "-morphology", "Dilate", "Disk:3", ")",
    "(", "mpr:ORG", "-negate",
    "-morphology", "Erode", "rectangle:1x70",
    "-mask", "mpr:ORG", "-morphology", "Dilate", "rectangle:1x70", "+mask",
    "-morphology", "Dilate", "Disk:3", ")",
    "(", "-clone", "1", "-clone", "2", "-evaluate-sequence", "add", ")",
    "-delete", "1,2", "-compose", "plus", "-composite",
    "(", "+clone", ")",
    "-compose", "Lighten", "-composite", "-blur", "0x0.5", "-threshold", "70%",
    "-define", "connected-components:verbose=true",
    "-define", "connected-components:area-threshold=80",
    "-connected-components", "8",
];

/// A program plus its arguments, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(tool: &ExternalTool) -> Self {
        Self {
            program: tool.program.clone(),
            args: tool.leading_args.iter().map(OsString::from).collect(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Shell-like rendering; arguments with spaces, brackets, parentheses or
    /// quotes are wrapped in double quotes.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|a| quote(&a.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

fn quote(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '[' | ']' | '(' | ')' | '"' | '\'' | '$' | '%'));
    if needs_quotes {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// `file.pdf[<selector>]`
fn frame_ref(input: &Path, selector: &str) -> OsString {
    let mut s = input.as_os_str().to_os_string();
    s.push(format!("[{selector}]"));
    s
}

// ── Output layout ────────────────────────────────────────────────────────

/// Where the images for one PDF are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub directory: PathBuf,
    pub base_name: String,
    pub extension: String,
}

impl OutputLayout {
    /// Resolve the layout from config overrides, falling back to
    /// `default_dir` and the PDF's file name.
    pub fn resolve(pdf: &Path, default_dir: PathBuf, config: &ConversionConfig) -> Self {
        Self {
            directory: config.output_directory.clone().unwrap_or(default_dir),
            base_name: config
                .base_name
                .clone()
                .unwrap_or_else(|| default_base_name(pdf)),
            extension: config.extension.clone(),
        }
    }

    /// `<dir>/<base>-<page>.<ext>`
    pub fn page_path(&self, page: usize) -> PathBuf {
        self.directory
            .join(format!("{}-{}.{}", self.base_name, page, self.extension))
    }

    /// `<dir>/<base>.<ext>`
    pub fn file_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.base_name, self.extension))
    }
}

/// File name with a trailing `.pdf` removed; other extensions are kept.
pub fn default_base_name(pdf: &Path) -> String {
    let name = pdf
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    match name.strip_suffix(".pdf") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}

// ── Commands ─────────────────────────────────────────────────────────────

/// `pdfinfo <pdf>`
pub fn info(tool: &ExternalTool, pdf: &Path) -> ToolCommand {
    ToolCommand::new(tool).arg(pdf)
}

/// `<tool> <options> <pdf>[<page>] <out>`
pub fn convert_page(config: &ConversionConfig, pdf: &Path, page: usize, out: &Path) -> ToolCommand {
    convert_page_list(config, pdf, &page.to_string(), out)
}

/// `<tool> <options> <pdf>[<list>] <out>`, `list` like `1,3,7` or `3-6`.
pub fn convert_page_list(config: &ConversionConfig, pdf: &Path, list: &str, out: &Path) -> ToolCommand {
    ToolCommand::new(&config.image_tool)
        .args(config.convert_options.to_args())
        .arg(frame_ref(pdf, list))
        .arg(out)
}

/// `<tool> <images...> -append <out>`
pub fn combine(config: &ConversionConfig, images: &[PathBuf], out: &Path) -> ToolCommand {
    ToolCommand::new(&config.image_tool)
        .args(images)
        .arg("-append")
        .arg(out)
}

/// Marker detection: crop, run the morphology pipeline, list components.
/// The image itself is discarded to `null:`.
pub fn markers(config: &ConversionConfig, input: &Path, crop: &CropRegion) -> ToolCommand {
    ToolCommand::new(&config.image_tool)
        .args(config.convert_options.to_args())
        .arg(input)
        .args(["-crop", &crop.to_string(), "+repage"])
        .args(MARKER_PIPELINE)
        .arg("null:")
}

/// Gutter detection: crop and enumerate every pixel as text on stdout.
pub fn margin(config: &ConversionConfig, input: &Path, crop: &CropRegion) -> ToolCommand {
    ToolCommand::new(&config.image_tool)
        .args(config.convert_options.to_args())
        .args(["-crop", &crop.to_string(), "+repage"])
        .arg(input)
        .arg("txt:-")
}
