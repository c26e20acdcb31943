//! Raw line records and their extraction from native tool output.
//!
//! Two textual contracts sit between the image tool and the detectors:
//!
//! * connected-component mode: `"<height> <x> <y>"` per region
//! * pixel-scan mode: `"<x> <y>"` per matching pixel
//!
//! The tool itself prints richer formats (`-connected-components` verbose
//! listing, `txt:-` pixel enumeration). [`component_lines`] and
//! [`black_pixel_lines`] reduce those to the contract formats so the
//! detectors can equally be fed text captured elsewhere.

use once_cell::sync::Lazy;
use regex::Regex;

/// One connected region: its bounding-box height and top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRecord {
    pub height: i64,
    pub x: i64,
    pub y: i64,
}

impl ComponentRecord {
    /// Tokenise `"h x y"`. Tokens past the third are ignored; a missing or
    /// non-integer token rejects the line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().map(str::parse::<i64>);
        Some(Self {
            height: tokens.next()?.ok()?,
            x: tokens.next()?.ok()?,
            y: tokens.next()?.ok()?,
        })
    }
}

/// One matching pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRecord {
    pub x: i64,
    pub y: i64,
}

impl PixelRecord {
    /// Tokenise `"x y"`, same rules as [`ComponentRecord::parse`].
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().map(str::parse::<i64>);
        Some(Self {
            x: tokens.next()?.ok()?,
            y: tokens.next()?.ok()?,
        })
    }
}

/// All well-formed component records in `text`.
pub fn component_records(text: &str) -> Vec<ComponentRecord> {
    text.lines().filter_map(ComponentRecord::parse).collect()
}

/// All well-formed pixel records in `text`.
pub fn pixel_records(text: &str) -> Vec<PixelRecord> {
    text.lines().filter_map(PixelRecord::parse).collect()
}

// ── Native output extraction ─────────────────────────────────────────────

// `  12: 580x3+10+120 300.0,121.0 1740 srgb(0,0,0)`
static RE_COMPONENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\d+:\s+(\d+)x(\d+)([+-]\d+)([+-]\d+)\s+(.*)$").unwrap()
});

// `10,5: (0,0,0)  #000000  black`
static RE_PIXEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+),(\d+):(.*)$").unwrap());

/// Reduce a verbose `-connected-components` listing to `"h x y"` lines,
/// keeping only black (foreground) components.
pub fn component_lines(output: &str) -> String {
    output
        .lines()
        .filter_map(|line| {
            let caps = RE_COMPONENT.captures(line)?;
            let rest = &caps[5];
            if !(rest.contains("(0,0,0)") || rest.contains("gray(0)")) {
                return None;
            }
            let x: i64 = caps[3].parse().ok()?;
            let y: i64 = caps[4].parse().ok()?;
            Some(format!("{} {} {}\n", &caps[2], x, y))
        })
        .collect()
}

/// Reduce a `txt:-` pixel enumeration to `"x y"` lines for black pixels.
pub fn black_pixel_lines(output: &str) -> String {
    output
        .lines()
        .filter_map(|line| {
            let caps = RE_PIXEL.captures(line)?;
            caps[3]
                .contains("#000000")
                .then(|| format!("{} {}\n", &caps[1], &caps[2]))
        })
        .collect()
}
