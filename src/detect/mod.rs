//! Line detection in scanned document images.
//!
//! The image tool does the pixel work (morphology, connected components,
//! pixel enumeration) and prints text. Everything here is a pure function
//! over that text:
//!
//! ```text
//! tool stdout ──▶ records ──▶ markers  (sorted, de-duplicated y positions)
//!                        └──▶ gutter   (one dominant x position)
//! ```
//!
//! 1. [`records`]: extract and tokenise `"h x y"` / `"x y"` line records;
//!    malformed lines are skipped, never fatal
//! 2. [`markers`]: cluster component rows into horizontal split positions
//! 3. [`gutter`]: find the column shared by (a fuzz fraction of) all rows
//!
//! None of these hold state, so they are safe to call from any number of
//! workers at once.

pub mod gutter;
pub mod markers;
pub mod records;

pub use gutter::{detect_gutter, parse_vertical_position_output, GutterPosition, GUTTER_BUFFER};
pub use markers::{detect_markers, parse_marker_output, GHOST_HEIGHT};
pub use records::{ComponentRecord, PixelRecord};
