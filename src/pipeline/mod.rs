//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the tool-facing parts can be exercised with scripted fakes.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ info ──▶ freshness ──▶ command ──▶ exec
//! (URL/path) (pdfinfo) (mtime)      (argv)      (tokio::process)
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local file
//! 2. [`info`]: read `pdfinfo` key/value output, mainly the page count
//! 3. [`freshness`]: skip pages whose image is newer than the PDF
//! 4. [`command`]: build argv for every tool invocation; no shell involved
//! 5. [`exec`]: spawn, capture stdout/stderr, map exit status to errors

pub mod command;
pub mod exec;
pub mod freshness;
pub mod info;
pub mod input;
