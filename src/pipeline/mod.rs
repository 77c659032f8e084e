//! Pipeline stages for turning queue items into pages of one PDF.
//!
//! Each submodule implements one step, so each can be tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌── Local(Pdf) ───────────────────────────────┐
//! input ──▶ classify ── Local(Image) ──▶ image_page ───────┼──▶ assemble
//! (path)     └── Remote(..) ──▶ remote (ConvertAPI) ── PDF ─┘   (lopdf)
//! ```
//!
//! 1. [`input`]      — read a path into a named byte buffer
//! 2. [`classify`]   — pick the strategy from the extension, once per item
//! 3. [`image_page`] — decode PNG/JPEG and lay it out on an A4 page
//! 4. [`remote`]     — upload office/text files for conversion and the merged
//!    PDF for compression; the only stage with network I/O
//! 5. [`assemble`]   — append pages in order to the growing output document

pub mod assemble;
pub mod classify;
pub mod image_page;
pub mod input;
pub mod remote;
