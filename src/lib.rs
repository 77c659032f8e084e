//! # docpipe
//!
//! Merge an ordered queue of PDFs, images and office documents into one PDF.
//!
//! ## Why this crate?
//!
//! Stitching a report together usually means a mix of inputs: a scanned
//! page as JPEG, a couple of existing PDFs, a Word document, a spreadsheet.
//! PDFs and images are merged in-process; office and text formats are sent
//! to a remote conversion service (ConvertAPI) and merged once they come
//! back as PDF. Page order always follows queue order, and the first item
//! that fails stops the run with an error attached to that item.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Queue (ordered)
//!  │
//!  ├─ 1. Credentials  resolve the API key, only if a remote step is needed
//!  ├─ 2. Classify     Local(pdf|image) · Remote(docx|xlsx|pptx|txt) · Unsupported
//!  ├─ 3. Convert      upload → converting → download   (remote items only)
//!  ├─ 4. Merge        append pages to one lopdf document
//!  └─ 5. Compress     optional whole-document pass through the service
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docpipe::{execute, read_file, PipelineConfig, Queue};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut queue = Queue::new();
//!     queue.enqueue([
//!         read_file("cover.png").await?,
//!         read_file("report.pdf").await?,
//!         read_file("appendix.docx").await?,
//!     ]);
//!
//!     // The key is only required because of the .docx item.
//!     let config = PipelineConfig::builder().api_key("secret").build()?;
//!     let pdf = execute(&mut queue, &config).await?;
//!     std::fs::write("merged.pdf", pdf)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docpipe` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docpipe = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod credentials;
pub mod error;
pub mod execute;
pub mod pipeline;
pub mod progress;
pub mod queue;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, DEFAULT_API_BASE_URL};
pub use credentials::{resolve_api_key, CredentialStore, JsonFileStore, MemoryStore};
pub use error::{ErrorKind, ItemError, PipelineError, RemoteError};
pub use execute::{execute, execute_sync, execute_to_file};
pub use pipeline::classify::{classify, requires_remote, Strategy};
pub use pipeline::input::{read_file, read_files};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use queue::{ItemId, ItemStatus, Queue, QueueItem, RawFile};
