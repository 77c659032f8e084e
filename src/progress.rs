//! Progress-callback trait for per-item pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! an event at every status transition of every queue item.
//!
//! The executor also writes each transition into the [`crate::Queue`] it is
//! running over, so callers that only need the final state can simply
//! inspect the queue afterwards.
//!
//! # Example
//!
//! ```rust
//! use docpipe::{ItemId, ItemStatus, PipelineConfig, PipelineProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder {
//!     seen: Mutex<Vec<(ItemId, ItemStatus)>>,
//! }
//!
//! impl PipelineProgressCallback for Recorder {
//!     fn on_item_status(&self, id: ItemId, status: ItemStatus, _e: Option<&str>, _p: Option<u8>) {
//!         self.seen.lock().unwrap().push((id, status));
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Recorder::default()))
//!     .build()
//!     .unwrap();
//! ```

use crate::queue::{ItemId, ItemStatus};
use std::sync::Arc;

/// Called by the executor as a run progresses.
///
/// Items are processed one at a time, so events for different items never
/// interleave. Upload-progress events may be delivered from the HTTP
/// client's connection task, hence `Send + Sync`. All methods default to
/// no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before the first item, after credentials are resolved.
    fn on_run_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called at every status transition of an item.
    ///
    /// # Arguments
    /// * `id`             — the item
    /// * `status`         — its new status
    /// * `error`          — message, only with [`ItemStatus::Error`]
    /// * `upload_percent` — 0–100, only with [`ItemStatus::Uploading`]
    fn on_item_status(
        &self,
        id: ItemId,
        status: ItemStatus,
        error: Option<&str>,
        upload_percent: Option<u8>,
    ) {
        let _ = (id, status, error, upload_percent);
    }

    /// Called before the merged document is sent for compression.
    fn on_compress_start(&self) {}

    /// Called once when the final bytes are ready.
    fn on_run_complete(&self, output_len: usize) {
        let _ = output_len;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
