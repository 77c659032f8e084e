//! Run entry points: drive every queue item through its strategy, in order.
//!
//! ## Why strictly sequential?
//!
//! Pages must land in the output in queue order, and the first failure
//! stops the run. Processing one item at a time gives both for free: the
//! accumulator only ever grows at the end, and there is never a second
//! in-flight item to cancel. The only await points are the remote calls.

use crate::config::PipelineConfig;
use crate::credentials::resolve_api_key;
use crate::error::{ItemError, PipelineError, RemoteError};
use crate::pipeline::assemble::Accumulator;
use crate::pipeline::classify::{classify, requires_remote, LocalFormat, Strategy};
use crate::pipeline::image_page;
use crate::pipeline::remote::{ConvertApiClient, UploadProgress};
use crate::progress::ProgressCallback;
use crate::queue::{ItemStatus, Queue};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Convert and merge every item of `queue` into one PDF.
///
/// This is the primary entry point for the library. Item statuses in
/// `queue` are updated as the run progresses, and the progress callback in
/// `config` (if any) is told about every transition.
///
/// # Errors
/// - [`PipelineError::EmptyQueue`] if there is nothing to merge.
/// - [`PipelineError::MissingCredential`] if an item or compression needs the
///   remote service and no API key is configured. No item is touched.
/// - [`PipelineError::ItemFailed`] at the first item that fails. That item is
///   left in `error`, earlier ones in `done`, later ones in `pending`.
/// - [`PipelineError::CompressionFailed`] if the final compression pass fails.
///   Every item is `done` at that point.
pub async fn execute(queue: &mut Queue, config: &PipelineConfig) -> Result<Vec<u8>, PipelineError> {
    let start = Instant::now();
    if queue.is_empty() {
        return Err(PipelineError::EmptyQueue);
    }
    queue.reset_for_run();

    // ── Step 1: Credentials, before any item changes state ───────────────
    let needs_remote = requires_remote(
        queue.items().iter().map(|item| &item.file),
        config.compress_output,
    );
    let client = if needs_remote {
        let key = resolve_api_key(config)?;
        Some(build_client(config, key)?)
    } else {
        None
    };

    let callback = config.progress_callback.as_ref();
    if let Some(cb) = callback {
        cb.on_run_start(queue.len());
    }
    info!(
        "Starting run: {} items, remote service {}, compression {}",
        queue.len(),
        if needs_remote { "required" } else { "not needed" },
        if config.compress_output { "on" } else { "off" }
    );

    // ── Step 2: Items, in order ──────────────────────────────────────────
    let mut acc = Accumulator::new();
    for index in 0..queue.len() {
        match process_item(queue, index, &mut acc, client.as_ref(), callback).await {
            Ok(()) => transition(queue, index, ItemStatus::Done, callback),
            Err(source) => {
                let item = &mut queue.items_mut()[index];
                let message = source.to_string();
                warn!("'{}' failed: {}", item.file.name, message);
                item.fail(message.clone());
                if let Some(cb) = callback {
                    cb.on_item_status(item.id, ItemStatus::Error, Some(&message), None);
                }
                return Err(PipelineError::ItemFailed {
                    id: item.id,
                    name: item.file.name.clone(),
                    source,
                });
            }
        }
    }

    // ── Step 3: Serialise ────────────────────────────────────────────────
    let pages = acc.page_count();
    let mut output = acc.finish()?;
    info!("Merged {} pages into {} bytes", pages, output.len());

    // ── Step 4: Optional compression ─────────────────────────────────────
    if config.compress_output {
        let client = client.as_ref().ok_or_else(|| {
            PipelineError::Internal("compression requested without a ConvertAPI client".into())
        })?;
        if let Some(cb) = callback {
            cb.on_compress_start();
        }
        let before = output.len();
        output = compress(client, output)
            .await
            .map_err(|source| PipelineError::CompressionFailed { source })?;
        info!("Compressed {} → {} bytes", before, output.len());
    }

    if let Some(cb) = callback {
        cb.on_run_complete(output.len());
    }
    info!(
        "Run complete: {} bytes in {}ms",
        output.len(),
        start.elapsed().as_millis()
    );
    Ok(output)
}

/// Run the pipeline and write the merged PDF directly to a file.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// partial file behind.
/// Returns the number of bytes written.
pub async fn execute_to_file(
    queue: &mut Queue,
    output_path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<usize, PipelineError> {
    let output = execute(queue, config).await?;
    let path = output_path.as_ref();
    let write_err = |source: std::io::Error| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            parent.to_path_buf()
        }
        None => PathBuf::from("."),
    };

    // Same directory as the target so the final rename stays on one filesystem.
    // The temp file is removed on drop if anything below fails.
    let tmp = tempfile::Builder::new()
        .prefix(".docpipe-")
        .suffix(".pdf.tmp")
        .tempfile_in(&dir)
        .map_err(write_err)?;
    tokio::fs::write(tmp.path(), &output).await.map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote {} bytes to {}", output.len(), path.display());
    Ok(output.len())
}

/// Synchronous wrapper around [`execute`].
///
/// Creates a temporary tokio runtime internally.
pub fn execute_sync(queue: &mut Queue, config: &PipelineConfig) -> Result<Vec<u8>, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PipelineError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(execute(queue, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn build_client(config: &PipelineConfig, api_key: String) -> Result<ConvertApiClient, PipelineError> {
    ConvertApiClient::new(
        config.api_base_url.clone(),
        api_key,
        config.request_timeout_secs.map(Duration::from_secs),
        config.upload_chunk_size,
    )
    .map_err(|e| PipelineError::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Move item `index` to `status` and report it.
fn transition(
    queue: &mut Queue,
    index: usize,
    status: ItemStatus,
    callback: Option<&ProgressCallback>,
) {
    let item = &mut queue.items_mut()[index];
    item.set_status(status);
    if status == ItemStatus::Uploading {
        item.upload_progress = Some(0);
    }
    debug!("{} '{}' → {}", item.id, item.file.name, status);
    if let Some(cb) = callback {
        let upload = item.upload_progress.filter(|_| status == ItemStatus::Uploading);
        cb.on_item_status(item.id, status, None, upload);
    }
}

/// Turn item `index` into pages on `acc`. Leaves the item in `merging` on
/// success; the caller marks it `done` or `error`.
async fn process_item(
    queue: &mut Queue,
    index: usize,
    acc: &mut Accumulator,
    client: Option<&ConvertApiClient>,
    callback: Option<&ProgressCallback>,
) -> Result<(), ItemError> {
    let strategy = classify(&queue.items()[index].file);
    debug!("'{}' → {}", queue.items()[index].file.name, strategy);

    match strategy {
        Strategy::Unsupported(extension) => Err(ItemError::UnsupportedFormat { extension }),

        Strategy::Local(format) => {
            transition(queue, index, ItemStatus::Merging, callback);
            let data = &queue.items()[index].file.data;
            match format {
                LocalFormat::Pdf => {
                    acc.append_pdf(data)?;
                }
                LocalFormat::Image(fmt) => {
                    let image = image_page::decode(data, fmt)?;
                    acc.append_image(&image);
                }
            }
            Ok(())
        }

        Strategy::Remote(format) => {
            let client = client.ok_or_else(|| RemoteError::Transport {
                reason: "no ConvertAPI client for this run".into(),
            })?;

            transition(queue, index, ItemStatus::Uploading, callback);
            let id = queue.items()[index].id;
            let latest = Arc::new(AtomicU8::new(0));
            let on_upload: UploadProgress = {
                let latest = Arc::clone(&latest);
                let cb = callback.cloned();
                Arc::new(move |pct| {
                    latest.store(pct, Ordering::Relaxed);
                    if let Some(cb) = &cb {
                        cb.on_item_status(id, ItemStatus::Uploading, None, Some(pct));
                    }
                })
            };

            let submitted = client
                .submit_conversion(&queue.items()[index].file, format, on_upload)
                .await;
            queue.items_mut()[index].upload_progress = Some(latest.load(Ordering::Relaxed));
            let submitted = submitted?;

            transition(queue, index, ItemStatus::Converting, callback);
            let pdf = client.fetch(submitted).await?;

            transition(queue, index, ItemStatus::Merging, callback);
            acc.append_pdf(&pdf)?;
            Ok(())
        }
    }
}

async fn compress(client: &ConvertApiClient, pdf: Vec<u8>) -> Result<Vec<u8>, RemoteError> {
    let submitted = client.submit_compression(pdf).await?;
    client.fetch(submitted).await
}
