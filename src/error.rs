//! Error types for the docpipe library.
//!
//! Three error types mirror the three places a run can break:
//!
//! * [`PipelineError`] — **Run-level**: what [`crate::execute()`] returns.
//!   A run either produces the merged bytes or exactly one of these.
//!
//! * [`ItemError`] — **Item-level**: one queue item could not be turned into
//!   pages. Its `Display` text becomes the item's `error_message`, and the
//!   run wraps it in [`PipelineError::ItemFailed`] together with the item id.
//!
//! * [`RemoteError`] — a call to the conversion service failed. It is an
//!   [`ItemError`] during conversion and a [`PipelineError::CompressionFailed`]
//!   during the final compression pass, which has no associated item.

use crate::queue::ItemId;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Configuration errors ─────────────────────────────────────────────
    /// A remote step is required but no API key could be found.
    #[error("{service} API key is not configured.\nSet it with --api-key, CONVERT_API_KEY, or add it to the credentials file.")]
    MissingCredential { service: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `execute` was called on a queue with no items.
    #[error("The queue is empty; add at least one file before running the pipeline")]
    EmptyQueue,

    // ── Run failures ─────────────────────────────────────────────────────
    /// An item failed; the run was halted at that item.
    #[error("Failed to process '{name}': {source}")]
    ItemFailed {
        id: ItemId,
        name: String,
        #[source]
        source: ItemError,
    },

    /// Every item merged but the whole-document compression pass failed.
    #[error("Failed to compress final output: {source}")]
    CompressionFailed {
        #[source]
        source: RemoteError,
    },

    /// The accumulated document could not be serialised.
    #[error("Failed to serialise merged PDF: {0}")]
    Serialize(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Any other failure while reading an input file.
    #[error("Failed to read input file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure category of a [`PipelineError`], for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    UnsupportedFormat,
    Transport,
    RemoteService,
    Decode,
    Compression,
    Io,
    Internal,
}

impl PipelineError {
    /// Classify the error. Item failures report the category of their cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MissingCredential { .. }
            | PipelineError::InvalidConfig(_)
            | PipelineError::EmptyQueue => ErrorKind::Configuration,
            PipelineError::ItemFailed { source, .. } => source.kind(),
            PipelineError::CompressionFailed { .. } => ErrorKind::Compression,
            PipelineError::FileNotFound { .. }
            | PipelineError::PermissionDenied { .. }
            | PipelineError::ReadFailed { .. }
            | PipelineError::OutputWriteFailed { .. } => ErrorKind::Io,
            PipelineError::Serialize(_) | PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The id of the item that halted the run, if any.
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            PipelineError::ItemFailed { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Why a single queue item could not be merged.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Extension is not one of the supported local or remote formats.
    #[error("Unsupported file type: .{extension}")]
    UnsupportedFormat { extension: String },

    /// The source (or converted) PDF could not be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// The image could not be decoded or embedded.
    #[error("Image could not be decoded: {detail}")]
    ImageDecode { detail: String },

    /// The conversion service call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ItemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ItemError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            ItemError::CorruptPdf { .. } | ItemError::ImageDecode { .. } => ErrorKind::Decode,
            ItemError::Remote(e) => e.kind(),
        }
    }
}

/// Failures talking to the conversion service.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("Network error occurred during upload: {reason}")]
    Transport { reason: String },

    /// The service answered with a non-success status.
    ///
    /// `message` already carries any per-parameter validation detail.
    #[error("{message}")]
    Service { status: u16, message: String },

    /// A success response listed no files.
    #[error("ConvertAPI returned no files.")]
    NoFiles,

    /// The converted file's URL could not be fetched.
    #[error("Failed to download converted file from '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The success body was not in the expected shape.
    #[error("Unexpected ConvertAPI response: {0}")]
    InvalidPayload(String),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Transport { .. } | RemoteError::DownloadFailed { .. } => {
                ErrorKind::Transport
            }
            RemoteError::Service { .. } | RemoteError::NoFiles | RemoteError::InvalidPayload(_) => {
                ErrorKind::RemoteService
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_names_extension() {
        let e = ItemError::UnsupportedFormat {
            extension: "xyz".into(),
        };
        assert_eq!(e.to_string(), "Unsupported file type: .xyz");
        assert_eq!(e.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn item_failed_display_and_kind() {
        let id = ItemId::new();
        let e = PipelineError::ItemFailed {
            id,
            name: "report.docx".into(),
            source: ItemError::Remote(RemoteError::Service {
                status: 401,
                message: "Unauthorized".into(),
            }),
        };
        let msg = e.to_string();
        assert!(msg.contains("report.docx"), "got: {msg}");
        assert!(msg.contains("Unauthorized"), "got: {msg}");
        assert_eq!(e.kind(), ErrorKind::RemoteService);
        assert_eq!(e.item_id(), Some(id));
    }

    #[test]
    fn compression_failure_has_no_item() {
        let e = PipelineError::CompressionFailed {
            source: RemoteError::NoFiles,
        };
        assert_eq!(e.kind(), ErrorKind::Compression);
        assert_eq!(e.item_id(), None);
        assert!(e.to_string().contains("compress"));
    }

    #[test]
    fn missing_credential_is_configuration() {
        let e = PipelineError::MissingCredential {
            service: "ConvertAPI".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Configuration);
        assert!(e.to_string().contains("ConvertAPI"));
    }

    #[test]
    fn transport_kind() {
        let e = RemoteError::Transport {
            reason: "connection refused".into(),
        };
        assert_eq!(e.kind(), ErrorKind::Transport);
        assert!(e.to_string().contains("connection refused"));
    }
}
