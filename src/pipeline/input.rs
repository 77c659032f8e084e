//! Input resolution: read a user-supplied path into a [`RawFile`].
//!
//! No content validation happens here. Format is decided later from the
//! file name, and a file whose bytes don't match its extension fails in
//! the stage that parses it, attached to its queue item.

use crate::error::PipelineError;
use crate::queue::RawFile;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Read a local file. The item name is the path's final component.
pub async fn read_file(path: impl AsRef<Path>) -> Result<RawFile, PipelineError> {
    let path = path.as_ref();

    let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => PipelineError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => PipelineError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PipelineError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read '{}' ({} bytes) from {}", name, data.len(), path.display());
    Ok(RawFile::new(name, data))
}

/// Read several files, stopping at the first failure.
pub async fn read_files<P: AsRef<Path>>(
    paths: impl IntoIterator<Item = P>,
) -> Result<Vec<RawFile>, PipelineError> {
    let mut files = Vec::new();
    for path in paths {
        files.push(read_file(path).await?);
    }
    Ok(files)
}
