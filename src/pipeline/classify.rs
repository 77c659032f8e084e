//! Format classification: decide once per item how it becomes PDF pages.
//!
//! The decision is made from the file extension alone. Content sniffing is
//! left to the stage that actually parses the bytes, so a mislabelled file
//! fails with a decode error naming the real problem.

use crate::queue::RawFile;
use serde::Serialize;
use std::fmt;

/// How an item will be turned into pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", content = "format", rename_all = "lowercase")]
pub enum Strategy {
    /// Handled in-process.
    Local(LocalFormat),
    /// Converted to PDF by the remote service first.
    Remote(RemoteFormat),
    /// Not a supported format; carries the (lower-cased) extension.
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalFormat {
    Pdf,
    Image(ImageFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteFormat {
    Docx,
    Xlsx,
    Pptx,
    Txt,
}

impl RemoteFormat {
    /// Source-format segment of the conversion endpoint path.
    pub fn extension(self) -> &'static str {
        match self {
            RemoteFormat::Docx => "docx",
            RemoteFormat::Xlsx => "xlsx",
            RemoteFormat::Pptx => "pptx",
            RemoteFormat::Txt => "txt",
        }
    }
}

impl Strategy {
    pub fn is_remote(&self) -> bool {
        matches!(self, Strategy::Remote(_))
    }

    /// Short label for listings: `Local`, `ConvertAPI` or `Unsupported`.
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Local(_) => "Local",
            Strategy::Remote(_) => "ConvertAPI",
            Strategy::Unsupported(_) => "Unsupported",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Local(LocalFormat::Pdf) => write!(f, "Local (pdf)"),
            Strategy::Local(LocalFormat::Image(ImageFormat::Png)) => write!(f, "Local (png)"),
            Strategy::Local(LocalFormat::Image(ImageFormat::Jpeg)) => write!(f, "Local (jpeg)"),
            Strategy::Remote(r) => write!(f, "ConvertAPI ({})", r.extension()),
            Strategy::Unsupported(ext) => write!(f, "Unsupported (.{ext})"),
        }
    }
}

/// Classify by extension.
pub fn classify_extension(ext: &str) -> Strategy {
    match ext {
        "pdf" => Strategy::Local(LocalFormat::Pdf),
        "png" => Strategy::Local(LocalFormat::Image(ImageFormat::Png)),
        "jpg" | "jpeg" => Strategy::Local(LocalFormat::Image(ImageFormat::Jpeg)),
        "docx" => Strategy::Remote(RemoteFormat::Docx),
        "xlsx" => Strategy::Remote(RemoteFormat::Xlsx),
        "pptx" => Strategy::Remote(RemoteFormat::Pptx),
        "txt" => Strategy::Remote(RemoteFormat::Txt),
        other => Strategy::Unsupported(other.to_string()),
    }
}

/// Classify a file by its name's extension (case-insensitive).
pub fn classify(file: &RawFile) -> Strategy {
    classify_extension(&file.extension())
}

/// Whether a run over `files` needs the remote service (and so an API key).
pub fn requires_remote<'a>(files: impl IntoIterator<Item = &'a RawFile>, compress: bool) -> bool {
    compress || files.into_iter().any(|f| classify(f).is_remote())
}
