//! Client for the remote conversion service (ConvertAPI REST v2).
//!
//! Two endpoints are used:
//!
//! ```text
//! POST {base}/convert/{ext}/to/pdf     JSON body, base64 file      → PDF
//! POST {base}/convert/pdf/to/compress  multipart/form-data upload  → PDF
//! ```
//!
//! Both ask the service to store the result (`StoreFile=true`) and answer
//! with `{"Files":[{"Url": …}]}` or, for inline results,
//! `{"Files":[{"FileData": "<base64>"}]}`. The first shape is modelled as
//! [`RemoteFile::Url`] and fetched with a follow-up GET; the second is
//! decoded straight into [`RemoteFile::Inline`]. [`ConvertApiClient::fetch`]
//! resolves either into bytes.
//!
//! The JSON conversion body is streamed in chunks so upload progress can be
//! reported while the request is in flight.

use crate::error::RemoteError;
use crate::pipeline::classify::RemoteFormat;
use crate::queue::RawFile;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Receives the upload percentage (0–100) whenever it changes.
pub type UploadProgress = Arc<dyn Fn(u8) + Send + Sync>;

/// A converted file as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteFile {
    /// Stored server-side; download it from here.
    Url(String),
    /// Returned inline, already base64-decoded.
    Inline(Vec<u8>),
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConvertRequest<'a> {
    parameters: Vec<Parameter<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Parameter<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_value: Option<FileValue<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FileValue<'a> {
    name: &'a str,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConvertResponse {
    #[serde(default)]
    files: Vec<ResultFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultFile {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    file_data: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    invalid_parameters: Option<serde_json::Map<String, Value>>,
}

const CONVERT_ERROR: &str = "Failed to convert file via ConvertAPI.";
const COMPRESS_ERROR: &str = "Failed to compress final output.";

// ── Client ───────────────────────────────────────────────────────────────

/// Authenticated ConvertAPI client.
#[derive(Clone)]
pub struct ConvertApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chunk_size: usize,
}

impl ConvertApiClient {
    /// Build a client. `timeout` of `None` keeps the transport default.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
        chunk_size: usize,
    ) -> Result<Self, RemoteError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder.build().map_err(transport)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chunk_size: chunk_size.max(1),
        })
    }

    /// Upload `file` for conversion to PDF.
    ///
    /// `on_upload` is called with the percentage of the request body handed
    /// to the transport, each time it changes.
    pub async fn submit_conversion(
        &self,
        file: &RawFile,
        format: RemoteFormat,
        on_upload: UploadProgress,
    ) -> Result<RemoteFile, RemoteError> {
        let url = format!("{}/convert/{}/to/pdf", self.base_url, format.extension());
        let body = conversion_body(file)?;
        let total = body.len() as u64;
        info!(
            "Uploading '{}' ({} bytes encoded) to {}",
            file.name, total, url
        );

        let chunks: Vec<Vec<u8>> = body.chunks(self.chunk_size).map(<[u8]>::to_vec).collect();
        let mut sent = 0u64;
        let mut last_reported: Option<u8> = None;
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            let pct = percent(sent, total);
            if last_reported != Some(pct) {
                last_reported = Some(pct);
                on_upload(pct);
            }
            Ok::<_, std::io::Error>(chunk)
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, total)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .map_err(transport)?;

        read_result(response, CONVERT_ERROR).await
    }

    /// Upload a finished PDF to the compression endpoint.
    pub async fn submit_compression(&self, pdf: Vec<u8>) -> Result<RemoteFile, RemoteError> {
        let url = format!("{}/convert/pdf/to/compress", self.base_url);
        info!("Uploading merged PDF ({} bytes) for compression", pdf.len());

        let part = reqwest::multipart::Part::bytes(pdf)
            .file_name("merged.pdf")
            .mime_str("application/pdf")
            .map_err(transport)?;
        let form = reqwest::multipart::Form::new()
            .part("File", part)
            .text("StoreFile", "true");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        read_result(response, COMPRESS_ERROR).await
    }

    /// Resolve a [`RemoteFile`] into bytes, downloading it if needed.
    pub async fn fetch(&self, file: RemoteFile) -> Result<Vec<u8>, RemoteError> {
        let url = match file {
            RemoteFile::Inline(bytes) => return Ok(bytes),
            RemoteFile::Url(url) => url,
        };
        debug!("Downloading converted file from {}", url);

        let failed = |reason: String| RemoteError::DownloadFailed {
            url: url.clone(),
            reason,
        };
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport {
        reason: e.to_string(),
    }
}

fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

fn conversion_body(file: &RawFile) -> Result<Vec<u8>, RemoteError> {
    let request = ConvertRequest {
        parameters: vec![
            Parameter {
                name: "File",
                file_value: Some(FileValue {
                    name: &file.name,
                    data: STANDARD.encode(&file.data),
                }),
                value: None,
            },
            Parameter {
                name: "StoreFile",
                file_value: None,
                value: Some(Value::Bool(true)),
            },
        ],
    };
    serde_json::to_vec(&request).map_err(|e| RemoteError::InvalidPayload(e.to_string()))
}

async fn read_result(
    response: reqwest::Response,
    default_error: &str,
) -> Result<RemoteFile, RemoteError> {
    let status = response.status();
    let text = response.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(service_error(status, &text, default_error));
    }
    parse_success(&text)
}

/// Pick the first returned file, preferring its URL.
fn parse_success(text: &str) -> Result<RemoteFile, RemoteError> {
    let body: ConvertResponse =
        serde_json::from_str(text).map_err(|e| RemoteError::InvalidPayload(e.to_string()))?;
    let first = body.files.into_iter().next().ok_or(RemoteError::NoFiles)?;
    match (first.url, first.file_data) {
        (Some(url), _) if !url.is_empty() => Ok(RemoteFile::Url(url)),
        (_, Some(data)) if !data.is_empty() => STANDARD
            .decode(data.trim())
            .map(RemoteFile::Inline)
            .map_err(|e| RemoteError::InvalidPayload(format!("FileData is not base64: {e}"))),
        _ => Err(RemoteError::InvalidPayload(
            "No file data or URL returned from ConvertAPI.".into(),
        )),
    }
}

/// Build the error for a non-success response.
///
/// The service's `Message` is used when present, followed by any
/// `InvalidParameters` entries as ` (name: detail, …)`.
fn service_error(status: StatusCode, body: &str, default_message: &str) -> RemoteError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => {
            let mut msg = err
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_message.to_string());
            if let Some(params) = err.invalid_parameters.filter(|p| !p.is_empty()) {
                let detail = params
                    .iter()
                    .map(|(name, value)| format!("{name}: {}", render_value(value)))
                    .collect::<Vec<_>>()
                    .join(", ");
                msg.push_str(&format!(" ({detail})"));
            }
            msg
        }
        Err(_) => format!(
            "ConvertAPI error: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .trim_end()
        .to_string(),
    };
    RemoteError::Service {
        status: status.as_u16(),
        message,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn error_message_with_invalid_parameters() {
        let body = r#"{"Code":4000,"Message":"Parameter validation error.","InvalidParameters":{"File":["File is empty"],"StoreFile":"must be boolean"}}"#;
        let err = service_error(StatusCode::BAD_REQUEST, body, CONVERT_ERROR);
        match err {
            RemoteError::Service { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(
                    message,
                    "Parameter validation error. (File: File is empty, StoreFile: must be boolean)"
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn error_message_falls_back_to_default() {
        let err = service_error(StatusCode::BAD_REQUEST, r#"{"InvalidParameters":{}}"#, CONVERT_ERROR);
        assert_eq!(err.to_string(), CONVERT_ERROR);
    }

    #[test]
    fn non_json_error_uses_status_line() {
        let err = service_error(StatusCode::BAD_GATEWAY, "<html>oops</html>", CONVERT_ERROR);
        assert_eq!(err.to_string(), "ConvertAPI error: 502 Bad Gateway");
    }

    #[test]
    fn success_prefers_url() {
        let file = parse_success(r#"{"Files":[{"FileName":"a.pdf","Url":"https://x/a.pdf"}]}"#).unwrap();
        assert_eq!(file, RemoteFile::Url("https://x/a.pdf".into()));
    }

    #[test]
    fn success_inline_is_decoded() {
        let data = STANDARD.encode(b"%PDF-1.5 inline");
        let text = format!(r#"{{"Files":[{{"FileName":"a.pdf","FileData":"{data}"}}]}}"#);
        assert_eq!(
            parse_success(&text).unwrap(),
            RemoteFile::Inline(b"%PDF-1.5 inline".to_vec())
        );
    }

    #[test]
    fn success_without_files_is_an_error() {
        assert!(matches!(parse_success(r#"{"Files":[]}"#), Err(RemoteError::NoFiles)));
        assert!(matches!(parse_success("{}"), Err(RemoteError::NoFiles)));
        assert!(matches!(
            parse_success(r#"{"Files":[{"FileName":"a.pdf"}]}"#),
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn percent_rounds_and_caps() {
        assert_eq!(percent(0, 10), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(10, 10), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[tokio::test]
    async fn conversion_request_shape_and_progress() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/convert/docx/to/pdf"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"Files":[{{"FileName":"a.pdf","FileData":"{}"}}]}}"#,
                STANDARD.encode(b"converted")
            )))
            .expect(1)
            .mount(&server)
            .await;

        // Small chunks so several progress values are reported.
        let client = ConvertApiClient::new(server.uri(), "test-key", None, 16).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: UploadProgress = Arc::new(move |p| sink.lock().unwrap().push(p));

        let file = RawFile::new("report.docx", b"hello world".to_vec());
        let result = client
            .submit_conversion(&file, RemoteFormat::Docx, progress)
            .await
            .unwrap();
        assert_eq!(client.fetch(result).await.unwrap(), b"converted");

        let seen = seen.lock().unwrap().clone();
        assert!(seen.len() > 1, "got {seen:?}");
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "monotonic: {seen:?}");
        assert_eq!(seen.last(), Some(&100));

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["Parameters"][0]["Name"], "File");
        assert_eq!(body["Parameters"][0]["FileValue"]["Name"], "report.docx");
        assert_eq!(
            body["Parameters"][0]["FileValue"]["Data"],
            STANDARD.encode(b"hello world")
        );
        assert_eq!(body["Parameters"][1]["Name"], "StoreFile");
        assert_eq!(body["Parameters"][1]["Value"], true);
    }

    #[tokio::test]
    async fn url_result_is_downloaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/out.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-bytes".to_vec()))
            .mount(&server)
            .await;

        let client = ConvertApiClient::new(server.uri(), "k", None, 1024).unwrap();
        let bytes = client
            .fetch(RemoteFile::Url(format!("{}/files/out.pdf", server.uri())))
            .await
            .unwrap();
        assert_eq!(bytes, b"%PDF-bytes");
    }

    #[tokio::test]
    async fn failed_download_reports_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ConvertApiClient::new(server.uri(), "k", None, 1024).unwrap();
        let url = format!("{}/files/gone.pdf", server.uri());
        let err = client.fetch(RemoteFile::Url(url.clone())).await.unwrap_err();
        match err {
            RemoteError::DownloadFailed { url: u, reason } => {
                assert_eq!(u, url);
                assert!(reason.contains("404"), "got {reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn compression_error_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/convert/pdf/to/compress"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string(r#"{"Message":"Compression unavailable"}"#),
            )
            .mount(&server)
            .await;

        let client = ConvertApiClient::new(server.uri(), "k", None, 1024).unwrap();
        let err = client.submit_compression(b"%PDF".to_vec()).await.unwrap_err();
        assert_eq!(err.to_string(), "Compression unavailable");
    }
}
