//! Configuration for a pipeline run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The same config can be reused across runs;
//! credentials are looked up fresh at the start of each run.

use crate::credentials::{CredentialStore, BUILD_TIME_KEY, CONVERT_SERVICE};
use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default ConvertAPI endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://v2.convertapi.com";

/// Configuration for a merge run.
///
/// # Example
/// ```rust
/// use docpipe::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .compress_output(true)
///     .api_key("secret")
///     .build()
///     .unwrap();
/// assert!(config.compress_output);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Send the merged PDF through the remote compression endpoint. Default: false.
    ///
    /// Requires an API key even when every input is local.
    pub compress_output: bool,

    /// Base URL of the conversion service. Default: [`DEFAULT_API_BASE_URL`].
    pub api_base_url: String,

    /// Explicit API key. Takes precedence over the credential store.
    pub api_key: Option<String>,

    /// Where to look up the API key when `api_key` is not set.
    pub credential_store: Option<Arc<dyn CredentialStore>>,

    /// Service name used for the credential-store lookup. Default: `"convertapi"`.
    pub credential_service: String,

    /// Last-resort key. Default: the `DOCPIPE_CONVERT_API_KEY` value at build time.
    pub build_time_key: Option<String>,

    /// Per-request timeout in seconds. Default: None (transport default).
    pub request_timeout_secs: Option<u64>,

    /// Size of the chunks the upload body is streamed in. Default: 64 KiB.
    ///
    /// Upload progress is reported once per chunk, so smaller chunks give
    /// smoother progress at the cost of more callbacks.
    pub upload_chunk_size: usize,

    /// Receives a callback at every item status transition.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compress_output: false,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            credential_store: None,
            credential_service: CONVERT_SERVICE.to_string(),
            build_time_key: BUILD_TIME_KEY.map(String::from),
            request_timeout_secs: None,
            upload_chunk_size: 64 * 1024,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("PipelineConfig")
            .field("compress_output", &self.compress_output)
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &redact(&self.api_key))
            .field(
                "credential_store",
                &self.credential_store.as_ref().map(|_| "<dyn CredentialStore>"),
            )
            .field("credential_service", &self.credential_service)
            .field("build_time_key", &redact(&self.build_time_key))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("upload_chunk_size", &self.upload_chunk_size)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn compress_output(mut self, v: bool) -> Self {
        self.config.compress_output = v;
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.config.credential_store = Some(store);
        self
    }

    pub fn credential_service(mut self, name: impl Into<String>) -> Self {
        self.config.credential_service = name.into();
        self
    }

    pub fn build_time_key(mut self, key: Option<String>) -> Self {
        self.config.build_time_key = key;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn upload_chunk_size(mut self, bytes: usize) -> Self {
        self.config.upload_chunk_size = bytes;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<PipelineConfig, PipelineError> {
        let c = &mut self.config;
        let base = c.api_base_url.trim_end_matches('/').to_string();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(PipelineError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        c.api_base_url = base;
        if c.upload_chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "Upload chunk size must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert!(!c.compress_output);
        assert_eq!(c.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(c.credential_service, "convertapi");
        assert_eq!(c.upload_chunk_size, 64 * 1024);
        assert!(c.request_timeout_secs.is_none());
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let c = PipelineConfig::builder()
            .api_base_url("http://127.0.0.1:8080/")
            .build()
            .unwrap();
        assert_eq!(c.api_base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(PipelineConfig::builder().api_base_url("ftp://x").build().is_err());
        assert!(PipelineConfig::builder().upload_chunk_size(0).build().is_err());
        assert!(PipelineConfig::builder().request_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = PipelineConfig::builder().api_key("sk-very-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-very-secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }
}
