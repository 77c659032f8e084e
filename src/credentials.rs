//! Local credential lookup for the conversion service.
//!
//! A run that needs the remote service reads its API key exactly once, in
//! this order:
//!
//! 1. an explicit key in [`crate::PipelineConfig::api_key`]
//! 2. the configured [`CredentialStore`] (e.g. a JSON file on disk)
//! 3. the key baked in at build time via `DOCPIPE_CONVERT_API_KEY`
//!
//! Empty strings count as absent at every level.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key under which the conversion service secret is stored.
pub const CONVERT_SERVICE: &str = "convertapi";

/// Key compiled into the binary, if any.
pub const BUILD_TIME_KEY: Option<&str> = option_env!("DOCPIPE_CONVERT_API_KEY");

/// A read-only service-name → secret lookup.
pub trait CredentialStore: Send + Sync {
    fn get(&self, service: &str) -> Option<String>;
}

/// In-memory store, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    keys: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service: impl Into<String>, secret: impl Into<String>) -> Self {
        self.keys.insert(service.into(), secret.into());
        self
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, service: &str) -> Option<String> {
        self.keys.get(service).cloned()
    }
}

/// A JSON object of `{ "service": "secret" }` stored on disk.
///
/// The file is re-read on every lookup so edits take effect on the next run.
/// A missing file means "no keys"; a malformed one is logged and treated the
/// same way.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> HashMap<String, String> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) => {
                debug!("Credential file {} not readable: {}", self.path.display(), e);
                return HashMap::new();
            }
        };
        match serde_json::from_str(&text) {
            Ok(map) => map,
            Err(e) => {
                warn!(
                    "Failed to parse credential file {}: {}",
                    self.path.display(),
                    e
                );
                HashMap::new()
            }
        }
    }
}

impl CredentialStore for JsonFileStore {
    fn get(&self, service: &str) -> Option<String> {
        self.load().remove(service)
    }
}

/// Resolve the conversion-service key for a run.
pub fn resolve_api_key(config: &PipelineConfig) -> Result<String, PipelineError> {
    fn non_empty(s: Option<String>) -> Option<String> {
        s.filter(|k| !k.trim().is_empty())
    }

    if let Some(key) = non_empty(config.api_key.clone()) {
        debug!("Using API key from configuration");
        return Ok(key);
    }

    if let Some(ref store) = config.credential_store {
        if let Some(key) = non_empty(store.get(&config.credential_service)) {
            debug!("Using API key from credential store");
            return Ok(key);
        }
    }

    if let Some(key) = non_empty(config.build_time_key.clone()) {
        debug!("Using build-time API key");
        return Ok(key);
    }

    Err(PipelineError::MissingCredential {
        service: "ConvertAPI".to_string(),
    })
}
