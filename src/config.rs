//! Configuration
//!
//! Values come from built-in defaults, then an optional JSON file, then the
//! environment; the CLI applies its own flags last.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::document::SandboxPolicy;
use crate::error::ConfigError;
use crate::protocol::ProtocolMode;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_ENDPOINT: &str = "/generate-code";

const REACT_UMD: &str = "https://unpkg.com/react@18/umd/react.development.js";
const REACT_DOM_UMD: &str = "https://unpkg.com/react-dom@18/umd/react-dom.development.js";

const BASE_STYLES: &str = "body { margin: 0; font-family: system-ui, -apple-system, sans-serif; }\n#root { min-height: 100vh; }";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the generation server.
    pub api_url: String,
    pub endpoint: String,
    pub protocol: ProtocolMode,
    /// Whole-request timeout; `None` waits for as long as the stream runs.
    pub request_timeout_secs: Option<u64>,
    pub renderer: RendererConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            protocol: ProtocolMode::default(),
            request_timeout_secs: None,
            renderer: RendererConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RendererConfig {
    /// Id of the element the root component mounts into.
    pub mount_id: String,
    pub title: String,
    /// Scripts that provide the `React` and `ReactDOM` globals.
    pub runtime_scripts: Vec<String>,
    pub base_styles: String,
    /// Root file paths in priority order.
    pub root_candidates: Vec<String>,
    pub sandbox: SandboxPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mount_id: "root".to_string(),
            title: "Preview".to_string(),
            runtime_scripts: vec![REACT_UMD.to_string(), REACT_DOM_UMD.to_string()],
            base_styles: BASE_STYLES.to_string(),
            root_candidates: [
                "src/App.tsx",
                "src/App.jsx",
                "src/App.ts",
                "src/App.js",
                "App.tsx",
                "App.jsx",
                "App.ts",
                "App.js",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            sandbox: SandboxPolicy::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by `PREVIEW_API_URL` (or `VITE_API_URL`),
    /// `PREVIEW_PROTOCOL` and `PREVIEW_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&data)?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Override fields from an environment lookup.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("PREVIEW_API_URL").or_else(|| non_empty("VITE_API_URL")) {
            self.api_url = url.trim().to_string();
        }
        if let Some(mode) = non_empty("PREVIEW_PROTOCOL") {
            self.protocol = mode.parse()?;
        }
        if let Some(secs) = non_empty("PREVIEW_TIMEOUT_SECS") {
            let parsed = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "PREVIEW_TIMEOUT_SECS",
                    value: secs.clone(),
                })?;
            self.request_timeout_secs = Some(parsed);
        }
        Ok(self)
    }

    /// Full generation URL.
    pub fn generate_url(&self) -> String {
        let base = self.api_url.trim_end_matches('/');
        if self.endpoint.starts_with('/') {
            format!("{}{}", base, self.endpoint)
        } else {
            format!("{}/{}", base, self.endpoint)
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
