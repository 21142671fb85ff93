//! Configuration types for the IP monitor
//!
//! Configuration is read once at startup from a JSON file and is immutable
//! for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use crate::selector::SelectionPolicy;

/// Environment variable that overrides the GitHub token from the config file
pub const TOKEN_ENV_VAR: &str = "IPMON_GITHUB_TOKEN";

/// Tokens that indicate an unedited template
const PLACEHOLDER_TOKENS: &[&str] = &["your_github_token", "replace_me", "changeme"];

/// Main monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Remote document store
    #[serde(default)]
    pub store: StoreConfig,

    /// Polling and interface selection settings
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Path (key) of the remote document
    #[serde(default = "default_data_file")]
    pub data_file: String,
}

impl MonitorConfig {
    /// Load configuration from a JSON file
    ///
    /// The file must exist; callers that want a template written for a
    /// missing file check for existence first (see [`MonitorConfig::template`]).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_json(&content).map_err(|e| {
            crate::Error::config(format!("{} ({})", e, path.display()))
        })
    }

    /// Parse configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self, crate::Error> {
        serde_json::from_str(content)
            .map_err(|e| crate::Error::config(format!("Invalid config JSON: {}", e)))
    }

    /// Apply environment overrides
    ///
    /// `IPMON_GITHUB_TOKEN` replaces the token of a GitHub store so the
    /// secret does not have to live in the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            self.override_token(token);
        }
    }

    fn override_token(&mut self, new_token: String) {
        if new_token.is_empty() {
            return;
        }
        if let StoreConfig::Github { token, .. } = &mut self.store {
            *token = new_token;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.data_file.trim().is_empty() {
            return Err(crate::Error::config("data_file cannot be empty"));
        }
        // Stores resolve the document below their root
        let is_plain = Path::new(&self.data_file)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(crate::Error::config(format!(
                "data_file must be a relative path without '.' or '..' components. Got: {}",
                self.data_file
            )));
        }

        self.monitor.validate()?;
        self.store.validate()?;

        Ok(())
    }

    /// Template written for a first run without a config file
    pub fn template() -> Self {
        Self {
            store: StoreConfig::Github {
                token: "YOUR_GITHUB_TOKEN".to_string(),
                repo: "username/repository".to_string(),
                branch: default_branch(),
                api_base: default_api_base(),
            },
            monitor: MonitorSettings {
                interval: default_interval(),
                interface_priority: vec![
                    "Ethernet".to_string(),
                    "eth".to_string(),
                    "en".to_string(),
                    "WLAN".to_string(),
                    "Wi-Fi".to_string(),
                    "wl".to_string(),
                ],
                exclude_interfaces: vec![
                    "Loopback".to_string(),
                    "VMware".to_string(),
                    "VirtualBox".to_string(),
                    "Hyper-V".to_string(),
                    "docker".to_string(),
                ],
            },
            data_file: default_data_file(),
        }
    }

    /// Render configuration as pretty JSON
    pub fn to_json(&self) -> Result<String, crate::Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Polling and interface selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between reconciliation cycles
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Ordered interface name fragments, most preferred first
    #[serde(default)]
    pub interface_priority: Vec<String>,

    /// Interface name fragments that are never selected
    #[serde(default)]
    pub exclude_interfaces: Vec<String>,
}

impl MonitorSettings {
    /// Validate the monitor settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval == 0 {
            return Err(crate::Error::config("monitor.interval must be > 0"));
        }
        if self.interface_priority.iter().any(|f| f.is_empty()) {
            return Err(crate::Error::config(
                "monitor.interface_priority cannot contain empty entries",
            ));
        }
        if self.exclude_interfaces.iter().any(|f| f.is_empty()) {
            // An empty fragment would match (and exclude) every interface
            return Err(crate::Error::config(
                "monitor.exclude_interfaces cannot contain empty entries",
            ));
        }
        Ok(())
    }

    /// Build the selection policy from these settings
    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::new(
            self.interface_priority.iter().cloned(),
            self.exclude_interfaces.iter().cloned(),
        )
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            interface_priority: Vec::new(),
            exclude_interfaces: Vec::new(),
        }
    }
}

/// Remote document store configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// GitHub repository contents API
    Github {
        /// Personal access token with contents write permission
        #[serde(default)]
        token: String,
        /// Repository in `owner/name` form
        repo: String,
        /// Branch to commit to
        #[serde(default = "default_branch")]
        branch: String,
        /// API base URL (GitHub Enterprise or tests)
        #[serde(default = "default_api_base")]
        api_base: String,
    },

    /// Local directory, one file per document
    File {
        /// Directory that holds the documents
        root: String,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Github {
                token,
                repo,
                branch,
                api_base,
            } => {
                if token.is_empty() {
                    return Err(crate::Error::config(format!(
                        "GitHub token is required. Set store.token or {}",
                        TOKEN_ENV_VAR
                    )));
                }
                let token_lower = token.to_lowercase();
                if PLACEHOLDER_TOKENS.iter().any(|p| token_lower.contains(p)) {
                    return Err(crate::Error::config(
                        "GitHub token appears to be a placeholder. Edit the config file.",
                    ));
                }
                let mut parts = repo.split('/');
                let valid_repo = matches!(
                    (parts.next(), parts.next(), parts.next()),
                    (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
                );
                if !valid_repo || repo == "username/repository" {
                    return Err(crate::Error::config(format!(
                        "store.repo must be of the form owner/name. Got: {}",
                        repo
                    )));
                }
                if branch.is_empty() {
                    return Err(crate::Error::config("store.branch cannot be empty"));
                }
                if !api_base.starts_with("https://") && !api_base.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "store.api_base must use HTTP or HTTPS scheme. Got: {}",
                        api_base
                    )));
                }
                Ok(())
            }
            StoreConfig::File { root } => {
                if root.is_empty() {
                    return Err(crate::Error::config("store.root cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::Github { .. } => "github",
            StoreConfig::File { .. } => "file",
        }
    }
}

// Hides the token
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Github {
                repo,
                branch,
                api_base,
                ..
            } => f
                .debug_struct("Github")
                .field("token", &"<REDACTED>")
                .field("repo", repo)
                .field("branch", branch)
                .field("api_base", api_base)
                .finish(),
            StoreConfig::File { root } => f.debug_struct("File").field("root", root).finish(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Github {
            token: String::new(),
            repo: String::new(),
            branch: default_branch(),
            api_base: default_api_base(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_data_file() -> String {
    "data.json".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
