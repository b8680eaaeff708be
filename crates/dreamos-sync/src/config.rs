//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DREAMOS_REMOTE_URL=https://xyz.supabase.co                         │
//! │     DREAMOS_DRAIN_POLICY=retain-failed                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/dreamos/dreamos.toml (Linux)                             │
//! │     ~/Library/Application Support/id.dreamos.dreamos/dreamos.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     in-memory remote, 5 s badge poll, ClearAll drain                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [tenant]
//! id = "sif-alfikri"
//! name = "SIF Al Fikri"
//!
//! [remote]
//! url = "https://xyz.supabase.co"
//! api_key = "..."
//! timeout_secs = 10
//!
//! [sync]
//! badge_poll_interval_secs = 5
//! reachability_interval_secs = 30
//! drain_policy = "clear-all"   # clear-all | retain-failed
//!
//! [storage]
//! path = "/var/lib/dreamos/dreamos.db"
//! quota_bytes = 5242880
//!
//! [ai]
//! enabled = true
//! api_key = "..."
//! model = "gemini-3-flash-preview"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Remote URL that selects the built-in in-memory remote store.
pub const MEMORY_REMOTE_URL: &str = "memory:";

// =============================================================================
// Drain Policy
// =============================================================================

/// What happens to the queue after a drain pass.
///
/// ```text
/// ClearAll      [M1 ✓, M2 ✗, M3 ✓]  →  []        (M2 is dropped)
/// RetainFailed  [M1 ✓, M2 ✗, M3 ✓]  →  [M2]      (retried next drain)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrainPolicy {
    /// Clear the whole queue after every pass, whatever failed.
    #[default]
    ClearAll,
    /// Remove only mutations the remote store confirmed.
    RetainFailed,
}

impl std::fmt::Display for DrainPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrainPolicy::ClearAll => write!(f, "clear-all"),
            DrainPolicy::RetainFailed => write!(f, "retain-failed"),
        }
    }
}

impl std::str::FromStr for DrainPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "clear-all" | "clear" => Ok(DrainPolicy::ClearAll),
            "retain-failed" | "retain" => Ok(DrainPolicy::RetainFailed),
            _ => Err(SyncError::InvalidConfig(format!(
                "Unknown drain policy: {}",
                s
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    #[serde(default = "default_tenant_id")]
    pub id: String,

    #[serde(default)]
    pub name: String,
}

fn default_tenant_id() -> String {
    dreamos_core::PENDING_SETUP_TENANT_ID.to_string()
}

impl Default for TenantSettings {
    fn default() -> Self {
        TenantSettings {
            id: default_tenant_id(),
            name: String::new(),
        }
    }
}

/// Remote store connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Project URL, or `memory:` for the in-memory remote.
    #[serde(default = "default_remote_url")]
    pub url: String,

    /// Anonymous API key sent as `apikey` and bearer token.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

fn default_remote_url() -> String {
    MEMORY_REMOTE_URL.to_string()
}

fn default_remote_timeout() -> u64 {
    10
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            url: default_remote_url(),
            api_key: None,
            timeout_secs: default_remote_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// How often the pending count is refreshed for status displays.
    /// Never triggers a drain.
    #[serde(default = "default_badge_poll")]
    pub badge_poll_interval_secs: u64,

    /// How often the remote store is probed for genuine reachability.
    /// Zero disables probing.
    #[serde(default = "default_reachability")]
    pub reachability_interval_secs: u64,

    #[serde(default)]
    pub drain_policy: DrainPolicy,
}

fn default_badge_poll() -> u64 {
    5
}
fn default_reachability() -> u64 {
    30
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            badge_poll_interval_secs: default_badge_poll(),
            reachability_interval_secs: default_reachability(),
            drain_policy: DrainPolicy::default(),
        }
    }
}

/// Local persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Byte quota for everything stored locally.
    #[serde(default = "default_quota")]
    pub quota_bytes: Option<u64>,
}

fn default_quota() -> Option<u64> {
    Some(5 * 1024 * 1024)
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            path: None,
            quota_bytes: default_quota(),
        }
    }
}

/// Generative-AI advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_ai_model")]
    pub model: String,

    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

fn default_ai_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_ai_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_ai_timeout() -> u64 {
    20
}

impl Default for AiSettings {
    fn default() -> Self {
        AiSettings {
            enabled: false,
            api_key: None,
            model: default_ai_model(),
            endpoint: default_ai_endpoint(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub tenant: TenantSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub ai: AiSettings,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (dreamos.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.tenant.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("tenant.id must not be empty".into()));
        }

        if !self.uses_memory_remote() {
            let url = Url::parse(&self.remote.url)?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(SyncError::InvalidUrl(format!(
                    "Remote URL must use http:// or https:// (or be '{}'), got: {}",
                    MEMORY_REMOTE_URL, self.remote.url
                )));
            }
        }

        if self.remote.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "remote.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.badge_poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.badge_poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.ai.enabled && self.ai.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(SyncError::InvalidConfig(
                "ai.api_key is required when ai.enabled = true".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("DREAMOS_TENANT_ID") {
            debug!(tenant_id = %id, "Overriding tenant id from environment");
            self.tenant.id = id;
        }

        if let Ok(url) = std::env::var("DREAMOS_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.remote.url = url;
        }

        if let Ok(key) = std::env::var("DREAMOS_REMOTE_API_KEY") {
            self.remote.api_key = Some(key);
        }

        if let Ok(policy) = std::env::var("DREAMOS_DRAIN_POLICY") {
            match policy.parse() {
                Ok(parsed) => self.sync.drain_policy = parsed,
                Err(_) => warn!(policy = %policy, "Unknown drain policy in environment"),
            }
        }

        if let Ok(path) = std::env::var("DREAMOS_DB_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }

        if let Ok(quota) = std::env::var("DREAMOS_STORAGE_QUOTA_BYTES") {
            if let Ok(q) = quota.parse::<u64>() {
                self.storage.quota_bytes = if q == 0 { None } else { Some(q) };
            }
        }

        if let Ok(enabled) = std::env::var("DREAMOS_AI_ENABLED") {
            self.ai.enabled = matches!(enabled.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Ok(key) = std::env::var("DREAMOS_AI_API_KEY") {
            self.ai.api_key = Some(key);
        }

        if let Ok(model) = std::env::var("DREAMOS_AI_MODEL") {
            self.ai.model = model;
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("id", "dreamos", "dreamos")
    }

    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("dreamos.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The SQLite file to open: configured path, else the platform data dir,
    /// else `./dreamos.db`.
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("dreamos.db")))
            .unwrap_or_else(|| PathBuf::from("dreamos.db"))
    }

    pub fn uses_memory_remote(&self) -> bool {
        self.remote.url == MEMORY_REMOTE_URL
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    pub fn badge_poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.badge_poll_interval_secs)
    }

    /// `None` when reachability probing is disabled.
    pub fn reachability_interval(&self) -> Option<Duration> {
        match self.sync.reachability_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.uses_memory_remote());
        assert_eq!(config.sync.badge_poll_interval_secs, 5);
        assert_eq!(config.sync.drain_policy, DrainPolicy::ClearAll);
        assert_eq!(config.tenant.id, "pending-setup");
    }

    #[test]
    fn test_drain_policy_parsing() {
        assert_eq!("clear-all".parse::<DrainPolicy>().unwrap(), DrainPolicy::ClearAll);
        assert_eq!(
            "retain_failed".parse::<DrainPolicy>().unwrap(),
            DrainPolicy::RetainFailed
        );
        assert!("sometimes".parse::<DrainPolicy>().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.remote.url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.remote.url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.remote.url = "https://xyz.supabase.co".to_string();
        assert!(config.validate().is_ok());

        config.ai.enabled = true;
        assert!(config.validate().is_err());
        config.ai.api_key = Some("key".to_string());
        assert!(config.validate().is_ok());

        config.tenant.id = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_parsing() {
        let config: SyncConfig = toml::from_str(
            r#"
            [remote]
            url = "https://xyz.supabase.co"

            [sync]
            drain_policy = "retain-failed"
            reachability_interval_secs = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.drain_policy, DrainPolicy::RetainFailed);
        assert_eq!(config.sync.badge_poll_interval_secs, 5);
        assert!(config.reachability_interval().is_none());
        assert_eq!(config.remote.timeout_secs, 10);
    }

    #[test]
    fn test_load_from_file_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dreamos.toml");

        let mut config = SyncConfig::default();
        config.tenant.id = "sif".to_string();
        config.storage.path = Some(dir.path().join("local.db"));
        config.save(Some(path.clone())).unwrap();

        let loaded = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.tenant.id, "sif");
        assert_eq!(loaded.database_path(), dir.path().join("local.db"));
    }
}
