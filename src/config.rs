use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for the offline core.
///
/// Defaults match production behavior; tests construct custom configs with
/// shorter windows where useful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(rename = "serverUrl")]
    pub server_url: Option<String>,
    #[serde(rename = "alertsUrl")]
    pub alerts_url: Option<String>,
    #[serde(rename = "apiToken")]
    pub api_token: Option<String>,

    /// Window within which alerts with the same identifying key collapse
    #[serde(rename = "dedupWindowMs", default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
    /// Hard cap on the dedup working set
    #[serde(rename = "dedupCap", default = "default_dedup_cap")]
    pub dedup_cap: usize,
    /// Minimum gap between user-facing connectivity notices
    #[serde(rename = "noticeCooldownMs", default = "default_notice_cooldown_ms")]
    pub notice_cooldown_ms: u64,
    /// Auto-dismiss timer for popup notifications
    #[serde(rename = "popupAutoDismissMs", default = "default_popup_auto_dismiss_ms")]
    pub popup_auto_dismiss_ms: u64,
    /// Optional TTL for cache entries; write-driven invalidation is the
    /// decisive mechanism, this is defense in depth only
    #[serde(rename = "cacheMaxAgeMs", default)]
    pub cache_max_age_ms: Option<u64>,
}

fn default_dedup_window_ms() -> u64 {
    8_000
}

fn default_dedup_cap() -> usize {
    300
}

fn default_notice_cooldown_ms() -> u64 {
    30_000
}

fn default_popup_auto_dismiss_ms() -> u64 {
    10_000
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            alerts_url: None,
            api_token: None,
            dedup_window_ms: default_dedup_window_ms(),
            dedup_cap: default_dedup_cap(),
            notice_cooldown_ms: default_notice_cooldown_ms(),
            popup_auto_dismiss_ms: default_popup_auto_dismiss_ms(),
            cache_max_age_ms: None,
        }
    }
}

impl CoreConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn notice_cooldown(&self) -> Duration {
        Duration::from_millis(self.notice_cooldown_ms)
    }

    pub fn popup_auto_dismiss(&self) -> Duration {
        Duration::from_millis(self.popup_auto_dismiss_ms)
    }

    pub fn cache_max_age(&self) -> Option<Duration> {
        self.cache_max_age_ms.map(Duration::from_millis)
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(home_dir) = dirs::home_dir() {
        Ok(home_dir.join(".inventory-sync"))
    } else {
        Err(CoreError::Config(
            "Could not find home directory".to_string(),
        ))
    }
}

pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn get_logs_dir() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("logs"))
}

pub fn get_data_dir() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("data"))
}

fn ensure_dir(path: &PathBuf) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;

        // Owner-only on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(path)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(path, permissions)?;
        }
    }
    Ok(())
}

pub fn ensure_config_dir() -> Result<()> {
    ensure_dir(&get_config_dir()?)
}

pub fn ensure_logs_dir() -> Result<()> {
    ensure_dir(&get_logs_dir()?)
}

pub fn ensure_data_dir() -> Result<()> {
    ensure_dir(&get_data_dir()?)
}

pub fn load_config() -> Result<CoreConfig> {
    ensure_config_dir()?;

    let config_file = get_config_file_path()?;

    if config_file.exists() {
        let content = fs::read_to_string(config_file)?;
        let config: CoreConfig = serde_json::from_str(&content)?;
        Ok(config)
    } else {
        Ok(CoreConfig::default())
    }
}

pub fn save_config(config: &CoreConfig) -> Result<()> {
    ensure_config_dir()?;

    let config_file = get_config_file_path()?;
    let content = serde_json::to_string_pretty(config)?;

    fs::write(&config_file, content)?;

    // Token lives in this file, keep it owner-readable only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(&config_file)?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(&config_file, permissions)?;
    }

    Ok(())
}
