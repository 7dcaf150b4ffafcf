//! Config module - Cấu hình keychain2bitwarden (config.toml).
//!
//! File cấu hình là tuỳ chọn và chỉ được đọc, không bao giờ được tạo:
//! - Đường dẫn `bw` và `security` binaries
//! - Keychain cần dump (mặc định: search list của user)
//! - Các class item được đọc (genp, inet)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Biến môi trường để chỉ định file config khác
pub const CONFIG_ENV: &str = "KEYCHAIN2BW_CONFIG";

/// Cấu hình chính
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Đường dẫn đến Bitwarden CLI
    pub bw_path: PathBuf,

    /// Đường dẫn đến macOS `security` tool
    pub security_path: PathBuf,

    /// Keychain cụ thể cần đọc (None = search list mặc định)
    pub keychain: Option<PathBuf>,

    /// Chạy `bw sync` trước khi list items
    pub sync_before_list: bool,

    /// Các class item được đọc từ keychain
    pub item_classes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bw_path: PathBuf::from("bw"),
            security_path: PathBuf::from("security"),
            keychain: None,
            sync_before_list: true,
            item_classes: vec!["genp".to_string(), "inet".to_string()],
        }
    }
}

/// Lấy đường dẫn config file mặc định (~/.config/keychain2bitwarden/config.toml)
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .map(|d| d.join("keychain2bitwarden"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

impl Config {
    /// Load config từ file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config từ đường dẫn mặc định, hoặc dùng defaults nếu không có file
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}
