//! Vault module - Bitwarden vault (đích của sync).
//!
//! Module này chứa:
//! - `VaultItem`: item login trong vault
//! - `Session`: session token đã xác thực, chỉ sống trong một run
//! - `VaultClient` trait (authenticate, list, create)
//! - `CredentialPrompt` trait: hỏi email / master password, được inject vào client
//! - `BitwardenCli`: implementation dùng `bw` CLI

pub mod bitwarden;

use crate::keychain::CredentialEntry;
use crate::secret::Secret;
use anyhow::Result;
use chrono::{DateTime, FixedOffset, SecondsFormat};

pub use bitwarden::BitwardenCli;

/// Một login item trong vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultItem {
    pub name: String,
    pub username: String,
    pub password: Secret,
    pub uri: String,
    pub notes: String,
}

impl VaultItem {
    /// Tạo item mới cho một keychain entry chưa có trong vault
    pub fn for_entry(entry: &CredentialEntry, imported_at: DateTime<FixedOffset>) -> Self {
        Self {
            name: entry.name(),
            username: entry.account.clone(),
            password: entry.secret.clone(),
            uri: format!("https://{}", entry.service),
            notes: format!(
                "Imported from macOS Keychain on {}",
                imported_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        }
    }
}

/// Session đã xác thực. Token bị xoá khỏi bộ nhớ khi drop.
#[derive(Debug)]
pub struct Session {
    token: Secret,
}

impl Session {
    pub fn new(token: impl Into<Secret>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &Secret {
        &self.token
    }
}

/// Nguồn credentials cho đăng nhập interactive
pub trait CredentialPrompt {
    /// Email tài khoản Bitwarden
    fn email(&self) -> Result<String>;

    /// Master password
    fn master_password(&self) -> Result<Secret>;
}

/// Trait cho vault đích
pub trait VaultClient {
    /// Xác thực và trả về session cho run hiện tại
    fn authenticate(&self) -> Result<Session>;

    /// Liệt kê tất cả items hiện có
    fn list_items(&self, session: &Session) -> Result<Vec<VaultItem>>;

    /// Tạo một item mới
    fn create_item(&self, session: &Session, item: &VaultItem) -> Result<()>;
}
