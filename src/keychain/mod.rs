//! Keychain module - Đọc credentials từ macOS Keychain.
//!
//! Module này chứa:
//! - `CredentialEntry`: bộ ba (service, account, secret) đọc từ keychain
//! - `KeychainReader` trait để core logic test được với fakes
//! - `SecurityKeychain`: implementation dùng `security` CLI và `keyring`

pub mod security;

use crate::error::SyncError;
use crate::secret::Secret;

pub use security::SecurityKeychain;

/// Một credential đọc từ keychain. Không thay đổi sau khi đọc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub service: String,
    pub account: String,
    pub secret: Secret,
}

impl CredentialEntry {
    pub fn new(
        service: impl Into<String>,
        account: impl Into<String>,
        secret: impl Into<Secret>,
    ) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
            secret: secret.into(),
        }
    }

    /// Tên item tương ứng trong vault ("{service} - {account}")
    pub fn name(&self) -> String {
        crate::sync::item_name(&self.service, &self.account)
    }
}

/// Kết quả quét keychain
#[derive(Debug, Default)]
pub struct KeychainScan {
    /// Các entries đọc được đầy đủ (kể cả secret)
    pub entries: Vec<CredentialEntry>,
    /// Số entries bị bỏ qua (không có service, không đọc được secret)
    pub skipped: usize,
}

/// Trait cho nguồn credentials local
pub trait KeychainReader {
    /// Liệt kê tất cả credentials của user hiện tại
    fn read_entries(&self) -> Result<KeychainScan, SyncError>;
}
