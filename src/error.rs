//! Error types cho một lần sync.
//!
//! - `Authentication` và `Read`: fatal, dừng run trước khi ghi bất cứ thứ gì
//! - `Write`: lỗi tạo một item, được log và đếm, run vẫn tiếp tục

use std::process::ExitCode;
use thiserror::Error;

/// Nguồn dữ liệu bị lỗi khi đọc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Keychain,
    Vault,
}

impl std::fmt::Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Store::Keychain => write!(f, "keychain"),
            Store::Vault => write!(f, "vault"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Authentication failed: {0:#}")]
    Authentication(anyhow::Error),

    #[error("Cannot read {store}: {source:#}")]
    Read {
        store: Store,
        #[source]
        source: anyhow::Error,
    },

    #[error("Cannot create vault item '{name}': {source:#}")]
    Write {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub fn read(store: Store, source: anyhow::Error) -> Self {
        SyncError::Read { store, source }
    }

    /// Fatal = run phải dừng ngay
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SyncError::Write { .. })
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_fatal_categories() {
        assert!(SyncError::Authentication(anyhow!("bad password")).is_fatal());
        assert!(SyncError::read(Store::Vault, anyhow!("offline")).is_fatal());
        let write = SyncError::Write {
            name: "github - bob".to_string(),
            source: anyhow!("rejected"),
        };
        assert!(!write.is_fatal());
    }

    #[test]
    fn test_messages_include_context() {
        let err = SyncError::read(
            Store::Keychain,
            anyhow!("exit status 51").context("security dump-keychain failed"),
        );
        let msg = err.to_string();
        assert!(msg.contains("Cannot read keychain"));
        assert!(msg.contains("security dump-keychain failed"));
        assert!(msg.contains("exit status 51"));
    }
}
