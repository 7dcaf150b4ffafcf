//! keychain2bitwarden - Sync một chiều từ macOS Keychain sang Bitwarden.
//!
//! Cung cấp các chức năng:
//! - Đọc credentials từ keychain (`security` CLI + `keyring`)
//! - Liệt kê và tạo items trong vault qua Bitwarden CLI (`bw`)
//! - Reconcile: tạo các items còn thiếu, bỏ qua các items đã có
//!
//! Nguyên tắc: không bao giờ log hoặc lưu secrets, không lưu state giữa các lần chạy.

pub mod config;
pub mod error;
pub mod keychain;
pub mod secret;
pub mod sync;
pub mod vault;

#[cfg(all(test, unix))]
mod test_support;

// Re-export main types
pub use config::Config;
pub use error::{Store, SyncError};
pub use keychain::{CredentialEntry, KeychainReader, KeychainScan, SecurityKeychain};
pub use secret::Secret;
pub use sync::{run, Mode, RunObserver, RunOptions, Stage, SyncPlan, SyncReport};
pub use vault::{BitwardenCli, CredentialPrompt, Session, VaultClient, VaultItem};
