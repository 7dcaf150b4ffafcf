//! Reconciler - Tính diff giữa keychain và vault, tạo các items còn thiếu.
//!
//! Identity key của một entry là tên item `"{service} - {account}"`,
//! so sánh chính xác (không case-folding, không trim). Password không bao giờ
//! tham gia vào việc so sánh.

use crate::error::SyncError;
use crate::keychain::CredentialEntry;
use crate::vault::{Session, VaultClient, VaultItem};
use chrono::{DateTime, FixedOffset};
use std::collections::HashSet;

/// Tên item trong vault cho một cặp (service, account)
pub fn item_name(service: &str, account: &str) -> String {
    format!("{} - {}", service, account)
}

/// Các entries có trong keychain nhưng chưa có trong vault
#[derive(Debug, Default)]
pub struct SyncPlan {
    /// Entries cần tạo, theo thứ tự đọc từ keychain
    pub entries: Vec<CredentialEntry>,
    /// Số entries đã có trong vault
    pub existing: usize,
}

impl SyncPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tính SyncPlan: entries có tên không nằm trong tập tên của vault
pub fn plan(entries: Vec<CredentialEntry>, items: &[VaultItem]) -> SyncPlan {
    let existing_names: HashSet<&str> = items.iter().map(|item| item.name.as_str()).collect();
    let mut plan = SyncPlan::default();

    for entry in entries {
        let name = entry.name();
        if existing_names.contains(name.as_str()) {
            tracing::debug!("Already in vault: {}", name);
            plan.existing += 1;
        } else {
            tracing::debug!("Missing from vault: {}", name);
            plan.entries.push(entry);
        }
    }

    plan
}

/// Một item tạo thất bại, đủ thông tin để tạo lại bằng tay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub service: String,
    pub account: String,
    pub error: String,
}

/// Kết quả của write phase
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub created: usize,
    pub failed: Vec<FailedItem>,
}

/// Tạo item cho từng entry trong plan. Lỗi của một item không dừng các item sau.
pub fn apply<V>(
    plan: &SyncPlan,
    vault: &V,
    session: &Session,
    imported_at: DateTime<FixedOffset>,
    mut on_item: impl FnMut(&CredentialEntry, &Result<(), SyncError>),
) -> ApplyOutcome
where
    V: VaultClient + ?Sized,
{
    let mut outcome = ApplyOutcome::default();

    for entry in &plan.entries {
        let item = VaultItem::for_entry(entry, imported_at);
        let result = vault
            .create_item(session, &item)
            .map_err(|source| SyncError::Write {
                name: item.name.clone(),
                source,
            });

        match &result {
            Ok(()) => {
                tracing::info!("Created vault item: {}", item.name);
                outcome.created += 1;
            }
            Err(e) => {
                tracing::error!("{}", e);
                outcome.failed.push(FailedItem {
                    service: entry.service.clone(),
                    account: entry.account.clone(),
                    error: format!("{:#}", e),
                });
            }
        }

        on_item(entry, &result);
    }

    outcome
}
