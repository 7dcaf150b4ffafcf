//! Sync module - Một lần chạy sync keychain → vault.
//!
//! Các bước (tuần tự, một thread):
//! `Init → Authenticated → ReadKeychain → ReadVault → Diff → (Write)? → Report → Done`
//!
//! Lỗi xác thực hoặc lỗi đọc dừng run ở trạng thái `Failed` trước khi ghi.
//! Session chỉ sống trong `run` và bị drop trên mọi đường thoát.

pub mod reconciler;

use crate::error::{Store, SyncError};
use crate::keychain::{CredentialEntry, KeychainReader};
use crate::vault::VaultClient;
use chrono::{DateTime, FixedOffset};

pub use reconciler::{apply, item_name, plan, ApplyOutcome, FailedItem, SyncPlan};

/// Chế độ chạy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Chỉ báo cáo plan, không ghi gì vào vault
    DryRun,
    /// Tạo các items còn thiếu
    Write,
}

/// Các trạng thái của một run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Authenticated,
    ReadKeychain,
    ReadVault,
    Diff,
    Write,
    Report,
    Done,
    Failed,
}

/// Tuỳ chọn cho một run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: Mode,
    /// Thời điểm import, ghi vào notes của các item mới
    pub imported_at: DateTime<FixedOffset>,
}

/// Một entry trong plan, không có secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub service: String,
    pub account: String,
}

impl PlannedItem {
    pub fn name(&self) -> String {
        item_name(&self.service, &self.account)
    }
}

/// Báo cáo cuối cùng của một run
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub mode: Mode,
    /// Số entries đọc được từ keychain
    pub scanned: usize,
    /// Số records bị bỏ qua khi đọc keychain
    pub skipped: usize,
    /// Số entries đã có trong vault
    pub existing: usize,
    /// Các entries còn thiếu trong vault
    pub planned: Vec<PlannedItem>,
    pub created: usize,
    pub failed: Vec<FailedItem>,
}

impl SyncReport {
    pub fn missing(&self) -> usize {
        self.planned.len()
    }

    /// Không có item nào tạo thất bại
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Quan sát tiến trình của run (progress bar, tests)
pub trait RunObserver {
    fn stage(&mut self, _stage: Stage) {}

    fn planned(&mut self, _plan: &SyncPlan) {}

    fn item(&mut self, _entry: &CredentialEntry, _result: &Result<(), SyncError>) {}
}

impl RunObserver for () {}

fn enter(observer: &mut dyn RunObserver, stage: Stage) {
    tracing::debug!("Stage: {:?}", stage);
    observer.stage(stage);
}

/// Chạy một lần sync đầy đủ
pub fn run<K, V>(
    keychain: &K,
    vault: &V,
    options: &RunOptions,
    observer: &mut dyn RunObserver,
) -> Result<SyncReport, SyncError>
where
    K: KeychainReader + ?Sized,
    V: VaultClient + ?Sized,
{
    let result = run_stages(keychain, vault, options, observer);
    match &result {
        Ok(_) => enter(observer, Stage::Done),
        Err(_) => enter(observer, Stage::Failed),
    }
    result
}

fn run_stages<K, V>(
    keychain: &K,
    vault: &V,
    options: &RunOptions,
    observer: &mut dyn RunObserver,
) -> Result<SyncReport, SyncError>
where
    K: KeychainReader + ?Sized,
    V: VaultClient + ?Sized,
{
    enter(observer, Stage::Init);

    let session = vault.authenticate().map_err(SyncError::Authentication)?;
    enter(observer, Stage::Authenticated);

    let scan = keychain.read_entries()?;
    tracing::info!(
        "Read {} keychain entries ({} skipped)",
        scan.entries.len(),
        scan.skipped
    );
    enter(observer, Stage::ReadKeychain);

    let items = vault
        .list_items(&session)
        .map_err(|e| SyncError::read(Store::Vault, e))?;
    tracing::info!("Found {} items in vault", items.len());
    enter(observer, Stage::ReadVault);

    let scanned = scan.entries.len();
    let sync_plan = plan(scan.entries, &items);
    tracing::info!(
        "{} entries missing from vault ({} already present)",
        sync_plan.len(),
        sync_plan.existing
    );
    enter(observer, Stage::Diff);
    observer.planned(&sync_plan);

    let mut outcome = ApplyOutcome::default();
    if options.mode == Mode::Write && !sync_plan.is_empty() {
        enter(observer, Stage::Write);
        outcome = apply(
            &sync_plan,
            vault,
            &session,
            options.imported_at,
            |entry, result| observer.item(entry, result),
        );
    }

    enter(observer, Stage::Report);
    Ok(SyncReport {
        mode: options.mode,
        scanned,
        skipped: scan.skipped,
        existing: sync_plan.existing,
        planned: sync_plan
            .entries
            .iter()
            .map(|e| PlannedItem {
                service: e.service.clone(),
                account: e.account.clone(),
            })
            .collect(),
        created: outcome.created,
        failed: outcome.failed,
    })
}
