//! Helpers cho tests chạy `security` / `bw` giả bằng shell script.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Một script vừa ghi có thể bị ETXTBSY nếu thread khác fork đúng lúc đó
static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

/// Giữ lock này trong suốt test có ghi và chạy script
pub fn script_lock() -> MutexGuard<'static, ()> {
    SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Ghi `body` thành shell script thực thi được trong `dir`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    let mut permissions = fs::metadata(&path).expect("script metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("chmod script");
    path
}

/// Nội dung log của script, rỗng nếu script chưa chạy
pub fn read_log(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}
