//! BitwardenCli - Vault client thông qua Bitwarden CLI (`bw`).
//!
//! - Session: `BW_SESSION` nếu có, nếu không thì `bw login` / `bw unlock`
//!   tuỳ theo `bw status`
//! - Master password được truyền qua biến môi trường của riêng child process,
//!   không bao giờ nằm trên command line
//! - Session token cũng được truyền qua `BW_SESSION` của child process
//! - `bw create item` nhận JSON đã base64-encode qua stdin (giống `bw encode`)

use super::{CredentialPrompt, Session, VaultClient, VaultItem};
use crate::config::Config;
use crate::secret::Secret;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use zeroize::Zeroize;

/// Biến môi trường chứa session token có sẵn
pub const SESSION_ENV: &str = "BW_SESSION";

/// Biến môi trường (chỉ cho child process) chứa master password
const PASSWORD_ENV: &str = "KEYCHAIN2BW_MASTER_PASSWORD";

/// Bitwarden login item type
const LOGIN_ITEM_TYPE: u8 = 1;

/// Trạng thái vault theo `bw status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    Unauthenticated,
    Locked,
    Unlocked,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    status: VaultStatus,
    user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BwItem {
    name: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    login: Option<BwLogin>,
}

#[derive(Debug, Deserialize)]
struct BwLogin {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    uris: Option<Vec<BwUri>>,
}

#[derive(Debug, Deserialize)]
struct BwUri {
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewItem<'a> {
    organization_id: Option<&'a str>,
    folder_id: Option<&'a str>,
    #[serde(rename = "type")]
    item_type: u8,
    name: &'a str,
    notes: &'a str,
    favorite: bool,
    login: NewLogin<'a>,
}

#[derive(Serialize)]
struct NewLogin<'a> {
    username: &'a str,
    password: &'a str,
    uris: Vec<NewUri<'a>>,
}

#[derive(Serialize)]
struct NewUri<'a> {
    #[serde(rename = "match")]
    match_type: Option<u8>,
    uri: &'a str,
}

/// Parse output của `bw status`
pub fn parse_status(json: &str) -> Result<(VaultStatus, Option<String>)> {
    let response: StatusResponse =
        serde_json::from_str(json).context("Cannot parse bw status output")?;
    Ok((response.status, response.user_email))
}

/// Parse output của `bw list items`
pub fn parse_items(json: &str) -> Result<Vec<VaultItem>> {
    let items: Vec<BwItem> =
        serde_json::from_str(json).context("Cannot parse bw list items output")?;

    Ok(items
        .into_iter()
        .map(|item| {
            let login = item.login.unwrap_or(BwLogin {
                username: None,
                password: None,
                uris: None,
            });
            let uri = login
                .uris
                .unwrap_or_default()
                .into_iter()
                .find_map(|u| u.uri)
                .unwrap_or_default();

            VaultItem {
                name: item.name,
                username: login.username.unwrap_or_default(),
                password: Secret::from(login.password.unwrap_or_default()),
                uri,
                notes: item.notes.unwrap_or_default(),
            }
        })
        .collect())
}

/// Encode item thành JSON base64 cho `bw create item`
pub fn encode_item(item: &VaultItem) -> Result<Secret> {
    let payload = NewItem {
        organization_id: None,
        folder_id: None,
        item_type: LOGIN_ITEM_TYPE,
        name: &item.name,
        notes: &item.notes,
        favorite: false,
        login: NewLogin {
            username: &item.username,
            password: item.password.expose(),
            uris: vec![NewUri {
                match_type: None,
                uri: &item.uri,
            }],
        },
    };

    let mut json = serde_json::to_vec(&payload).context("Cannot serialize vault item")?;
    let encoded = STANDARD.encode(&json);
    json.zeroize();
    Ok(Secret::from(encoded))
}

/// Vault client dùng `bw` CLI
pub struct BitwardenCli<P: CredentialPrompt> {
    /// Đường dẫn đến bw binary
    bw_path: PathBuf,
    /// Chạy `bw sync` trước khi list items
    sync_before_list: bool,
    /// Session token có sẵn (BW_SESSION)
    session_override: Option<Secret>,
    /// Nguồn email / master password
    prompt: P,
}

impl<P: CredentialPrompt> BitwardenCli<P> {
    /// Tạo client mới, đọc `BW_SESSION` từ môi trường
    pub fn new(config: &Config, prompt: P) -> Self {
        let session_override = std::env::var(SESSION_ENV)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(Secret::from);

        Self {
            bw_path: config.bw_path.clone(),
            sync_before_list: config.sync_before_list,
            session_override,
            prompt,
        }
    }

    /// Thay session token có sẵn (None = luôn đăng nhập interactive)
    pub fn with_session_override(mut self, token: Option<Secret>) -> Self {
        self.session_override = token.filter(|t| !t.expose().trim().is_empty());
        self
    }

    /// Chạy bw command và trả về stdout
    fn run_bw(
        &self,
        args: &[&str],
        session: Option<&Session>,
        password: Option<&Secret>,
        stdin: Option<&Secret>,
    ) -> Result<String> {
        let mut cmd = Command::new(&self.bw_path);
        cmd.arg("--nointeraction")
            .args(args)
            .env_remove(SESSION_ENV)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(session) = session {
            cmd.env(SESSION_ENV, session.token().expose());
        }
        if let Some(password) = password {
            cmd.env(PASSWORD_ENV, password.expose());
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Cannot execute {}", self.bw_path.display()))?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                if let Err(e) = pipe.write_all(input.expose().as_bytes()) {
                    drop(pipe);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(e).context("Cannot write to bw stdin");
                }
            }
        }

        let output = child.wait_with_output().context("Cannot wait for bw")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("bw {} failed ({}): {}", args[0], output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Trạng thái vault hiện tại
    pub fn status(&self) -> Result<(VaultStatus, Option<String>)> {
        let output = self.run_bw(&["status"], None, None, None)?;
        parse_status(&output)
    }

    fn login(&self) -> Result<Secret> {
        let email = self.prompt.email()?;
        let password = self.prompt.master_password()?;
        let output = self.run_bw(
            &["login", email.trim(), "--passwordenv", PASSWORD_ENV, "--raw"],
            None,
            Some(&password),
            None,
        )?;
        Ok(Secret::new(output.trim()))
    }

    fn unlock(&self) -> Result<Secret> {
        let password = self.prompt.master_password()?;
        let output = self.run_bw(
            &["unlock", "--passwordenv", PASSWORD_ENV, "--raw"],
            None,
            Some(&password),
            None,
        )?;
        Ok(Secret::new(output.trim()))
    }
}

impl<P: CredentialPrompt> VaultClient for BitwardenCli<P> {
    fn authenticate(&self) -> Result<Session> {
        if let Some(token) = &self.session_override {
            tracing::debug!("Using existing session from {}", SESSION_ENV);
            return Ok(Session::new(token.clone()));
        }

        let (status, email) = self.status()?;
        tracing::debug!(
            "Bitwarden status: {:?} ({})",
            status,
            email.as_deref().unwrap_or("no account")
        );

        let token = match status {
            VaultStatus::Unauthenticated => self.login().context("bw login failed")?,
            // Unlocked mà không có BW_SESSION vẫn cần unlock để lấy token
            VaultStatus::Locked | VaultStatus::Unlocked => {
                self.unlock().context("bw unlock failed")?
            }
        };

        if token.is_empty() {
            bail!("bw returned an empty session token");
        }

        Ok(Session::new(token))
    }

    fn list_items(&self, session: &Session) -> Result<Vec<VaultItem>> {
        if self.sync_before_list {
            if let Err(e) = self.run_bw(&["sync"], Some(session), None, None) {
                tracing::warn!("bw sync failed, listing cached vault: {:#}", e);
            }
        }

        let output = self.run_bw(&["list", "items"], Some(session), None, None)?;
        parse_items(&output)
    }

    fn create_item(&self, session: &Session, item: &VaultItem) -> Result<()> {
        let encoded = encode_item(item)?;
        self.run_bw(&["create", "item"], Some(session), None, Some(&encoded))?;
        Ok(())
    }
}
