//! SecurityKeychain - Đọc keychain thông qua macOS `security` tool.
//!
//! Quy trình:
//! 1. `security dump-keychain` (không có `-d`, nên không dump secrets)
//! 2. Parse các block `keychain:` / `class:` / `attributes:`
//! 3. Đọc secret cho từng record:
//!    - genp (generic password): qua `keyring` crate, hoặc
//!      `security find-generic-password -w` khi cấu hình một keychain cụ thể
//!    - inet (internet password): `security find-internet-password -w`

use super::{CredentialEntry, KeychainReader, KeychainScan};
use crate::config::Config;
use crate::error::{Store, SyncError};
use crate::secret::Secret;
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Các thông báo của `security` khi keychain bị khoá hoặc user từ chối
const ACCESS_DENIED_MARKERS: &[&str] = &[
    "User interaction is not allowed",
    "user name or passphrase you entered is not correct",
    "User canceled the operation",
];

/// Một record thô từ `security dump-keychain`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeychainRecord {
    /// Đường dẫn keychain chứa record
    pub keychain: String,
    /// Class của record ("genp", "inet", ...)
    pub class: String,
    /// Các attribute dạng "acct", "svce", "srvr"
    pub attributes: HashMap<String, String>,
}

impl KeychainRecord {
    /// Service của record: `svce` cho genp, `srvr` cho inet
    pub fn service(&self) -> Option<&str> {
        let key = match self.class.as_str() {
            "inet" => "srvr",
            _ => "svce",
        };
        self.attributes.get(key).map(String::as_str)
    }

    pub fn account(&self) -> &str {
        self.attributes.get("acct").map(String::as_str).unwrap_or("")
    }
}

/// Parse output của `security dump-keychain`
pub fn parse_dump(output: &str) -> Vec<KeychainRecord> {
    let mut records = Vec::new();
    let mut current: Option<KeychainRecord> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("keychain: ") {
            if let Some(record) = current.take() {
                records.push(record);
            }
            current = Some(KeychainRecord {
                keychain: unquote(path).to_string(),
                ..KeychainRecord::default()
            });
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };

        if let Some(class) = line.strip_prefix("class: ") {
            record.class = unquote(class).to_string();
        } else if let Some((name, value)) = parse_attribute(line) {
            if let Some(value) = value {
                record.attributes.insert(name, value);
            }
        }
    }

    if let Some(record) = current {
        records.push(record);
    }

    records
}

/// Parse một dòng attribute dạng `    "acct"<blob>="alice"`.
/// Các attribute dạng số (`0x00000007 <blob>=...`) bị bỏ qua.
fn parse_attribute(line: &str) -> Option<(String, Option<String>)> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix('"')?;
    let name_end = rest.find('"')?;
    let name = &rest[..name_end];
    let after_name = &rest[name_end + 1..];
    let eq = after_name.find('=')?;
    Some((name.to_string(), parse_value(&after_name[eq + 1..])))
}

/// Giá trị attribute: `"text"`, `<NULL>` hoặc hex blob `0x...  "text"`
fn parse_value(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.starts_with("<NULL>") {
        return None;
    }
    if let Some(hex) = raw.strip_prefix("0x") {
        let hex = hex.split_whitespace().next().unwrap_or("");
        let bytes = decode_hex(hex)?;
        let text = String::from_utf8_lossy(&bytes);
        return Some(text.trim_end_matches('\0').to_string());
    }
    if let Some(quoted) = raw.strip_prefix('"') {
        let end = quoted.rfind('"').unwrap_or(quoted.len());
        return Some(quoted[..end].to_string());
    }
    Some(raw.to_string())
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if !hex.is_ascii() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Keychain reader dùng `security` CLI
pub struct SecurityKeychain {
    /// Đường dẫn đến `security` binary
    security_path: PathBuf,
    /// Keychain cụ thể (None = search list mặc định)
    keychain: Option<PathBuf>,
    /// Các class được đọc
    classes: Vec<String>,
}

impl SecurityKeychain {
    pub fn new(config: &Config) -> Self {
        Self {
            security_path: config.security_path.clone(),
            keychain: config.keychain.clone(),
            classes: config.item_classes.clone(),
        }
    }

    /// Chạy `security` và trả về stdout
    fn run_security(&self, mut cmd: Command) -> Result<String> {
        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Cannot execute {}", self.security_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("security failed ({}): {}", output.status, stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn command(&self) -> Command {
        Command::new(&self.security_path)
    }

    /// Dump danh sách records (không có secrets)
    pub fn dump(&self) -> Result<Vec<KeychainRecord>, SyncError> {
        let mut cmd = self.command();
        cmd.arg("dump-keychain");
        if let Some(keychain) = &self.keychain {
            cmd.arg(keychain);
        }

        let output = self.run_security(cmd).map_err(|e| {
            let message = format!("{:#}", e);
            if ACCESS_DENIED_MARKERS.iter().any(|m| message.contains(m)) {
                SyncError::Authentication(e.context("Keychain access denied"))
            } else {
                SyncError::read(Store::Keychain, e.context("security dump-keychain failed"))
            }
        })?;

        Ok(parse_dump(&output))
    }

    /// Đọc secret của một record.
    /// `keyring` chỉ tìm trong search list mặc định, nên khi cấu hình một
    /// keychain cụ thể thì genp cũng đọc qua `security` với đường dẫn keychain.
    fn lookup_secret(&self, record: &KeychainRecord, service: &str) -> Result<Secret> {
        let account = record.account();
        match record.class.as_str() {
            "genp" if self.keychain.is_none() && !account.is_empty() => {
                let entry = keyring::Entry::new(service, account)
                    .context("Cannot open keyring entry")?;
                let password = entry
                    .get_password()
                    .context("Cannot read password from keyring")?;
                Ok(Secret::from(password))
            }
            "genp" => self.find_password("find-generic-password", record, service),
            "inet" => self.find_password("find-internet-password", record, service),
            other => Err(anyhow!("Unsupported keychain class: {}", other)),
        }
    }

    /// `security find-*-password -w` cho record không đọc được qua keyring
    fn find_password(
        &self,
        subcommand: &str,
        record: &KeychainRecord,
        service: &str,
    ) -> Result<Secret> {
        // -s là service (genp) hoặc server (inet)
        let mut cmd = self.command();
        cmd.arg(subcommand).arg("-s").arg(service);
        if !record.account().is_empty() {
            cmd.arg("-a").arg(record.account());
        }
        cmd.arg("-w");
        if !record.keychain.is_empty() {
            cmd.arg(Path::new(&record.keychain));
        }

        let output = self.run_security(cmd)?;
        let password = output.strip_suffix('\n').unwrap_or(&output);
        Ok(Secret::new(password))
    }
}

impl KeychainReader for SecurityKeychain {
    fn read_entries(&self) -> Result<KeychainScan, SyncError> {
        let records = self.dump()?;
        let mut scan = KeychainScan::default();

        for record in records {
            if !self.classes.iter().any(|c| *c == record.class) {
                continue;
            }

            let Some(service) = record.service().filter(|s| !s.is_empty()) else {
                tracing::debug!(
                    "Skipping {} record without service (account '{}')",
                    record.class,
                    record.account()
                );
                scan.skipped += 1;
                continue;
            };

            match self.lookup_secret(&record, service) {
                Ok(secret) => {
                    tracing::debug!("Read keychain entry: {} - {}", service, record.account());
                    scan.entries.push(CredentialEntry::new(service, record.account(), secret));
                }
                Err(e) => {
                    tracing::warn!(
                        "Cannot read password for {} - {}: {:#}",
                        service,
                        record.account(),
                        e
                    );
                    scan.skipped += 1;
                }
            }
        }

        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"keychain: "/Users/test/Library/Keychains/login.keychain-db"
version: 512
class: "genp"
attributes:
    0x00000007 <blob>="example.com"
    0x00000008 <blob>=<NULL>
    "acct"<blob>="user1@example.com"
    "cdat"<timedate>=0x32303139303630373134353933325A00  "20190607145932Z\000"
    "desc"<blob>=<NULL>
    "svce"<blob>="example.com"
keychain: "/Users/test/Library/Keychains/login.keychain-db"
version: 512
class: "inet"
attributes:
    "acct"<blob>="user2@test.com"
    "ptcl"<uint32>="htps"
    "srvr"<blob>="test.com"
keychain: "/Users/test/Library/Keychains/login.keychain-db"
version: 512
class: 0x0000000F
attributes:
    "klbl"<blob>=0x6B6579  "key"
"#;

    #[test]
    fn test_parse_dump_records() {
        let records = parse_dump(DUMP);
        assert_eq!(records.len(), 3);

        assert_eq!(
            records[0].keychain,
            "/Users/test/Library/Keychains/login.keychain-db"
        );
        assert_eq!(records[0].class, "genp");
        assert_eq!(records[0].service(), Some("example.com"));
        assert_eq!(records[0].account(), "user1@example.com");
        assert_eq!(
            records[0].attributes.get("cdat").map(String::as_str),
            Some("20190607145932Z")
        );
        assert!(!records[0].attributes.contains_key("desc"));

        assert_eq!(records[1].class, "inet");
        assert_eq!(records[1].service(), Some("test.com"));
        assert_eq!(records[1].account(), "user2@test.com");

        assert_eq!(records[2].class, "0x0000000F");
        assert_eq!(records[2].service(), None);
    }

    #[test]
    fn test_parse_dump_empty() {
        assert!(parse_dump("").is_empty());
        assert!(parse_dump("garbage\nmore garbage\n").is_empty());
    }

    #[test]
    fn test_parse_value_forms() {
        assert_eq!(parse_value("\"alice\""), Some("alice".to_string()));
        assert_eq!(parse_value("<NULL>"), None);
        assert_eq!(
            parse_value("0x616C696365  \"alice\""),
            Some("alice".to_string())
        );
        assert_eq!(
            parse_value("\"has \"quotes\" inside\""),
            Some("has \"quotes\" inside".to_string())
        );
        assert_eq!(parse_value("0xZZ"), None);
    }

    #[test]
    fn test_account_defaults_to_empty() {
        let record = parse_dump(
            "keychain: \"/tmp/a.keychain\"\nclass: \"genp\"\nattributes:\n    \"svce\"<blob>=\"AirPort\"\n",
        );
        assert_eq!(record[0].service(), Some("AirPort"));
        assert_eq!(record[0].account(), "");
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("6869"), Some(b"hi".to_vec()));
        assert_eq!(decode_hex("686"), None);
        assert_eq!(decode_hex(""), Some(Vec::new()));
    }

    // -----------------------------------------------------------------------
    // Fake `security` binary
    // -----------------------------------------------------------------------

    #[cfg(unix)]
    mod fake_security {
        use super::*;
        use crate::test_support::{read_log, script_lock, write_script};
        use tempfile::TempDir;

        const SCRIPT: &str = r#"echo "$*" >> "@DIR@/calls.log"
case "$1" in
  dump-keychain) cat "@DIR@/dump.txt" ;;
  find-generic-password) echo "genp-$3" ;;
  find-internet-password)
    if [ "$3" = "broken.com" ]; then
      echo "security: The specified item could not be found in the keychain." >&2
      exit 44
    fi
    echo "inet-$3" ;;
  *) exit 2 ;;
esac"#;

        fn dump(keychain: &Path) -> String {
            let keychain = keychain.display();
            format!(
                r#"keychain: "{keychain}"
class: "genp"
attributes:
    "acct"<blob>="alice"
    "svce"<blob>="example.com"
keychain: "{keychain}"
class: "inet"
attributes:
    "acct"<blob>="bob"
    "srvr"<blob>="test.com"
keychain: "{keychain}"
class: "inet"
attributes:
    "acct"<blob>="carol"
    "srvr"<blob>="broken.com"
keychain: "{keychain}"
class: "genp"
attributes:
    "acct"<blob>="dave"
keychain: "{keychain}"
class: 0x80001000
attributes:
    "alis"<blob>="Some Certificate"
"#
            )
        }

        /// Script + dump trong một thư mục tạm, keychain được cấu hình tường minh
        fn setup(dir: &TempDir, classes: &[&str]) -> (SecurityKeychain, PathBuf) {
            let keychain_path = dir.path().join("work.keychain-db");
            std::fs::write(dir.path().join("dump.txt"), dump(&keychain_path)).unwrap();
            let body = SCRIPT.replace("@DIR@", &dir.path().display().to_string());
            let config = Config {
                security_path: write_script(dir.path(), "security", &body),
                keychain: Some(keychain_path.clone()),
                item_classes: classes.iter().map(|c| c.to_string()).collect(),
                ..Config::default()
            };
            (SecurityKeychain::new(&config), keychain_path)
        }

        fn names(scan: &KeychainScan) -> Vec<String> {
            scan.entries.iter().map(CredentialEntry::name).collect()
        }

        #[test]
        fn test_read_entries_from_configured_keychain() -> Result<()> {
            let _lock = script_lock();
            let dir = TempDir::new()?;
            let (reader, keychain_path) = setup(&dir, &["genp", "inet"]);

            let scan = reader.read_entries()?;

            assert_eq!(names(&scan), vec!["example.com - alice", "test.com - bob"]);
            assert_eq!(scan.entries[0].secret.expose(), "genp-example.com");
            assert_eq!(scan.entries[1].secret.expose(), "inet-test.com");
            // record không có service và record không đọc được password
            assert_eq!(scan.skipped, 2);

            let log = read_log(&dir.path().join("calls.log"));
            let keychain = keychain_path.display();
            assert!(log.contains(&format!("dump-keychain {}", keychain)));
            assert!(log.contains(&format!(
                "find-generic-password -s example.com -a alice -w {}",
                keychain
            )));
            assert!(log.contains(&format!(
                "find-internet-password -s test.com -a bob -w {}",
                keychain
            )));
            assert!(!log.contains("-a dave"));
            Ok(())
        }

        #[test]
        fn test_read_entries_filters_classes() -> Result<()> {
            let _lock = script_lock();
            let dir = TempDir::new()?;
            let (reader, _) = setup(&dir, &["inet"]);

            let scan = reader.read_entries()?;

            assert_eq!(names(&scan), vec!["test.com - bob"]);
            assert_eq!(scan.skipped, 1);
            let log = read_log(&dir.path().join("calls.log"));
            assert!(!log.contains("find-generic-password"));
            Ok(())
        }

        fn failing_reader(dir: &TempDir, stderr: &str, code: u8) -> SecurityKeychain {
            let body = format!("echo \"{}\" >&2\nexit {}", stderr, code);
            let config = Config {
                security_path: write_script(dir.path(), "security", &body),
                keychain: Some(dir.path().join("work.keychain-db")),
                ..Config::default()
            };
            SecurityKeychain::new(&config)
        }

        #[test]
        fn test_access_denied_is_authentication_error() -> Result<()> {
            let _lock = script_lock();
            let dir = TempDir::new()?;
            let reader = failing_reader(
                &dir,
                "security: SecKeychainCopySearchList: User interaction is not allowed.",
                36,
            );

            let err = reader.read_entries().unwrap_err();

            assert!(matches!(err, SyncError::Authentication(_)));
            assert!(err.is_fatal());
            Ok(())
        }

        #[test]
        fn test_dump_failure_is_keychain_read_error() -> Result<()> {
            let _lock = script_lock();
            let dir = TempDir::new()?;
            let reader = failing_reader(
                &dir,
                "security: SecKeychainOpen: The specified keychain could not be found.",
                50,
            );

            let err = reader.read_entries().unwrap_err();

            assert!(matches!(
                err,
                SyncError::Read {
                    store: Store::Keychain,
                    ..
                }
            ));
            Ok(())
        }
    }
}
