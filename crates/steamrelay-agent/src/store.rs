//! Account secrets kept in `accounts.json` and per-account maFiles.
//!
//! ```json
//! {
//!   "alice": {
//!     "password": "...",
//!     "mafile_path": "maFiles/alice.maFile",
//!     "api_key": "...",
//!     "login_cookies": {"sessionid": "...", "steamLoginSecure": "..."}
//!   }
//! }
//! ```
//!
//! The file is re-read on every lookup so edits made while the agent runs
//! are picked up. A missing or unreadable file reads as empty.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use steamrelay_session::{CookieSnapshot, CredentialStore, GuardSecrets, SessionError};
use tokio::sync::Mutex;

use crate::AgentError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AccountEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mafile_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    login_cookies: Option<CookieSnapshot>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

/// The maFile fields the agent reads.
#[derive(Debug, Deserialize)]
pub(crate) struct MaFile {
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub shared_secret: Option<String>,
    #[serde(default)]
    pub identity_secret: Option<String>,
    #[serde(rename = "Session", default)]
    pub session: Option<MaFileSession>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MaFileSession {
    /// Either a JSON number or a string, depending on the exporter.
    #[serde(rename = "SteamID", default)]
    pub steam_id: Option<Value>,
}

impl MaFile {
    pub(crate) async fn read(path: &Path) -> Result<Self, AgentError> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| AgentError::io(path, e))?;
        serde_json::from_slice(&raw).map_err(|e| AgentError::json(path, e))
    }

    fn steamid(&self) -> String {
        match self.session.as_ref().and_then(|s| s.steam_id.as_ref()) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    fn guard_secrets(&self) -> GuardSecrets {
        GuardSecrets {
            steamid: self.steamid(),
            shared_secret: self.shared_secret.clone().unwrap_or_default(),
            identity_secret: self.identity_secret.clone().unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// JsonCredentialStore
// ---------------------------------------------------------------------------

/// [`CredentialStore`] over `accounts.json`.
///
/// Relative `mafile_path` values are resolved against the directory of
/// the accounts file.
#[derive(Debug)]
pub struct JsonCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> BTreeMap<String, AccountEntry> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "accounts file unreadable");
                return BTreeMap::new();
            }
        };
        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "accounts file malformed");
            BTreeMap::new()
        })
    }

    async fn entry(&self, login: &str) -> Option<AccountEntry> {
        self.read_all()
            .await
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(login))
            .map(|(_, entry)| entry)
    }

    fn resolve(&self, mafile_path: &str) -> PathBuf {
        let path = Path::new(mafile_path);
        match self.path.parent() {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    async fn write_all(&self, accounts: &BTreeMap<String, AccountEntry>) -> Result<(), AgentError> {
        let body = serde_json::to_vec_pretty(accounts).map_err(|e| AgentError::json(&self.path, e))?;
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| AgentError::io(dir, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| AgentError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AgentError::io(&self.path, e))
    }
}

impl CredentialStore for JsonCredentialStore {
    async fn password(&self, login: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entry(login).await.and_then(|e| e.password))
    }

    async fn guard_secrets(&self, login: &str) -> Result<Option<GuardSecrets>, SessionError> {
        let Some(mafile_path) = self.entry(login).await.and_then(|e| e.mafile_path) else {
            return Ok(None);
        };
        if mafile_path.trim().is_empty() {
            return Ok(None);
        }
        let path = self.resolve(&mafile_path);
        match MaFile::read(&path).await {
            Ok(mafile) => Ok(Some(mafile.guard_secrets())),
            Err(AgentError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(login, path = %path.display(), "maFile not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn api_key(&self, login: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entry(login).await.and_then(|e| e.api_key))
    }

    async fn persisted_cookies(
        &self,
        login: &str,
    ) -> Result<Option<CookieSnapshot>, SessionError> {
        Ok(self.entry(login).await.and_then(|e| e.login_cookies))
    }

    /// Rewrites only `login_cookies` of the matching entry; other fields
    /// and accounts are preserved. Unknown logins are left alone.
    async fn save_cookies(
        &self,
        login: &str,
        cookies: &CookieSnapshot,
    ) -> Result<(), SessionError> {
        let _guard = self.write_lock.lock().await;
        let mut accounts = self.read_all().await;
        let Some(entry) = accounts
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(login))
            .map(|(_, entry)| entry)
        else {
            tracing::warn!(login, "not saving cookies for an account missing from accounts file");
            return Ok(());
        };
        entry.login_cookies = Some(cookies.clone());
        self.write_all(&accounts).await?;
        tracing::info!(login, count = cookies.len(), "login cookies saved");
        Ok(())
    }
}
