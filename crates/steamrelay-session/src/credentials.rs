//! Hooks for where account secrets and proxies come from.
//!
//! The session layer never reads files itself. It asks a
//! [`CredentialStore`] for passwords, maFile secrets, API keys and saved
//! cookies, and a [`ProxyResolver`] for the outbound proxy of each login.
//! The agent binary implements both over JSON files; tests use in-memory
//! maps.

use std::fmt;
use std::future::Future;

use crate::{CookieSnapshot, SessionError};

/// The maFile fields a session needs.
#[derive(Clone, PartialEq, Eq)]
pub struct GuardSecrets {
    pub steamid: String,
    pub shared_secret: String,
    pub identity_secret: String,
}

impl fmt::Debug for GuardSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardSecrets")
            .field("steamid", &self.steamid)
            .finish_non_exhaustive()
    }
}

/// Everything needed to log one account in, assembled by
/// [`load_credential`].
#[derive(Clone)]
pub struct Credential {
    pub login: String,
    pub password: String,
    pub secrets: GuardSecrets,
    pub api_key: String,
    /// Cookies saved after the last successful login, if any.
    pub cookies: Option<CookieSnapshot>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("login", &self.login)
            .field("secrets", &self.secrets)
            .field("has_cookies", &self.cookies.is_some())
            .finish_non_exhaustive()
    }
}

/// Source of account secrets.
///
/// Lookups are by login and should be case-insensitive. `Ok(None)` means
/// "not configured"; `Err` means the store itself failed.
pub trait CredentialStore: Send + Sync + 'static {
    fn password(
        &self,
        login: &str,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;

    fn guard_secrets(
        &self,
        login: &str,
    ) -> impl Future<Output = Result<Option<GuardSecrets>, SessionError>> + Send;

    fn api_key(
        &self,
        login: &str,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;

    fn persisted_cookies(
        &self,
        login: &str,
    ) -> impl Future<Output = Result<Option<CookieSnapshot>, SessionError>> + Send;

    /// Replaces the saved cookies of `login`.
    fn save_cookies(
        &self,
        login: &str,
        cookies: &CookieSnapshot,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// Maps a login to its outbound proxy URI. `None` means direct.
pub trait ProxyResolver: Send + Sync + 'static {
    fn proxy_for(&self, login: &str) -> Option<String>;
}

/// Always connects directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProxy;

impl ProxyResolver for NoProxy {
    fn proxy_for(&self, _login: &str) -> Option<String> {
        None
    }
}

fn required(
    login: &str,
    field: &'static str,
    value: Option<String>,
) -> Result<String, SessionError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SessionError::MissingCredential {
            login: login.to_owned(),
            field,
        })
}

/// Reads and validates everything `store` knows about `login`.
///
/// # Errors
/// [`SessionError::MissingCredential`] names the first missing field:
/// password, api_key, the maFile itself, or one of its secrets.
pub async fn load_credential<S: CredentialStore>(
    store: &S,
    login: &str,
) -> Result<Credential, SessionError> {
    let password = required(login, "password", store.password(login).await?)?;
    let api_key = required(login, "api_key", store.api_key(login).await?)?;
    let secrets = store
        .guard_secrets(login)
        .await?
        .ok_or_else(|| SessionError::MissingCredential {
            login: login.to_owned(),
            field: "mafile",
        })?;
    let secrets = GuardSecrets {
        steamid: required(login, "steamid", Some(secrets.steamid))?,
        shared_secret: required(login, "shared_secret", Some(secrets.shared_secret))?,
        identity_secret: required(login, "identity_secret", Some(secrets.identity_secret))?,
    };
    let cookies = store
        .persisted_cookies(login)
        .await?
        .filter(|c| !c.is_empty());

    Ok(Credential {
        login: login.to_owned(),
        password,
        secrets,
        api_key,
        cookies,
    })
}

// ---------------------------------------------------------------------------
// MemoryCredentialStore
// ---------------------------------------------------------------------------

/// One account held by [`MemoryCredentialStore`].
#[derive(Debug, Clone, Default)]
pub struct AccountRecord {
    pub password: Option<String>,
    pub secrets: Option<GuardSecrets>,
    pub api_key: Option<String>,
    pub cookies: Option<CookieSnapshot>,
}

/// A [`CredentialStore`] backed by a map, keyed by lowercased login.
///
/// Useful for embedding and tests; saved cookies stay in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    accounts: tokio::sync::Mutex<std::collections::HashMap<String, AccountRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account.
    pub async fn insert(&self, login: &str, record: AccountRecord) {
        self.accounts
            .lock()
            .await
            .insert(login.to_lowercase(), record);
    }

    /// Returns a copy of the stored record.
    pub async fn get(&self, login: &str) -> Option<AccountRecord> {
        self.accounts.lock().await.get(&login.to_lowercase()).cloned()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn password(&self, login: &str) -> Result<Option<String>, SessionError> {
        Ok(self.get(login).await.and_then(|r| r.password))
    }

    async fn guard_secrets(&self, login: &str) -> Result<Option<GuardSecrets>, SessionError> {
        Ok(self.get(login).await.and_then(|r| r.secrets))
    }

    async fn api_key(&self, login: &str) -> Result<Option<String>, SessionError> {
        Ok(self.get(login).await.and_then(|r| r.api_key))
    }

    async fn persisted_cookies(
        &self,
        login: &str,
    ) -> Result<Option<CookieSnapshot>, SessionError> {
        Ok(self.get(login).await.and_then(|r| r.cookies))
    }

    async fn save_cookies(
        &self,
        login: &str,
        cookies: &CookieSnapshot,
    ) -> Result<(), SessionError> {
        let mut accounts = self.accounts.lock().await;
        let record = accounts
            .get_mut(&login.to_lowercase())
            .ok_or_else(|| SessionError::Store(format!("unknown login {login}")))?;
        record.cookies = Some(cookies.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> AccountRecord {
        AccountRecord {
            password: Some("hunter2".into()),
            secrets: Some(GuardSecrets {
                steamid: "76561197960287930".into(),
                shared_secret: "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=".into(),
                identity_secret: "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=".into(),
            }),
            api_key: Some("KEY".into()),
            cookies: None,
        }
    }

    #[tokio::test]
    async fn test_load_credential_complete_record() {
        let store = MemoryCredentialStore::new();
        store.insert("Alice", full_record()).await;

        let cred = load_credential(&store, "alice").await.unwrap();
        assert_eq!(cred.password, "hunter2");
        assert_eq!(cred.secrets.steamid, "76561197960287930");
        assert!(cred.cookies.is_none());
    }

    #[tokio::test]
    async fn test_load_credential_missing_password() {
        let store = MemoryCredentialStore::new();
        store
            .insert(
                "alice",
                AccountRecord {
                    password: None,
                    ..full_record()
                },
            )
            .await;

        let err = load_credential(&store, "alice").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::MissingCredential { field: "password", .. }
        ));
    }

    #[tokio::test]
    async fn test_load_credential_blank_shared_secret() {
        let store = MemoryCredentialStore::new();
        let mut record = full_record();
        if let Some(secrets) = record.secrets.as_mut() {
            secrets.shared_secret = "  ".into();
        }
        store.insert("alice", record).await;

        let err = load_credential(&store, "alice").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::MissingCredential { field: "shared_secret", .. }
        ));
    }

    #[tokio::test]
    async fn test_load_credential_unknown_login() {
        let store = MemoryCredentialStore::new();
        let err = load_credential(&store, "ghost").await.unwrap_err();
        assert!(matches!(err, SessionError::MissingCredential { .. }));
    }

    #[tokio::test]
    async fn test_load_credential_ignores_empty_cookie_set() {
        let store = MemoryCredentialStore::new();
        store
            .insert(
                "alice",
                AccountRecord {
                    cookies: Some(CookieSnapshot::new()),
                    ..full_record()
                },
            )
            .await;
        assert!(load_credential(&store, "alice").await.unwrap().cookies.is_none());
    }

    #[tokio::test]
    async fn test_save_cookies_round_trips_through_store() {
        let store = MemoryCredentialStore::new();
        store.insert("alice", full_record()).await;
        let cookies = CookieSnapshot::from([("sessionid".to_owned(), "x".to_owned())]);

        store.save_cookies("ALICE", &cookies).await.unwrap();
        assert_eq!(store.persisted_cookies("alice").await.unwrap(), Some(cookies));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let secrets = full_record().secrets.unwrap();
        let printed = format!("{secrets:?}");
        assert!(printed.contains("76561197960287930"));
        assert!(!printed.contains("MTIz"));
    }
}
