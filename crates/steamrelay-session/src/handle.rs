//! An authenticated Steam client for one account.

use std::fmt;

use crate::{CookieSnapshot, Credential, GuardSecrets, SessionError, SteamHttp};

/// A logged-in (or resumed) session.
///
/// Holds the cookie-carrying client plus the account data market and
/// confirmation calls need. Produced by [`AuthSession::login`] or
/// [`SteamSession::from_cookies`]; owned by the session cache.
///
/// [`AuthSession::login`]: crate::AuthSession::login
#[derive(Clone)]
pub struct SteamSession {
    login: String,
    secrets: GuardSecrets,
    api_key: String,
    http: SteamHttp,
}

impl SteamSession {
    pub(crate) fn new(http: SteamHttp, credential: &Credential) -> Self {
        Self {
            login: credential.login.clone(),
            secrets: credential.secrets.clone(),
            api_key: credential.api_key.clone(),
            http,
        }
    }

    /// Rebuilds a session from saved cookies without talking to Steam.
    ///
    /// The result may well be logged out; check it with
    /// [`is_alive`](Self::is_alive) before use.
    pub fn from_cookies(http: SteamHttp, credential: &Credential, cookies: &CookieSnapshot) -> Self {
        http.import_snapshot(cookies);
        Self::new(http, credential)
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn steamid(&self) -> &str {
        &self.secrets.steamid
    }

    pub fn secrets(&self) -> &GuardSecrets {
        &self.secrets
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn http(&self) -> &SteamHttp {
        &self.http
    }

    /// The community `sessionid` cookie, used as CSRF token in form posts.
    pub fn session_id(&self) -> Option<String> {
        self.http.session_id()
    }

    /// Like [`session_id`](Self::session_id) but an error when absent.
    pub fn require_session_id(&self) -> Result<String, SessionError> {
        self.session_id()
            .ok_or_else(|| SessionError::NotAlive(self.login.clone()))
    }

    /// Loads the community front page and checks that it greets this
    /// account, i.e. the body contains the login name.
    pub async fn is_alive(&self) -> Result<bool, SessionError> {
        let body = self
            .http
            .client()
            .get(&self.http.urls().community)
            .send()
            .await?
            .text()
            .await?;
        let alive = body.to_lowercase().contains(&self.login.to_lowercase());
        tracing::debug!(login = %self.login, alive, "session liveness checked");
        Ok(alive)
    }

    pub fn export_cookies(&self) -> CookieSnapshot {
        self.http.export_snapshot()
    }
}

impl fmt::Debug for SteamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SteamSession")
            .field("login", &self.login)
            .field("steamid", &self.secrets.steamid)
            .finish_non_exhaustive()
    }
}
