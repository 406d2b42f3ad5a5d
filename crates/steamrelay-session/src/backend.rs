//! The seam between the session cache and the Steam web.
//!
//! [`SessionCache`](crate::SessionCache) only needs four things from a
//! backend: a full login, a cookie resume, a liveness check and a cookie
//! export. [`SteamBackend`] does them against the real services; cache
//! tests plug in a counting fake.

use std::future::Future;

use crate::{
    AuthSession, CookieSnapshot, Credential, ProxyResolver, SessionError, SteamHttp,
    SteamSession, SteamUrls,
};

/// Produces and checks sessions for the cache.
pub trait SessionBackend: Send + Sync + 'static {
    type Session: Send + Sync + 'static;

    /// Runs the complete login protocol.
    fn login(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;

    /// Rebuilds a session from persisted cookies. Must not log in.
    fn resume(
        &self,
        credential: &Credential,
        cookies: &CookieSnapshot,
    ) -> impl Future<Output = Result<Self::Session, SessionError>> + Send;

    fn is_alive(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<bool, SessionError>> + Send;

    fn export_cookies(&self, session: &Self::Session) -> CookieSnapshot;
}

/// Real Steam, one fresh cookie jar per session, proxied per login.
#[derive(Debug, Clone)]
pub struct SteamBackend<P> {
    urls: SteamUrls,
    proxies: P,
}

impl<P: ProxyResolver> SteamBackend<P> {
    pub fn new(urls: SteamUrls, proxies: P) -> Self {
        Self { urls, proxies }
    }

    fn http_for(&self, login: &str) -> Result<SteamHttp, SessionError> {
        let proxy = self.proxies.proxy_for(login);
        if proxy.is_some() {
            tracing::debug!(login, "using configured proxy");
        }
        SteamHttp::new(self.urls.clone(), proxy.as_deref())
    }
}

impl<P: ProxyResolver> SessionBackend for SteamBackend<P> {
    type Session = SteamSession;

    async fn login(&self, credential: &Credential) -> Result<SteamSession, SessionError> {
        let http = self.http_for(&credential.login)?;
        AuthSession::new(http, credential).login().await
    }

    async fn resume(
        &self,
        credential: &Credential,
        cookies: &CookieSnapshot,
    ) -> Result<SteamSession, SessionError> {
        let http = self.http_for(&credential.login)?;
        Ok(SteamSession::from_cookies(http, credential, cookies))
    }

    async fn is_alive(&self, session: &SteamSession) -> Result<bool, SessionError> {
        session.is_alive().await
    }

    fn export_cookies(&self, session: &SteamSession) -> CookieSnapshot {
        session.export_cookies()
    }
}
