//! The cookie-carrying HTTP client every Steam session rides on.
//!
//! Steam keeps its login state entirely in cookies (`steamLoginSecure`,
//! `sessionid`, ...). [`SteamHttp`] pairs a `reqwest` client with a
//! shared cookie jar so those cookies can be read, injected, exported
//! after a login, and imported again to resume a session without logging
//! in.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Url};

use crate::{SessionError, SteamUrls};

/// Flat `name → value` cookie set, as persisted in the credential store.
pub type CookieSnapshot = BTreeMap<String, String>;

/// Browser user agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A `reqwest` client plus the cookie jar it writes into.
///
/// Cheap to clone: both halves are reference counted.
#[derive(Clone)]
pub struct SteamHttp {
    client: Client,
    jar: Arc<Jar>,
    urls: Arc<SteamUrls>,
}

impl SteamHttp {
    /// Builds a client with an empty jar, optionally routed through
    /// `proxy` (any scheme `reqwest` accepts: http, https, socks5).
    pub fn new(urls: SteamUrls, proxy: Option<&str>) -> Result<Self, SessionError> {
        let jar = Arc::new(Jar::default());
        let mut builder = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT);
        if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(Self {
            client: builder.build()?,
            jar,
            urls: Arc::new(urls),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn urls(&self) -> &SteamUrls {
        &self.urls
    }

    /// Reads cookie `name` as it would be sent to `base`.
    pub fn cookie(&self, base: &str, name: &str) -> Option<String> {
        cookie_pairs(&self.jar, base)
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Sets a host-only cookie for `base` with path `/`.
    pub fn set_cookie(&self, base: &str, name: &str, value: &str) {
        match Url::parse(base) {
            Ok(url) => self.jar.add_cookie_str(&format!("{name}={value}; Path=/"), &url),
            Err(e) => tracing::warn!(base, error = %e, "cannot set cookie on unparsable url"),
        }
    }

    /// The community domain's `sessionid` cookie, which doubles as the
    /// CSRF token for every form post.
    pub fn session_id(&self) -> Option<String> {
        self.cookie(&self.urls.community, "sessionid")
    }

    /// Exports every cookie visible to the store and community hosts.
    ///
    /// When both hosts carry a cookie with the same name, the community
    /// value wins: that is the host market and trade calls go to.
    pub fn export_snapshot(&self) -> CookieSnapshot {
        let mut snapshot = CookieSnapshot::new();
        for base in [&self.urls.login, &self.urls.store, &self.urls.community] {
            snapshot.extend(cookie_pairs(&self.jar, base));
        }
        snapshot
    }

    /// Installs `snapshot` on both the community and store hosts.
    pub fn import_snapshot(&self, snapshot: &CookieSnapshot) {
        for base in [&self.urls.community, &self.urls.store] {
            for (name, value) in snapshot {
                self.set_cookie(base, name, value);
            }
        }
    }
}

fn cookie_pairs(jar: &Jar, base: &str) -> Vec<(String, String)> {
    let Ok(url) = Url::parse(base) else {
        return Vec::new();
    };
    let Some(header) = jar.cookies(&url) else {
        return Vec::new();
    };
    let Ok(header) = header.to_str() else {
        return Vec::new();
    };
    header
        .split("; ")
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}
