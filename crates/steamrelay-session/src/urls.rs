//! Base URLs of the Steam web services the agent talks to.

/// Where each Steam service lives.
///
/// Production uses [`SteamUrls::default`]. Tests point every service at a
/// single mock server with [`SteamUrls::single`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteamUrls {
    pub community: String,
    pub store: String,
    pub api: String,
    pub login: String,
}

impl Default for SteamUrls {
    fn default() -> Self {
        Self {
            community: "https://steamcommunity.com".into(),
            store: "https://store.steampowered.com".into(),
            api: "https://api.steampowered.com".into(),
            login: "https://login.steampowered.com".into(),
        }
    }
}

impl SteamUrls {
    /// Every service rooted at `base` (trailing slash stripped).
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_owned();
        Self {
            community: base.clone(),
            store: base.clone(),
            api: base.clone(),
            login: base,
        }
    }

    /// `IAuthenticationService` method URL on the API host.
    pub fn auth_service(&self, method: &str) -> String {
        format!("{}/IAuthenticationService/{method}/v1", self.api)
    }

    pub fn finalize_login(&self) -> String {
        format!("{}/jwt/finalizelogin", self.login)
    }

    /// `settoken` endpoint on the host rooted at `base`.
    pub fn set_token(base: &str) -> String {
        format!("{base}/login/settoken")
    }

    pub fn community_path(&self, path: &str) -> String {
        format!("{}{path}", self.community)
    }
}
