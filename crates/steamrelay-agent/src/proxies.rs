//! Per-login proxies from `proxies.json` (`{"login": "http://host:port"}`).

use std::collections::HashMap;
use std::path::Path;

use steamrelay_session::ProxyResolver;

use crate::AgentError;

/// [`ProxyResolver`] over a proxies file read once at startup.
///
/// Logins without an entry, or with an empty one, connect directly.
#[derive(Debug, Clone, Default)]
pub struct JsonProxyResolver {
    proxies: HashMap<String, String>,
}

impl JsonProxyResolver {
    /// Loads `path`; a missing file means no proxies at all.
    pub async fn load(path: &Path) -> Result<Self, AgentError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no proxies file, all accounts connect directly");
                return Ok(Self::default());
            }
            Err(e) => return Err(AgentError::io(path, e)),
        };
        let map: HashMap<String, String> =
            serde_json::from_slice(&raw).map_err(|e| AgentError::json(path, e))?;
        Ok(Self::from_map(map))
    }

    pub fn from_map(map: HashMap<String, String>) -> Self {
        let proxies = map
            .into_iter()
            .filter(|(_, proxy)| !proxy.trim().is_empty())
            .map(|(login, proxy)| (login.to_lowercase(), proxy.trim().to_owned()))
            .collect();
        Self { proxies }
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

impl ProxyResolver for JsonProxyResolver {
    fn proxy_for(&self, login: &str) -> Option<String> {
        self.proxies.get(&login.to_lowercase()).cloned()
    }
}
