//! Steam account sessions for steamrelay.
//!
//! This crate turns stored account secrets into logged-in Steam web
//! sessions and keeps them alive:
//!
//! 1. **Login**: the Steam web login protocol as a state machine
//!    ([`AuthSession`], [`LoginStep`])
//! 2. **Steam Guard**: one-time codes, confirmation keys and device ids
//!    ([`guard`])
//! 3. **Caching**: one live session per login, resumed from saved
//!    cookies when possible ([`SessionCache`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Command dispatch (steamrelay)  ← checks out a session per command
//!     ↕
//! Session layer (this crate)  ← login, cookies, liveness
//!     ↕
//! Steam web (reqwest + cookie jar)
//! ```
//!
//! Secrets and proxies come from the outside through the
//! [`CredentialStore`] and [`ProxyResolver`] traits.

#![allow(async_fn_in_trait)]

mod backend;
mod cache;
mod credentials;
pub mod eresult;
mod error;
pub mod guard;
mod handle;
mod http;
mod login;
mod urls;

pub use backend::{SessionBackend, SteamBackend};
pub use cache::{SessionCache, SessionCacheConfig, SessionLease};
pub use credentials::{
    AccountRecord, Credential, CredentialStore, GuardSecrets, MemoryCredentialStore, NoProxy,
    ProxyResolver, load_credential,
};
pub use error::SessionError;
pub use handle::SteamSession;
pub use http::{CookieSnapshot, SteamHttp, USER_AGENT};
pub use login::{AuthSession, LoginStep, RsaKey, encrypt_password};
pub use urls::SteamUrls;
