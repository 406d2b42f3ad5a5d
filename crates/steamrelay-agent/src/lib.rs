//! The steamrelay agent process.
//!
//! Reads its settings and account files from disk, then keeps one
//! connection to the gateway open for as long as it runs:
//!
//! ```text
//! config.json ─┐
//! maFiles/    ─┼─► Agent::build ─► Agent::run ⇄ gateway (reconnects)
//! accounts.json┤
//! proxies.json ┘
//! ```
//!
//! - [`AgentConfig`]: gateway URL, token and file locations
//! - [`MaFileScanner`]: which logins to announce
//! - [`JsonCredentialStore`]: passwords, secrets, API keys and saved
//!   cookies per login
//! - [`JsonProxyResolver`]: optional outbound proxy per login

mod agent;
mod config;
mod error;
mod mafiles;
mod proxies;
mod store;

pub use agent::{Agent, AgentBackend, AgentChannel};
pub use config::{AGENT_TOKEN_ENV, AgentConfig, SERVER_URL_ENV};
pub use error::AgentError;
pub use mafiles::{MaFileScanner, ScannedAccount};
pub use proxies::JsonProxyResolver;
pub use store::JsonCredentialStore;
