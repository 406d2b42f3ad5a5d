//! # steamrelay
//!
//! The agent side of a Steam account relay.
//!
//! An agent holds Steam accounts (passwords, maFiles, cookies) that its
//! callers never see. It dials out to a gateway, announces the logins it
//! serves, and runs market and trade commands for them:
//!
//! ```text
//! gateway ⇄ CommandChannel ─► CommandDispatcher ─► SessionCache ─► Steam
//!             (websocket)        (retry, codes)      (login, cookies)
//! ```
//!
//! - [`CommandChannel`]: manifest, ping/pong, one response per command
//! - [`CommandDispatcher`]: parses the command, checks out the login's
//!   session, runs the call, maps failures to an [`ErrorCode`]
//! - [`RetryPolicy`]: five attempts with 1, 2, 3, 4 second pauses for
//!   remote reads
//!
//! The caller side lives in `steamrelay-bridge`.
//!
//! [`ErrorCode`]: steamrelay_protocol::ErrorCode

mod channel;
mod config;
mod dispatcher;
mod error;
mod retry;

pub use channel::CommandChannel;
pub use config::{ChannelConfig, ResponseOrder};
pub use dispatcher::CommandDispatcher;
pub use error::{ChannelError, CommandError};
pub use retry::RetryPolicy;

/// Everything needed to assemble an agent.
pub mod prelude {
    pub use crate::{ChannelConfig, CommandChannel, CommandDispatcher, RetryPolicy};
    pub use steamrelay_market::ListingPaging;
    pub use steamrelay_protocol::{Command, CommandEnvelope, ResponseEnvelope};
    pub use steamrelay_session::{
        CredentialStore, ProxyResolver, SessionCache, SessionCacheConfig, SteamBackend, SteamUrls,
    };
    pub use steamrelay_transport::{Connection, ConnectionStatus, WebSocketConnection};
}
