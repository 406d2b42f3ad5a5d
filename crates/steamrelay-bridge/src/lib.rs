//! Caller side of steamrelay.
//!
//! A caller never talks to an agent directly. It publishes a command on
//! the relay, the gateway forwards it to the agent holding the target
//! token, and the agent's answer is pushed back to a list keyed by the
//! request id:
//!
//! ```text
//!  RemoteSteamClient ─► RpcBridge ─PUBLISH to_agent_gateway─► gateway ─► agent
//!                          ▲                                                │
//!                          └──────── BLPOP response:<request_id> ◄──────────┘
//! ```
//!
//! # Failing fast
//!
//! Silence is not retried. If no response arrives before the timeout,
//! or the gateway reports the agent offline, the agent is treated as
//! unreachable and the configured [`UnreachablePolicy`] runs: by default
//! the process exits, otherwise the agent token is quarantined and a
//! supervisor is notified.
//!
//! # Key types
//!
//! - [`Relay`]: publish/wait seam, with [`RedisRelay`] (feature `redis`)
//!   and the in-process [`MemoryRelay`]
//! - [`RpcBridge`]: correlation and the unreachable policy
//! - [`RemoteSteamClient`]: one typed method per command

mod client;
mod config;
mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis;
mod relay;
mod rpc;

pub use client::RemoteSteamClient;
pub use config::{BridgeConfig, Unreachable, UnreachablePolicy};
pub use error::BridgeError;
pub use memory::{MemoryGateway, MemoryRelay, MemoryResponder};
#[cfg(feature = "redis")]
pub use redis::RedisRelay;
pub use relay::Relay;
pub use rpc::RpcBridge;
