//! Wire protocol for steamrelay.
//!
//! This crate defines the messages that travel across both hops of the
//! relay:
//!
//! - **Envelopes** ([`CommandEnvelope`], [`ResponseEnvelope`],
//!   [`RelayRequest`], [`AgentMessage`]): the JSON shapes exchanged with
//!   the gateway and the relay.
//! - **Commands** ([`Command`]): the closed set of operations an agent
//!   runs, parsed and validated from an envelope's `cmd` + `args`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, types out.
//! - **Errors** ([`WireError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (CommandEnvelope → Command) → Dispatcher
//! ```
//!
//! Nothing here knows about Steam sessions or sockets.

mod codec;
mod command;
mod error;
mod game;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use command::{Command, InventoryQuery, STEAMID64_BASE, TradeItem, TradeOfferRequest};
pub use error::WireError;
pub use game::{Currency, GameOptions};
pub use types::{
    AgentMessage, CommandEnvelope, ErrorCode, RelayRequest, RequestId,
    ResponseEnvelope, Status,
};
