//! Market, inventory, and trade calls for steamrelay.
//!
//! Everything here runs against an already authenticated
//! [`SteamSession`](steamrelay_session::SteamSession) borrowed from the
//! session cache:
//!
//! - [`MarketOps`]: prices, listings, buy/sell orders
//! - [`TradeOps`]: inventories, wallet, trade offers
//! - [`ConfirmationExecutor`]: the mobile confirmations some of those
//!   need before Steam treats them as done
//!
//! Listing pages are scraped with the parsers in [`scrape`]; how far past
//! the first page to go is decided by [`ListingPaging::plan`].

mod config;
mod confirmation;
mod error;
mod inventory;
mod market;
pub mod scrape;

pub use config::{ListingPaging, ListingPlan};
pub use confirmation::{CONFIRMATION_TYPE_MARKET_LISTING, Confirmation, ConfirmationExecutor};
pub use error::MarketError;
pub use inventory::TradeOps;
pub use market::MarketOps;
