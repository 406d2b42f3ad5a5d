//! Routes a command envelope to the call that implements it.
//!
//! ```text
//! CommandEnvelope ─parse─► Command ─checkout(login)─► SessionLease
//!                                                        │
//!                      retry (reads only) ◄── MarketOps / TradeOps
//!                                                        │
//!                 ResponseEnvelope ◄── success / error + code
//! ```
//!
//! The session lease is held for the whole command, retries included, so
//! two commands for one login never share its cookie jar at the same
//! time. Commands for different logins run independently.

use serde_json::Value;
use steamrelay_market::{ListingPaging, MarketOps, TradeOps};
use steamrelay_protocol::{Command, CommandEnvelope, ResponseEnvelope};
use steamrelay_session::{CredentialStore, SessionBackend, SessionCache, SteamSession};
use tokio_util::sync::CancellationToken;

use crate::{CommandError, RetryPolicy};

/// Executes commands against cached sessions.
pub struct CommandDispatcher<B: SessionBackend, S> {
    sessions: SessionCache<B, S>,
    paging: ListingPaging,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl<B, S> CommandDispatcher<B, S>
where
    B: SessionBackend<Session = SteamSession>,
    S: CredentialStore,
{
    pub fn new(sessions: SessionCache<B, S>, paging: ListingPaging, retry: RetryPolicy) -> Self {
        Self {
            sessions,
            paging: paging.validated(),
            retry: retry.validated(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn sessions(&self) -> &SessionCache<B, S> {
        &self.sessions
    }

    /// Fires on [`shutdown`](Self::shutdown); retry loops stop waiting.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels in-flight retries and drops every cached session.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.sessions.logout_all().await;
    }

    /// Runs one command and builds its response.
    ///
    /// Never fails: every error becomes an `error` response. The
    /// response always carries the envelope's `request_id`.
    pub async fn execute(&self, envelope: CommandEnvelope) -> ResponseEnvelope {
        let request_id = envelope.request_id.clone();
        match self.try_execute(&envelope).await {
            Ok(result) => {
                tracing::debug!(%request_id, cmd = %envelope.cmd, "command succeeded");
                ResponseEnvelope::success(request_id, result)
            }
            Err(e) => {
                let code = e.code();
                tracing::warn!(
                    %request_id,
                    cmd = %envelope.cmd,
                    login = %envelope.account_login,
                    %code,
                    error = %e,
                    "command failed"
                );
                ResponseEnvelope::error(request_id, code, e.to_string())
            }
        }
    }

    async fn try_execute(&self, envelope: &CommandEnvelope) -> Result<Value, CommandError> {
        if envelope.cmd.trim().is_empty() {
            return Err(CommandError::invalid_argument("missing cmd"));
        }
        let login = envelope.account_login.trim();
        if login.is_empty() {
            return Err(CommandError::invalid_argument("missing account_login"));
        }
        let command = Command::parse(&envelope.cmd, &envelope.args)?;

        let mut lease = self.sessions.checkout(login).await?;
        let session: &SteamSession = &lease;
        let outcome = if command.is_retryable() {
            self.retry
                .run(&self.cancel, None, |_| self.perform(session, &command))
                .await
        } else {
            self.perform(session, &command).await
        };

        match &outcome {
            Ok(_) => lease.touch(),
            Err(e) if e.invalidates_session() => {
                tracing::info!(login, "dropping stale session");
                lease.invalidate();
            }
            Err(_) => {}
        }
        outcome
    }

    async fn perform(&self, session: &SteamSession, command: &Command) -> Result<Value, CommandError> {
        let market = MarketOps::new(session, &self.paging);
        let trade = TradeOps::new(session);
        let result = match command {
            Command::IsSessionAlive => Value::Bool(session.is_alive().await?),
            Command::GetSessionId => session.session_id().map_or(Value::Null, Value::String),
            Command::GetMyInventory(query) => trade.get_my_inventory(query).await?,
            Command::GetPartnerInventory {
                partner_steam_id,
                query,
            } => trade.get_partner_inventory(partner_steam_id, query).await?,
            Command::GetWalletBalance { convert_to_decimal } => {
                trade.get_wallet_balance(*convert_to_decimal).await?
            }
            Command::MakeOfferWithUrl(offer) => trade.make_offer_with_url(offer).await?,
            Command::MarketFetchPrice {
                item_hash_name,
                game,
                currency,
            } => market.fetch_price(item_hash_name, game, *currency).await?,
            Command::MarketFetchPriceHistory {
                item_hash_name,
                game,
            } => market.fetch_price_history(item_hash_name, game).await?,
            Command::MarketCreateSellOrder {
                assetid,
                game,
                money_to_receive,
            } => {
                market
                    .create_sell_order(assetid, game, *money_to_receive)
                    .await?
            }
            Command::MarketCreateBuyOrder {
                market_name,
                price_single_item,
                quantity,
                game,
                currency,
            } => {
                market
                    .create_buy_order(market_name, *price_single_item, *quantity, game, *currency)
                    .await?
            }
            Command::MarketCancelSellOrder { sell_listing_id } => {
                market.cancel_sell_order(sell_listing_id).await?
            }
            Command::MarketCancelBuyOrder { buy_order_id } => {
                market.cancel_buy_order(buy_order_id).await?
            }
            Command::MarketGetMyBuyOrders => market.get_my_buy_orders().await?,
            Command::MarketGetMySellListings => market.get_my_sell_listings().await?,
            Command::MarketGetMyRecentSellListings => market.get_my_recent_sell_listings().await?,
            Command::MarketGetMyMarketListings => market.get_my_market_listings().await?,
            Command::MarketGetHistory { start, count } => {
                market.get_market_history(*start, *count).await?
            }
        };
        Ok(result)
    }
}
