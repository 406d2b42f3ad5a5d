//! Typed caller API: one method per agent command.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use steamrelay_protocol::{Command, Currency, GameOptions, InventoryQuery, TradeOfferRequest};

use crate::{BridgeError, Relay, RpcBridge};

/// Drives one account on one agent through a shared [`RpcBridge`].
///
/// ```rust,no_run
/// # async fn demo(bridge: std::sync::Arc<steamrelay_bridge::RpcBridge<steamrelay_bridge::MemoryRelay>>) {
/// use std::time::Duration;
/// use steamrelay_bridge::RemoteSteamClient;
///
/// let client = RemoteSteamClient::new(bridge, "agent-token", "alice", Duration::from_secs(60));
/// let alive = client.is_session_alive().await;
/// # }
/// ```
pub struct RemoteSteamClient<R: Relay> {
    bridge: Arc<RpcBridge<R>>,
    target_token: String,
    account_login: String,
    timeout: Duration,
}

impl<R: Relay> RemoteSteamClient<R> {
    pub fn new(
        bridge: Arc<RpcBridge<R>>,
        target_token: impl Into<String>,
        account_login: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            bridge,
            target_token: target_token.into(),
            account_login: account_login.into(),
            timeout,
        }
    }

    pub fn account_login(&self) -> &str {
        &self.account_login
    }

    /// Runs any command and returns its raw `result`.
    pub async fn run(&self, command: &Command) -> Result<Value, BridgeError> {
        self.bridge
            .call(&self.target_token, &self.account_login, command, self.timeout)
            .await
    }

    pub async fn is_session_alive(&self) -> Result<bool, BridgeError> {
        let result = self.run(&Command::IsSessionAlive).await?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub async fn get_session_id(&self) -> Result<Option<String>, BridgeError> {
        let result = self.run(&Command::GetSessionId).await?;
        Ok(result.as_str().map(str::to_owned))
    }

    pub async fn get_my_inventory(&self, query: InventoryQuery) -> Result<Value, BridgeError> {
        self.run(&Command::GetMyInventory(query)).await
    }

    pub async fn get_partner_inventory(
        &self,
        partner_steam_id: impl Into<String>,
        query: InventoryQuery,
    ) -> Result<Value, BridgeError> {
        self.run(&Command::GetPartnerInventory {
            partner_steam_id: partner_steam_id.into(),
            query,
        })
        .await
    }

    pub async fn get_wallet_balance(&self, convert_to_decimal: bool) -> Result<Value, BridgeError> {
        self.run(&Command::GetWalletBalance { convert_to_decimal })
            .await
    }

    pub async fn make_offer_with_url(&self, offer: TradeOfferRequest) -> Result<Value, BridgeError> {
        self.run(&Command::MakeOfferWithUrl(offer)).await
    }

    pub async fn market_fetch_price(
        &self,
        item_hash_name: impl Into<String>,
        game: GameOptions,
        currency: Currency,
    ) -> Result<Value, BridgeError> {
        self.run(&Command::MarketFetchPrice {
            item_hash_name: item_hash_name.into(),
            game,
            currency,
        })
        .await
    }

    pub async fn market_fetch_price_history(
        &self,
        item_hash_name: impl Into<String>,
        game: GameOptions,
    ) -> Result<Value, BridgeError> {
        self.run(&Command::MarketFetchPriceHistory {
            item_hash_name: item_hash_name.into(),
            game,
        })
        .await
    }

    /// `money_to_receive` is what the seller gets, in minor units.
    pub async fn market_create_sell_order(
        &self,
        assetid: impl Into<String>,
        game: GameOptions,
        money_to_receive: u64,
    ) -> Result<Value, BridgeError> {
        self.run(&Command::MarketCreateSellOrder {
            assetid: assetid.into(),
            game,
            money_to_receive,
        })
        .await
    }

    pub async fn market_create_buy_order(
        &self,
        market_name: impl Into<String>,
        price_single_item: u64,
        quantity: u32,
        game: GameOptions,
        currency: Currency,
    ) -> Result<Value, BridgeError> {
        self.run(&Command::MarketCreateBuyOrder {
            market_name: market_name.into(),
            price_single_item,
            quantity,
            game,
            currency,
        })
        .await
    }

    pub async fn market_cancel_sell_order(
        &self,
        sell_listing_id: impl Into<String>,
    ) -> Result<Value, BridgeError> {
        self.run(&Command::MarketCancelSellOrder {
            sell_listing_id: sell_listing_id.into(),
        })
        .await
    }

    pub async fn market_cancel_buy_order(
        &self,
        buy_order_id: impl Into<String>,
    ) -> Result<Value, BridgeError> {
        self.run(&Command::MarketCancelBuyOrder {
            buy_order_id: buy_order_id.into(),
        })
        .await
    }

    pub async fn market_get_my_buy_orders(&self) -> Result<Value, BridgeError> {
        self.run(&Command::MarketGetMyBuyOrders).await
    }

    pub async fn market_get_my_sell_listings(&self) -> Result<Value, BridgeError> {
        self.run(&Command::MarketGetMySellListings).await
    }

    pub async fn market_get_my_recent_sell_listings(&self) -> Result<Value, BridgeError> {
        self.run(&Command::MarketGetMyRecentSellListings).await
    }

    /// Sell listings and buy orders together.
    pub async fn market_get_my_market_listings(&self) -> Result<Value, BridgeError> {
        self.run(&Command::MarketGetMyMarketListings).await
    }

    pub async fn market_get_history(&self, start: u32, count: u32) -> Result<Value, BridgeError> {
        self.run(&Command::MarketGetHistory { start, count }).await
    }
}
