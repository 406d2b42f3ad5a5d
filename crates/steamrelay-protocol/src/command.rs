//! Typed commands.
//!
//! On the wire a command is a `cmd` string plus a free-form `args` object.
//! [`Command::parse`] turns that pair into one variant of a closed enum,
//! validating every argument up front. Anything wrong with the arguments
//! becomes [`WireError::InvalidArgument`] before a single request is sent
//! to Steam; an unrecognized `cmd` becomes [`WireError::UnknownCommand`].
//!
//! Callers are loose about types: `app_id` arrives as `"730"` or `730`,
//! ids as strings or numbers. The `flex` helpers below accept both.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{Currency, GameOptions, WireError};

// ---------------------------------------------------------------------------
// Argument types
// ---------------------------------------------------------------------------

/// Which inventory to load and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryQuery {
    pub game: GameOptions,
    pub merge: bool,
    pub count: u32,
}

/// One asset in a trade offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeItem {
    #[serde(alias = "app_id", default = "default_app_id", deserialize_with = "flex::string")]
    pub appid: String,
    #[serde(alias = "context_id", default = "default_context_id", deserialize_with = "flex::string")]
    pub contextid: String,
    #[serde(alias = "asset_id", deserialize_with = "flex::string")]
    pub assetid: String,
    #[serde(default = "default_amount", deserialize_with = "flex::u32")]
    pub amount: u32,
}

/// Offset between a 32-bit account id and its SteamID64.
pub const STEAMID64_BASE: u64 = 76_561_197_960_265_728;

/// A trade offer sent through the partner's trade URL.
///
/// Built only through [`TradeOfferRequest::from_url`] or
/// [`Command::parse`], so `partner` and `token` always agree with
/// `trade_offer_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOfferRequest {
    pub trade_offer_url: String,
    /// Account id from the URL's `partner` parameter.
    pub partner: u32,
    /// Access token from the URL's `token` parameter.
    pub token: String,
    pub items_from_me: Vec<TradeItem>,
    pub items_from_them: Vec<TradeItem>,
    pub message: String,
}

impl TradeOfferRequest {
    /// An empty offer addressed through `trade_offer_url`.
    ///
    /// # Errors
    /// [`WireError::InvalidArgument`] unless the URL carries a `partner`
    /// that fits a 32-bit account id and a non-empty `token`.
    pub fn from_url(trade_offer_url: impl Into<String>) -> Result<Self, WireError> {
        let trade_offer_url = trade_offer_url.into();
        let (partner, token) = parse_trade_url(&trade_offer_url)?;
        Ok(Self {
            trade_offer_url,
            partner,
            token,
            items_from_me: Vec::new(),
            items_from_them: Vec::new(),
            message: String::new(),
        })
    }

    pub fn partner_steamid(&self) -> u64 {
        STEAMID64_BASE + u64::from(self.partner)
    }
}

fn parse_trade_url(trade_offer_url: &str) -> Result<(u32, String), WireError> {
    let invalid = |why: String| {
        WireError::InvalidArgument(format!("make_offer_with_url: trade_offer_url {why}"))
    };
    let url = url::Url::parse(trade_offer_url).map_err(|e| invalid(e.to_string()))?;
    let mut partner = None;
    let mut token = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "partner" => partner = Some(value.into_owned()),
            "token" => token = Some(value.into_owned()),
            _ => {}
        }
    }
    let partner = partner.ok_or_else(|| invalid("has no partner".into()))?;
    let partner = partner
        .parse::<u32>()
        .map_err(|_| invalid(format!("partner {partner:?} is not a 32-bit account id")))?;
    let token = token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| invalid("has no token".into()))?;
    Ok((partner, token))
}

/// Every command the agent can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    IsSessionAlive,
    GetSessionId,
    GetMyInventory(InventoryQuery),
    GetPartnerInventory {
        partner_steam_id: String,
        query: InventoryQuery,
    },
    GetWalletBalance {
        convert_to_decimal: bool,
    },
    MakeOfferWithUrl(TradeOfferRequest),
    MarketFetchPrice {
        item_hash_name: String,
        game: GameOptions,
        currency: Currency,
    },
    MarketFetchPriceHistory {
        item_hash_name: String,
        game: GameOptions,
    },
    MarketCreateSellOrder {
        assetid: String,
        game: GameOptions,
        /// Amount the seller receives, in minor currency units.
        money_to_receive: u64,
    },
    MarketCreateBuyOrder {
        market_name: String,
        /// Price per item, in minor currency units.
        price_single_item: u64,
        quantity: u32,
        game: GameOptions,
        currency: Currency,
    },
    MarketCancelSellOrder {
        sell_listing_id: String,
    },
    MarketCancelBuyOrder {
        buy_order_id: String,
    },
    MarketGetMyBuyOrders,
    MarketGetMySellListings,
    MarketGetMyRecentSellListings,
    MarketGetMyMarketListings,
    MarketGetHistory {
        start: u32,
        count: u32,
    },
}

// ---------------------------------------------------------------------------
// Raw argument shapes (what serde sees)
// ---------------------------------------------------------------------------

fn default_app_id() -> String {
    "730".to_owned()
}

fn default_context_id() -> String {
    "2".to_owned()
}

fn default_amount() -> u32 {
    1
}

fn default_inventory_count() -> u32 {
    5000
}

fn default_history_count() -> u32 {
    100
}

fn yes() -> bool {
    true
}

#[derive(Deserialize)]
struct InventoryArgs {
    #[serde(default = "default_app_id", deserialize_with = "flex::string")]
    app_id: String,
    #[serde(default, deserialize_with = "flex::opt_string")]
    context_id: Option<String>,
    #[serde(default = "yes")]
    merge: bool,
    #[serde(default = "default_inventory_count", deserialize_with = "flex::u32")]
    count: u32,
}

impl InventoryArgs {
    fn into_query(self) -> InventoryQuery {
        InventoryQuery {
            game: GameOptions::resolve(&self.app_id, self.context_id.as_deref()),
            merge: self.merge,
            count: self.count,
        }
    }
}

#[derive(Deserialize)]
struct PartnerInventoryArgs {
    #[serde(deserialize_with = "flex::string")]
    partner_steam_id: String,
    #[serde(flatten)]
    inventory: InventoryArgs,
}

#[derive(Deserialize)]
struct WalletArgs {
    #[serde(default = "yes")]
    convert_to_decimal: bool,
}

#[derive(Deserialize)]
struct TradeOfferArgs {
    trade_offer_url: String,
    #[serde(default)]
    items_from_me: Vec<TradeItem>,
    #[serde(default)]
    items_from_them: Vec<TradeItem>,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct FetchPriceArgs {
    item_hash_name: String,
    #[serde(deserialize_with = "flex::string")]
    app_id: String,
    #[serde(deserialize_with = "flex::u32")]
    currency: u32,
}

#[derive(Deserialize)]
struct PriceHistoryArgs {
    item_hash_name: String,
    #[serde(deserialize_with = "flex::string")]
    app_id: String,
}

#[derive(Deserialize)]
struct SellOrderArgs {
    #[serde(deserialize_with = "flex::string")]
    assetid: String,
    #[serde(deserialize_with = "flex::string")]
    app_id: String,
    #[serde(default, deserialize_with = "flex::opt_string")]
    context_id: Option<String>,
    #[serde(deserialize_with = "flex::u64")]
    money_to_receive: u64,
}

#[derive(Deserialize)]
struct BuyOrderArgs {
    market_name: String,
    #[serde(deserialize_with = "flex::u64")]
    price_single_item: u64,
    #[serde(deserialize_with = "flex::u32")]
    quantity: u32,
    #[serde(deserialize_with = "flex::string")]
    app_id: String,
    #[serde(default = "usd", deserialize_with = "flex::u32")]
    currency: u32,
}

fn usd() -> u32 {
    Currency::USD.code()
}

#[derive(Deserialize)]
struct CancelSellArgs {
    #[serde(deserialize_with = "flex::string")]
    sell_listing_id: String,
}

#[derive(Deserialize)]
struct CancelBuyArgs {
    #[serde(deserialize_with = "flex::string")]
    buy_order_id: String,
}

#[derive(Deserialize)]
struct HistoryArgs {
    #[serde(default, deserialize_with = "flex::u32")]
    start: u32,
    #[serde(default = "default_history_count", deserialize_with = "flex::u32")]
    count: u32,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Deserializes `args` into `T`, reporting failures as `InvalidArgument`.
fn args<T: DeserializeOwned>(cmd: &str, args: &Value) -> Result<T, WireError> {
    let value = match args {
        Value::Null => Value::Object(Default::default()),
        Value::Object(_) => args.clone(),
        _ => {
            return Err(WireError::InvalidArgument(format!(
                "{cmd}: args must be an object"
            )));
        }
    };
    serde_json::from_value(value)
        .map_err(|e| WireError::InvalidArgument(format!("{cmd}: {e}")))
}

fn require(cmd: &str, field: &str, value: &str) -> Result<(), WireError> {
    if value.trim().is_empty() {
        return Err(WireError::InvalidArgument(format!(
            "{cmd}: {field} must not be empty"
        )));
    }
    Ok(())
}

fn positive(cmd: &str, field: &str, value: u64) -> Result<(), WireError> {
    if value == 0 {
        return Err(WireError::InvalidArgument(format!(
            "{cmd}: {field} must be greater than zero"
        )));
    }
    Ok(())
}

impl Command {
    /// Parses and validates a command from its wire form.
    ///
    /// # Errors
    /// - [`WireError::UnknownCommand`] for an unrecognized `cmd`
    /// - [`WireError::InvalidArgument`] for missing or invalid arguments
    pub fn parse(cmd: &str, raw: &Value) -> Result<Self, WireError> {
        let command = match cmd {
            "is_session_alive" => Self::IsSessionAlive,
            "get_session_id" => Self::GetSessionId,
            "get_my_inventory" => {
                Self::GetMyInventory(args::<InventoryArgs>(cmd, raw)?.into_query())
            }
            "get_partner_inventory" => {
                let a: PartnerInventoryArgs = args(cmd, raw)?;
                require(cmd, "partner_steam_id", &a.partner_steam_id)?;
                Self::GetPartnerInventory {
                    partner_steam_id: a.partner_steam_id,
                    query: a.inventory.into_query(),
                }
            }
            "get_wallet_balance" => {
                let a: WalletArgs = args(cmd, raw)?;
                Self::GetWalletBalance {
                    convert_to_decimal: a.convert_to_decimal,
                }
            }
            "make_offer_with_url" => {
                let a: TradeOfferArgs = args(cmd, raw)?;
                require(cmd, "trade_offer_url", &a.trade_offer_url)?;
                for item in a.items_from_me.iter().chain(&a.items_from_them) {
                    require(cmd, "assetid", &item.assetid)?;
                }
                let mut offer = TradeOfferRequest::from_url(a.trade_offer_url)?;
                offer.items_from_me = a.items_from_me;
                offer.items_from_them = a.items_from_them;
                offer.message = a.message;
                Self::MakeOfferWithUrl(offer)
            }
            "market_fetch_price" => {
                let a: FetchPriceArgs = args(cmd, raw)?;
                require(cmd, "item_hash_name", &a.item_hash_name)?;
                require(cmd, "app_id", &a.app_id)?;
                Self::MarketFetchPrice {
                    item_hash_name: a.item_hash_name,
                    game: GameOptions::resolve(&a.app_id, None),
                    currency: Currency::new(a.currency)?,
                }
            }
            "market_fetch_price_history" => {
                let a: PriceHistoryArgs = args(cmd, raw)?;
                require(cmd, "item_hash_name", &a.item_hash_name)?;
                require(cmd, "app_id", &a.app_id)?;
                Self::MarketFetchPriceHistory {
                    item_hash_name: a.item_hash_name,
                    game: GameOptions::resolve(&a.app_id, None),
                }
            }
            "market_create_sell_order" => {
                let a: SellOrderArgs = args(cmd, raw)?;
                require(cmd, "assetid", &a.assetid)?;
                require(cmd, "app_id", &a.app_id)?;
                positive(cmd, "money_to_receive", a.money_to_receive)?;
                Self::MarketCreateSellOrder {
                    assetid: a.assetid,
                    game: GameOptions::resolve(&a.app_id, a.context_id.as_deref()),
                    money_to_receive: a.money_to_receive,
                }
            }
            "market_create_buy_order" => {
                let a: BuyOrderArgs = args(cmd, raw)?;
                require(cmd, "market_name", &a.market_name)?;
                require(cmd, "app_id", &a.app_id)?;
                positive(cmd, "price_single_item", a.price_single_item)?;
                positive(cmd, "quantity", u64::from(a.quantity))?;
                Self::MarketCreateBuyOrder {
                    market_name: a.market_name,
                    price_single_item: a.price_single_item,
                    quantity: a.quantity,
                    game: GameOptions::resolve(&a.app_id, None),
                    currency: Currency::new(a.currency)?,
                }
            }
            "market_cancel_sell_order" => {
                let a: CancelSellArgs = args(cmd, raw)?;
                require(cmd, "sell_listing_id", &a.sell_listing_id)?;
                Self::MarketCancelSellOrder {
                    sell_listing_id: a.sell_listing_id,
                }
            }
            "market_cancel_buy_order" => {
                let a: CancelBuyArgs = args(cmd, raw)?;
                require(cmd, "buy_order_id", &a.buy_order_id)?;
                Self::MarketCancelBuyOrder {
                    buy_order_id: a.buy_order_id,
                }
            }
            "market_get_my_buy_orders" => Self::MarketGetMyBuyOrders,
            "market_get_my_sell_listings" => Self::MarketGetMySellListings,
            "market_get_my_recent_sell_listings" => Self::MarketGetMyRecentSellListings,
            "market_get_my_market_listings" => Self::MarketGetMyMarketListings,
            "market_get_history" => {
                let a: HistoryArgs = args(cmd, raw)?;
                Self::MarketGetHistory {
                    start: a.start,
                    count: a.count,
                }
            }
            other => return Err(WireError::UnknownCommand(other.to_owned())),
        };
        Ok(command)
    }

    /// The wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IsSessionAlive => "is_session_alive",
            Self::GetSessionId => "get_session_id",
            Self::GetMyInventory(_) => "get_my_inventory",
            Self::GetPartnerInventory { .. } => "get_partner_inventory",
            Self::GetWalletBalance { .. } => "get_wallet_balance",
            Self::MakeOfferWithUrl(_) => "make_offer_with_url",
            Self::MarketFetchPrice { .. } => "market_fetch_price",
            Self::MarketFetchPriceHistory { .. } => "market_fetch_price_history",
            Self::MarketCreateSellOrder { .. } => "market_create_sell_order",
            Self::MarketCreateBuyOrder { .. } => "market_create_buy_order",
            Self::MarketCancelSellOrder { .. } => "market_cancel_sell_order",
            Self::MarketCancelBuyOrder { .. } => "market_cancel_buy_order",
            Self::MarketGetMyBuyOrders => "market_get_my_buy_orders",
            Self::MarketGetMySellListings => "market_get_my_sell_listings",
            Self::MarketGetMyRecentSellListings => "market_get_my_recent_sell_listings",
            Self::MarketGetMyMarketListings => "market_get_my_market_listings",
            Self::MarketGetHistory { .. } => "market_get_history",
        }
    }

    /// Returns `true` for remote reads that may be retried.
    ///
    /// Mutations (orders, cancellations, trade offers) are never retried:
    /// a request that timed out may still have been applied by Steam.
    /// Session liveness checks are cheap and report their own state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GetMyInventory(_)
                | Self::GetPartnerInventory { .. }
                | Self::GetWalletBalance { .. }
                | Self::MarketFetchPrice { .. }
                | Self::MarketFetchPriceHistory { .. }
                | Self::MarketGetMyBuyOrders
                | Self::MarketGetMySellListings
                | Self::MarketGetMyRecentSellListings
                | Self::MarketGetMyMarketListings
                | Self::MarketGetHistory { .. }
        )
    }

    /// Renders the `args` object for this command, the inverse of
    /// [`parse`](Self::parse). Used by callers building envelopes.
    pub fn to_args(&self) -> Value {
        match self {
            Self::IsSessionAlive
            | Self::GetSessionId
            | Self::MarketGetMyBuyOrders
            | Self::MarketGetMySellListings
            | Self::MarketGetMyRecentSellListings
            | Self::MarketGetMyMarketListings => json!({}),
            Self::GetMyInventory(q) => json!({
                "app_id": q.game.app_id,
                "context_id": q.game.context_id,
                "merge": q.merge,
                "count": q.count,
            }),
            Self::GetPartnerInventory {
                partner_steam_id,
                query,
            } => json!({
                "partner_steam_id": partner_steam_id,
                "app_id": query.game.app_id,
                "context_id": query.game.context_id,
                "merge": query.merge,
                "count": query.count,
            }),
            Self::GetWalletBalance { convert_to_decimal } => {
                json!({ "convert_to_decimal": convert_to_decimal })
            }
            Self::MakeOfferWithUrl(offer) => json!({
                "trade_offer_url": offer.trade_offer_url,
                "items_from_me": offer.items_from_me,
                "items_from_them": offer.items_from_them,
                "message": offer.message,
            }),
            Self::MarketFetchPrice {
                item_hash_name,
                game,
                currency,
            } => json!({
                "item_hash_name": item_hash_name,
                "app_id": game.app_id,
                "currency": currency.code(),
            }),
            Self::MarketFetchPriceHistory {
                item_hash_name,
                game,
            } => json!({
                "item_hash_name": item_hash_name,
                "app_id": game.app_id,
            }),
            Self::MarketCreateSellOrder {
                assetid,
                game,
                money_to_receive,
            } => json!({
                "assetid": assetid,
                "app_id": game.app_id,
                "context_id": game.context_id,
                "money_to_receive": money_to_receive.to_string(),
            }),
            Self::MarketCreateBuyOrder {
                market_name,
                price_single_item,
                quantity,
                game,
                currency,
            } => json!({
                "market_name": market_name,
                "price_single_item": price_single_item.to_string(),
                "quantity": quantity,
                "app_id": game.app_id,
                "currency": currency.code(),
            }),
            Self::MarketCancelSellOrder { sell_listing_id } => {
                json!({ "sell_listing_id": sell_listing_id })
            }
            Self::MarketCancelBuyOrder { buy_order_id } => {
                json!({ "buy_order_id": buy_order_id })
            }
            Self::MarketGetHistory { start, count } => {
                json!({ "start": start, "count": count })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// String-or-number deserializers
// ---------------------------------------------------------------------------

mod flex {
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(serde_json::Number),
    }

    impl StrOrNum {
        fn into_string(self) -> String {
            match self {
                Self::Str(s) => s,
                Self::Num(n) => n.to_string(),
            }
        }
    }

    pub(super) fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(StrOrNum::deserialize(d)?.into_string())
    }

    pub(super) fn opt_string<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<StrOrNum>::deserialize(d)?
            .map(StrOrNum::into_string)
            .filter(|s| !s.is_empty()))
    }

    pub(super) fn u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let raw = StrOrNum::deserialize(d)?.into_string();
        raw.trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a whole number, got {raw:?}")))
    }

    pub(super) fn u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let raw = StrOrNum::deserialize(d)?.into_string();
        raw.trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a whole number, got {raw:?}")))
    }
}
