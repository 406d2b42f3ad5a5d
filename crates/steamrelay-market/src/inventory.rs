//! Inventory, wallet, and trade-offer calls.

use reqwest::StatusCode;
use serde_json::{Map, Value, json};
use steamrelay_protocol::{InventoryQuery, TradeItem, TradeOfferRequest};
use steamrelay_session::SteamSession;

use crate::{ConfirmationExecutor, MarketError, scrape};

/// Inventory and trade operations over a borrowed session.
pub struct TradeOps<'a> {
    session: &'a SteamSession,
}

impl<'a> TradeOps<'a> {
    pub fn new(session: &'a SteamSession) -> Self {
        Self { session }
    }

    fn url(&self, path: &str) -> String {
        self.session.http().urls().community_path(path)
    }

    pub async fn get_my_inventory(&self, query: &InventoryQuery) -> Result<Value, MarketError> {
        self.inventory(self.session.steamid(), query).await
    }

    pub async fn get_partner_inventory(
        &self,
        partner_steam_id: &str,
        query: &InventoryQuery,
    ) -> Result<Value, MarketError> {
        self.inventory(partner_steam_id, query).await
    }

    async fn inventory(&self, steamid: &str, query: &InventoryQuery) -> Result<Value, MarketError> {
        let url = self.url(&format!(
            "/inventory/{steamid}/{}/{}",
            query.game.app_id, query.game.context_id
        ));
        let response = self
            .session
            .http()
            .client()
            .get(url)
            .query(&[("l", "english".to_owned()), ("count", query.count.to_string())])
            .send()
            .await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketError::RateLimited("inventory endpoint".into()));
        }
        if !response.status().is_success() {
            return Err(MarketError::Status {
                context: "inventory",
                status: response.status().as_u16(),
            });
        }
        let json: Value = response.json().await?;
        if json["success"] != json!(1) {
            return Err(MarketError::Api(format!("inventory of {steamid} unavailable")));
        }
        Ok(if query.merge {
            merge_inventory(&json)
        } else {
            json
        })
    }

    /// Wallet balance from `g_rgWalletInfo` on the market page.
    ///
    /// With `convert_to_decimal` amounts are decimal strings (`"123.45"`);
    /// otherwise minor units.
    pub async fn get_wallet_balance(&self, convert_to_decimal: bool) -> Result<Value, MarketError> {
        let response = self.session.http().client().get(self.url("/market")).send().await?;
        if response.status() != StatusCode::OK {
            return Err(MarketError::Status {
                context: "wallet",
                status: response.status().as_u16(),
            });
        }
        let info = scrape::parse_wallet_info(&response.text().await?)?;
        let balance = minor_units(&info["wallet_balance"])
            .ok_or_else(|| MarketError::Parse("wallet_balance missing".into()))?;
        let delayed = minor_units(&info["wallet_delayed_balance"]).unwrap_or(0);
        let amount = |minor: u64| {
            if convert_to_decimal {
                Value::String(format!("{}.{:02}", minor / 100, minor % 100))
            } else {
                Value::from(minor)
            }
        };
        Ok(json!({
            "balance": amount(balance),
            "wallet_currency": info["wallet_currency"].clone(),
            "delayed_balance": amount(delayed),
        }))
    }

    /// Sends a trade offer through the partner's trade URL, confirming it
    /// on the mobile side when Steam asks for it.
    pub async fn make_offer_with_url(&self, offer: &TradeOfferRequest) -> Result<Value, MarketError> {
        let trade = json!({
            "newversion": true,
            "version": 4,
            "me": {"assets": asset_list(&offer.items_from_me), "currency": [], "ready": false},
            "them": {"assets": asset_list(&offer.items_from_them), "currency": [], "ready": false},
        });
        let form = [
            ("sessionid", self.session.require_session_id()?),
            ("serverid", "1".to_owned()),
            ("partner", offer.partner_steamid().to_string()),
            ("tradeoffermessage", offer.message.clone()),
            ("json_tradeoffer", trade.to_string()),
            ("captcha", String::new()),
            (
                "trade_offer_create_params",
                json!({"trade_offer_access_token": offer.token}).to_string(),
            ),
        ];
        let community = self.session.http().urls().community.clone();
        let response = self
            .session
            .http()
            .client()
            .post(self.url("/tradeoffer/new/send"))
            .header("Referer", offer.trade_offer_url.as_str())
            .header("Origin", community)
            .form(&form)
            .send()
            .await?;
        let mut json: Value = response.json().await?;
        if let Some(error) = json["strError"].as_str() {
            return Err(MarketError::Api(error.to_owned()));
        }

        if json["needs_mobile_confirmation"].as_bool() == Some(true) {
            let offer_id = match &json["tradeofferid"] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return Err(MarketError::Parse("trade offer without id".into())),
            };
            let confirmation = ConfirmationExecutor::new(self.session)
                .confirm_by_id(&offer_id)
                .await
                .map_err(MarketError::during_confirmation)?;
            json["confirmation"] = confirmation;
        }
        Ok(json)
    }
}

fn asset_list(items: &[TradeItem]) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            json!({
                "appid": item.appid.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(item.appid.clone())),
                "contextid": item.contextid,
                "amount": item.amount,
                "assetid": item.assetid,
            })
        })
        .collect()
}

fn minor_units(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Joins `assets` with their `descriptions` into `{assetid: item}`.
///
/// Each item is its description plus `id`, `amount` and `contextid`.
fn merge_inventory(json: &Value) -> Value {
    let mut descriptions = std::collections::HashMap::new();
    for description in json["descriptions"].as_array().into_iter().flatten() {
        let key = (
            description["classid"].as_str().unwrap_or_default().to_owned(),
            description["instanceid"].as_str().unwrap_or("0").to_owned(),
        );
        descriptions.insert(key, description);
    }

    let mut merged = Map::new();
    for asset in json["assets"].as_array().into_iter().flatten() {
        let Some(asset_id) = asset["assetid"].as_str() else {
            continue;
        };
        let key = (
            asset["classid"].as_str().unwrap_or_default().to_owned(),
            asset["instanceid"].as_str().unwrap_or("0").to_owned(),
        );
        let mut item = descriptions
            .get(&key)
            .and_then(|d| d.as_object().cloned())
            .unwrap_or_default();
        item.insert("id".into(), Value::from(asset_id));
        item.insert("amount".into(), asset["amount"].clone());
        item.insert("contextid".into(), asset["contextid"].clone());
        merged.insert(asset_id.to_owned(), Value::Object(item));
    }
    Value::Object(merged)
}
