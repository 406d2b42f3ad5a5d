//! Steam Community Market calls for one authenticated session.

use reqwest::{Response, StatusCode};
use serde_json::{Value, json};
use steamrelay_protocol::{Currency, GameOptions};
use steamrelay_session::SteamSession;

use crate::scrape::{self, Listings};
use crate::{ConfirmationExecutor, ListingPaging, ListingPlan, MarketError};

/// How many of the newest listings `get_my_recent_sell_listings` returns.
const RECENT_LISTINGS: u32 = 10;

/// Market operations over a borrowed session.
///
/// The caller holds the session's lease for the lifetime of this value,
/// so nothing else drives the same cookie jar meanwhile.
pub struct MarketOps<'a> {
    session: &'a SteamSession,
    paging: &'a ListingPaging,
}

impl<'a> MarketOps<'a> {
    pub fn new(session: &'a SteamSession, paging: &'a ListingPaging) -> Self {
        Self { session, paging }
    }

    fn url(&self, path: &str) -> String {
        self.session.http().urls().community_path(path)
    }

    fn session_id(&self) -> Result<String, MarketError> {
        Ok(self.session.require_session_id()?)
    }

    /// `/market/listings/<app>/<name>` with the name percent-encoded.
    fn listing_page_url(&self, app_id: &str, market_name: &str) -> String {
        let base = self.url("/market/listings");
        let Ok(mut url) = reqwest::Url::parse(&base) else {
            return base;
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(app_id).push(market_name);
        }
        url.into()
    }

    async fn pace(&self) {
        if !self.paging.pacing.is_zero() {
            tokio::time::sleep(self.paging.pacing).await;
        }
    }

    // -----------------------------------------------------------------------
    // Prices
    // -----------------------------------------------------------------------

    /// `priceoverview` for one item.
    ///
    /// # Errors
    /// [`MarketError::RateLimited`] on HTTP 429 (about 20 calls a minute).
    pub async fn fetch_price(
        &self,
        item_hash_name: &str,
        game: &GameOptions,
        currency: Currency,
    ) -> Result<Value, MarketError> {
        let currency = currency.code().to_string();
        let response = self
            .session
            .http()
            .client()
            .get(self.url("/market/priceoverview/"))
            .query(&[
                ("country", "PL"),
                ("currency", currency.as_str()),
                ("appid", game.app_id.as_str()),
                ("market_hash_name", item_hash_name),
            ])
            .send()
            .await?;
        price_json(response).await
    }

    /// `pricehistory` for one item.
    pub async fn fetch_price_history(
        &self,
        item_hash_name: &str,
        game: &GameOptions,
    ) -> Result<Value, MarketError> {
        let response = self
            .session
            .http()
            .client()
            .get(self.url("/market/pricehistory/"))
            .query(&[
                ("country", "PL"),
                ("appid", game.app_id.as_str()),
                ("market_hash_name", item_hash_name),
            ])
            .send()
            .await?;
        price_json(response).await
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    async fn market_page(&self) -> Result<String, MarketError> {
        let response = self.session.http().client().get(self.url("/market")).send().await?;
        let response = ok_status(response, "market page")?;
        Ok(response.text().await?)
    }

    async fn render(&self, path: &str, start: u32, count: i64) -> Result<Listings, MarketError> {
        let response = self
            .session
            .http()
            .client()
            .get(self.url(path))
            .query(&[("query", String::new()), ("start", start.to_string()), ("count", count.to_string())])
            .send()
            .await?;
        let json: Value = ok_status(response, "listing render")?.json().await?;
        if json["success"] == Value::Bool(false) {
            return Err(MarketError::Api(format!("listing render refused at start={start}")));
        }
        Ok(scrape::parse_render_response(&json))
    }

    /// The account's active buy orders, keyed by order id.
    pub async fn get_my_buy_orders(&self) -> Result<Value, MarketError> {
        let listings = scrape::parse_market_page(&self.market_page().await?)?;
        self.pace().await;
        to_value(&listings.buy_orders)
    }

    /// Every active sell listing, following pagination past the first page.
    pub async fn get_my_sell_listings(&self) -> Result<Value, MarketError> {
        let listings = self.all_sell_listings().await?;
        to_value(&listings.sell_listings)
    }

    async fn all_sell_listings(&self) -> Result<Listings, MarketError> {
        let html = self.market_page().await?;
        let mut listings = scrape::parse_market_page(&html)?;

        let (shown, total) = scrape::listing_counts(&html).unwrap_or((0, 0));
        let plan = self.paging.plan(shown, total);
        tracing::debug!(login = %self.session.login(), shown, total, ?plan, "sell listing plan");
        match plan {
            ListingPlan::Complete => {}
            ListingPlan::Bulk { start } => {
                self.pace().await;
                listings.merge(self.render("/market/mylistings/render/", start, -1).await?);
            }
            ListingPlan::Paged { starts, count } => {
                for start in starts {
                    self.pace().await;
                    listings.merge(self.render("/market/mylistings/", start, i64::from(count)).await?);
                }
            }
        }
        self.pace().await;
        Ok(listings)
    }

    /// The ten newest sell listings (the last page).
    pub async fn get_my_recent_sell_listings(&self) -> Result<Value, MarketError> {
        let html = self.market_page().await?;
        let listings = match scrape::listing_counts(&html) {
            Some((shown, total)) if total > shown => {
                let start = total.saturating_sub(RECENT_LISTINGS);
                self.pace().await;
                self.render("/market/mylistings/render/", start, i64::from(RECENT_LISTINGS))
                    .await?
            }
            _ => scrape::parse_market_page(&html)?,
        };
        self.pace().await;
        to_value(&listings.sell_listings)
    }

    /// Buy orders and all sell listings together.
    pub async fn get_my_market_listings(&self) -> Result<Value, MarketError> {
        let buy_orders = self.get_my_buy_orders().await?;
        let sell_listings = self.get_my_sell_listings().await?;
        Ok(json!({"buy_orders": buy_orders, "sell_listings": sell_listings}))
    }

    /// One page of the account's market history.
    pub async fn get_market_history(&self, start: u32, count: u32) -> Result<Value, MarketError> {
        let response = self
            .session
            .http()
            .client()
            .get(self.url("/market/myhistory/render/"))
            .query(&[("query", String::new()), ("start", start.to_string()), ("count", count.to_string())])
            .send()
            .await?;
        let json: Value = ok_status(response, "market history")?.json().await?;
        if json["success"] == Value::Bool(false) {
            return Err(MarketError::Api("market history refused".into()));
        }
        Ok(json)
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Lists an inventory item; `money_to_receive` is in minor units.
    ///
    /// Confirms the listing on the mobile side when Steam asks for it.
    pub async fn create_sell_order(
        &self,
        assetid: &str,
        game: &GameOptions,
        money_to_receive: u64,
    ) -> Result<Value, MarketError> {
        let referer = self.url(&format!("/profiles/{}/inventory", self.session.steamid()));
        let form = [
            ("assetid", assetid.to_owned()),
            ("sessionid", self.session_id()?),
            ("contextid", game.context_id.clone()),
            ("appid", game.app_id.clone()),
            ("amount", "1".to_owned()),
            ("price", money_to_receive.to_string()),
        ];
        let response = self
            .session
            .http()
            .client()
            .post(self.url("/market/sellitem/"))
            .header("Referer", referer)
            .form(&form)
            .send()
            .await?;
        let json: Value = response.json().await?;

        if json["needs_mobile_confirmation"].as_bool() == Some(true) {
            tracing::info!(login = %self.session.login(), assetid, "sell order needs confirmation");
            return ConfirmationExecutor::new(self.session)
                .confirm_sell_listing(assetid)
                .await
                .map_err(MarketError::during_confirmation);
        }
        if json["success"] == Value::Bool(false) {
            return Err(MarketError::Api(format!("sell order failed: {json}")));
        }
        Ok(json)
    }

    /// Places a buy order; `price_single_item` is in minor units.
    ///
    /// When Steam wants a mobile confirmation, confirms it and posts the
    /// order again with the confirmation id.
    pub async fn create_buy_order(
        &self,
        market_name: &str,
        price_single_item: u64,
        quantity: u32,
        game: &GameOptions,
        currency: Currency,
    ) -> Result<Value, MarketError> {
        let referer = self.listing_page_url(&game.app_id, market_name);
        let price_total = price_single_item.saturating_mul(u64::from(quantity));
        let mut form = vec![
            ("sessionid", self.session_id()?),
            ("currency", currency.code().to_string()),
            ("appid", game.app_id.clone()),
            ("market_hash_name", market_name.to_owned()),
            ("price_total", price_total.to_string()),
            ("quantity", quantity.to_string()),
            ("confirmation", "0".to_owned()),
        ];

        let json = self.post_buy_order(&referer, &form).await?;
        if json["success"] == json!(1) {
            return Ok(json);
        }
        if json["need_confirmation"].as_bool() != Some(true) {
            return Err(MarketError::Api(format!("buy order failed: {json}")));
        }

        let confirmation_id = match &json["confirmation"]["confirmation_id"] {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(MarketError::Parse(format!(
                    "buy order confirmation without id: {json}"
                )));
            }
        };
        tokio::time::sleep(self.paging.confirmation_delay).await;
        ConfirmationExecutor::new(self.session)
            .confirm_by_id(&confirmation_id)
            .await
            .map_err(MarketError::during_confirmation)?;

        if let Some(slot) = form.iter_mut().find(|(k, _)| *k == "confirmation") {
            slot.1 = confirmation_id;
        }
        tokio::time::sleep(self.paging.confirmation_delay).await;
        let json = self
            .post_buy_order(&referer, &form)
            .await
            .map_err(MarketError::during_confirmation)?;
        if json["success"] == json!(1) {
            Ok(json)
        } else {
            Err(MarketError::ConfirmationFailed(format!(
                "order failed after confirmation: {json}"
            )))
        }
    }

    async fn post_buy_order(
        &self,
        referer: &str,
        form: &[(&str, String)],
    ) -> Result<Value, MarketError> {
        let response = self
            .session
            .http()
            .client()
            .post(self.url("/market/createbuyorder/"))
            .header("Referer", referer)
            .form(form)
            .send()
            .await?;
        Ok(response.json().await?)
    }

    /// Removes a sell listing.
    pub async fn cancel_sell_order(&self, sell_listing_id: &str) -> Result<Value, MarketError> {
        let response = self
            .session
            .http()
            .client()
            .post(self.url(&format!("/market/removelisting/{sell_listing_id}")))
            .header("Referer", self.url("/market/"))
            .form(&[("sessionid", self.session_id()?)])
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(MarketError::Status {
                context: "remove listing",
                status: response.status().as_u16(),
            });
        }
        Ok(Value::Null)
    }

    /// Cancels a buy order.
    pub async fn cancel_buy_order(&self, buy_order_id: &str) -> Result<Value, MarketError> {
        let response = self
            .session
            .http()
            .client()
            .post(self.url("/market/cancelbuyorder/"))
            .header("Referer", self.url("/market"))
            .form(&[
                ("sessionid", self.session_id()?),
                ("buy_orderid", buy_order_id.to_owned()),
            ])
            .send()
            .await?;
        let json: Value = response.json().await?;
        if json["success"] != json!(1) {
            return Err(MarketError::Api(format!(
                "cancel buy order failed, success: {}",
                json["success"]
            )));
        }
        Ok(json)
    }
}

fn ok_status(response: Response, context: &'static str) -> Result<Response, MarketError> {
    if response.status() == StatusCode::OK {
        Ok(response)
    } else {
        Err(MarketError::Status {
            context,
            status: response.status().as_u16(),
        })
    }
}

async fn price_json(response: Response) -> Result<Value, MarketError> {
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return Err(MarketError::RateLimited(
            "price endpoint allows about 20 requests per minute".into(),
        ));
    }
    let response = ok_status(response, "price endpoint")?;
    Ok(response.json().await?)
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, MarketError> {
    serde_json::to_value(value).map_err(|e| MarketError::Parse(e.to_string()))
}
