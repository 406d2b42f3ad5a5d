//! Mobile confirmations, signed with the account's identity secret.
//!
//! Steam parks market listings, some buy orders, and trade offers until
//! the "mobile app" confirms them. The app's calls are plain community
//! requests carrying a device id and an HMAC key per operation tag,
//! which [`ConfirmationExecutor`] reproduces.

use serde::Deserialize;
use serde_json::{Value, json};
use steamrelay_session::{SteamSession, guard};

use crate::MarketError;

const MOBILE_REQUESTED_WITH: &str = "com.valvesoftware.android.steam.community";

/// `type` of a market-listing confirmation.
pub const CONFIRMATION_TYPE_MARKET_LISTING: u32 = 3;

/// One pending confirmation.
#[derive(Debug, Clone, Deserialize)]
pub struct Confirmation {
    pub id: String,
    pub nonce: String,
    #[serde(default)]
    pub creator_id: String,
    #[serde(rename = "type", default)]
    pub kind: u32,
    #[serde(default)]
    pub headline: String,
}

#[derive(Deserialize)]
struct ConfirmationList {
    success: bool,
    #[serde(default)]
    conf: Vec<Confirmation>,
    #[serde(default)]
    message: Option<String>,
}

/// Lists and accepts confirmations for one session.
pub struct ConfirmationExecutor<'a> {
    session: &'a SteamSession,
}

impl<'a> ConfirmationExecutor<'a> {
    pub fn new(session: &'a SteamSession) -> Self {
        Self { session }
    }

    fn signed_params(&self, tag: &str) -> Result<Vec<(&'static str, String)>, MarketError> {
        let secrets = self.session.secrets();
        let now = guard::unix_now();
        let key = guard::generate_confirmation_key(&secrets.identity_secret, now, tag)?;
        Ok(vec![
            ("p", guard::generate_device_id(&secrets.steamid)),
            ("a", secrets.steamid.clone()),
            ("k", key),
            ("t", now.to_string()),
            ("m", "react".to_owned()),
            ("tag", tag.to_owned()),
        ])
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, MarketError> {
        let http = self.session.http();
        let response = http
            .client()
            .get(http.urls().community_path(path))
            .query(params)
            .header("X-Requested-With", MOBILE_REQUESTED_WITH)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MarketError::Status {
                context: "mobileconf",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    /// Every confirmation currently waiting.
    pub async fn list(&self) -> Result<Vec<Confirmation>, MarketError> {
        let params = self.signed_params("conf")?;
        let raw = self.get_json("/mobileconf/getlist", &params).await?;
        let list: ConfirmationList = serde_json::from_value(raw)
            .map_err(|e| MarketError::Parse(format!("confirmation list: {e}")))?;
        if !list.success {
            return Err(MarketError::ConfirmationFailed(
                list.message
                    .unwrap_or_else(|| "confirmation list refused".to_owned()),
            ));
        }
        Ok(list.conf)
    }

    /// The HTML detail page of one confirmation.
    pub async fn details(&self, confirmation: &Confirmation) -> Result<String, MarketError> {
        let params = self.signed_params(&format!("details{}", confirmation.id))?;
        let raw = self
            .get_json(&format!("/mobileconf/details/{}", confirmation.id), &params)
            .await?;
        Ok(raw["html"].as_str().unwrap_or_default().to_owned())
    }

    /// Accepts one confirmation.
    pub async fn allow(&self, confirmation: &Confirmation) -> Result<(), MarketError> {
        let mut params = self.signed_params("allow")?;
        params.push(("op", "allow".to_owned()));
        params.push(("cid", confirmation.id.clone()));
        params.push(("ck", confirmation.nonce.clone()));
        let raw = self.get_json("/mobileconf/ajaxop", &params).await?;
        if raw["success"].as_bool() == Some(true) {
            tracing::info!(login = %self.session.login(), id = %confirmation.id, "confirmation accepted");
            Ok(())
        } else {
            Err(MarketError::ConfirmationFailed(format!(
                "steam refused confirmation {}",
                confirmation.id
            )))
        }
    }

    /// Accepts the confirmation whose id (or creator id, e.g. a trade
    /// offer id) is `id`.
    pub async fn confirm_by_id(&self, id: &str) -> Result<Value, MarketError> {
        let pending = self.list().await?;
        let confirmation = pending
            .iter()
            .find(|c| c.id == id || c.creator_id == id)
            .ok_or_else(|| {
                MarketError::ConfirmationFailed(format!("no pending confirmation for {id}"))
            })?;
        self.allow(confirmation).await?;
        Ok(json!({"success": true, "confirmation_id": confirmation.id}))
    }

    /// Accepts the market-listing confirmation for `asset_id`.
    pub async fn confirm_sell_listing(&self, asset_id: &str) -> Result<Value, MarketError> {
        let pending = self.list().await?;
        for confirmation in pending
            .iter()
            .filter(|c| c.kind == CONFIRMATION_TYPE_MARKET_LISTING)
        {
            if self.details(confirmation).await?.contains(asset_id) {
                self.allow(confirmation).await?;
                return Ok(json!({
                    "success": true,
                    "confirmation_id": confirmation.id,
                    "assetid": asset_id,
                }));
            }
        }
        Err(MarketError::ConfirmationFailed(format!(
            "no listing confirmation mentions asset {asset_id}"
        )))
    }
}
