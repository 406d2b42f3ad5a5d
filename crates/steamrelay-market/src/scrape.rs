//! Parsers for the HTML Steam serves on `/market` and its render endpoints.
//!
//! A listing page carries three things that only make sense together:
//!
//! - the listing rows themselves (`id="mylisting_<id>"`,
//!   `id="mybuyorder_<id>"`),
//! - hover scripts mapping each listing to an asset address
//!   (`CreateItemHoverFromContainer(g_rgAssets, 'mylisting_<id>_name',
//!   <app>, '<ctx>', '<asset>', ...)`),
//! - the asset descriptions (`var g_rgAssets = {...};` inline, or the
//!   `assets` field of a render response).
//!
//! [`parse_listings`] reads the rows, [`parse_hovers`] the addresses, and
//! [`Listings::attach_descriptions`] stitches descriptions onto sell rows.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::MarketError;

static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"id="(mylisting|mybuyorder)_(\d+)""#).expect("row regex is valid")
});
static ITEM_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class="market_listing_item_name_link"[^>]*href="([^"]*)"[^>]*>([^<]*)<"#)
        .expect("item name regex is valid")
});
static BUYER_PAYS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"title="This is the price the buyer pays\.">\s*([^<]+?)\s*<"#)
        .expect("buyer price regex is valid")
});
static YOU_RECEIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"title="This is how much you will receive\.">\s*\(?([^<)]+?)\)?\s*<"#)
        .expect("receive price regex is valid")
});
static BUY_QTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)market_listing_inline_buyorder_qty">\s*(\d+)[^<]*</span>\s*([^<]+?)\s*<"#)
        .expect("buy order regex is valid")
});
static HOVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"CreateItemHoverFromContainer\(\s*g_rgAssets\s*,\s*'mylisting_(\d+)_name'\s*,\s*(\d+)\s*,\s*'(\d+)'\s*,\s*'(\d+)'"#,
    )
    .expect("hover regex is valid")
});
static ASSETS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var\s+g_rgAssets\s*=\s*(\{.*?\});\s*\n").expect("assets regex is valid")
});
static SHOWN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span id="tabContentsMyActiveMarketListings_end">(\d+)</span>"#)
        .expect("shown regex is valid")
});
static TOTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span id="tabContentsMyActiveMarketListings_total">([\d,]+)</span>"#)
        .expect("total regex is valid")
});
static WALLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var\s+g_rgWalletInfo\s*=\s*(\{.*?\});").expect("wallet regex is valid")
});

/// Where a listed item lives in the owner's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetAddress {
    pub app_id: String,
    pub context_id: String,
    pub asset_id: String,
}

/// One of the account's active sell listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellListing {
    pub listing_id: String,
    pub item_name: Option<String>,
    pub buyer_pays: Option<String>,
    pub you_receive: Option<String>,
    pub asset: Option<AssetAddress>,
    /// The asset's description from `g_rgAssets`, when found.
    pub description: Option<Value>,
}

/// One of the account's active buy orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuyOrder {
    pub order_id: String,
    pub item_name: Option<String>,
    pub item_link: Option<String>,
    pub quantity: Option<u32>,
    pub price: Option<String>,
}

/// Listings keyed by id, so merging pages can never duplicate one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Listings {
    pub sell_listings: BTreeMap<String, SellListing>,
    pub buy_orders: BTreeMap<String, BuyOrder>,
}

impl Listings {
    /// Fills `asset` and `description` of every sell listing that has a
    /// hover entry. `assets` is shaped `{app: {ctx: {asset_id: desc}}}`.
    pub fn attach_descriptions(&mut self, hovers: &HashMap<String, AssetAddress>, assets: &Value) {
        for (id, listing) in &mut self.sell_listings {
            let Some(address) = hovers.get(id) else {
                continue;
            };
            let description = &assets[&address.app_id][&address.context_id][&address.asset_id];
            if !description.is_null() {
                listing.description = Some(description.clone());
            }
            listing.asset = Some(address.clone());
        }
    }

    /// Adds `other`'s entries; entries already present are replaced.
    pub fn merge(&mut self, other: Listings) {
        self.sell_listings.extend(other.sell_listings);
        self.buy_orders.extend(other.buy_orders);
    }
}

fn capture(re: &Regex, text: &str, group: usize) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(group))
        .map(|m| m.as_str().trim().to_owned())
}

/// Reads every listing row in `html`.
pub fn parse_listings(html: &str) -> Listings {
    let rows: Vec<_> = ROW_RE.captures_iter(html).collect();
    let mut listings = Listings::default();

    for (i, row) in rows.iter().enumerate() {
        let (Some(whole), Some(kind), Some(id)) = (row.get(0), row.get(1), row.get(2)) else {
            continue;
        };
        let end = rows
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(html.len(), |m| m.start());
        let chunk = &html[whole.end()..end];
        let id = id.as_str().to_owned();
        let item_name = capture(&ITEM_NAME_RE, chunk, 2);

        if kind.as_str() == "mylisting" {
            listings.sell_listings.insert(
                id.clone(),
                SellListing {
                    listing_id: id,
                    item_name,
                    buyer_pays: capture(&BUYER_PAYS_RE, chunk, 1),
                    you_receive: capture(&YOU_RECEIVE_RE, chunk, 1),
                    asset: None,
                    description: None,
                },
            );
        } else {
            listings.buy_orders.insert(
                id.clone(),
                BuyOrder {
                    order_id: id,
                    item_name,
                    item_link: capture(&ITEM_NAME_RE, chunk, 1),
                    quantity: capture(&BUY_QTY_RE, chunk, 1).and_then(|q| q.parse().ok()),
                    price: capture(&BUY_QTY_RE, chunk, 2),
                },
            );
        }
    }
    listings
}

/// Maps listing id to asset address from hover scripts.
pub fn parse_hovers(html: &str) -> HashMap<String, AssetAddress> {
    HOVER_RE
        .captures_iter(html)
        .map(|c| {
            (
                c[1].to_owned(),
                AssetAddress {
                    app_id: c[2].to_owned(),
                    context_id: c[3].to_owned(),
                    asset_id: c[4].to_owned(),
                },
            )
        })
        .collect()
}

/// The inline `g_rgAssets` object, or an empty object when absent.
pub fn parse_inline_assets(html: &str) -> Result<Value, MarketError> {
    match ASSETS_RE.captures(html) {
        Some(c) => serde_json::from_str(&c[1])
            .map_err(|e| MarketError::Parse(format!("g_rgAssets: {e}"))),
        None => Ok(Value::Object(Default::default())),
    }
}

/// `(shown, total)` active sell listings, when the page reports them.
pub fn listing_counts(html: &str) -> Option<(u32, u32)> {
    let shown = capture(&SHOWN_RE, html, 1)?.parse().ok()?;
    let total = capture(&TOTAL_RE, html, 1)?.replace(',', "").parse().ok()?;
    Some((shown, total))
}

/// Everything the full `/market` page yields.
pub fn parse_market_page(html: &str) -> Result<Listings, MarketError> {
    let assets = parse_inline_assets(html)?;
    let mut listings = parse_listings(html);
    listings.attach_descriptions(&parse_hovers(html), &assets);
    Ok(listings)
}

/// Everything a JSON render response (`results_html`, `hovers`,
/// `assets`) yields.
pub fn parse_render_response(json: &Value) -> Listings {
    let html = json["results_html"].as_str().unwrap_or_default();
    let hovers = json["hovers"].as_str().unwrap_or_default();
    let mut listings = parse_listings(html);
    listings.attach_descriptions(&parse_hovers(hovers), &json["assets"]);
    listings
}

/// The `g_rgWalletInfo` object embedded in market pages.
pub fn parse_wallet_info(html: &str) -> Result<Value, MarketError> {
    let raw = capture(&WALLET_RE, html, 1)
        .ok_or_else(|| MarketError::Parse("g_rgWalletInfo not found".into()))?;
    serde_json::from_str(&raw).map_err(|e| MarketError::Parse(format!("g_rgWalletInfo: {e}")))
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// A sell row in the shape Steam renders it.
    pub fn sell_row(id: u64, asset: u64) -> String {
        format!(
            r#"<div class="market_listing_row market_recent_listing_row listing_{id}" id="mylisting_{id}">
  <span class="market_listing_price">
    <span style="display: inline-block">
      <span title="This is the price the buyer pays.">$1.15</span>
      <br>
      <span title="This is how much you will receive.">($1.00)</span>
    </span>
  </span>
  <span class="market_listing_item_name_block">
    <span id="mylisting_{id}_name" class="market_listing_item_name"><a class="market_listing_item_name_link" href="https://steamcommunity.com/market/listings/730/Item%20{asset}">Item {asset}</a></span>
  </span>
</div>
"#
        )
    }

    pub fn hover(id: u64, asset: u64) -> String {
        format!(
            "CreateItemHoverFromContainer( g_rgAssets, 'mylisting_{id}_name', 730, '2', '{asset}', 0 );\n"
        )
    }

    pub fn buy_row(id: u64) -> String {
        format!(
            r#"<div class="market_listing_row market_recent_listing_row" id="mybuyorder_{id}">
  <span class="market_listing_price">
    <span class="market_listing_inline_buyorder_qty">2 @</span>
    $0.03
  </span>
  <a class="market_listing_item_name_link" href="https://steamcommunity.com/market/listings/730/Case">Case</a>
</div>
"#
        )
    }

    /// A full `/market` page with sell rows `ids`, one buy order, and the
    /// given counters.
    pub fn market_page(ids: std::ops::Range<u64>, shown: u32, total: u32) -> String {
        let mut page = String::from("<html><script>\nvar g_rgAssets = {\"730\":{\"2\":{");
        let assets: Vec<String> = ids
            .clone()
            .map(|id| format!("\"{}\":{{\"market_hash_name\":\"Item {}\"}}", id + 1000, id + 1000))
            .collect();
        page.push_str(&assets.join(","));
        page.push_str("}}};\nvar g_rgWalletInfo = {\"wallet_currency\":1,\"wallet_balance\":12345,\"wallet_delayed_balance\":50};\n</script>\n");
        for id in ids.clone() {
            page.push_str(&sell_row(id, id + 1000));
        }
        page.push_str(&buy_row(9001));
        page.push_str(&format!(
            "<span id=\"tabContentsMyActiveMarketListings_end\">{shown}</span>\n\
             <span id=\"tabContentsMyActiveMarketListings_total\">{total}</span>\n<script>\n"
        ));
        for id in ids {
            page.push_str(&hover(id, id + 1000));
        }
        page.push_str("</script></html>");
        page
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_listings_reads_sell_and_buy_rows() {
        let html = format!("{}{}", sell_row(11, 500), buy_row(22));
        let listings = parse_listings(&html);

        let sell = &listings.sell_listings["11"];
        assert_eq!(sell.item_name.as_deref(), Some("Item 500"));
        assert_eq!(sell.buyer_pays.as_deref(), Some("$1.15"));
        assert_eq!(sell.you_receive.as_deref(), Some("$1.00"));

        let buy = &listings.buy_orders["22"];
        assert_eq!(buy.quantity, Some(2));
        assert_eq!(buy.price.as_deref(), Some("$0.03"));
        assert_eq!(buy.item_name.as_deref(), Some("Case"));
    }

    #[test]
    fn test_parse_listings_ignores_name_span_ids() {
        let listings = parse_listings(&sell_row(11, 500));
        assert_eq!(listings.sell_listings.len(), 1);
    }

    #[test]
    fn test_parse_market_page_attaches_descriptions() {
        let listings = parse_market_page(&market_page(1..4, 3, 3)).unwrap();

        assert_eq!(listings.sell_listings.len(), 3);
        let first = &listings.sell_listings["1"];
        assert_eq!(first.asset.as_ref().map(|a| a.asset_id.as_str()), Some("1001"));
        assert_eq!(
            first.description.as_ref().unwrap()["market_hash_name"],
            "Item 1001"
        );
        assert_eq!(listings.buy_orders.len(), 1);
    }

    #[test]
    fn test_listing_counts_strips_thousands_separator() {
        let html = "<span id=\"tabContentsMyActiveMarketListings_end\">100</span>\
                    <span id=\"tabContentsMyActiveMarketListings_total\">1,250</span>";
        assert_eq!(listing_counts(html), Some((100, 1250)));
        assert_eq!(listing_counts("<html></html>"), None);
    }

    #[test]
    fn test_parse_inline_assets_absent_is_empty_object() {
        assert_eq!(parse_inline_assets("<html/>").unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_parse_render_response_uses_json_assets() {
        let json = serde_json::json!({
            "results_html": sell_row(7, 70),
            "hovers": hover(7, 70),
            "assets": {"730": {"2": {"70": {"name": "seventy"}}}}
        });
        let listings = parse_render_response(&json);
        assert_eq!(
            listings.sell_listings["7"].description.as_ref().unwrap()["name"],
            "seventy"
        );
    }

    #[test]
    fn test_parse_wallet_info() {
        let wallet = parse_wallet_info(&market_page(0..0, 0, 0)).unwrap();
        assert_eq!(wallet["wallet_balance"], 12345);
        assert!(parse_wallet_info("<html/>").is_err());
    }

    #[test]
    fn test_merge_replaces_duplicates() {
        let mut a = parse_listings(&sell_row(1, 10));
        a.merge(parse_listings(&format!("{}{}", sell_row(1, 10), sell_row(2, 20))));
        assert_eq!(a.sell_listings.len(), 2);
    }
}
