//! Game and currency identifiers used by inventory and market commands.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::WireError;

/// An (app id, context id) pair addressing one Steam inventory.
///
/// Both parts stay strings because that is how Steam's endpoints and the
/// callers' JSON carry them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameOptions {
    pub app_id: String,
    pub context_id: String,
}

impl GameOptions {
    /// Counter-Strike 2.
    pub fn cs() -> Self {
        Self::new("730", "2")
    }

    /// Dota 2.
    pub fn dota2() -> Self {
        Self::new("570", "2")
    }

    /// Team Fortress 2.
    pub fn tf2() -> Self {
        Self::new("440", "2")
    }

    /// Steam community items (trading cards, backgrounds).
    pub fn steam() -> Self {
        Self::new("753", "6")
    }

    pub fn new(app_id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            context_id: context_id.into(),
        }
    }

    /// Picks the inventory context for `app_id`.
    ///
    /// Known games ignore `context_id` and use their fixed context.
    /// Other apps use `context_id`, falling back to `"2"`.
    pub fn resolve(app_id: &str, context_id: Option<&str>) -> Self {
        match app_id {
            "730" => Self::cs(),
            "570" => Self::dota2(),
            "440" => Self::tf2(),
            "753" => Self::steam(),
            other => Self::new(other, context_id.unwrap_or("2")),
        }
    }
}

impl fmt::Display for GameOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_id, self.context_id)
    }
}

/// A Steam wallet currency code (1 = USD, 3 = EUR, 5 = RUB, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Currency(u32);

impl Currency {
    pub const USD: Self = Self(1);
    pub const EUR: Self = Self(3);

    /// Highest currency code Steam currently assigns.
    pub const MAX_CODE: u32 = 47;

    /// Validates a raw currency code.
    ///
    /// # Errors
    /// Returns [`WireError::InvalidArgument`] for codes outside
    /// `1..=MAX_CODE`.
    pub fn new(code: u32) -> Result<Self, WireError> {
        if (1..=Self::MAX_CODE).contains(&code) {
            Ok(Self(code))
        } else {
            Err(WireError::InvalidArgument(format!(
                "invalid currency value: {code}"
            )))
        }
    }

    pub fn code(self) -> u32 {
        self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::USD
    }
}

impl TryFrom<u32> for Currency {
    type Error = WireError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<Currency> for u32 {
    fn from(c: Currency) -> Self {
        c.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_games_use_fixed_context() {
        assert_eq!(GameOptions::resolve("730", Some("9")), GameOptions::cs());
        assert_eq!(GameOptions::resolve("570", None).context_id, "2");
        assert_eq!(GameOptions::resolve("440", None).context_id, "2");
        assert_eq!(GameOptions::resolve("753", None).context_id, "6");
    }

    #[test]
    fn test_resolve_unknown_app_uses_given_context_or_two() {
        assert_eq!(
            GameOptions::resolve("252490", Some("5")),
            GameOptions::new("252490", "5")
        );
        assert_eq!(
            GameOptions::resolve("252490", None),
            GameOptions::new("252490", "2")
        );
    }

    #[test]
    fn test_currency_new_rejects_out_of_range() {
        assert!(Currency::new(0).is_err());
        assert!(Currency::new(Currency::MAX_CODE + 1).is_err());
        assert_eq!(Currency::new(5).unwrap().code(), 5);
    }

    #[test]
    fn test_currency_deserialize_validates() {
        let ok: Currency = serde_json::from_str("3").unwrap();
        assert_eq!(ok, Currency::EUR);
        assert!(serde_json::from_str::<Currency>("999").is_err());
    }
}
