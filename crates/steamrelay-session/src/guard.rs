//! Steam Guard mobile-authenticator math.
//!
//! The maFile of every account carries two base64 secrets:
//!
//! - `shared_secret` produces the 5-character login codes
//!   ([`generate_one_time_code`]), a TOTP variant with a 30-second step
//!   and Steam's own alphabet.
//! - `identity_secret` signs mobile confirmation requests
//!   ([`generate_confirmation_key`]).
//!
//! All functions take the timestamp explicitly so they're deterministic;
//! [`unix_now`] supplies the real clock.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};

use crate::SessionError;

type HmacSha1 = Hmac<Sha1>;

/// Characters Steam uses for guard codes (no vowels, no look-alikes).
const CODE_ALPHABET: &[u8] = b"23456789BCDFGHJKMNPQRTVWXY";
const CODE_LENGTH: usize = 5;
const STEP_SECS: u64 = 30;

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn hmac_sha1(secret_b64: &str, message: &[u8]) -> Result<[u8; 20], SessionError> {
    let key = STANDARD
        .decode(secret_b64.trim())
        .map_err(|e| SessionError::InvalidSecret(e.to_string()))?;
    let mut mac = HmacSha1::new_from_slice(&key)
        .map_err(|e| SessionError::InvalidSecret(e.to_string()))?;
    mac.update(message);
    let mut out = [0u8; 20];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Computes the Steam Guard login code valid at `timestamp`.
///
/// # Errors
/// Returns [`SessionError::InvalidSecret`] if `shared_secret` is not
/// valid base64.
pub fn generate_one_time_code(shared_secret: &str, timestamp: u64) -> Result<String, SessionError> {
    let digest = hmac_sha1(shared_secret, &(timestamp / STEP_SECS).to_be_bytes())?;

    // Dynamic truncation: the low nibble of the last byte picks a
    // 4-byte window, top bit masked off.
    let offset = usize::from(digest[19] & 0x0f);
    let window = [
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ];
    let mut full = u32::from_be_bytes(window) & 0x7fff_ffff;

    let base = CODE_ALPHABET.len() as u32;
    let mut code = String::with_capacity(CODE_LENGTH);
    for _ in 0..CODE_LENGTH {
        code.push(char::from(CODE_ALPHABET[(full % base) as usize]));
        full /= base;
    }
    Ok(code)
}

/// Computes the base64 signature for a mobile confirmation call.
///
/// `tag` names the operation (`"conf"` to list, `"details"`, `"allow"`,
/// `"cancel"`).
pub fn generate_confirmation_key(
    identity_secret: &str,
    timestamp: u64,
    tag: &str,
) -> Result<String, SessionError> {
    let mut message = timestamp.to_be_bytes().to_vec();
    message.extend_from_slice(tag.as_bytes());
    let digest = hmac_sha1(identity_secret, &message)?;
    Ok(STANDARD.encode(digest))
}

/// Derives the mobile device id Steam expects for `steamid`:
/// `android:` followed by the SHA-1 hex digest laid out as a UUID.
pub fn generate_device_id(steamid: &str) -> String {
    let hex: String = Sha1::digest(steamid.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!(
        "android:{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
