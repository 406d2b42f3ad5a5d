//! The Steam web login protocol as an explicit state machine.
//!
//! One [`AuthSession`] drives one login attempt:
//!
//! ```text
//! Init → WarmedUp → RsaFetched → CredentialsSubmitted → GuardUpdated
//!      → Polled → Finalized → TokensSet → Established
//!
//! (any step) ──error──→ Failed
//! ```
//!
//! Each transition is one method below. A failed step ends the attempt:
//! the caller gets a [`SessionError::Protocol`] naming the step, and the
//! half-built cookie jar is dropped with the `AuthSession`.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::RequestBuilder;
use reqwest::multipart::Form;
use rsa::rand_core::OsRng;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPublicKey};
use serde_json::Value;

use crate::eresult::{self, ERESULT_OK};
use crate::{Credential, SessionError, SteamHttp, SteamSession, SteamUrls, guard};

/// How many times a key response without modulus/exponent is re-requested.
const RSA_FETCH_RETRIES: usize = 5;

/// `code_type` for a mobile-authenticator code.
const GUARD_CODE_TYPE_DEVICE: &str = "3";

// ---------------------------------------------------------------------------
// LoginStep
// ---------------------------------------------------------------------------

/// Where an [`AuthSession`] is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    Init,
    WarmedUp,
    RsaFetched,
    CredentialsSubmitted,
    GuardUpdated,
    Polled,
    Finalized,
    TokensSet,
    Established,
    Failed,
}

impl LoginStep {
    /// Returns `true` for `Established` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Established | Self::Failed)
    }

    /// The step reached by succeeding at the current one.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::WarmedUp),
            Self::WarmedUp => Some(Self::RsaFetched),
            Self::RsaFetched => Some(Self::CredentialsSubmitted),
            Self::CredentialsSubmitted => Some(Self::GuardUpdated),
            Self::GuardUpdated => Some(Self::Polled),
            Self::Polled => Some(Self::Finalized),
            Self::Finalized => Some(Self::TokensSet),
            Self::TokensSet => Some(Self::Established),
            Self::Established | Self::Failed => None,
        }
    }
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Per-step data
// ---------------------------------------------------------------------------

/// The account's RSA public key as served by Steam.
#[derive(Debug, Clone)]
pub struct RsaKey {
    pub modulus_hex: String,
    pub exponent_hex: String,
    pub timestamp: String,
}

/// A nonce/auth pair from `transfer_info`, redeemed on one domain.
#[derive(Debug, Clone, Default)]
struct TransferToken {
    nonce: String,
    auth: String,
}

/// Encrypts `password` with PKCS#1 v1.5 and base64-encodes the result.
pub fn encrypt_password(password: &str, key: &RsaKey) -> Result<String, SessionError> {
    let step = LoginStep::RsaFetched;
    let n = BigUint::parse_bytes(key.modulus_hex.as_bytes(), 16)
        .ok_or_else(|| SessionError::protocol(step, "rsa modulus is not hex"))?;
    let e = BigUint::parse_bytes(key.exponent_hex.as_bytes(), 16)
        .ok_or_else(|| SessionError::protocol(step, "rsa exponent is not hex"))?;
    let public = RsaPublicKey::new(n, e)
        .map_err(|err| SessionError::protocol(step, format!("rsa key rejected: {err}")))?;
    let encrypted = public
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, password.as_bytes())
        .map_err(|err| SessionError::protocol(step, format!("rsa encryption failed: {err}")))?;
    Ok(STANDARD.encode(encrypted))
}

fn parse_json(step: LoginStep, body: &str) -> Result<Value, SessionError> {
    serde_json::from_str(body).map_err(|e| {
        SessionError::protocol(step, format!("malformed JSON ({e}); body: {body}"))
    })
}

/// Reads a string field that Steam may serialize as a number.
fn field_str(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// AuthSession
// ---------------------------------------------------------------------------

/// One login attempt for one account.
pub struct AuthSession {
    http: SteamHttp,
    login: String,
    password: String,
    shared_secret: String,
    credential: Credential,
    state: LoginStep,
    client_id: String,
    steamid: String,
    request_id: String,
    refresh_token: String,
    store_token: TransferToken,
    community_token: TransferToken,
}

impl AuthSession {
    /// Prepares an attempt. `http` should carry a fresh cookie jar.
    pub fn new(http: SteamHttp, credential: &Credential) -> Self {
        Self {
            http,
            login: credential.login.clone(),
            password: credential.password.clone(),
            shared_secret: credential.secrets.shared_secret.clone(),
            credential: credential.clone(),
            state: LoginStep::Init,
            client_id: String::new(),
            steamid: String::new(),
            request_id: String::new(),
            refresh_token: String::new(),
            store_token: TransferToken::default(),
            community_token: TransferToken::default(),
        }
    }

    pub fn state(&self) -> LoginStep {
        self.state
    }

    /// Runs the whole protocol and returns the established session.
    pub async fn login(mut self) -> Result<SteamSession, SessionError> {
        self.run().await?;
        self.into_session()
    }

    /// Drives every remaining step. On error the state becomes `Failed`.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        tracing::debug!(login = %self.login, "starting login");
        match self.drive().await {
            Ok(()) => {
                tracing::info!(login = %self.login, steamid = %self.steamid, "login established");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(login = %self.login, step = %self.state, error = %e, "login failed");
                self.state = LoginStep::Failed;
                Err(e)
            }
        }
    }

    /// Hands over the authenticated client once the attempt succeeded.
    pub fn into_session(self) -> Result<SteamSession, SessionError> {
        if self.state != LoginStep::Established {
            return Err(SessionError::protocol(
                self.state,
                "login did not reach Established",
            ));
        }
        Ok(SteamSession::new(self.http, &self.credential))
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        self.warm_up().await?;
        let key = self.fetch_rsa_key().await?;
        let encrypted = encrypt_password(&self.password, &key)?;
        self.begin_auth_session(&encrypted, &key.timestamp).await?;
        self.submit_guard_code(guard::unix_now()).await?;
        self.poll_status().await?;
        let transfer = self.finalize().await?;
        self.set_tokens(transfer).await?;
        self.establish().await
    }

    fn advance(&mut self, to: LoginStep) {
        debug_assert_eq!(self.state.next(), Some(to));
        tracing::debug!(login = %self.login, from = %self.state, to = %to, "login step");
        self.state = to;
    }

    /// Adds the `Referer`/`Origin` pair Steam checks on API calls.
    fn with_origin(&self, request: RequestBuilder) -> RequestBuilder {
        let community = &self.http.urls().community;
        request
            .header("Referer", format!("{community}/"))
            .header("Origin", community.as_str())
    }

    /// Step 1: hit the community root so anti-automation cookies (and the
    /// first `sessionid`) are set.
    async fn warm_up(&mut self) -> Result<(), SessionError> {
        let community = self.http.urls().community.clone();
        self.http.client().post(&community).send().await?;
        self.http.client().get(&community).send().await?;
        self.advance(LoginStep::WarmedUp);
        Ok(())
    }

    /// Step 2: fetch the account's RSA key, re-asking when Steam answers
    /// without one.
    async fn fetch_rsa_key(&mut self) -> Result<RsaKey, SessionError> {
        let url = self.http.urls().auth_service("GetPasswordRSAPublicKey");
        for attempt in 0..=RSA_FETCH_RETRIES {
            let request = self
                .http
                .client()
                .get(&url)
                .query(&[("account_name", self.login.as_str())]);
            let body = self.with_origin(request).send().await?.text().await?;
            let json = parse_json(LoginStep::RsaFetched, &body)?;
            let response = &json["response"];
            let key = match (
                field_str(response, "publickey_mod"),
                field_str(response, "publickey_exp"),
                field_str(response, "timestamp"),
            ) {
                (Some(modulus_hex), Some(exponent_hex), Some(timestamp)) => RsaKey {
                    modulus_hex,
                    exponent_hex,
                    timestamp,
                },
                _ => {
                    tracing::debug!(login = %self.login, attempt, "rsa key response incomplete");
                    continue;
                }
            };
            self.advance(LoginStep::RsaFetched);
            return Ok(key);
        }
        Err(SessionError::protocol(
            LoginStep::RsaFetched,
            "could not obtain rsa key",
        ))
    }

    /// Step 3/4: submit the encrypted password and check `x-eresult`.
    async fn begin_auth_session(
        &mut self,
        encrypted_password: &str,
        timestamp: &str,
    ) -> Result<(), SessionError> {
        let step = LoginStep::CredentialsSubmitted;
        let url = self.http.urls().auth_service("BeginAuthSessionViaCredentials");
        let form = [
            ("persistence", "1"),
            ("encrypted_password", encrypted_password),
            ("account_name", self.login.as_str()),
            ("encryption_timestamp", timestamp),
        ];
        let request = self.http.client().post(&url).form(&form);
        let response = self.with_origin(request).send().await?;

        let eresult = response
            .headers()
            .get("x-eresult")
            .ok_or_else(|| SessionError::protocol(step, "x-eresult header missing"))?
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .ok_or_else(|| SessionError::protocol(step, "x-eresult header is not a number"))?;
        if eresult != ERESULT_OK {
            return Err(SessionError::protocol(step, eresult::failure_message(eresult)));
        }

        // Step 5: identifiers for the rest of the exchange.
        let body = response.text().await?;
        let json = parse_json(step, &body)?;
        let inner = &json["response"];
        match (
            field_str(inner, "client_id"),
            field_str(inner, "steamid"),
            field_str(inner, "request_id"),
        ) {
            (Some(client_id), Some(steamid), Some(request_id)) => {
                self.client_id = client_id;
                self.steamid = steamid;
                self.request_id = request_id;
            }
            _ => {
                return Err(SessionError::protocol(
                    step,
                    format!("client_id/steamid/request_id missing; body: {body}"),
                ));
            }
        }
        self.advance(step);
        Ok(())
    }

    /// Step 6: answer the Steam Guard challenge with the current code.
    async fn submit_guard_code(&mut self, now: u64) -> Result<(), SessionError> {
        let code = guard::generate_one_time_code(&self.shared_secret, now)?;
        let url = self.http.urls().auth_service("UpdateAuthSessionWithSteamGuardCode");
        let form = [
            ("client_id", self.client_id.as_str()),
            ("steamid", self.steamid.as_str()),
            ("code_type", GUARD_CODE_TYPE_DEVICE),
            ("code", code.as_str()),
        ];
        let request = self.http.client().post(&url).form(&form);
        self.with_origin(request).send().await?;
        self.advance(LoginStep::GuardUpdated);
        Ok(())
    }

    /// Step 7: poll once for the refresh token.
    async fn poll_status(&mut self) -> Result<(), SessionError> {
        let step = LoginStep::Polled;
        let url = self.http.urls().auth_service("PollAuthSessionStatus");
        let form = [
            ("client_id", self.client_id.as_str()),
            ("request_id", self.request_id.as_str()),
        ];
        let request = self.http.client().post(&url).form(&form);
        let body = self.with_origin(request).send().await?.text().await?;
        let json = parse_json(step, &body)?;
        self.refresh_token = field_str(&json["response"], "refresh_token").ok_or_else(|| {
            SessionError::protocol(step, "no refresh_token (guard code rejected?)")
        })?;
        self.advance(step);
        Ok(())
    }

    /// Step 8: trade the refresh token for per-domain transfer tokens.
    async fn finalize(&mut self) -> Result<[TransferToken; 2], SessionError> {
        let step = LoginStep::Finalized;
        let community = self.http.urls().community.clone();
        let session_id = self
            .http
            .session_id()
            .ok_or_else(|| SessionError::protocol(step, "sessionid cookie not set"))?;
        let redir = format!("{community}/login/home/?goto=");
        let form = Form::new()
            .text("nonce", self.refresh_token.clone())
            .text("sessionid", session_id)
            .text("redir", redir.clone());

        let body = self
            .http
            .client()
            .post(self.http.urls().finalize_login())
            .header("Referer", redir)
            .header("Origin", community)
            .multipart(form)
            .send()
            .await?
            .text()
            .await?;
        if body.trim().is_empty() {
            return Err(SessionError::protocol(step, "empty finalizelogin response"));
        }
        let json = parse_json(step, &body)?;
        let token = |idx: usize| -> Option<TransferToken> {
            let params = &json["transfer_info"].get(idx)?["params"];
            Some(TransferToken {
                nonce: field_str(params, "nonce")?,
                auth: field_str(params, "auth")?,
            })
        };
        match (token(0), token(1)) {
            (Some(store), Some(community)) => {
                self.advance(step);
                Ok([store, community])
            }
            _ => Err(SessionError::protocol(
                step,
                format!("transfer_info incomplete; body: {body}"),
            )),
        }
    }

    /// Step 9: redeem the transfer tokens on community and store.
    async fn set_tokens(&mut self, [store, community]: [TransferToken; 2]) -> Result<(), SessionError> {
        self.store_token = store;
        self.community_token = community;
        let urls = self.http.urls().clone();
        for (base, token) in [
            (&urls.community, &self.community_token),
            (&urls.store, &self.store_token),
        ] {
            let form = [
                ("nonce", token.nonce.as_str()),
                ("auth", token.auth.as_str()),
                ("steamID", self.steamid.as_str()),
            ];
            self.http
                .client()
                .post(SteamUrls::set_token(base))
                .form(&form)
                .send()
                .await?;
        }
        self.advance(LoginStep::TokensSet);
        Ok(())
    }

    /// Step 10: browser-like cookies, one authenticated page load, and
    /// the `sessionid` pinned on both domains.
    async fn establish(&mut self) -> Result<(), SessionError> {
        let step = LoginStep::Established;
        let urls = self.http.urls().clone();
        for base in [&urls.community, &urls.store] {
            self.http.set_cookie(base, "steamRememberLogin", "true");
            self.http.set_cookie(base, "timezoneOffset", "14400,0");
        }
        self.http
            .client()
            .get(urls.community_path("/my/home/"))
            .header("Accept", "application/json, text/plain, */*")
            .send()
            .await?;
        let session_id = self
            .http
            .session_id()
            .ok_or_else(|| SessionError::protocol(step, "sessionid missing after login"))?;
        self.http.set_cookie(&urls.community, "sessionid", &session_id);
        self.http.set_cookie(&urls.store, "sessionid", &session_id);
        self.advance(step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_step_next_follows_protocol_order() {
        let mut step = LoginStep::Init;
        let mut seen = vec![step];
        while let Some(next) = step.next() {
            seen.push(next);
            step = next;
        }
        assert_eq!(seen.len(), 9);
        assert_eq!(step, LoginStep::Established);
        assert_eq!(LoginStep::Failed.next(), None);
    }

    #[test]
    fn test_login_step_terminal_states() {
        assert!(LoginStep::Established.is_terminal());
        assert!(LoginStep::Failed.is_terminal());
        assert!(!LoginStep::Polled.is_terminal());
    }

    #[test]
    fn test_encrypt_password_produces_modulus_sized_ciphertext() {
        let key = RsaKey {
            modulus_hex: "ff".repeat(256),
            exponent_hex: "010001".into(),
            timestamp: "1".into(),
        };
        let encoded = encrypt_password("hunter2", &key).unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap().len(), 256);
    }

    #[test]
    fn test_encrypt_password_rejects_non_hex_modulus() {
        let key = RsaKey {
            modulus_hex: "zz".into(),
            exponent_hex: "010001".into(),
            timestamp: "1".into(),
        };
        let err = encrypt_password("x", &key).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol { step: LoginStep::RsaFetched, .. }
        ));
    }

    #[test]
    fn test_field_str_accepts_numbers() {
        let v = serde_json::json!({"client_id": 123, "steamid": "765", "empty": ""});
        assert_eq!(field_str(&v, "client_id").as_deref(), Some("123"));
        assert_eq!(field_str(&v, "steamid").as_deref(), Some("765"));
        assert_eq!(field_str(&v, "empty"), None);
    }
}
