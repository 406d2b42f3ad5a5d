//! Request/response over a [`Relay`], with fail-fast on silence.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;
use steamrelay_protocol::{Command, CommandEnvelope, RelayRequest, RequestId, ResponseEnvelope};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{BridgeError, Relay, Unreachable, UnreachablePolicy};

/// Error texts the gateway uses when it could not hand a command over.
const GATEWAY_OFFLINE_MARKERS: [&str; 2] = ["Agent is offline", "Failed to send command"];

/// The caller side of the relay.
///
/// One bridge is shared by every caller in the process. Each call gets
/// a fresh random `request_id`, so concurrent calls never see each
/// other's responses.
pub struct RpcBridge<R: Relay> {
    relay: R,
    policy: UnreachablePolicy,
    quarantined: Mutex<HashSet<String>>,
}

impl<R: Relay> RpcBridge<R> {
    pub fn new(relay: R, policy: UnreachablePolicy) -> Self {
        Self {
            relay,
            policy,
            quarantined: Mutex::new(HashSet::new()),
        }
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub async fn is_quarantined(&self, target_token: &str) -> bool {
        self.quarantined.lock().await.contains(target_token)
    }

    /// Lifts the quarantine on `target_token`, e.g. after its agent was
    /// restarted. Returns `false` if it wasn't quarantined.
    pub async fn release(&self, target_token: &str) -> bool {
        self.quarantined.lock().await.remove(target_token)
    }

    /// Runs `command` on `account_login` through the agent holding
    /// `target_token` and returns its `result`.
    ///
    /// # Errors
    /// [`BridgeError::AgentUnreachable`] if nothing came back within
    /// `timeout` (after the [`UnreachablePolicy`] ran),
    /// [`BridgeError::Remote`] if the agent answered with an error.
    pub async fn call(
        &self,
        target_token: &str,
        account_login: &str,
        command: &Command,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        let response = self
            .call_raw(target_token, account_login, command.name(), command.to_args(), timeout)
            .await?;
        if response.is_success() {
            return Ok(response.result.unwrap_or(Value::Null));
        }
        Err(BridgeError::Remote {
            cmd: command.name().to_owned(),
            code: response.code,
            message: response
                .message
                .unwrap_or_else(|| "unknown error".to_owned()),
        })
    }

    /// Like [`call`](Self::call) with an untyped `cmd`/`args` pair,
    /// returning the whole response envelope.
    ///
    /// Error responses are returned as-is, except the gateway's own
    /// "agent offline" reports, which count as unreachable.
    pub async fn call_raw(
        &self,
        target_token: &str,
        account_login: &str,
        cmd: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<ResponseEnvelope, BridgeError> {
        if self.is_quarantined(target_token).await {
            return Err(BridgeError::Quarantined(target_token.to_owned()));
        }

        let request_id = RequestId::from(Uuid::new_v4().to_string());
        let request = RelayRequest {
            target_token: target_token.to_owned(),
            envelope: CommandEnvelope {
                cmd: cmd.to_owned(),
                account_login: account_login.to_owned(),
                args,
                request_id: request_id.clone(),
            },
        };
        self.relay.publish(&request).await?;
        tracing::debug!(%request_id, cmd, login = account_login, "command published");

        let Some(response) = self.relay.wait_response(&request_id, timeout).await? else {
            let reason = format!("no response within {timeout:?}");
            return Err(self.unreachable(&request, reason).await);
        };
        if response.request_id != request_id {
            return Err(BridgeError::Relay(format!(
                "expected response to {request_id}, got {}",
                response.request_id
            )));
        }

        if !response.is_success() {
            let message = response.message.as_deref().unwrap_or_default();
            if GATEWAY_OFFLINE_MARKERS.iter().any(|m| message.contains(m)) {
                let reason = message.to_owned();
                return Err(self.unreachable(&request, reason).await);
            }
        }
        Ok(response)
    }

    async fn unreachable(&self, request: &RelayRequest, reason: String) -> BridgeError {
        let target = &request.target_token;
        let envelope = &request.envelope;
        match &self.policy {
            UnreachablePolicy::ExitProcess => {
                tracing::error!(
                    cmd = %envelope.cmd,
                    login = %envelope.account_login,
                    request_id = %envelope.request_id,
                    %reason,
                    "agent unreachable, terminating"
                );
                std::process::exit(1)
            }
            UnreachablePolicy::Quarantine(supervisor) => {
                tracing::error!(
                    cmd = %envelope.cmd,
                    login = %envelope.account_login,
                    request_id = %envelope.request_id,
                    %reason,
                    "agent unreachable, quarantined"
                );
                self.quarantined.lock().await.insert(target.clone());
                let report = Unreachable {
                    target_token: target.clone(),
                    account_login: envelope.account_login.clone(),
                    cmd: envelope.cmd.clone(),
                    reason: reason.clone(),
                };
                if supervisor.send(report).is_err() {
                    tracing::warn!("unreachable report dropped, supervisor gone");
                }
                BridgeError::AgentUnreachable {
                    target: target.clone(),
                    reason,
                }
            }
        }
    }
}
