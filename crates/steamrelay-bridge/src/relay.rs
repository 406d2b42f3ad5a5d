//! The relay seam: publish a request, then block for its response.

use std::time::Duration;

use steamrelay_protocol::{RelayRequest, RequestId, ResponseEnvelope};

use crate::BridgeError;

/// A message relay between callers and the gateway.
///
/// Requests fan out on a topic; each response comes back on its own
/// per-request slot and is consumed by exactly one waiter.
/// Implementations must allow many waits in flight at once.
pub trait Relay: Send + Sync + 'static {
    /// Publishes `request` for the gateway to forward to its agent.
    ///
    /// Publishing with nobody listening is not an error; the wait that
    /// follows simply times out.
    fn publish(
        &self,
        request: &RelayRequest,
    ) -> impl Future<Output = Result<(), BridgeError>> + Send;

    /// Waits up to `timeout` for the response to `request_id`.
    ///
    /// `Ok(None)` means nothing arrived in time.
    fn wait_response(
        &self,
        request_id: &RequestId,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<ResponseEnvelope>, BridgeError>> + Send;
}
