//! In-process relay.
//!
//! [`MemoryRelay`] is the caller half; [`MemoryGateway`] is what a test
//! (or an embedded gateway) reads requests from and answers through.
//!
//! ```text
//!  RpcBridge ──publish──► mpsc ──► MemoryGateway::next_request
//!      ▲                                   │
//!      └── oneshot per request_id ◄── MemoryResponder::respond
//! ```
//!
//! The oneshot pair for a request is created when it is published, so a
//! response that races ahead of the wait is kept, and a second response
//! for the same id finds the sender already taken.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use steamrelay_protocol::{RelayRequest, RequestId, ResponseEnvelope};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::{BridgeError, Relay};

#[derive(Default)]
struct Slot {
    tx: Option<oneshot::Sender<ResponseEnvelope>>,
    rx: Option<oneshot::Receiver<ResponseEnvelope>>,
}

type Slots = Arc<Mutex<HashMap<RequestId, Slot>>>;

// ---------------------------------------------------------------------------
// MemoryRelay
// ---------------------------------------------------------------------------

/// Caller half of an in-process relay.
pub struct MemoryRelay {
    outbound: mpsc::UnboundedSender<RelayRequest>,
    slots: Slots,
}

impl MemoryRelay {
    /// Creates a connected relay/gateway pair.
    pub fn new() -> (Self, MemoryGateway) {
        let (outbound, requests) = mpsc::unbounded_channel();
        let slots = Slots::default();
        let gateway = MemoryGateway {
            requests,
            responder: MemoryResponder {
                slots: Arc::clone(&slots),
            },
        };
        (Self { outbound, slots }, gateway)
    }

    /// Requests published but not yet waited out.
    pub async fn pending(&self) -> usize {
        self.slots.lock().await.len()
    }
}

impl Relay for MemoryRelay {
    async fn publish(&self, request: &RelayRequest) -> Result<(), BridgeError> {
        let (tx, rx) = oneshot::channel();
        let id = request.envelope.request_id.clone();
        self.slots.lock().await.insert(
            id.clone(),
            Slot {
                tx: Some(tx),
                rx: Some(rx),
            },
        );
        if self.outbound.send(request.clone()).is_err() {
            tracing::debug!(request_id = %id, "no gateway attached, request dropped");
        }
        Ok(())
    }

    async fn wait_response(
        &self,
        request_id: &RequestId,
        timeout: Duration,
    ) -> Result<Option<ResponseEnvelope>, BridgeError> {
        let rx = self
            .slots
            .lock()
            .await
            .get_mut(request_id)
            .and_then(|slot| slot.rx.take())
            .ok_or_else(|| BridgeError::Relay(format!("nothing pending for {request_id}")))?;

        let outcome = tokio::time::timeout(timeout, rx).await;
        self.slots.lock().await.remove(request_id);
        match outcome {
            Ok(Ok(response)) => Ok(Some(response)),
            Ok(Err(_)) => Err(BridgeError::Relay(format!(
                "response slot for {request_id} closed"
            ))),
            Err(_) => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryGateway / MemoryResponder
// ---------------------------------------------------------------------------

/// Gateway half: the stream of published requests.
pub struct MemoryGateway {
    requests: mpsc::UnboundedReceiver<RelayRequest>,
    responder: MemoryResponder,
}

impl MemoryGateway {
    /// The next published request, or `None` once the relay is dropped.
    pub async fn next_request(&mut self) -> Option<RelayRequest> {
        self.requests.recv().await
    }

    /// A cloneable handle for answering requests.
    pub fn responder(&self) -> MemoryResponder {
        self.responder.clone()
    }
}

/// Delivers responses to waiting callers.
#[derive(Clone)]
pub struct MemoryResponder {
    slots: Slots,
}

impl MemoryResponder {
    /// Delivers `response` to whoever waits on its `request_id`.
    ///
    /// Returns `false` if the id is unknown, already answered, or its
    /// waiter gave up.
    pub async fn respond(&self, response: ResponseEnvelope) -> bool {
        let tx = self
            .slots
            .lock()
            .await
            .get_mut(&response.request_id)
            .and_then(|slot| slot.tx.take());
        match tx {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }
}
