//! Redis relay: `PUBLISH` to the gateway topic, `BLPOP` on a per-request
//! list for the answer.
//!
//! Publishing shares one multiplexed connection. A `BLPOP` parks the
//! connection it runs on, so waits draw from a bounded pool of idle
//! connections instead. A connection goes back to the pool only after
//! its `BLPOP` returned; one abandoned mid-wait is dropped.
//!
//! Fractional `BLPOP` timeouts need Redis 6.0 or newer.

use std::future::Future;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use steamrelay_protocol::{Codec, JsonCodec, RelayRequest, RequestId, ResponseEnvelope};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::{BridgeConfig, BridgeError, Relay};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Slack on top of the `BLPOP` timeout before the socket read gives up.
const READ_SLACK: Duration = Duration::from_secs(5);

/// A [`Relay`] backed by a Redis server.
pub struct RedisRelay<C: Codec = JsonCodec> {
    client: redis::Client,
    publisher: MultiplexedConnection,
    waits: WaitPool<MultiplexedConnection>,
    config: BridgeConfig,
    codec: C,
}

impl RedisRelay<JsonCodec> {
    /// Connects to `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str, config: BridgeConfig) -> Result<Self, BridgeError> {
        Self::with_codec(url, config, JsonCodec).await
    }
}

impl<C: Codec> RedisRelay<C> {
    pub async fn with_codec(url: &str, config: BridgeConfig, codec: C) -> Result<Self, BridgeError> {
        let config = config.validated();
        let client = redis::Client::open(url)?;
        let publisher = client
            .get_multiplexed_async_connection_with_timeouts(CONNECT_TIMEOUT, CONNECT_TIMEOUT)
            .await?;
        tracing::info!(topic = %config.topic, "redis relay connected");
        Ok(Self {
            client,
            publisher,
            waits: WaitPool::new(config.max_concurrent_waits),
            config,
            codec,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl<C: Codec> Relay for RedisRelay<C> {
    async fn publish(&self, request: &RelayRequest) -> Result<(), BridgeError> {
        let payload = self.codec.encode(request)?;
        let mut conn = self.publisher.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&self.config.topic)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        if receivers == 0 {
            tracing::warn!(
                topic = %self.config.topic,
                request_id = %request.envelope.request_id,
                "no gateway subscribed"
            );
        }
        Ok(())
    }

    async fn wait_response(
        &self,
        request_id: &RequestId,
        timeout: Duration,
    ) -> Result<Option<ResponseEnvelope>, BridgeError> {
        // BLPOP with 0 blocks forever.
        if timeout.is_zero() {
            return Ok(None);
        }
        let timeout = timeout.min(self.config.max_wait);
        let (mut conn, permit) = self
            .waits
            .acquire(move || async move {
                let conn = self
                    .client
                    .get_multiplexed_async_connection_with_timeouts(
                        self.config.max_wait + READ_SLACK,
                        CONNECT_TIMEOUT,
                    )
                    .await?;
                tracing::debug!("opened relay wait connection");
                Ok::<_, BridgeError>(conn)
            })
            .await?;

        let key = self.config.response_key(request_id.as_str());
        let popped: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
            .arg(&key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        self.waits.release(conn).await;
        drop(permit);

        match popped {
            Some((_, payload)) => Ok(Some(self.codec.decode(&payload)?)),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// WaitPool
// ---------------------------------------------------------------------------

/// Idle connections reused by blocking waits, at most `capacity` in use.
struct WaitPool<T> {
    idle: Mutex<Vec<T>>,
    permits: Semaphore,
    capacity: usize,
}

impl<T> WaitPool<T> {
    fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    /// An idle connection, or a fresh one from `open`. The permit bounds
    /// connections in use; hold it until the connection is released or
    /// dropped.
    async fn acquire<F, Fut>(&self, open: F) -> Result<(T, SemaphorePermit<'_>), BridgeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BridgeError::Relay("wait pool closed".into()))?;
        let reused = self.idle.lock().await.pop();
        let conn = match reused {
            Some(conn) => conn,
            None => open().await?,
        };
        Ok((conn, permit))
    }

    /// Returns a connection whose last command completed.
    async fn release(&self, conn: T) {
        let mut idle = self.idle.lock().await;
        if idle.len() < self.capacity {
            idle.push(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    async fn checkout<'a>(
        pool: &'a WaitPool<usize>,
        opened: &AtomicUsize,
    ) -> (usize, SemaphorePermit<'a>) {
        pool.acquire(move || async move {
            Ok::<_, BridgeError>(opened.fetch_add(1, Ordering::SeqCst))
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_wait_pool_reuses_released_connection() {
        let pool = WaitPool::new(2);
        let opened = AtomicUsize::new(0);

        let (conn, permit) = checkout(&pool, &opened).await;
        pool.release(conn).await;
        drop(permit);
        let (again, _permit) = checkout(&pool, &opened).await;

        assert_eq!(again, 0);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_pool_drops_abandoned_connection() {
        let pool = WaitPool::new(2);
        let opened = AtomicUsize::new(0);

        let (_abandoned, permit) = checkout(&pool, &opened).await;
        drop(permit);
        let (fresh, _permit) = checkout(&pool, &opened).await;

        assert_eq!(fresh, 1);
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wait_pool_caps_connections_in_use() {
        let pool = WaitPool::new(1);
        let opened = AtomicUsize::new(0);
        let (conn, permit) = checkout(&pool, &opened).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), checkout(&pool, &opened)).await;
        assert!(blocked.is_err());

        pool.release(conn).await;
        drop(permit);
        let (again, _permit) = checkout(&pool, &opened).await;
        assert_eq!(again, 0);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }
}
