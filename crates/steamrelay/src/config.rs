//! Gateway channel settings.

use std::time::Duration;

/// Order in which responses are written back to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseOrder {
    /// Same order the commands arrived in. A slow command holds back
    /// the responses queued behind it, not their execution.
    #[default]
    Receipt,
    /// As soon as each command finishes.
    Completion,
}

/// Liveness and ordering settings for a [`CommandChannel`](crate::CommandChannel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// How often a ping is sent.
    pub ping_interval: Duration,

    /// How long after a ping its pong may take.
    pub pong_timeout: Duration,

    pub response_order: ResponseOrder,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            response_order: ResponseOrder::Receipt,
        }
    }
}

impl ChannelConfig {
    /// Keeps the pong tolerance inside the ping interval and both above
    /// zero.
    pub fn validated(mut self) -> Self {
        self.ping_interval = self.ping_interval.max(Duration::from_millis(100));
        self.pong_timeout = self
            .pong_timeout
            .clamp(Duration::from_millis(50), self.ping_interval);
        self
    }
}
