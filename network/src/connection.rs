// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection state for the push channel, with bounded fixed-delay retry

use anyhow::{anyhow, Result};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

/// Connection state of the link to the messaging server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting {
        /// One-based attempt number
        attempt: u32,
    },
    Connected,
}

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Wait between failed attempts
    pub delay: Duration,
    /// Attempts before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
            max_attempts: 5,
        }
    }
}

/// Tracks the link through disconnected, connecting and connected
pub struct ConnectionTracker {
    policy: ReconnectPolicy,
    state_tx: watch::Sender<LinkState>,
}

impl ConnectionTracker {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Disconnected);
        Self { policy, state_tx }
    }

    pub fn state(&self) -> LinkState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    /// Attempt to connect, retrying after a fixed delay until the attempt limit
    pub async fn connect_with_retry<F, Fut, T>(&self, connect_fn: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.set_state(LinkState::Connecting { attempt });

            match connect_fn().await {
                Ok(link) => {
                    info!(attempt, "Connected");
                    self.set_state(LinkState::Connected);
                    return Ok(link);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Connection attempt failed");

                    if attempt >= self.policy.max_attempts {
                        self.set_state(LinkState::Disconnected);
                        return Err(anyhow!("Failed to connect after {} attempts: {}", attempt, e));
                    }

                    info!("Retrying connection in {:?}", self.policy.delay);
                    sleep(self.policy.delay).await;
                }
            }
        }
    }

    /// Handle disconnection
    pub fn handle_disconnection(&self) {
        if self.is_connected() {
            warn!("Link lost");
        }
        self.set_state(LinkState::Disconnected);
    }

    fn set_state(&self, state: LinkState) {
        self.state_tx.send_replace(state);
    }
}
