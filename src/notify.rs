//! Badge notification channel.
//!
//! The engine reports fix counts through a [`BadgeNotifier`]. Sending is
//! fire-and-forget: no acknowledgment is awaited and a failed send is the
//! caller's to log, never to retry.
//!
//! # Example
//!
//! ```ignore
//! let (notifier, mut badge) = bato_fixer::notify::channel();
//!
//! notifier.notify(RuntimeMessage::update_badge(2))?;
//! assert_eq!(badge.recv().await, Some(RuntimeMessage::update_badge(2)));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::RuntimeMessage;

// ============================================================================
// BadgeNotifier
// ============================================================================

/// Outbound half of the page → background message channel.
pub trait BadgeNotifier: Send + Sync {
    /// Posts `message` without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Notification`] if the channel is closed.
    fn notify(&self, message: RuntimeMessage) -> Result<()>;
}

impl<N: BadgeNotifier + ?Sized> BadgeNotifier for Arc<N> {
    fn notify(&self, message: RuntimeMessage) -> Result<()> {
        (**self).notify(message)
    }
}

// ============================================================================
// ChannelNotifier
// ============================================================================

/// Notifier backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<RuntimeMessage>,
}

/// Receiving half held by whoever owns the badge.
#[derive(Debug)]
pub struct BadgeReceiver {
    rx: mpsc::UnboundedReceiver<RuntimeMessage>,
}

/// Creates a connected notifier/receiver pair.
#[must_use]
pub fn channel() -> (ChannelNotifier, BadgeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelNotifier { tx }, BadgeReceiver { rx })
}

impl BadgeNotifier for ChannelNotifier {
    fn notify(&self, message: RuntimeMessage) -> Result<()> {
        trace!(kind = message.kind(), "Posting runtime message");
        self.tx
            .send(message)
            .map_err(|_| Error::notification("badge receiver dropped"))
    }
}

impl BadgeReceiver {
    /// Waits for the next message. `None` once every notifier is gone.
    pub async fn recv(&mut self) -> Option<RuntimeMessage> {
        self.rx.recv().await
    }

    /// Takes a message if one is queued.
    pub fn try_recv(&mut self) -> Option<RuntimeMessage> {
        self.rx.try_recv().ok()
    }

    /// Drains the queue and returns the most recent badge count.
    pub fn latest_count(&mut self) -> Option<u64> {
        let mut latest = None;
        while let Ok(RuntimeMessage::UpdateBadge { count }) = self.rx.try_recv() {
            latest = Some(count);
        }
        latest
    }
}

// ============================================================================
// NullNotifier
// ============================================================================

/// Notifier that discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl BadgeNotifier for NullNotifier {
    fn notify(&self, _message: RuntimeMessage) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
