//! Multicast channel with full-history replay.
//!
//! The worker's output must be observable by any number of independent
//! subscribers, each of which sees every message emitted before it attached
//! (replay) and every message emitted afterwards, in emission order. A
//! `tokio::sync::broadcast` channel is not suitable: it drops items under
//! lag and has no replay. This is instead an append-only log with
//! per-subscriber read cursors, bounded by the bridge's own lifetime.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::LockResultExt;

struct ReplayLog<T> {
    items: Vec<T>,
    closed: bool,
}

struct ReplayInner<T> {
    log: Mutex<ReplayLog<T>>,
    notify: Notify,
}

/// Publisher handle for a replayed multicast channel.
///
/// Cloning is cheap and shares the same log.
pub(crate) struct ReplayChannel<T> {
    inner: Arc<ReplayInner<T>>,
}

impl<T> Clone for ReplayChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> ReplayChannel<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(ReplayInner {
                log: Mutex::new(ReplayLog {
                    items: Vec::new(),
                    closed: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Append an item and wake all waiting subscribers. Ignored after close.
    pub(crate) fn publish(&self, item: T) {
        {
            let mut log = self.inner.log.lock().recover_poison("replay publish");
            if log.closed {
                return;
            }
            log.items.push(item);
        }
        self.inner.notify.notify_waiters();
    }

    /// Close the channel. Subscribers drain the remaining history and then
    /// observe end-of-stream. Idempotent.
    pub(crate) fn close(&self) {
        {
            let mut log = self.inner.log.lock().recover_poison("replay close");
            log.closed = true;
        }
        self.inner.notify.notify_waiters();
    }

    /// Attach a subscriber whose cursor starts at the beginning of history.
    pub(crate) fn subscribe(&self) -> ReplaySubscriber<T> {
        ReplaySubscriber {
            inner: Arc::clone(&self.inner),
            cursor: 0,
        }
    }
}

/// Independent read cursor over a [`ReplayChannel`]'s log.
pub(crate) struct ReplaySubscriber<T> {
    inner: Arc<ReplayInner<T>>,
    cursor: usize,
}

impl<T: Clone> ReplaySubscriber<T> {
    /// Receive the next item, replaying history first.
    ///
    /// Returns `None` once the channel is closed and the history is drained.
    pub(crate) async fn recv(&mut self) -> Option<T> {
        loop {
            // Register for wakeups before inspecting the log so a publish
            // between the check and the await cannot be missed.
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let log = self.inner.log.lock().recover_poison("replay recv");
                if self.cursor < log.items.len() {
                    let item = log.items[self.cursor].clone();
                    self.cursor += 1;
                    return Some(item);
                }
                if log.closed {
                    return None;
                }
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn late_subscriber_replays_history() {
        let channel = ReplayChannel::new();
        channel.publish(1);
        channel.publish(2);

        let mut subscriber = channel.subscribe();
        assert_eq!(subscriber.recv().await, Some(1));
        assert_eq!(subscriber.recv().await, Some(2));

        channel.publish(3);
        assert_eq!(subscriber.recv().await, Some(3));
    }

    #[tokio::test]
    async fn subscribers_are_independent() {
        let channel = ReplayChannel::new();
        channel.publish("a");

        let mut first = channel.subscribe();
        let mut second = channel.subscribe();

        // Both see the same item; neither consumes it for the other.
        assert_eq!(first.recv().await, Some("a"));
        assert_eq!(second.recv().await, Some("a"));
    }

    #[tokio::test]
    async fn recv_waits_for_future_publishes() {
        let channel = ReplayChannel::new();
        let mut subscriber = channel.subscribe();

        let publisher = channel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish(99);
        });

        let received = tokio::time::timeout(Duration::from_secs(5), subscriber.recv())
            .await
            .expect("recv should be woken by the publish");
        assert_eq!(received, Some(99));
    }

    #[tokio::test]
    async fn close_ends_the_stream_after_history() {
        let channel = ReplayChannel::new();
        channel.publish(7);
        channel.close();
        channel.close(); // idempotent
        channel.publish(8); // ignored after close

        let mut subscriber = channel.subscribe();
        assert_eq!(subscriber.recv().await, Some(7));
        assert_eq!(subscriber.recv().await, None);
    }

    #[tokio::test]
    async fn close_wakes_blocked_subscribers() {
        let channel: ReplayChannel<u8> = ReplayChannel::new();
        let mut subscriber = channel.subscribe();

        let closer = channel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close();
        });

        let received = tokio::time::timeout(Duration::from_secs(5), subscriber.recv())
            .await
            .expect("close should wake the subscriber");
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn emission_order_is_preserved() {
        let channel = ReplayChannel::new();
        for i in 0..100 {
            channel.publish(i);
        }
        channel.close();

        let mut subscriber = channel.subscribe();
        let mut seen = Vec::new();
        while let Some(item) = subscriber.recv().await {
            seen.push(item);
        }
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }
}
