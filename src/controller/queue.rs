// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deduplicating work queue with per-key in-flight exclusivity.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;

/// FIFO of string keys with classic controller work queue semantics:
///
/// - a key that is already pending is not queued twice;
/// - a key re-added while it is being processed re-enters the queue once
///   [`WorkQueue::done`] is called for it, so there is never more than one
///   concurrent owner per key;
/// - after [`WorkQueue::shut_down`] the queue drains and [`WorkQueue::get`]
///   resolves to `None`.
#[derive(Default)]
pub struct WorkQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<String>,
    /// Keys waiting to be processed (pending or re-added while in flight).
    dirty: HashSet<String>,
    /// Keys currently owned by a consumer, between `get` and `done`.
    processing: HashSet<String>,
    shutting_down: bool,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a key. No-op if the key is already pending or the queue is
    /// shutting down; a key currently in flight is parked and re-queued by
    /// `done`.
    pub fn add(&self, key: impl Into<String>) {
        let key = key.into();
        {
            let mut inner = self.inner.lock().expect("work queue lock");
            if inner.shutting_down || inner.dirty.contains(&key) {
                return;
            }
            inner.dirty.insert(key.clone());
            if inner.processing.contains(&key) {
                return;
            }
            inner.queue.push_back(key);
        }
        self.notify.notify_one();
    }

    /// Wait for the next key. Resolves to `None` once the queue has shut down
    /// and drained.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().expect("work queue lock");
                if let Some(key) = inner.queue.pop_front() {
                    inner.dirty.remove(&key);
                    inner.processing.insert(key.clone());
                    return Some(key);
                }
                if inner.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Release a key obtained from [`WorkQueue::get`]. If the key was
    /// re-added in the meantime it goes back on the queue.
    pub fn done(&self, key: &str) {
        let requeued = {
            let mut inner = self.inner.lock().expect("work queue lock");
            inner.processing.remove(key);
            if inner.dirty.contains(key) && !inner.shutting_down {
                inner.queue.push_back(key.to_string());
                true
            } else {
                false
            }
        };
        if requeued {
            self.notify.notify_one();
        }
    }

    /// Stop accepting new keys and wake all waiting consumers.
    pub fn shut_down(&self) {
        {
            let mut inner = self.inner.lock().expect("work queue lock");
            inner.shutting_down = true;
        }
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = WorkQueue::new();
        queue.add("a");
        queue.add("b");
        queue.add("c");

        assert_eq!(queue.get().await.as_deref(), Some("a"));
        assert_eq!(queue.get().await.as_deref(), Some("b"));
        assert_eq!(queue.get().await.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_pending_key_is_deduplicated() {
        let queue = WorkQueue::new();
        queue.add("a");
        queue.add("a");
        queue.add("b");

        assert_eq!(queue.get().await.as_deref(), Some("a"));
        assert_eq!(queue.get().await.as_deref(), Some("b"));

        queue.done("a");
        queue.done("b");
        queue.shut_down();
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test]
    async fn test_readd_while_in_flight_requeues_after_done() {
        let queue = WorkQueue::new();
        queue.add("a");

        let key = queue.get().await.unwrap();
        assert_eq!(key, "a");

        // Re-add while in flight: parked until done releases the key.
        queue.add("a");
        queue.done(&key);

        assert_eq!(queue.get().await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_shutdown_wakes_blocked_get() {
        let queue = Arc::new(WorkQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.get().await })
        };

        // Give the consumer a chance to block.
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.shut_down();

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("get did not return after shutdown")
            .unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_keys() {
        let queue = WorkQueue::new();
        queue.add("a");
        queue.add("b");
        queue.shut_down();

        assert_eq!(queue.get().await.as_deref(), Some("a"));
        assert_eq!(queue.get().await.as_deref(), Some("b"));
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test]
    async fn test_add_after_shutdown_is_ignored() {
        let queue = WorkQueue::new();
        queue.shut_down();
        queue.add("a");

        assert_eq!(queue.get().await, None);
    }

    #[tokio::test]
    async fn test_key_can_be_processed_again_after_done() {
        let queue = WorkQueue::new();
        queue.add("a");
        let key = queue.get().await.unwrap();
        queue.done(&key);

        queue.add("a");
        assert_eq!(queue.get().await.as_deref(), Some("a"));
    }
}
