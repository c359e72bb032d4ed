//! In-memory event bus for consumer tests.
//!
//! Messages passed to [`InMemoryEventBus::publish`] are delivered to every
//! live subscription whose topic list contains the topic. Nothing is retained
//! for later subscribers, so a test that publishes should first wait for the
//! consumer to subscribe
//! ([`InMemoryEventBus::wait_for_subscribers`]).

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use ratings_core::event_bus::{EventBus, EventBusError, InboundMessage, MessageStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;

type Sender = mpsc::UnboundedSender<Result<InboundMessage, EventBusError>>;

#[derive(Debug)]
struct Subscription {
    topics: Vec<String>,
    sender: Sender,
}

/// Channel-backed [`EventBus`].
///
/// Cloning shares subscriptions and counters.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventBus {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
    published: Arc<RwLock<Vec<InboundMessage>>>,
    next_offset: Arc<AtomicI64>,
    subscribe_calls: Arc<AtomicUsize>,
}

impl InMemoryEventBus {
    /// Create a bus with no subscriptions
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a transport error into every live subscription.
    pub fn inject_error(&self, error: &EventBusError) {
        self.prune();
        for subscription in self.subscriptions.read().unwrap().iter() {
            let _ = subscription.sender.send(Err(error.clone()));
        }
    }

    /// End every live subscription stream, as a broker disconnect would.
    pub fn close_subscriptions(&self) {
        self.subscriptions.write().unwrap().clear();
    }

    /// Number of subscriptions whose receiver is still alive
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.prune();
        self.subscriptions.read().unwrap().len()
    }

    /// Total number of `subscribe` calls so far, including ended ones
    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Every message published so far, in order
    #[must_use]
    pub fn published(&self) -> Vec<InboundMessage> {
        self.published.read().unwrap().clone()
    }

    /// Wait until at least `count` subscribe calls have been made.
    ///
    /// Gives up after five seconds and returns `false`.
    pub async fn wait_for_subscribers(&self, count: usize) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            if self.subscribe_calls() >= count && self.subscriber_count() > 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    /// Deliver a message to every live subscription on `topic`.
    ///
    /// Stands in for the producing service.
    pub fn publish(&self, topic: &str, key: Option<&str>, payload: &[u8]) {
        let message = InboundMessage {
            topic: topic.to_string(),
            partition: 0,
            offset: self.next_offset.fetch_add(1, Ordering::SeqCst),
            key: key.map(|k| k.as_bytes().to_vec()),
            payload: payload.to_vec(),
        };

        self.prune();
        for subscription in self.subscriptions.read().unwrap().iter() {
            if subscription.topics.iter().any(|t| t == topic) {
                let _ = subscription.sender.send(Ok(message.clone()));
            }
        }

        self.published.write().unwrap().push(message);
    }

    fn prune(&self) {
        self.subscriptions
            .write()
            .unwrap()
            .retain(|s| !s.sender.is_closed());
    }
}

impl EventBus for InMemoryEventBus {
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();

        Box::pin(async move {
            let (sender, mut receiver) = mpsc::unbounded_channel();
            self.subscriptions
                .write()
                .unwrap()
                .push(Subscription { topics, sender });
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);

            let stream = async_stream::stream! {
                while let Some(item) = receiver.recv().await {
                    yield item;
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
