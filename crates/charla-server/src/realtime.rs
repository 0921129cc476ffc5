//! Change notification fan-out.
//!
//! Every successful write publishes a full snapshot of the slice it
//! touched. Subscribers filter by [`Subscription`]; a subscriber that
//! lags behind the channel skips the missed events and catches up with
//! the next snapshot.

use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use charla_shared::events::{ChangeEvent, Topic};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish a snapshot. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let topic = event.topic();
        match self.tx.send(event) {
            Ok(receivers) => tracing::trace!(topic = topic.as_str(), receivers, "published"),
            Err(_) => tracing::trace!(topic = topic.as_str(), "no subscribers"),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Events matching `filter`, in publish order. Lagged gaps are skipped.
    pub fn subscribe(&self, filter: Subscription) -> impl Stream<Item = ChangeEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |item| match item {
            Ok(event) if filter.accepts(&event) => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "subscriber lagged, waiting for next snapshot");
                None
            }
        })
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Which events a subscriber wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    /// Empty means every topic.
    pub topics: Vec<Topic>,
    /// Restrict `messages` events to one chat.
    pub chat_id: Option<String>,
}

impl Subscription {
    pub fn topic(topic: Topic) -> Self {
        Self {
            topics: vec![topic],
            chat_id: None,
        }
    }

    pub fn messages_of(chat_id: impl Into<String>) -> Self {
        Self {
            topics: vec![Topic::Messages],
            chat_id: Some(chat_id.into()),
        }
    }

    pub fn wants(&self, topic: Topic) -> bool {
        self.topics.is_empty() || self.topics.contains(&topic)
    }

    pub fn accepts(&self, event: &ChangeEvent) -> bool {
        if !self.wants(event.topic()) {
            return false;
        }
        match (&self.chat_id, event.chat_id()) {
            (Some(wanted), Some(actual)) => wanted == actual,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn messages(chat: &str) -> ChangeEvent {
        ChangeEvent::Messages {
            chat_id: chat.into(),
            messages: vec![],
        }
    }

    #[tokio::test]
    async fn delivers_only_matching_events() {
        let feed = ChangeFeed::new();
        let stream = feed.subscribe(Subscription::messages_of("5491100000001"));
        tokio::pin!(stream);

        feed.publish(ChangeEvent::Chats(vec![]));
        feed.publish(messages("5491100000002"));
        feed.publish(messages("5491100000001"));

        let got = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.chat_id(), Some("5491100000001"));
    }

    #[tokio::test]
    async fn lagging_subscriber_resumes_with_latest() {
        let feed = ChangeFeed::new();
        let stream = feed.subscribe(Subscription::topic(Topic::Categories));
        tokio::pin!(stream);

        for _ in 0..(CHANNEL_CAPACITY + 10) {
            feed.publish(ChangeEvent::Categories(vec![]));
        }
        feed.publish(ChangeEvent::AdminProfile(None));

        let got = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap();
        assert!(matches!(got, Some(ChangeEvent::Categories(_))));
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let feed = ChangeFeed::new();
        feed.publish(ChangeEvent::Statuses(vec![]));
        assert_eq!(feed.receiver_count(), 0);
    }

    #[test]
    fn empty_subscription_accepts_everything() {
        let all = Subscription::default();
        assert!(all.accepts(&ChangeEvent::Chats(vec![])));
        assert!(all.accepts(&messages("x")));
    }
}
