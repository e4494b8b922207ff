use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::LIVE_UPDATE_EVENT;
use crate::types::UpdateEvent;

/// Capacity of each in-process topic channel. Slow subscribers lag and drop.
const TOPIC_CAPACITY: usize = 64;

/// Publishes update events to the subscribers of a topic.
///
/// Best effort: failures are logged by the implementation and never surface
/// to the poll loop.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, topic: &str, event: &UpdateEvent);
}

/// Emit each event as a single JSON line on stdout.
#[derive(Debug, Default)]
pub struct StdoutBroadcaster;

#[derive(Serialize)]
struct TopicEnvelope<'a> {
    channel: &'a str,
    event: &'a str,
    data: &'a UpdateEvent,
}

#[async_trait]
impl Broadcaster for StdoutBroadcaster {
    async fn publish(&self, topic: &str, event: &UpdateEvent) {
        let envelope = TopicEnvelope {
            channel: topic,
            event: LIVE_UPDATE_EVENT,
            data: event,
        };
        if let Ok(json) = serde_json::to_string(&envelope) {
            println!("{json}");
        }
    }
}

/// In-process fan-out: one `tokio::sync::broadcast` channel per topic.
#[derive(Debug, Default)]
pub struct ChannelBroadcaster {
    topics: DashMap<String, broadcast::Sender<Arc<UpdateEvent>>>,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic, creating it if needed. Only events published
    /// after this call are received.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Arc<UpdateEvent>> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of topics that currently hold a channel.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn publish(&self, topic: &str, event: &UpdateEvent) {
        let delivered = match self.topics.get(topic) {
            Some(tx) => tx.send(Arc::new(event.clone())).is_ok(),
            None => {
                debug!("No subscribers on {topic}, dropping event");
                return;
            }
        };
        // Err only means every receiver has been dropped.
        if !delivered {
            self.topics
                .remove_if(topic, |_, tx| tx.receiver_count() == 0);
            debug!("No live subscribers on {topic}, topic removed");
        }
    }
}

/// POSTs `{channel, event, data}` to a trigger endpoint (Pusher-style relay).
pub struct WebhookBroadcaster {
    http: reqwest::Client,
    url: String,
}

impl WebhookBroadcaster {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Broadcaster for WebhookBroadcaster {
    async fn publish(&self, topic: &str, event: &UpdateEvent) {
        let envelope = TopicEnvelope {
            channel: topic,
            event: LIVE_UPDATE_EVENT,
            data: event,
        };
        match self.http.post(&self.url).json(&envelope).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Webhook accepted event for {topic}");
            }
            Ok(resp) => warn!("Webhook rejected event for {topic}: HTTP {}", resp.status()),
            Err(e) => warn!("Webhook publish for {topic} failed: {e}"),
        }
    }
}

/// Publish to several broadcasters in order.
#[derive(Default)]
pub struct FanoutBroadcaster {
    targets: Vec<Arc<dyn Broadcaster>>,
}

impl FanoutBroadcaster {
    pub fn new(targets: Vec<Arc<dyn Broadcaster>>) -> Self {
        Self { targets }
    }

    pub fn push(&mut self, target: Arc<dyn Broadcaster>) {
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl Broadcaster for FanoutBroadcaster {
    async fn publish(&self, topic: &str, event: &UpdateEvent) {
        for target in &self.targets {
            target.publish(topic, event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::testkit::{RecordingBroadcaster, id};

    fn event(form: &str) -> UpdateEvent {
        UpdateEvent::live_update(id(form), vec![], DateTime::<Utc>::UNIX_EPOCH)
    }

    #[tokio::test]
    async fn channel_delivers_to_topic_subscribers() {
        let hub = ChannelBroadcaster::new();
        let mut rx1 = hub.subscribe("form-F1");
        let mut rx2 = hub.subscribe("form-F1");
        let mut other = hub.subscribe("form-F2");
        assert_eq!(hub.subscriber_count("form-F1"), 2);

        hub.publish("form-F1", &event("F1")).await;

        assert_eq!(rx1.recv().await.unwrap().form_id, id("F1"));
        assert_eq!(rx2.recv().await.unwrap().form_id, id("F1"));
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn channel_without_subscribers_drops() {
        let hub = ChannelBroadcaster::new();
        hub.publish("form-F9", &event("F9")).await;
        assert_eq!(hub.subscriber_count("form-F9"), 0);
    }

    #[tokio::test]
    async fn channel_prunes_topics_without_receivers() {
        let hub = ChannelBroadcaster::new();
        let rx = hub.subscribe("form-F1");
        let _kept = hub.subscribe("form-F2");
        assert_eq!(hub.topic_count(), 2);

        drop(rx);
        hub.publish("form-F1", &event("F1")).await;
        hub.publish("form-F2", &event("F2")).await;

        assert_eq!(hub.topic_count(), 1);
        assert_eq!(hub.subscriber_count("form-F1"), 0);
        assert_eq!(hub.subscriber_count("form-F2"), 1);

        // Resubscribing recreates the topic.
        let mut rx = hub.subscribe("form-F1");
        hub.publish("form-F1", &event("F1")).await;
        assert_eq!(rx.recv().await.unwrap().form_id, id("F1"));
    }

    #[tokio::test]
    async fn fanout_publishes_to_all_targets() {
        let a = Arc::new(RecordingBroadcaster::default());
        let b = Arc::new(RecordingBroadcaster::default());
        let fanout = FanoutBroadcaster::new(vec![a.clone() as Arc<dyn Broadcaster>, b.clone()]);
        assert_eq!(fanout.len(), 2);

        fanout.publish("form-F1", &event("F1")).await;

        assert_eq!(a.published().len(), 1);
        assert_eq!(b.published()[0].0, "form-F1");
    }

    #[tokio::test]
    async fn webhook_failure_is_swallowed() {
        let hook = WebhookBroadcaster::new("http://127.0.0.1:9/trigger", Duration::from_millis(200))
            .unwrap();
        hook.publish("form-F1", &event("F1")).await;
    }

    #[test]
    fn envelope_shape() {
        let ev = event("F1");
        let envelope = TopicEnvelope {
            channel: "form-F1",
            event: LIVE_UPDATE_EVENT,
            data: &ev,
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["channel"], "form-F1");
        assert_eq!(json["event"], "live-update");
        assert_eq!(json["data"]["type"], "live_update");
    }
}
