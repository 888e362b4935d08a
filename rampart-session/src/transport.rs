//! The pub/sub transport contract the coordinator consumes, plus an
//! in-process implementation for tests and local play.
//!
//! The contract is deliberately weak, matching what a serverless pub/sub
//! service actually guarantees:
//!
//! - `send` is fire-and-forget, at-most-once: a frame reaches whoever is
//!   subscribed at send time and nobody else. No ordering across senders.
//! - Presence is best-effort but eventually converges: every change
//!   re-emits the complete membership view to all subscribers.
//! - Failures surface as [`TransportEvent::ChannelError`]; recovery is the
//!   coordinator's problem.
//!
//! [`MemoryHub`] is a topic-keyed room registry with one event stream per
//! subscriber. It additionally exposes fault injection (`detach`, `fail`,
//! `refuse_joins`) so staleness, transport errors, and reconnect
//! exhaustion are all reproducible in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::PresenceRecord;

/// Transport failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("channel unavailable: {0}")]
    Unavailable(String),
    #[error("not subscribed")]
    NotSubscribed,
}

/// Events delivered to a subscriber.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A broadcast frame from another subscriber.
    Message(Vec<u8>),
    /// The complete membership view after any presence change.
    PresenceSync(Vec<PresenceRecord>),
    /// The channel failed; the subscription is no longer trustworthy.
    ChannelError(TransportError),
}

/// Stream of [`TransportEvent`]s for one subscription. A fresh stream is
/// handed out by every successful `join`/`subscribe_only`.
pub type EventStream = mpsc::UnboundedReceiver<TransportEvent>;

/// One pub/sub channel as consumed by the session layer.
///
/// Async methods suspend only at transport boundaries; `send` never blocks
/// and never reports delivery.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + 'static {
    /// Subscribe and publish presence in one step.
    async fn join(&mut self, presence: PresenceRecord) -> Result<EventStream, TransportError>;

    /// Subscribe without publishing presence (used before join acceptance,
    /// and by discovery consumers).
    async fn subscribe_only(&mut self) -> Result<EventStream, TransportError>;

    /// Fire-and-forget broadcast to all other current subscribers.
    fn send(&self, payload: Vec<u8>);

    /// Publish or replace this connection's presence record. Best-effort.
    async fn track_presence(&self, record: PresenceRecord) -> Result<(), TransportError>;

    /// Re-publish a changed presence record. Best-effort.
    async fn update_presence(&self, record: PresenceRecord) -> Result<(), TransportError>;

    /// Unsubscribe and stop presence publication.
    async fn leave(&mut self);
}

// ───────────────────────────────────────────────────────────────────
// In-memory hub
// ───────────────────────────────────────────────────────────────────

struct Subscriber {
    tx: mpsc::UnboundedSender<TransportEvent>,
    presence: Option<PresenceRecord>,
    /// Detached subscribers receive nothing — a silent network blackhole.
    attached: bool,
}

#[derive(Default)]
struct Topic {
    subscribers: HashMap<Uuid, Subscriber>,
    refuse_joins: bool,
}

#[derive(Default)]
struct HubInner {
    topics: HashMap<String, Topic>,
}

/// In-process pub/sub hub. Cheap to clone; all channels created from the
/// same hub share its topics.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel handle bound to a topic. The handle is inert until
    /// `join` or `subscribe_only`.
    pub fn channel(&self, topic: &str) -> MemoryChannel {
        MemoryChannel {
            hub: self.clone(),
            topic: topic.to_string(),
            connection_id: Uuid::new_v4(),
            subscribed: false,
        }
    }

    /// Make subsequent `join`/`subscribe_only` calls on a topic fail, as an
    /// unreachable service would.
    pub fn refuse_joins(&self, topic: &str, refuse: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.topics.entry(topic.to_string()).or_default().refuse_joins = refuse;
    }

    /// Emit a channel error to every attached subscriber of a topic.
    pub fn fail(&self, topic: &str) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(topic) = inner.topics.get(topic) {
            for sub in topic.subscribers.values().filter(|s| s.attached) {
                let _ = sub.tx.send(TransportEvent::ChannelError(TransportError::Unavailable(
                    "injected failure".into(),
                )));
            }
        }
    }

    /// Silently stop delivering to one connection without removing its
    /// presence — the shape of a network partition the service has not yet
    /// noticed.
    pub fn detach(&self, topic: &str, connection_id: Uuid) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(topic) = inner.topics.get_mut(topic) {
            if let Some(sub) = topic.subscribers.get_mut(&connection_id) {
                sub.attached = false;
            }
        }
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.topics.get(topic).map_or(0, |t| t.subscribers.len())
    }

    fn subscribe(
        &self,
        topic: &str,
        connection_id: Uuid,
        presence: Option<PresenceRecord>,
    ) -> Result<EventStream, TransportError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let topic_state = inner.topics.entry(topic.to_string()).or_default();
        if topic_state.refuse_joins {
            return Err(TransportError::Unavailable("join refused".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let had_presence = presence.is_some();
        topic_state.subscribers.insert(
            connection_id,
            Subscriber { tx, presence, attached: true },
        );
        Self::emit_sync(topic_state);
        log::debug!("connection {connection_id} subscribed to {topic} (presence: {had_presence})");
        Ok(rx)
    }

    fn set_presence(
        &self,
        topic: &str,
        connection_id: Uuid,
        record: PresenceRecord,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let topic_state = inner
            .topics
            .get_mut(topic)
            .ok_or(TransportError::NotSubscribed)?;
        let sub = topic_state
            .subscribers
            .get_mut(&connection_id)
            .ok_or(TransportError::NotSubscribed)?;
        sub.presence = Some(record);
        Self::emit_sync(topic_state);
        Ok(())
    }

    fn broadcast(&self, topic: &str, sender: Uuid, payload: Vec<u8>) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(topic_state) = inner.topics.get(topic) else { return };
        // The sender must be subscribed at send time; otherwise the frame
        // is lost, matching the at-most-once contract.
        if !topic_state.subscribers.contains_key(&sender) {
            return;
        }
        for (id, sub) in &topic_state.subscribers {
            if *id == sender || !sub.attached {
                continue;
            }
            let _ = sub.tx.send(TransportEvent::Message(payload.clone()));
        }
    }

    fn unsubscribe(&self, topic: &str, connection_id: Uuid) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(topic_state) = inner.topics.get_mut(topic) {
            if topic_state.subscribers.remove(&connection_id).is_some() {
                Self::emit_sync(topic_state);
            }
        }
    }

    /// Push the complete membership view to every attached subscriber.
    fn emit_sync(topic_state: &Topic) {
        let view: Vec<PresenceRecord> = topic_state
            .subscribers
            .values()
            .filter_map(|s| s.presence.clone())
            .collect();
        for sub in topic_state.subscribers.values().filter(|s| s.attached) {
            let _ = sub.tx.send(TransportEvent::PresenceSync(view.clone()));
        }
    }
}

/// One connection to a [`MemoryHub`] topic.
pub struct MemoryChannel {
    hub: MemoryHub,
    topic: String,
    connection_id: Uuid,
    subscribed: bool,
}

impl MemoryChannel {
    /// Stable id of this connection, usable with [`MemoryHub::detach`].
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Transport for MemoryChannel {
    async fn join(&mut self, presence: PresenceRecord) -> Result<EventStream, TransportError> {
        let rx = self
            .hub
            .subscribe(&self.topic, self.connection_id, Some(presence))?;
        self.subscribed = true;
        Ok(rx)
    }

    async fn subscribe_only(&mut self) -> Result<EventStream, TransportError> {
        let rx = self.hub.subscribe(&self.topic, self.connection_id, None)?;
        self.subscribed = true;
        Ok(rx)
    }

    fn send(&self, payload: Vec<u8>) {
        self.hub.broadcast(&self.topic, self.connection_id, payload);
    }

    async fn track_presence(&self, record: PresenceRecord) -> Result<(), TransportError> {
        self.hub.set_presence(&self.topic, self.connection_id, record)
    }

    async fn update_presence(&self, record: PresenceRecord) -> Result<(), TransportError> {
        self.hub.set_presence(&self.topic, self.connection_id, record)
    }

    async fn leave(&mut self) {
        if self.subscribed {
            self.hub.unsubscribe(&self.topic, self.connection_id);
            self.subscribed = false;
        }
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        if self.subscribed {
            self.hub.unsubscribe(&self.topic, self.connection_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ParticipantIdentity;

    fn presence(name: &str) -> PresenceRecord {
        PresenceRecord::new(&ParticipantIdentity::new(name))
    }

    async fn next_message(rx: &mut EventStream) -> Option<Vec<u8>> {
        while let Some(event) = rx.recv().await {
            if let TransportEvent::Message(bytes) = event {
                return Some(bytes);
            }
        }
        None
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let hub = MemoryHub::new();
        let mut a = hub.channel("room");
        let mut b = hub.channel("room");

        let mut rx_a = a.join(presence("a")).await.unwrap();
        let mut rx_b = b.join(presence("b")).await.unwrap();

        a.send(vec![1, 2, 3]);
        assert_eq!(next_message(&mut rx_b).await, Some(vec![1, 2, 3]));

        // The sender never hears its own frame.
        b.send(vec![9]);
        assert_eq!(next_message(&mut rx_a).await, Some(vec![9]));
    }

    #[tokio::test]
    async fn test_send_without_subscription_is_lost() {
        let hub = MemoryHub::new();
        let mut a = hub.channel("room");
        let mut rx_a = a.join(presence("a")).await.unwrap();

        let ghost = hub.channel("room");
        ghost.send(vec![42]);

        // Nothing arrives; only the initial presence sync is pending.
        a.send(vec![0]); // unrelated, keeps channel alive
        match rx_a.recv().await {
            Some(TransportEvent::PresenceSync(_)) => {}
            other => panic!("expected presence sync, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_presence_sync_carries_full_view() {
        let hub = MemoryHub::new();
        let mut a = hub.channel("room");
        let mut b = hub.channel("room");

        let mut rx_a = a.join(presence("a")).await.unwrap();
        let _rx_b = b.join(presence("b")).await.unwrap();

        // First sync: just us. Second sync: both.
        let mut views = Vec::new();
        while views.len() < 2 {
            match rx_a.recv().await {
                Some(TransportEvent::PresenceSync(view)) => views.push(view),
                Some(_) => {}
                None => break,
            }
        }
        assert_eq!(views[0].len(), 1);
        assert_eq!(views[1].len(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_only_is_invisible() {
        let hub = MemoryHub::new();
        let mut a = hub.channel("room");
        let mut watcher = hub.channel("room");

        let mut rx_a = a.join(presence("a")).await.unwrap();
        let _rx_w = watcher.subscribe_only().await.unwrap();

        // The watcher triggers a sync (subscription change) but contributes
        // no presence record.
        match rx_a.recv().await {
            Some(TransportEvent::PresenceSync(view)) => assert_eq!(view.len(), 1),
            other => panic!("expected sync, got {other:?}"),
        }
        match rx_a.recv().await {
            Some(TransportEvent::PresenceSync(view)) => assert_eq!(view.len(), 1),
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_leave_removes_presence() {
        let hub = MemoryHub::new();
        let mut a = hub.channel("room");
        let mut b = hub.channel("room");

        let mut rx_a = a.join(presence("a")).await.unwrap();
        let _rx_b = b.join(presence("b")).await.unwrap();
        b.leave().await;

        let mut last_view = Vec::new();
        while let Ok(event) =
            tokio::time::timeout(std::time::Duration::from_millis(100), rx_a.recv()).await
        {
            match event {
                Some(TransportEvent::PresenceSync(view)) => last_view = view,
                Some(_) => {}
                None => break,
            }
        }
        assert_eq!(last_view.len(), 1);
        assert_eq!(hub.subscriber_count("room"), 1);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let hub = MemoryHub::new();
        let mut a = hub.channel("room");
        let _rx_a = a.join(presence("a")).await.unwrap();
        {
            let mut b = hub.channel("room");
            let _rx_b = b.join(presence("b")).await.unwrap();
            assert_eq!(hub.subscriber_count("room"), 2);
        }
        assert_eq!(hub.subscriber_count("room"), 1);
    }

    #[tokio::test]
    async fn test_detach_blackholes_silently() {
        let hub = MemoryHub::new();
        let mut a = hub.channel("room");
        let mut b = hub.channel("room");
        let b_conn = b.connection_id();

        let _rx_a = a.join(presence("a")).await.unwrap();
        let mut rx_b = b.join(presence("b")).await.unwrap();
        while let Ok(Some(_)) =
            tokio::time::timeout(std::time::Duration::from_millis(50), rx_b.recv()).await
        {}

        hub.detach("room", b_conn);
        a.send(vec![7]);

        // No message, no error — silence.
        let got = tokio::time::timeout(std::time::Duration::from_millis(100), rx_b.recv()).await;
        assert!(got.is_err(), "detached subscriber should hear nothing");
        // Presence is still visible to others.
        assert_eq!(hub.subscriber_count("room"), 2);
    }

    #[tokio::test]
    async fn test_fail_emits_channel_error() {
        let hub = MemoryHub::new();
        let mut a = hub.channel("room");
        let mut rx_a = a.join(presence("a")).await.unwrap();

        hub.fail("room");
        let mut saw_error = false;
        while let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(100), rx_a.recv()).await
        {
            if matches!(event, TransportEvent::ChannelError(_)) {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_refuse_joins() {
        let hub = MemoryHub::new();
        hub.refuse_joins("room", true);
        let mut a = hub.channel("room");
        assert!(a.join(presence("a")).await.is_err());

        hub.refuse_joins("room", false);
        assert!(a.join(presence("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejoin_after_leave_gets_fresh_stream() {
        let hub = MemoryHub::new();
        let mut a = hub.channel("room");
        let _first = a.join(presence("a")).await.unwrap();
        a.leave().await;
        let mut second = a.join(presence("a")).await.unwrap();
        match second.recv().await {
            Some(TransportEvent::PresenceSync(view)) => assert_eq!(view.len(), 1),
            other => panic!("expected sync on fresh stream, got {other:?}"),
        }
    }
}
