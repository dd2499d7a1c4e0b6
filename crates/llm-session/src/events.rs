//! Event bus for inbound [`LlmEvent`]s (§4.2). Supports a wildcard `*`
//! subscription for diagnostics and per-event-kind subscriptions that can be
//! torn down by identity — used for the one-shot "wait for `session.updated`"
//! pattern during session bring-up.

use std::collections::HashMap;

use tokio::sync::mpsc;
use vb_protocol::LlmEvent;

/// Returns the wire tag (`session.created`, `response.done`, ...) for an
/// event, or `None` for the catch-all `Unknown` variant — which only
/// wildcard subscribers ever see.
fn event_kind(event: &LlmEvent) -> Option<&'static str> {
    Some(match event {
        LlmEvent::SessionCreated => "session.created",
        LlmEvent::SessionUpdated => "session.updated",
        LlmEvent::SpeechStarted => "input_audio_buffer.speech_started",
        LlmEvent::SpeechStopped => "input_audio_buffer.speech_stopped",
        LlmEvent::ResponseCreated { .. } => "response.created",
        LlmEvent::ResponseAudioDelta { .. } => "response.audio.delta",
        LlmEvent::ResponseAudioDone { .. } => "response.audio.done",
        LlmEvent::ResponseAudioTranscriptDelta { .. } => "response.audio_transcript.delta",
        LlmEvent::ResponseAudioTranscriptDone { .. } => "response.audio_transcript.done",
        LlmEvent::ResponseFunctionCallArgumentsDone { .. } => {
            "response.function_call_arguments.done"
        }
        LlmEvent::ResponseDone { .. } => "response.done",
        LlmEvent::InputAudioTranscriptionCompleted { .. } => {
            "conversation.item.input_audio_transcription.completed"
        }
        LlmEvent::Error { .. } => "error",
        LlmEvent::Unknown => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

enum Filter {
    All,
    Kind(&'static str),
}

struct Subscriber {
    filter: Filter,
    tx: mpsc::UnboundedSender<LlmEvent>,
}

/// Process-local pub/sub bus, one per LLM session.
#[derive(Default)]
pub struct EventBus {
    next_id: std::sync::atomic::AtomicU64,
    subscribers: std::sync::Mutex<HashMap<u64, Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event, including `Unknown`.
    pub fn subscribe_all(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<LlmEvent>) {
        self.subscribe(Filter::All)
    }

    /// Subscribe to a single event kind by its wire tag, e.g. `"response.done"`.
    pub fn subscribe_kind(&self, kind: &'static str) -> (SubscriptionId, mpsc::UnboundedReceiver<LlmEvent>) {
        self.subscribe(Filter::Kind(kind))
    }

    fn subscribe(&self, filter: Filter) -> (SubscriptionId, mpsc::UnboundedReceiver<LlmEvent>) {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().insert(id, Subscriber { filter, tx });
        (SubscriptionId(id), rx)
    }

    /// Remove a subscription by identity. No-op if already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().remove(&id.0);
    }

    /// Fan the event out to every matching, still-connected subscriber.
    pub fn publish(&self, event: LlmEvent) {
        let kind = event_kind(&event);
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|_, sub| {
            let matches = match sub.filter {
                Filter::All => true,
                Filter::Kind(k) => kind == Some(k),
            };
            if matches {
                sub.tx.send(event.clone()).is_ok()
            } else {
                true
            }
        });
    }

    /// Wait once for an event of the given kind, then tear the subscription
    /// down — the `session.updated`-completion pattern from §4.2.
    pub async fn wait_once(&self, kind: &'static str) -> Option<LlmEvent> {
        let (id, mut rx) = self.subscribe_kind(kind);
        let event = rx.recv().await;
        self.unsubscribe(id);
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_maps_known_variants() {
        assert_eq!(event_kind(&LlmEvent::SessionCreated), Some("session.created"));
        assert_eq!(event_kind(&LlmEvent::Unknown), None);
    }

    #[tokio::test]
    async fn wildcard_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe_all();
        bus.publish(LlmEvent::SessionCreated);
        bus.publish(LlmEvent::SpeechStarted);
        assert!(matches!(rx.recv().await, Some(LlmEvent::SessionCreated)));
        assert!(matches!(rx.recv().await, Some(LlmEvent::SpeechStarted)));
    }

    #[tokio::test]
    async fn kind_subscriber_only_sees_matching_events() {
        let bus = EventBus::new();
        let (_id, mut rx) = bus.subscribe_kind("session.updated");
        bus.publish(LlmEvent::SessionCreated);
        bus.publish(LlmEvent::SessionUpdated);
        let received = rx.recv().await;
        assert!(matches!(received, Some(LlmEvent::SessionUpdated)));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (id, mut rx) = bus.subscribe_all();
        bus.unsubscribe(id);
        bus.publish(LlmEvent::SessionCreated);
        // Sender was dropped from the registry; channel closes with no item.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn wait_once_tears_down_after_firing() {
        let bus = std::sync::Arc::new(EventBus::new());
        let waiter = tokio::spawn({
            let bus = bus.clone();
            async move { bus.wait_once("session.updated").await }
        });
        tokio::task::yield_now().await;
        bus.publish(LlmEvent::SessionUpdated);
        let got = waiter.await.unwrap();
        assert!(matches!(got, Some(LlmEvent::SessionUpdated)));
        assert_eq!(bus.subscribers.lock().unwrap().len(), 0);
    }
}
