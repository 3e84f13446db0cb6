use async_trait::async_trait;
use tracing::info;

use crate::identity::{AuthHistoryEntry, Identity};

/// Destination for fetched authentication history.
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Record the history fetched for one identity.
    async fn record(&self, identity: &Identity, entries: &[AuthHistoryEntry]);
}

/// Emits each history dump as one informational `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl HistorySink for TracingSink {
    async fn record(&self, identity: &Identity, entries: &[AuthHistoryEntry]) {
        let dump = serde_json::to_string(entries).unwrap_or_else(|e| format!("<unserializable: {e}>"));
        info!(
            username = %identity.username,
            subject_id = identity.subject_id.as_deref().unwrap_or(""),
            entries = entries.len(),
            auth_events = %dump,
            "auth events"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::{Arc, Mutex};

    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;

    struct CapturedEvent {
        level: Level,
        fields: HashMap<String, String>,
    }

    /// Layer that keeps every event's level and fields.
    #[derive(Clone, Default)]
    struct CaptureLayer {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    impl CaptureLayer {
        fn take(&self) -> Vec<CapturedEvent> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

    impl Visit for FieldVisitor<'_> {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_owned(), value.to_owned());
        }

        fn record_u64(&mut self, field: &Field, value: u64) {
            self.0.insert(field.name().to_owned(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_owned(), format!("{value:?}"));
        }
    }

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            event.record(&mut FieldVisitor(&mut fields));
            self.events.lock().unwrap().push(CapturedEvent {
                level: *event.metadata().level(),
                fields,
            });
        }
    }

    fn capture() -> (CaptureLayer, tracing::subscriber::DefaultGuard) {
        let layer = CaptureLayer::default();
        let subscriber = tracing_subscriber::registry().with(layer.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (layer, guard)
    }

    #[tokio::test]
    async fn one_info_event_per_identity_with_history_dump() {
        let (layer, _guard) = capture();
        let identity = Identity::new("alice").with_subject_id("u-1");
        let entries: Vec<AuthHistoryEntry> = (1..=3)
            .map(|i| {
                AuthHistoryEntry::new(serde_json::json!({
                    "eventId": format!("e-{i}"),
                    "eventType": "SignIn",
                }))
            })
            .collect();

        TracingSink.record(&identity, &entries).await;

        let events = layer.take();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.level, Level::INFO);
        assert_eq!(event.fields["message"], "auth events");
        assert_eq!(event.fields["username"], "alice");
        assert_eq!(event.fields["subject_id"], "u-1");
        assert_eq!(event.fields["entries"], "3");

        let dumped: serde_json::Value = serde_json::from_str(&event.fields["auth_events"]).unwrap();
        assert_eq!(dumped, serde_json::to_value(&entries).unwrap());
    }

    #[tokio::test]
    async fn empty_history_is_still_logged() {
        let (layer, _guard) = capture();
        let identity = Identity::new("bob");

        TracingSink.record(&identity, &[]).await;

        let events = layer.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].fields["username"], "bob");
        assert_eq!(events[0].fields["subject_id"], "");
        assert_eq!(events[0].fields["entries"], "0");
        assert_eq!(events[0].fields["auth_events"], "[]");
    }
}
