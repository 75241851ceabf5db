//! Optional NATS publisher for domain events.

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    /// Fire-and-forget publish; failures are logged.
    pub fn publish(&self, event: DomainEvent) {
        let subject = event.subject();
        tracing::debug!(subject, ?event, "Domain event");
        let Some(client) = self.nats.clone() else { return };
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, subject, "Could not encode event");
                return;
            }
        };
        tokio::spawn(async move {
            if let Err(e) = client.publish(subject.to_string(), payload.into()).await {
                tracing::warn!(error = %e, subject, "Event publish failed");
            }
        });
    }
}
