use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::AuditEvent;

/// An audit event stamped with the moment it was emitted.
#[derive(Debug, Clone)]
pub struct AuditEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

impl AuditEventEnvelope {
    fn now(event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Cloneable sender side of the audit channel.
///
/// Failures to enqueue are logged and never surface to the caller.
#[derive(Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditEventEnvelope>,
}

impl AuditHandle {
    pub fn new(tx: mpsc::Sender<AuditEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, event: AuditEvent) {
        let event_type = event.event_type();
        if let Err(e) = self.tx.send(AuditEventEnvelope::now(event)).await {
            tracing::error!("Failed to emit audit event {}: {}", event_type, e);
        }
    }

    /// Emit an event from synchronous code. Returns false if it was dropped.
    pub fn try_emit(&self, event: AuditEvent) -> bool {
        let event_type = event.event_type();
        match self.tx.try_send(AuditEventEnvelope::now(event)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit audit event {}: {}", event_type, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped() -> AuditEvent {
        AuditEvent::ServiceStopped {
            reason: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_emit_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = AuditHandle::new(tx);

        handle.emit(stopped()).await;

        let envelope = rx.recv().await.expect("Should receive event");
        assert!(matches!(envelope.event, AuditEvent::ServiceStopped { .. }));
    }

    #[test]
    fn test_try_emit_stamps_time() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = AuditHandle::new(tx);

        let before = Utc::now();
        assert!(handle.try_emit(stopped()));

        let envelope = rx.try_recv().expect("Should receive event");
        assert!(envelope.timestamp >= before);
    }

    #[test]
    fn test_try_emit_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = AuditHandle::new(tx);

        assert!(handle.try_emit(stopped()));
        assert!(!handle.try_emit(stopped()));
    }

    #[tokio::test]
    async fn test_emit_closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::channel::<AuditEventEnvelope>(4);
        let handle = AuditHandle::new(tx);
        drop(rx);

        handle.emit(stopped()).await;
        assert!(!handle.try_emit(stopped()));
    }
}
