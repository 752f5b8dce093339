use std::sync::Arc;

use tokio::sync::mpsc;

use super::{AuditEventEnvelope, AuditHandle, AuditRecord, AuditStore};

/// Background task that drains the audit channel into an [`AuditStore`].
pub struct AuditWriter {
    rx: mpsc::Receiver<AuditEventEnvelope>,
    store: Arc<dyn AuditStore>,
}

impl AuditWriter {
    pub fn new(rx: mpsc::Receiver<AuditEventEnvelope>, store: Arc<dyn AuditStore>) -> Self {
        Self { rx, store }
    }

    /// Write events until every [`AuditHandle`] has been dropped.
    pub async fn run(mut self) {
        tracing::info!("Audit writer started");

        let mut written = 0u64;
        while let Some(envelope) = self.rx.recv().await {
            let record = AuditRecord {
                id: 0,
                timestamp: envelope.timestamp,
                event_type: envelope.event.event_type().to_string(),
                picking_id: envelope.event.picking_id(),
                user_id: envelope.event.user_id().map(String::from),
                data: envelope.event,
            };

            match self.store.insert(&record) {
                Ok(_) => written += 1,
                Err(e) => tracing::error!("Failed to write audit event {}: {}", record.event_type, e),
            }
        }

        tracing::info!("Audit writer shutting down after {} event(s)", written);
    }
}

/// Create a connected audit handle and writer.
///
/// Spawn the writer with `tokio::spawn(writer.run())` and clone the handle
/// wherever events are produced.
pub fn create_audit_system(
    store: Arc<dyn AuditStore>,
    buffer_size: usize,
) -> (AuditHandle, AuditWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (AuditHandle::new(tx), AuditWriter::new(rx, store))
}
