//! Mock audit log.

use super::lock;
use crate::error::Result;
use crate::providers::{AuditEvent, AuditKind, AuditLog};
use std::sync::{Arc, Mutex};

/// In-memory append-only audit log for testing.
#[derive(Clone, Default)]
pub struct MockAuditLog {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MockAuditLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count of events of one kind.
    #[must_use]
    pub fn count(&self, kind: AuditKind) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| e.kind == kind).count())
            .unwrap_or(0)
    }
}

impl AuditLog for MockAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        lock(&self.events)?.push(event);
        Ok(())
    }
}
