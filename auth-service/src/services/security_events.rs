use std::sync::Arc;

use crate::models::SecurityEvent;
use crate::services::SecurityEventLog;

/// Best-effort writer for the security event trail. A failed append is logged
/// and never fails the operation that produced the event.
#[derive(Clone)]
pub struct SecurityEventRecorder {
    log: Arc<dyn SecurityEventLog>,
}

impl SecurityEventRecorder {
    pub fn new(log: Arc<dyn SecurityEventLog>) -> Self {
        Self { log }
    }

    pub async fn record(&self, event: SecurityEvent) {
        if let Err(e) = self.log.append_event(&event).await {
            tracing::error!(
                error = %e,
                user_id = %event.user_id,
                event_type = %event.event_type_code,
                "Failed to record security event"
            );
        }
    }
}
