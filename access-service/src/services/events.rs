use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::store::UserStore;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Session lifecycle notifications. Login and logout are not audited; these
/// events are how other components learn about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { user_id: Uuid, at: DateTime<Utc> },
    LoggedOut { user_id: Uuid, at: DateTime<Utc> },
}

#[derive(Clone)]
pub struct SessionEvents {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Fire and forget; having no subscribers is fine.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

/// Keep `last_login_utc` current from the event stream.
pub fn spawn_last_login_tracker(
    events: &SessionEvents,
    users: Arc<dyn UserStore>,
) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::LoggedIn { user_id, at }) => {
                    if let Err(e) = users.record_login(user_id, at).await {
                        tracing::warn!(user_id = %user_id, error = %e, "Failed to record last login");
                    }
                }
                Ok(SessionEvent::LoggedOut { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Last-login tracker lagged behind session events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
