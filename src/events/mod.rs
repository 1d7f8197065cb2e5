//! Lifecycle events emitted by the engine.
//!
//! Events are a closed set of variants rather than untyped property bags,
//! and the bus is owned by the engine instance: subscribers register a
//! callback on a specific `TokenStore`, never on process-wide state.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// One emitted event with its wall-clock timestamp.
#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

/// The closed set of engine lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Initialized {
        records_loaded: usize,
    },
    Stored {
        id: String,
        size: u64,
    },
    Retrieved {
        id: String,
    },
    Updated {
        id: String,
        size: u64,
    },
    Removed {
        id: String,
        secure: bool,
    },
    BackupCreated {
        backup_id: String,
        token_count: usize,
    },
    BackupRestored {
        backup_id: String,
        restored: usize,
    },
    IntegrityCheck {
        valid: bool,
        errors: usize,
        repaired: usize,
    },
    Cleanup {
        removed: usize,
        reclaimed_bytes: u64,
    },
    Error {
        operation: String,
        id: Option<String>,
        message: String,
    },
}

type Subscriber = Box<dyn Fn(&Event) + Send + Sync>;

/// Callback registry for engine events.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked synchronously for every emitted event.
    pub fn subscribe(&self, f: impl Fn(&Event) + Send + Sync + 'static) {
        self.subscribers.lock().push(Box::new(f));
    }

    /// Deliver an event to all subscribers, stamping it with the current time.
    pub fn emit(&self, kind: EventKind) {
        let event = Event {
            timestamp: Utc::now(),
            kind,
        };
        for subscriber in self.subscribers.lock().iter() {
            subscriber(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.subscribe(move |event| sink.lock().push(event.kind.clone()));

        bus.emit(EventKind::Stored {
            id: "github".into(),
            size: 42,
        });
        bus.emit(EventKind::Retrieved { id: "github".into() });

        let events = seen.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            EventKind::Stored {
                id: "github".into(),
                size: 42
            }
        );
    }
}
