//! Change notifications for the UI layer.
//!
//! Publishers fire and forget; subscribers get their own mpsc receiver.
//! Delivery order between subscribers is not guaranteed.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    BlocksChanged,
    BypassOccurred { host_name: String },
    StatsUpdated,
    ScheduleActivated { schedule_id: i64 },
    ScheduleDeactivated { schedule_id: i64 },
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<AppEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<AppEvent> {
        let (tx, rx) = channel();
        let mut subs = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        subs.push(tx);
        rx
    }

    /// Deliver an event to every live subscriber; dropped receivers are pruned.
    pub fn publish(&self, event: &AppEvent) {
        let mut subs = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
