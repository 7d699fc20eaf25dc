use crate::notify::{NotificationEvent, Notifier};

/// Keeps every notification in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    events: ::std::sync::Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_of_kind(&self, kind: &str) -> Vec<NotificationEvent> {
        self.events()
            .into_iter()
            .filter(|x| x.event_kind == kind)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: NotificationEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
