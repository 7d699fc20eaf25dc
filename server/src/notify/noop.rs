use crate::notify::{NotificationEvent, Notifier};

pub struct NoopNotifier;

impl NoopNotifier {
    pub fn new() -> Self {
        NoopNotifier
    }
}

impl Notifier for NoopNotifier {
    fn notify(&self, event: NotificationEvent) {
        ::log::debug!(
            "dropping notification {} for {} recipients",
            event.event_kind,
            event.recipients.len()
        );
    }
}
