use crate::app::ports::EventNotifierPort;
use crate::types::Event;
use tokio::sync::broadcast;
use tracing::{info, warn};

const CHANNEL_CAPACITY: usize = 256;

/// Writes events to the log and fans them out to in-process subscribers.
///
/// Sending never blocks; with no subscribers the event is only logged.
pub struct LogNotifier {
    sender: broadcast::Sender<Event>,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LogNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl EventNotifierPort for LogNotifier {
    fn emit(&self, event: Event) {
        if event.is_error {
            warn!(event = event.kind.as_str(), app = %event.app_name, "{}", event.message);
        } else {
            info!(event = event.kind.as_str(), app = %event.app_name, "{}", event.message);
        }
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }
}
