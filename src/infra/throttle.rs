use crate::app::ports::ThrottlePort;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;

/// Fixed pause after each item, independent of how long the item's calls took.
///
/// The pause runs while holding the lock, so batches sharing one throttle take
/// turns and the spacing holds across all of them.
#[derive(Debug)]
pub struct FixedIntervalThrottle {
    interval: Duration,
    turn: Mutex<()>,
}

impl FixedIntervalThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            turn: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ThrottlePort for FixedIntervalThrottle {
    async fn wait(&self) {
        let _turn = self.turn.lock().await;
        tokio::time::sleep(self.interval).await;
    }
}
