use larder_sync_core::SyncRegion;
use tokio::sync::mpsc;

/// Hook a store fires after each mutation that should reach the cloud,
/// naming the region it touched. Deliveries are fire-and-forget: the
/// consumer coalesces bursts, and a missing consumer never blocks or
/// fails the local mutation.
#[derive(Debug, Clone)]
pub struct PushHandle {
    tx: Option<mpsc::UnboundedSender<SyncRegion>>,
}

impl PushHandle {
    /// Creates a connected handle plus the receiver the sync engine
    /// drains. Clones of the handle feed the same receiver.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncRegion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A handle with no consumer. Stores built with it work normally,
    /// their mutations just never reach a sync engine.
    #[must_use]
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, region: SyncRegion) {
        if let Some(tx) = &self.tx {
            // A closed receiver means the engine is gone; the local
            // mutation stands either way.
            let _ = tx.send(region);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notify_reaches_the_receiver() {
        let (handle, mut rx) = PushHandle::channel();
        handle.notify(SyncRegion::Pantry);
        handle.notify(SyncRegion::Shopping);

        assert_eq!(rx.recv().await, Some(SyncRegion::Pantry));
        assert_eq!(rx.recv().await, Some(SyncRegion::Shopping));
    }

    #[tokio::test]
    async fn clones_share_one_receiver() {
        let (handle, mut rx) = PushHandle::channel();
        let clone = handle.clone();
        clone.notify(SyncRegion::Recipes);
        assert_eq!(rx.recv().await, Some(SyncRegion::Recipes));
    }

    #[test]
    fn disconnected_notify_is_a_no_op() {
        let handle = PushHandle::disconnected();
        handle.notify(SyncRegion::MealPlans);
    }

    #[test]
    fn notify_after_receiver_dropped_is_silent() {
        let (handle, rx) = PushHandle::channel();
        drop(rx);
        handle.notify(SyncRegion::Pantry);
    }
}
