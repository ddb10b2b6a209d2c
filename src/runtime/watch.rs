//! Async subscriptions to class targets backed by `tokio::sync::watch`.

use std::sync::Arc;

use tokio::sync::watch;

use crate::core::{AppResult, ClassId, ObserverId, QosEngine, QosError, TargetChange, TargetObserver};

struct WatchObserver {
    tx: watch::Sender<i32>,
}

impl TargetObserver for WatchObserver {
    fn on_target_changed(&self, change: &TargetChange) -> AppResult<()> {
        // send_replace never fails, even with no live receiver
        self.tx.send_replace(change.target);
        Ok(())
    }
}

/// Live view of a class target for async consumers.
///
/// Dropping the subscription unregisters its observer.
pub struct TargetSubscription {
    engine: QosEngine,
    class: ClassId,
    observer: ObserverId,
    rx: watch::Receiver<i32>,
}

/// Subscribe to target changes of a class.
pub fn subscribe(engine: &QosEngine, class: ClassId) -> Result<TargetSubscription, QosError> {
    let initial = engine.current_target(class)?;
    let (tx, rx) = watch::channel(initial);
    let observer = engine.register_observer(class, Arc::new(WatchObserver { tx }))?;
    Ok(TargetSubscription {
        engine: engine.clone(),
        class,
        observer,
        rx,
    })
}

impl TargetSubscription {
    /// Most recently published target.
    pub fn current(&self) -> i32 {
        *self.rx.borrow()
    }

    /// Wait for the next change and return the new target.
    pub async fn changed(&mut self) -> Result<i32, QosError> {
        self.rx
            .changed()
            .await
            .map_err(|_| QosError::InvalidHandle)?;
        Ok(*self.rx.borrow_and_update())
    }

    /// Class being watched.
    pub const fn class(&self) -> ClassId {
        self.class
    }
}

impl Drop for TargetSubscription {
    fn drop(&mut self) {
        let _ = self.engine.unregister_observer(self.class, self.observer);
    }
}
