use crate::page::Subscription;

/// Result of running every registered teardown step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub stopped: usize,
    pub failed: usize,
}

/// Subscriptions to stop when the page changes under the watcher
///
/// Steps run last-registered first. Each step is isolated: a failing stop is
/// logged and the remaining steps still run.
#[derive(Debug, Default)]
pub struct TeardownRegistry {
    subscriptions: Vec<Subscription>,
}

impl TeardownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn run_all(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        while let Some(mut subscription) = self.subscriptions.pop() {
            match subscription.stop() {
                Ok(()) => report.stopped += 1,
                Err(e) => {
                    tracing::warn!("Failed to stop {}: {}", subscription.label(), e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}
