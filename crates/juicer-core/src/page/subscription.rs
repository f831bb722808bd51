use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type StopFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// Handle for an active observation
///
/// `stop()` disconnects the observer and is idempotent: only the first call
/// runs the disconnect. Dropping an active subscription stops it.
pub struct Subscription {
    label: &'static str,
    active: Arc<AtomicBool>,
    on_stop: Option<StopFn>,
}

impl Subscription {
    /// Create a subscription whose `stop` runs `on_stop` once
    pub fn new<F>(label: &'static str, on_stop: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            label,
            active: Arc::new(AtomicBool::new(true)),
            on_stop: Some(Box::new(on_stop)),
        }
    }

    /// A subscription with nothing to disconnect
    pub fn detached(label: &'static str) -> Self {
        Self::new(label, || Ok(()))
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop the observation
    ///
    /// Returns the disconnect error of the first call, if any. Later calls are
    /// no-ops returning `Ok`.
    pub fn stop(&mut self) -> anyhow::Result<()> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        match self.on_stop.take() {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("Failed to stop {} on drop: {}", self.label, e);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_stop_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut sub = Subscription::new("test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(sub.is_active());
        sub.stop().unwrap();
        sub.stop().unwrap();
        assert!(!sub.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_stops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        {
            let _sub = Subscription::new("test", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_error_reported_once() {
        let mut sub = Subscription::new("test", || anyhow::bail!("already disconnected"));
        assert!(sub.stop().is_err());
        assert!(sub.stop().is_ok());
    }
}
