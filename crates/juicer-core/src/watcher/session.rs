use tokio::time::Instant;

use super::TeardownRegistry;
use crate::config::{SettingsError, WatcherSettings};
use crate::events::{self, EventSender, WatchEvent};
use crate::status::TargetSet;
use crate::tracker::ArmingGate;

/// Process-wide state of one watcher
///
/// Holds the boot instant behind the deadzone, the validated settings and
/// target set, the subscriptions to tear down on the next route change, and
/// the binding generation that stale timers are checked against.
#[derive(Debug)]
pub struct WatcherSession {
    settings: WatcherSettings,
    targets: TargetSet,
    gate: ArmingGate,
    teardown: TeardownRegistry,
    generation: u64,
    events: EventSender,
}

impl WatcherSession {
    /// Start a session booted at `Instant::now()`
    pub fn new(settings: WatcherSettings, events: EventSender) -> Result<Self, SettingsError> {
        Self::booted_at(settings, events, Instant::now())
    }

    pub fn booted_at(
        settings: WatcherSettings,
        events: EventSender,
        boot: Instant,
    ) -> Result<Self, SettingsError> {
        settings.check()?;
        let targets = settings.target_set()?;
        let gate = ArmingGate::new(boot, settings.timing.boot_deadzone());
        Ok(Self {
            settings,
            targets,
            gate,
            teardown: TeardownRegistry::new(),
            generation: 0,
            events,
        })
    }

    pub fn settings(&self) -> &WatcherSettings {
        &self.settings
    }

    pub fn targets(&self) -> &TargetSet {
        &self.targets
    }

    pub fn gate(&self) -> &ArmingGate {
        &self.gate
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn teardown(&self) -> &TeardownRegistry {
        &self.teardown
    }

    pub fn teardown_mut(&mut self) -> &mut TeardownRegistry {
        &mut self.teardown
    }

    pub(crate) fn emit(&self, event: WatchEvent) {
        events::emit(&self.events, event);
    }

    /// Invalidate everything scheduled so far, returning the new generation
    pub(crate) fn advance_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}
