use std::time::Duration;
use tokio::time::Instant;

use super::EntityRecord;

/// Suppresses firing during the boot deadzone and each entity's settling window
#[derive(Debug, Clone, Copy)]
pub struct ArmingGate {
    boot: Instant,
    deadzone: Duration,
}

impl ArmingGate {
    pub fn new(boot: Instant, deadzone: Duration) -> Self {
        Self { boot, deadzone }
    }

    pub fn boot(&self) -> Instant {
        self.boot
    }

    /// Whether `now` is still inside the global boot deadzone
    pub fn in_deadzone(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.boot) <= self.deadzone
    }

    /// Whether an entity may fire at `now`
    ///
    /// Requires the entity to be armed with its deadline passed, and the boot
    /// deadzone to have elapsed.
    pub fn should_fire(&self, record: &EntityRecord, now: Instant) -> bool {
        let deadline_passed = record.arm_at.map(|at| now >= at).unwrap_or(false);
        record.armed && deadline_passed && !self.in_deadzone(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADZONE: Duration = Duration::from_millis(1200);

    fn record(armed: bool, arm_at: Option<Instant>) -> EntityRecord {
        EntityRecord {
            last_status: "to do".to_string(),
            armed,
            arm_at,
        }
    }

    #[test]
    fn test_unarmed_never_fires() {
        let boot = Instant::now();
        let gate = ArmingGate::new(boot, DEADZONE);
        let later = boot + Duration::from_secs(10);
        assert!(!gate.should_fire(&record(false, Some(boot)), later));
    }

    #[test]
    fn test_armed_after_deadline_and_deadzone_fires() {
        let boot = Instant::now();
        let gate = ArmingGate::new(boot, DEADZONE);
        let arm_at = boot + Duration::from_millis(900);
        let now = boot + Duration::from_millis(1300);
        assert!(gate.should_fire(&record(true, Some(arm_at)), now));
    }

    #[test]
    fn test_deadzone_blocks_armed_entity() {
        let boot = Instant::now();
        let gate = ArmingGate::new(boot, DEADZONE);
        let arm_at = boot + Duration::from_millis(100);
        let now = boot + Duration::from_millis(1200);
        assert!(gate.in_deadzone(now));
        assert!(!gate.should_fire(&record(true, Some(arm_at)), now));
    }

    #[test]
    fn test_extended_deadline_blocks_armed_entity() {
        let boot = Instant::now();
        let gate = ArmingGate::new(boot, DEADZONE);
        let now = boot + Duration::from_secs(5);
        let arm_at = now + Duration::from_millis(1);
        assert!(!gate.should_fire(&record(true, Some(arm_at)), now));
    }

    #[test]
    fn test_armed_without_deadline_does_not_fire() {
        let boot = Instant::now();
        let gate = ArmingGate::new(boot, DEADZONE);
        let now = boot + Duration::from_secs(5);
        assert!(!gate.should_fire(&record(true, None), now));
    }
}
