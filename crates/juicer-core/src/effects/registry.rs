use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use std::sync::Arc;

use super::{run_contained, Effect, EffectError, Placement};

/// Chooses an index among `len` registered effects
pub trait EffectPicker: Send {
    /// Pick an index in `0..len`; `len` is never zero
    fn pick(&mut self, len: usize) -> usize;
}

/// Uniform choice from the thread-local generator
#[derive(Debug, Default)]
pub struct RandomPicker;

impl EffectPicker for RandomPicker {
    fn pick(&mut self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Uniform choice from a fixed seed, for reproducible runs
pub struct SeededPicker {
    rng: StdRng,
}

impl SeededPicker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl EffectPicker for SeededPicker {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

/// Always the same index (clamped to the registry size)
#[derive(Debug)]
pub struct FixedPicker(pub usize);

impl EffectPicker for FixedPicker {
    fn pick(&mut self, len: usize) -> usize {
        self.0.min(len - 1)
    }
}

/// Registered effects plus the policy choosing among them
pub struct EffectRegistry {
    effects: Vec<Arc<dyn Effect>>,
    picker: Box<dyn EffectPicker>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectRegistry {
    /// Empty registry with uniform random selection
    pub fn new() -> Self {
        Self::with_picker(Box::new(RandomPicker))
    }

    pub fn with_picker(picker: Box<dyn EffectPicker>) -> Self {
        Self {
            effects: Vec::new(),
            picker,
        }
    }

    /// Replace the selection policy
    pub fn set_picker(&mut self, picker: Box<dyn EffectPicker>) {
        self.picker = picker;
    }

    /// Register an effect; a later effect with the same id replaces the earlier one
    pub fn register(&mut self, effect: Arc<dyn Effect>) {
        if let Some(existing) = self.effects.iter_mut().find(|e| e.id() == effect.id()) {
            *existing = effect;
        } else {
            self.effects.push(effect);
        }
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.effects.iter().map(|e| e.id()).collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Effect>> {
        self.effects.iter().find(|e| e.id() == id).cloned()
    }

    /// Pick one effect, `None` when nothing is registered
    pub fn pick_random(&mut self) -> Option<Arc<dyn Effect>> {
        if self.effects.is_empty() {
            return None;
        }
        let index = self.picker.pick(self.effects.len());
        self.effects.get(index).cloned()
    }

    /// Pick and run one effect
    ///
    /// Silently does nothing (returns `None`) when the registry is empty or
    /// there is no placement. Otherwise returns the chosen id and the run
    /// result; a panicking effect reports [`EffectError::Panicked`].
    pub fn run_random(
        &mut self,
        placement: Option<&Placement>,
    ) -> Option<(String, Result<(), EffectError>)> {
        let placement = placement?;
        let effect = self.pick_random()?;
        let id = effect.id().to_string();
        tracing::debug!("Running effect {}", id);
        Some((id, run_contained(effect.as_ref(), placement)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::FnEffect;
    use crate::page::{ElementId, Rect};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn placement() -> Placement {
        Placement {
            element: ElementId(1),
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            document_offset: (0.0, 0.0),
            viewport: (100.0, 100.0),
        }
    }

    fn counting(id: &str, counter: Arc<AtomicUsize>) -> Arc<dyn Effect> {
        Arc::new(FnEffect::new(id, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    #[test]
    fn test_empty_registry_is_noop() {
        let mut registry = EffectRegistry::new();
        assert!(registry.pick_random().is_none());
        assert!(registry.run_random(Some(&placement())).is_none());
    }

    #[test]
    fn test_missing_placement_is_noop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = EffectRegistry::new();
        registry.register(counting("a", calls.clone()));

        assert!(registry.run_random(None).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fixed_picker_selects_index() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let mut registry = EffectRegistry::with_picker(Box::new(FixedPicker(1)));
        registry.register(counting("a", a.clone()));
        registry.register(counting("b", b.clone()));

        let (id, result) = registry.run_random(Some(&placement())).unwrap();
        assert_eq!(id, "b");
        assert!(result.is_ok());
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fixed_picker_clamps() {
        assert_eq!(FixedPicker(10).pick(3), 2);
    }

    #[test]
    fn test_seeded_picker_is_reproducible() {
        let mut first = SeededPicker::new(42);
        let mut second = SeededPicker::new(42);
        let a: Vec<usize> = (0..20).map(|_| first.pick(7)).collect();
        let b: Vec<usize> = (0..20).map(|_| second.pick(7)).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|i| *i < 7));
    }

    #[test]
    fn test_random_picker_in_range() {
        let mut picker = RandomPicker;
        for _ in 0..50 {
            assert!(picker.pick(3) < 3);
        }
    }

    #[test]
    fn test_register_replaces_same_id() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = EffectRegistry::new();
        registry.register(counting("a", calls.clone()));
        registry.register(counting("a", calls.clone()));
        registry.register(counting("b", calls));
        assert_eq!(registry.ids(), vec!["a", "b"]);
        assert!(registry.get("b").is_some());
    }
}
