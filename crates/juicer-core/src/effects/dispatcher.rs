use std::sync::Arc;

use crate::events::{self, EventSender, FireTrigger, WatchEvent};
use crate::page::{ElementId, Page};

use super::{run_contained, Effect, EffectRegistry, Overlay, Placement};

/// What a dispatch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// An effect ran to completion
    Fired { effect_id: String },
    /// An effect was picked and failed; the failure was logged
    Failed { effect_id: String, error: String },
    /// Nothing registered, or the element has no box
    Skipped,
}

/// Runs a random registered effect over an element
///
/// The ring, when set, plays after the picked effect whatever its outcome.
/// Failures stop here: they are logged and reported as an event, never
/// returned to the caller.
pub struct EffectDispatcher {
    registry: EffectRegistry,
    ring: Option<Arc<dyn Effect>>,
    overlay: Overlay,
    events: EventSender,
}

impl EffectDispatcher {
    pub fn new(registry: EffectRegistry, events: EventSender) -> Self {
        Self {
            registry,
            ring: None,
            overlay: Overlay::new(),
            events,
        }
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EffectRegistry {
        &mut self.registry
    }

    /// Play `ring` after every dispatch
    pub fn set_ring(&mut self, ring: Arc<dyn Effect>) {
        self.ring = Some(ring);
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Keep the overlay aligned with `element`
    pub fn align_overlay(&mut self, page: &dyn Page, element: ElementId) {
        self.overlay.place_over(page, element);
    }

    fn play_ring(&self, placement: &Placement) {
        if let Some(ring) = &self.ring {
            if let Err(e) = run_contained(ring.as_ref(), placement) {
                tracing::warn!("Ring {} failed on {}: {}", ring.id(), placement.element, e);
            }
        }
    }

    pub fn fire(
        &mut self,
        page: &dyn Page,
        element: ElementId,
        trigger: FireTrigger,
    ) -> DispatchOutcome {
        let Some(placement) = self.overlay.place_over(page, element) else {
            tracing::debug!("Skipping effect: {} has no bounding box", element);
            return DispatchOutcome::Skipped;
        };
        let picked = self.registry.run_random(Some(&placement));
        self.play_ring(&placement);

        let Some((effect_id, result)) = picked else {
            return DispatchOutcome::Skipped;
        };
        match result {
            Ok(()) => {
                tracing::info!("Fired {} on {} ({:?})", effect_id, element, trigger);
                events::emit(
                    &self.events,
                    WatchEvent::EffectFired {
                        trigger,
                        element,
                        effect_id: effect_id.clone(),
                        at: chrono::Utc::now(),
                    },
                );
                DispatchOutcome::Fired { effect_id }
            }
            Err(e) => {
                tracing::warn!("Effect {} failed on {}: {}", effect_id, element, e);
                let error = e.to_string();
                events::emit(
                    &self.events,
                    WatchEvent::EffectFailed {
                        trigger,
                        element,
                        effect_id: effect_id.clone(),
                        error: error.clone(),
                    },
                );
                DispatchOutcome::Failed { effect_id, error }
            }
        }
    }
}
