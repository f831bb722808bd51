//! Effect capability: registry, positioning and dispatch.
//!
//! Rendering is external. An [`Effect`] receives a [`Placement`] describing
//! where the triggering element sits and is free to draw whatever it likes.

mod confetti;
mod dispatcher;
mod overlay;
mod registry;
mod ring;

pub use confetti::{
    medical_emoji, register_confetti_presets, BurstShapes, ConfettiBurst, ConfettiEffect,
    ConfettiPreset, ConfettiRenderer,
};
pub use dispatcher::{DispatchOutcome, EffectDispatcher};
pub use overlay::Overlay;
pub use registry::{EffectPicker, EffectRegistry, FixedPicker, RandomPicker, SeededPicker};
pub use ring::{Glow, GlowRing, RingPulse, RingRenderer};

use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

use crate::page::{ElementId, Rect};

/// Errors reported by an effect run
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EffectError {
    /// The effect ran and reported a failure
    #[error("effect {id} failed: {message}")]
    Failed { id: String, message: String },

    /// The renderer behind the effect is not available
    #[error("renderer unavailable for effect {id}")]
    RendererUnavailable { id: String },

    /// The effect panicked
    #[error("effect {id} panicked")]
    Panicked { id: String },
}

/// Where the triggering element sits when an effect runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub element: ElementId,
    /// Viewport-relative rectangle
    pub rect: Rect,
    /// Document-relative top-left corner (scroll offset + rect)
    pub document_offset: (f64, f64),
    /// Window inner size
    pub viewport: (f64, f64),
}

impl Placement {
    /// Rect center as a fraction of the viewport, `(0.5, 0.5)` for an empty viewport
    pub fn origin(&self) -> (f64, f64) {
        let (width, height) = self.viewport;
        if width <= 0.0 || height <= 0.0 {
            return (0.5, 0.5);
        }
        let (cx, cy) = self.rect.center();
        (cx / width, cy / height)
    }
}

/// A celebratory effect
pub trait Effect: Send + Sync {
    /// Stable identifier (e.g. "confetti.burst")
    fn id(&self) -> &str;

    /// Play the effect at the given placement
    fn run(&self, placement: &Placement) -> Result<(), EffectError>;
}

/// Run `effect`, turning a panic into [`EffectError::Panicked`]
pub(crate) fn run_contained(effect: &dyn Effect, placement: &Placement) -> Result<(), EffectError> {
    panic::catch_unwind(AssertUnwindSafe(|| effect.run(placement))).unwrap_or_else(|_| {
        Err(EffectError::Panicked {
            id: effect.id().to_string(),
        })
    })
}

/// Effect backed by a closure
pub struct FnEffect<F> {
    id: String,
    run: F,
}

impl<F> FnEffect<F>
where
    F: Fn(&Placement) -> Result<(), EffectError> + Send + Sync,
{
    pub fn new(id: &str, run: F) -> Self {
        Self {
            id: id.to_string(),
            run,
        }
    }
}

impl<F> Effect for FnEffect<F>
where
    F: Fn(&Placement) -> Result<(), EffectError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self, placement: &Placement) -> Result<(), EffectError> {
        (self.run)(placement)
    }
}
