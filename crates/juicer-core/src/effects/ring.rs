use std::sync::Arc;
use std::time::Duration;

use super::{Effect, EffectError, Placement};
use crate::page::{ElementId, Rect};

/// One box-shadow layer of the ring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub blur: f64,
    pub spread: f64,
    /// `(r, g, b, alpha)`
    pub color: (u8, u8, u8, f64),
}

/// A glow ring expanding out of the overlay
///
/// The ring scales from nothing to `peak_scale` at 70% of `duration`, then
/// fades out while growing to `final_scale`. It is removed after `lifetime`.
#[derive(Debug, Clone, PartialEq)]
pub struct RingPulse {
    pub element: ElementId,
    /// Document-relative box of the overlay the ring fills
    pub bounds: Rect,
    pub duration: Duration,
    pub lifetime: Duration,
    pub peak_scale: f64,
    pub final_scale: f64,
    pub glows: [Glow; 2],
}

impl RingPulse {
    pub fn over(placement: &Placement) -> Self {
        let (left, top) = placement.document_offset;
        Self {
            element: placement.element,
            bounds: Rect::new(left, top, placement.rect.width, placement.rect.height),
            duration: Duration::from_millis(650),
            lifetime: Duration::from_millis(700),
            peak_scale: 1.2,
            final_scale: 1.6,
            glows: [
                Glow {
                    blur: 40.0,
                    spread: 15.0,
                    color: (255, 200, 100, 0.8),
                },
                Glow {
                    blur: 120.0,
                    spread: 60.0,
                    color: (255, 100, 0, 0.35),
                },
            ],
        }
    }
}

/// Draws glow rings
pub trait RingRenderer: Send + Sync {
    fn render_ring(&self, pulse: &RingPulse) -> Result<(), EffectError>;
}

/// The glow ring played after every dispatched effect
pub struct GlowRing {
    renderer: Arc<dyn RingRenderer>,
}

impl GlowRing {
    pub const ID: &'static str = "ring.glow";

    pub fn new(renderer: Arc<dyn RingRenderer>) -> Self {
        Self { renderer }
    }
}

impl Effect for GlowRing {
    fn id(&self) -> &str {
        Self::ID
    }

    fn run(&self, placement: &Placement) -> Result<(), EffectError> {
        self.renderer.render_ring(&RingPulse::over(placement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<RingPulse>>);

    impl RingRenderer for Recording {
        fn render_ring(&self, pulse: &RingPulse) -> Result<(), EffectError> {
            self.0.lock().push(pulse.clone());
            Ok(())
        }
    }

    #[test]
    fn test_ring_fills_overlay_box() {
        let renderer = Arc::new(Recording::default());
        let ring = GlowRing::new(renderer.clone());
        let placement = Placement {
            element: ElementId(4),
            rect: Rect::new(10.0, 20.0, 80.0, 24.0),
            document_offset: (10.0, 520.0),
            viewport: (1280.0, 800.0),
        };

        assert!(ring.run(&placement).is_ok());
        let pulses = renderer.0.lock();
        assert_eq!(pulses.len(), 1);
        assert_eq!(pulses[0].element, ElementId(4));
        assert_eq!(pulses[0].bounds, Rect::new(10.0, 520.0, 80.0, 24.0));
        assert!(pulses[0].lifetime > pulses[0].duration);
    }
}
