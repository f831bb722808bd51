use juicer_core::effects::{
    BurstShapes, ConfettiBurst, ConfettiRenderer, EffectError, RingPulse, RingRenderer,
};

/// Renders bursts and rings as log lines
///
/// The first burst of each effect is logged at info, follow-up bursts and
/// rings at debug.
pub struct LogRenderer {
    text_shapes: bool,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self { text_shapes: true }
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn shape_label(shapes: &BurstShapes) -> String {
    match shapes {
        BurstShapes::Default => "confetti".to_string(),
        BurstShapes::Stars => "stars".to_string(),
        BurstShapes::Text { glyphs, .. } => glyphs.concat(),
    }
}

impl ConfettiRenderer for LogRenderer {
    fn supports_text_shapes(&self) -> bool {
        self.text_shapes
    }

    fn render(&self, burst: &ConfettiBurst) -> Result<(), EffectError> {
        let (x, y) = burst.origin;
        if burst.delay.is_zero() {
            tracing::info!(
                "🎉 {} x{} at ({:.2}, {:.2}), angle {:.0}, spread {:.0}",
                shape_label(&burst.shapes),
                burst.particle_count,
                x,
                y,
                burst.angle,
                burst.spread
            );
        } else {
            tracing::debug!(
                "  +{}ms {} x{} at ({:.2}, {:.2})",
                burst.delay.as_millis(),
                shape_label(&burst.shapes),
                burst.particle_count,
                x,
                y
            );
        }
        Ok(())
    }
}

impl RingRenderer for LogRenderer {
    fn render_ring(&self, pulse: &RingPulse) -> Result<(), EffectError> {
        tracing::debug!(
            "  ring on {} at ({:.0}, {:.0}) for {}ms",
            pulse.element,
            pulse.bounds.left,
            pulse.bounds.top,
            pulse.duration.as_millis()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_never_fails() {
        let renderer = LogRenderer::new();
        assert!(renderer.supports_text_shapes());
        assert!(renderer.render(&ConfettiBurst::default()).is_ok());
    }

    #[test]
    fn test_shape_labels() {
        assert_eq!(shape_label(&BurstShapes::Stars), "stars");
        let text = BurstShapes::Text {
            glyphs: vec!["🩺".to_string(), "💊".to_string()],
            scalar: 2.0,
        };
        assert_eq!(shape_label(&text), "🩺💊");
        let plain = LogRenderer { text_shapes: false };
        assert!(!plain.supports_text_shapes());
    }
}
