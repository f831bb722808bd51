//! Built-in confetti presets.
//!
//! A preset expands a [`Placement`] into a short timeline of
//! [`ConfettiBurst`]es. Drawing them is the job of a [`ConfettiRenderer`].

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use std::sync::Arc;
use std::time::Duration;

use super::{Effect, EffectError, EffectRegistry, Placement};

const SHOWER_FRAME: Duration = Duration::from_millis(16);
const SHOWER_LENGTH: Duration = Duration::from_millis(1200);

/// Particle shapes for one burst
#[derive(Debug, Clone, PartialEq)]
pub enum BurstShapes {
    /// Renderer default (squares and circles)
    Default,
    Stars,
    /// Glyphs drawn as text at the given scale
    Text { glyphs: Vec<String>, scalar: f64 },
}

/// One emission of particles, `delay` after the effect started
#[derive(Debug, Clone, PartialEq)]
pub struct ConfettiBurst {
    pub delay: Duration,
    pub particle_count: u32,
    pub angle: f64,
    pub spread: f64,
    pub start_velocity: f64,
    pub gravity: f64,
    pub ticks: u32,
    pub scalar: f64,
    pub drift: f64,
    pub shapes: BurstShapes,
    /// Viewport fraction, `(0, 0)` top-left
    pub origin: (f64, f64),
}

impl Default for ConfettiBurst {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            particle_count: 50,
            angle: 90.0,
            spread: 45.0,
            start_velocity: 45.0,
            gravity: 1.0,
            ticks: 200,
            scalar: 1.0,
            drift: 0.0,
            shapes: BurstShapes::Default,
            origin: (0.5, 0.5),
        }
    }
}

impl ConfettiBurst {
    fn at(origin: (f64, f64)) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Draws confetti bursts
pub trait ConfettiRenderer: Send + Sync {
    /// Whether glyph shapes can be drawn; emoji presets fall back to stars otherwise
    fn supports_text_shapes(&self) -> bool;

    /// Draw (or schedule, per `burst.delay`) one burst
    fn render(&self, burst: &ConfettiBurst) -> Result<(), EffectError>;
}

/// Named confetti timelines
#[derive(Debug, Clone, PartialEq)]
pub enum ConfettiPreset {
    /// Central burst followed by two side bursts
    Burst,
    /// Two side cannons aimed inward
    Cannons,
    /// Four jittered all-direction bursts
    Fireworks,
    /// Small bursts every frame for just over a second
    Shower,
    /// Three slow, drifting bursts above the element
    Float,
    Stars,
    /// Glyph confetti, drawn as stars when the renderer lacks text shapes
    Emoji {
        id: String,
        glyphs: Vec<String>,
        scalar: f64,
    },
}

/// The medical emoji preset
pub fn medical_emoji() -> ConfettiPreset {
    ConfettiPreset::emoji(
        "confetti.medicalEmoji",
        &["🩺", "💉", "💊", "🧬", "🩹", "🏥", "🧪", "🫀"],
        1.6,
    )
}

fn jitter(rng: &mut StdRng, width: f64) -> f64 {
    (rng.random::<f64>() - 0.5) * width
}

impl ConfettiPreset {
    pub fn emoji(id: &str, glyphs: &[&str], scalar: f64) -> Self {
        ConfettiPreset::Emoji {
            id: id.to_string(),
            glyphs: glyphs.iter().map(|g| g.to_string()).collect(),
            scalar,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ConfettiPreset::Burst => "confetti.burst",
            ConfettiPreset::Cannons => "confetti.cannons",
            ConfettiPreset::Fireworks => "confetti.fireworks",
            ConfettiPreset::Shower => "confetti.shower",
            ConfettiPreset::Float => "confetti.float",
            ConfettiPreset::Stars => "confetti.stars",
            ConfettiPreset::Emoji { id, .. } => id,
        }
    }

    /// Expand the preset into its burst timeline
    pub fn bursts(
        &self,
        placement: &Placement,
        rng: &mut StdRng,
        text_shapes: bool,
    ) -> Vec<ConfettiBurst> {
        let (x, y) = placement.origin();
        match self {
            ConfettiPreset::Burst => {
                let side = |origin_x: f64, angle: f64| ConfettiBurst {
                    particle_count: 60,
                    angle,
                    spread: 55.0,
                    ..ConfettiBurst::at((origin_x, y)).after(Duration::from_millis(200))
                };
                vec![
                    ConfettiBurst {
                        particle_count: 140,
                        spread: 80.0,
                        start_velocity: 45.0,
                        ..ConfettiBurst::at((x, y))
                    },
                    side(0.0, 60.0),
                    side(1.0, 120.0),
                ]
            }
            ConfettiPreset::Cannons => [(0.0, 60.0), (1.0, 120.0)]
                .into_iter()
                .map(|(origin_x, angle)| ConfettiBurst {
                    particle_count: 120,
                    angle,
                    spread: 70.0,
                    start_velocity: 55.0,
                    ..ConfettiBurst::at((origin_x, y))
                })
                .collect(),
            ConfettiPreset::Fireworks => (0..4u64)
                .map(|i| {
                    let origin = (
                        (x + jitter(rng, 0.2)).clamp(0.05, 0.95),
                        (y + jitter(rng, 0.2)).clamp(0.15, 0.85),
                    );
                    ConfettiBurst {
                        particle_count: 90,
                        spread: 360.0,
                        start_velocity: 60.0,
                        ticks: 210,
                        gravity: 0.9,
                        ..ConfettiBurst::at(origin).after(Duration::from_millis(i * 180))
                    }
                })
                .collect(),
            ConfettiPreset::Shower => {
                let mut bursts = Vec::new();
                let mut delay = Duration::ZERO;
                while delay <= SHOWER_LENGTH {
                    bursts.push(ConfettiBurst {
                        particle_count: 6 + rng.random_range(0..5),
                        spread: 65.0,
                        start_velocity: 30.0,
                        gravity: 1.1,
                        ..ConfettiBurst::at((x + jitter(rng, 0.08), y - 0.05)).after(delay)
                    });
                    delay += SHOWER_FRAME;
                }
                bursts
            }
            ConfettiPreset::Float => (0..3u64)
                .map(|i| ConfettiBurst {
                    particle_count: 80,
                    spread: 90.0,
                    start_velocity: 25.0,
                    gravity: 0.6,
                    scalar: 1.0 + rng.random::<f64>() * 0.4,
                    drift: jitter(rng, 1.2),
                    ticks: 260,
                    ..ConfettiBurst::at((x, (y - 0.1).max(0.05)))
                        .after(Duration::from_millis(i * 200))
                })
                .collect(),
            ConfettiPreset::Stars => vec![ConfettiBurst {
                particle_count: 120,
                spread: 100.0,
                start_velocity: 45.0,
                gravity: 0.9,
                shapes: BurstShapes::Stars,
                scalar: 1.2,
                ..ConfettiBurst::at((x, y))
            }],
            ConfettiPreset::Emoji { glyphs, scalar, .. } => {
                if !text_shapes {
                    return ConfettiPreset::Stars.bursts(placement, rng, text_shapes);
                }
                (0..3u64)
                    .map(|i| {
                        let origin = (x + jitter(rng, 0.04), y + jitter(rng, 0.04));
                        ConfettiBurst {
                            particle_count: 60,
                            spread: 75.0,
                            start_velocity: 42.0,
                            gravity: 0.95,
                            shapes: BurstShapes::Text {
                                glyphs: glyphs.clone(),
                                scalar: *scalar,
                            },
                            scalar: *scalar,
                            ..ConfettiBurst::at(origin).after(Duration::from_millis(i * 160))
                        }
                    })
                    .collect()
            }
        }
    }
}

/// A preset bound to a renderer
pub struct ConfettiEffect {
    preset: ConfettiPreset,
    renderer: Arc<dyn ConfettiRenderer>,
    rng: Mutex<StdRng>,
}

impl ConfettiEffect {
    pub fn new(preset: ConfettiPreset, renderer: Arc<dyn ConfettiRenderer>) -> Self {
        Self::with_seed(preset, renderer, rand::random())
    }

    pub fn with_seed(preset: ConfettiPreset, renderer: Arc<dyn ConfettiRenderer>, seed: u64) -> Self {
        Self {
            preset,
            renderer,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn preset(&self) -> &ConfettiPreset {
        &self.preset
    }
}

impl Effect for ConfettiEffect {
    fn id(&self) -> &str {
        self.preset.id()
    }

    fn run(&self, placement: &Placement) -> Result<(), EffectError> {
        let bursts = {
            let mut rng = self.rng.lock();
            self.preset
                .bursts(placement, &mut rng, self.renderer.supports_text_shapes())
        };
        for burst in &bursts {
            self.renderer.render(burst)?;
        }
        Ok(())
    }
}

/// Register every built-in preset against `renderer`
///
/// With a seed, each preset's jitter is reproducible.
pub fn register_confetti_presets(
    registry: &mut EffectRegistry,
    renderer: Arc<dyn ConfettiRenderer>,
    seed: Option<u64>,
) {
    let presets = [
        ConfettiPreset::Burst,
        ConfettiPreset::Cannons,
        ConfettiPreset::Fireworks,
        ConfettiPreset::Shower,
        ConfettiPreset::Float,
        ConfettiPreset::Stars,
        medical_emoji(),
    ];
    for (i, preset) in presets.into_iter().enumerate() {
        let effect = match seed {
            Some(seed) => ConfettiEffect::with_seed(preset, renderer.clone(), seed + i as u64),
            None => ConfettiEffect::new(preset, renderer.clone()),
        };
        registry.register(Arc::new(effect));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ElementId, Rect};

    struct Recording {
        text_shapes: bool,
        bursts: Mutex<Vec<ConfettiBurst>>,
    }

    impl Recording {
        fn new(text_shapes: bool) -> Arc<Self> {
            Arc::new(Self {
                text_shapes,
                bursts: Mutex::new(Vec::new()),
            })
        }
    }

    impl ConfettiRenderer for Recording {
        fn supports_text_shapes(&self) -> bool {
            self.text_shapes
        }

        fn render(&self, burst: &ConfettiBurst) -> Result<(), EffectError> {
            self.bursts.lock().push(burst.clone());
            Ok(())
        }
    }

    struct Broken;

    impl ConfettiRenderer for Broken {
        fn supports_text_shapes(&self) -> bool {
            false
        }

        fn render(&self, _burst: &ConfettiBurst) -> Result<(), EffectError> {
            Err(EffectError::RendererUnavailable {
                id: "confetti".to_string(),
            })
        }
    }

    fn placement() -> Placement {
        Placement {
            element: ElementId(1),
            rect: Rect::new(150.0, 350.0, 100.0, 100.0),
            document_offset: (150.0, 350.0),
            viewport: (1000.0, 1000.0),
        }
    }

    #[test]
    fn test_burst_timeline() {
        let mut rng = StdRng::seed_from_u64(1);
        let bursts = ConfettiPreset::Burst.bursts(&placement(), &mut rng, false);
        assert_eq!(bursts.len(), 3);
        assert_eq!(bursts[0].particle_count, 140);
        assert_eq!(bursts[0].origin, (0.2, 0.4));
        assert_eq!(bursts[1].delay, Duration::from_millis(200));
        assert_eq!(bursts[1].origin, (0.0, 0.4));
        assert_eq!(bursts[2].angle, 120.0);
        assert_eq!(bursts[2].origin, (1.0, 0.4));
    }

    #[test]
    fn test_fireworks_origin_is_clamped() {
        let edge = Placement {
            rect: Rect::new(0.0, 0.0, 0.0, 0.0),
            ..placement()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let bursts = ConfettiPreset::Fireworks.bursts(&edge, &mut rng, false);
        assert_eq!(bursts.len(), 4);
        for (i, burst) in bursts.iter().enumerate() {
            assert_eq!(burst.delay, Duration::from_millis(i as u64 * 180));
            assert!((0.05..=0.95).contains(&burst.origin.0));
            assert!((0.15..=0.85).contains(&burst.origin.1));
        }
    }

    #[test]
    fn test_shower_spans_frames() {
        let mut rng = StdRng::seed_from_u64(3);
        let bursts = ConfettiPreset::Shower.bursts(&placement(), &mut rng, false);
        assert_eq!(bursts.len(), 76);
        assert_eq!(bursts.last().unwrap().delay, SHOWER_LENGTH);
        assert!(bursts
            .iter()
            .all(|b| (6..=10).contains(&b.particle_count)));
    }

    #[test]
    fn test_float_stays_below_top() {
        let top = Placement {
            rect: Rect::new(100.0, 0.0, 10.0, 10.0),
            ..placement()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let bursts = ConfettiPreset::Float.bursts(&top, &mut rng, false);
        assert_eq!(bursts.len(), 3);
        assert!(bursts.iter().all(|b| b.origin.1 == 0.05));
        assert!(bursts.iter().all(|b| (1.0..1.4).contains(&b.scalar)));
    }

    #[test]
    fn test_emoji_falls_back_to_stars() {
        let mut rng = StdRng::seed_from_u64(9);
        let bursts = medical_emoji().bursts(&placement(), &mut rng, false);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].shapes, BurstShapes::Stars);

        let bursts = medical_emoji().bursts(&placement(), &mut rng, true);
        assert_eq!(bursts.len(), 3);
        assert!(matches!(
            &bursts[0].shapes,
            BurstShapes::Text { glyphs, .. } if glyphs.len() == 8
        ));
    }

    #[test]
    fn test_effect_renders_every_burst() {
        let renderer = Recording::new(true);
        let effect = ConfettiEffect::with_seed(ConfettiPreset::Cannons, renderer.clone(), 0);
        assert_eq!(effect.id(), "confetti.cannons");
        effect.run(&placement()).unwrap();
        assert_eq!(renderer.bursts.lock().len(), 2);
    }

    #[test]
    fn test_renderer_failure_propagates() {
        let effect = ConfettiEffect::with_seed(ConfettiPreset::Stars, Arc::new(Broken), 0);
        assert!(matches!(
            effect.run(&placement()),
            Err(EffectError::RendererUnavailable { .. })
        ));
    }

    #[test]
    fn test_register_all_presets() {
        let mut registry = EffectRegistry::new();
        register_confetti_presets(&mut registry, Recording::new(false), Some(1));
        assert_eq!(
            registry.ids(),
            vec![
                "confetti.burst",
                "confetti.cannons",
                "confetti.fireworks",
                "confetti.shower",
                "confetti.float",
                "confetti.stars",
                "confetti.medicalEmoji",
            ]
        );
    }
}
