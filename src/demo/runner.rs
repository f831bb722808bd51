use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use juicer_core::config::WatcherSettings;
use juicer_core::effects::{
    register_confetti_presets, ConfettiRenderer, EffectRegistry, GlowRing, SeededPicker,
};
use juicer_core::events::WatchEvent;
use juicer_core::page::{ElementId, ElementSpec, Rect, SimulatedPage};
use juicer_core::watcher::Watcher;

use super::renderer::LogRenderer;
use super::scenario::{DemoAction, DemoScenario};

const ROW_HEIGHT: f64 = 40.0;

/// Counts gathered from the event stream
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DemoSummary {
    pub fired: usize,
    pub failed: usize,
    pub status_changes: usize,
}

/// Applies scenario actions to the simulated page
struct Stage {
    page: SimulatedPage,
    settings: WatcherSettings,
    rows: HashMap<String, ElementId>,
    detail: Option<ElementId>,
}

impl Stage {
    fn new(page: SimulatedPage, settings: WatcherSettings) -> Self {
        Self {
            page,
            settings,
            rows: HashMap::new(),
            detail: None,
        }
    }

    fn row_spec(&self, status: &str) -> ElementSpec {
        let selector = self
            .settings
            .row_selectors
            .first()
            .map(String::as_str)
            .unwrap_or_default();
        let top = 120.0 + self.rows.len() as f64 * ROW_HEIGHT;
        ElementSpec::new()
            .matching(selector)
            .attr(
                &self.settings.status_attribute,
                &format!("{} - Change status", status),
            )
            .rect(Rect::new(640.0, top, 96.0, 28.0))
    }

    fn detail_spec(&self, status: &str) -> ElementSpec {
        ElementSpec::new()
            .matching(&self.settings.detail_selector)
            .text(status)
            .rect(Rect::new(880.0, 96.0, 120.0, 32.0))
    }

    fn row(&self, name: &str) -> Option<ElementId> {
        let id = self.rows.get(name).copied();
        if id.is_none() {
            tracing::warn!("Scenario refers to unknown row {}", name);
        }
        id
    }

    fn apply(&mut self, action: &DemoAction) {
        tracing::debug!("Step: {:?}", action);
        match action {
            DemoAction::Navigate { path } => {
                self.page.clear();
                self.page.navigate(path);
                self.rows.clear();
                self.detail = None;
            }
            DemoAction::AddDetail { status } => {
                if self.detail.is_some() {
                    tracing::warn!("Detail element already present, use replace_detail");
                    return;
                }
                let spec = self.detail_spec(status);
                self.detail = Some(self.page.append(self.page.body(), spec));
            }
            DemoAction::ReplaceDetail { status } => {
                let spec = self.detail_spec(status);
                let replaced = self
                    .detail
                    .and_then(|old| self.page.replace(old, spec.clone()));
                self.detail =
                    Some(replaced.unwrap_or_else(|| self.page.append(self.page.body(), spec)));
            }
            DemoAction::SetStatus { status } => match self.detail {
                Some(id) => self.page.set_text(id, status),
                None => tracing::warn!("No detail element to update"),
            },
            DemoAction::AddRow { row, status } => {
                let spec = self.row_spec(status);
                let id = self.page.append(self.page.body(), spec);
                if let Some(old) = self.rows.insert(row.clone(), id) {
                    self.page.remove(old);
                }
            }
            DemoAction::SetRowStatus { row, status } => {
                if let Some(id) = self.row(row) {
                    self.page.set_attribute(
                        id,
                        &self.settings.status_attribute,
                        &format!("{} - Change status", status),
                    );
                }
            }
            DemoAction::RemoveRow { row } => {
                if let Some(id) = self.rows.remove(row) {
                    self.page.remove(id);
                }
            }
            DemoAction::ClickRow { row } => {
                if let Some(id) = self.row(row) {
                    self.page.click(id);
                }
            }
            DemoAction::Key(chord) => self.page.key_down(chord.clone()),
            DemoAction::Scroll { x, y } => self.page.scroll_to(*x, *y),
        }
    }
}

/// Log every watch event and count the interesting ones until the channel closes
async fn collect_events(mut rx: broadcast::Receiver<WatchEvent>) -> DemoSummary {
    let mut summary = DemoSummary::default();
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Ok(json) = serde_json::to_string(&event) {
                    tracing::debug!("event: {}", json);
                }
                match &event {
                    WatchEvent::EffectFired {
                        effect_id, element, ..
                    } => {
                        summary.fired += 1;
                        tracing::info!("Fired {} on {}", effect_id, element);
                    }
                    WatchEvent::EffectFailed { error, .. } => {
                        summary.failed += 1;
                        tracing::warn!("Effect failed: {}", error);
                    }
                    WatchEvent::StatusChanged { .. } => summary.status_changes += 1,
                    _ => {}
                }
            }
            Err(RecvError::Lagged(n)) => tracing::warn!("Event log skipped {} events", n),
            Err(RecvError::Closed) => break,
        }
    }
    summary
}

/// Play `scenario` against a simulated page while a watcher runs
pub async fn run(
    settings: WatcherSettings,
    scenario: DemoScenario,
    seed: Option<u64>,
) -> Result<DemoSummary> {
    let page = SimulatedPage::new(&scenario.path);
    let mut stage = Stage::new(page.clone(), settings.clone());

    // Steps at offset zero describe the page as it loads
    let (initial, timed): (Vec<_>, Vec<_>) =
        scenario.steps.iter().partition(|step| step.at_ms == 0);
    for step in initial {
        stage.apply(&step.action);
    }

    let renderer = Arc::new(LogRenderer::new());
    let confetti: Arc<dyn ConfettiRenderer> = renderer.clone();
    let mut registry = match seed {
        Some(seed) => EffectRegistry::with_picker(Box::new(SeededPicker::new(seed))),
        None => EffectRegistry::new(),
    };
    register_confetti_presets(&mut registry, confetti, seed);

    let watcher = Watcher::new(page, settings, registry)
        .context("Invalid watcher settings")?
        .with_ring(Arc::new(GlowRing::new(renderer)));
    let collector = tokio::spawn(collect_events(watcher.subscribe()));
    let shutdown = watcher.shutdown_handle();
    let handle = tokio::spawn(watcher.run());

    tracing::info!(
        "Playing {} steps on {}",
        scenario.steps.len(),
        scenario.path
    );
    let start = Instant::now();
    for step in timed {
        tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
        stage.apply(&step.action);
    }
    tokio::time::sleep(Duration::from_millis(scenario.grace_ms)).await;

    shutdown.shutdown();
    handle.await.context("Watcher task failed")?;
    collector.await.context("Event collector failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::scenario::{default_scenario, DemoStep};
    use pretty_assertions::assert_eq;

    fn step(at_ms: u64, action: DemoAction) -> DemoStep {
        DemoStep { at_ms, action }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_default_scenario() {
        let summary = run(WatcherSettings::default(), default_scenario(), Some(7))
            .await
            .unwrap();
        // Two board rows, two detail transitions, one manual trigger
        assert_eq!(summary.fired, 5);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_unknown_rows_are_skipped() {
        let scenario = DemoScenario {
            path: "/jira/board".to_string(),
            grace_ms: 100,
            steps: vec![
                step(
                    0,
                    DemoAction::AddRow {
                        row: "A-1".to_string(),
                        status: "To Do".to_string(),
                    },
                ),
                step(
                    1500,
                    DemoAction::SetRowStatus {
                        row: "B-2".to_string(),
                        status: "Done".to_string(),
                    },
                ),
                step(
                    1600,
                    DemoAction::ClickRow {
                        row: "B-2".to_string(),
                    },
                ),
            ],
        };
        let summary = run(WatcherSettings::default(), scenario, None).await.unwrap();
        assert_eq!(summary, DemoSummary::default());
    }

    #[test]
    fn test_replace_detail_without_detail_appends() {
        let page = SimulatedPage::new("/browse/X-1");
        let mut stage = Stage::new(page, WatcherSettings::default());
        stage.apply(&DemoAction::ReplaceDetail {
            status: "Done".to_string(),
        });
        assert!(stage.detail.is_some());

        stage.apply(&DemoAction::Navigate {
            path: "/jira/board".to_string(),
        });
        assert!(stage.detail.is_none());
        assert!(stage.rows.is_empty());
    }
}
