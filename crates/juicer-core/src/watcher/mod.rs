//! Lifecycle controller: binds both sources, follows route changes, and runs
//! the single event loop everything else is driven from.

mod session;
mod teardown;

pub use session::WatcherSession;
pub use teardown::{TeardownRegistry, TeardownReport};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::{SettingsError, WatcherSettings};
use crate::effects::{DispatchOutcome, Effect, EffectDispatcher, EffectRegistry};
use crate::events::{self, FireTrigger, Surface, WatchEvent};
use crate::observe::{
    BindOutcome, DetailSource, ObserveContext, RowSource, ScheduledTask, Scheduler,
};
use crate::page::{ObserveRequest, Page, PageEvent, PageEventSink, Subscription};

/// Scheduler backed by tokio timers
///
/// Each task comes back through the loop's task channel tagged with the
/// generation it was scheduled in.
struct TaskScheduler {
    tx: mpsc::UnboundedSender<(u64, ScheduledTask)>,
    generation: u64,
}

impl Scheduler for TaskScheduler {
    fn schedule(&mut self, delay: Duration, task: ScheduledTask) {
        let tx = self.tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send((generation, task));
        });
    }
}

/// Stops a running [`Watcher`]
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

/// Watches a page for qualifying status edges
pub struct Watcher<P: Page> {
    page: P,
    session: WatcherSession,
    dispatcher: EffectDispatcher,
    scheduler: TaskScheduler,
    detail: DetailSource,
    rows: RowSource,
    sink: PageEventSink,
    page_rx: mpsc::UnboundedReceiver<PageEvent>,
    task_rx: mpsc::UnboundedReceiver<(u64, ScheduledTask)>,
    location: String,
    keys: Option<Subscription>,
    ready: Option<Subscription>,
    stop_tx: Arc<watch::Sender<bool>>,
}

impl<P: Page> Watcher<P> {
    /// Create a watcher; the boot deadzone starts now
    pub fn new(
        page: P,
        settings: WatcherSettings,
        registry: EffectRegistry,
    ) -> Result<Self, SettingsError> {
        let events = events::channel();
        let detail = DetailSource::new(&settings.detail_selector);
        let rows = RowSource::new(&settings);
        let session = WatcherSession::new(settings, events.clone())?;
        let (sink, page_rx) = mpsc::unbounded_channel();
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let location = page.location_path();

        Ok(Self {
            page,
            session,
            dispatcher: EffectDispatcher::new(registry, events),
            scheduler: TaskScheduler {
                tx: task_tx,
                generation: 0,
            },
            detail,
            rows,
            sink,
            page_rx,
            task_rx,
            location,
            keys: None,
            ready: None,
            stop_tx: Arc::new(watch::channel(false).0),
        })
    }

    /// Play `ring` over the element after every dispatched effect
    pub fn with_ring(mut self, ring: Arc<dyn Effect>) -> Self {
        self.dispatcher.set_ring(ring);
        self
    }

    /// Receive every event the watcher emits from now on
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.session.events().subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.stop_tx.clone())
    }

    pub fn session(&self) -> &WatcherSession {
        &self.session
    }

    pub fn detail(&self) -> &DetailSource {
        &self.detail
    }

    pub fn rows(&self) -> &RowSource {
        &self.rows
    }

    pub fn dispatcher(&self) -> &EffectDispatcher {
        &self.dispatcher
    }

    /// Split into a handler context and the two sources
    fn parts(&mut self) -> (ObserveContext<'_>, &mut DetailSource, &mut RowSource) {
        let ctx = ObserveContext {
            page: &self.page,
            session: &mut self.session,
            dispatcher: &mut self.dispatcher,
            scheduler: &mut self.scheduler,
            sink: &self.sink,
            now: Instant::now(),
        };
        (ctx, &mut self.detail, &mut self.rows)
    }

    /// Listen for the manual trigger, then bind once the document is ready
    pub fn start(&mut self) {
        if self.keys.is_none() {
            match self.page.observe(ObserveRequest::Keys, self.sink.clone()) {
                Ok(subscription) => self.keys = Some(subscription),
                Err(e) => tracing::warn!("Manual trigger unavailable: {}", e),
            }
        }

        if self.page.is_loading() {
            match self.page.observe(ObserveRequest::DomReady, self.sink.clone()) {
                Ok(subscription) => {
                    tracing::debug!("Document still loading, waiting for DOMContentLoaded");
                    self.ready = Some(subscription);
                    return;
                }
                Err(e) => tracing::warn!("Could not wait for document ready: {}", e),
            }
        }
        self.init_with_retry();
    }

    /// Try to bind both surfaces
    pub fn init(&mut self) -> (BindOutcome, BindOutcome) {
        tracing::info!(
            "Init at {} ({} effects registered)",
            self.location,
            self.dispatcher.registry().len()
        );
        let (mut ctx, detail, rows) = self.parts();
        let detail = detail.bind(&mut ctx);
        let rows = rows.bind(&mut ctx);
        (detail, rows)
    }

    fn init_with_retry(&mut self) {
        let (detail, rows) = self.init();
        if !(detail.is_bound() && rows.is_bound()) {
            self.scheduler.schedule(
                self.session.settings().timing.init_retry(),
                ScheduledTask::RetryInit { attempt: 1 },
            );
        }
    }

    pub fn handle_page_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::Mutation { surface } => {
                let (mut ctx, detail, rows) = self.parts();
                match surface {
                    Surface::Detail => detail.on_mutation(&mut ctx),
                    Surface::Rows => rows.on_mutation(&mut ctx),
                }
            }
            PageEvent::Scroll | PageEvent::Resize | PageEvent::ElementResized(_) => {
                let (mut ctx, detail, _) = self.parts();
                detail.on_viewport_change(&mut ctx);
            }
            PageEvent::Intersection { element, visible } => {
                let (mut ctx, _, rows) = self.parts();
                rows.on_intersection(&mut ctx, element, visible);
            }
            PageEvent::Click { target } => {
                let (mut ctx, _, rows) = self.parts();
                rows.on_click(&mut ctx, target);
            }
            PageEvent::KeyDown(chord) => {
                if chord == self.session.settings().manual_trigger {
                    self.trigger_manual();
                }
            }
            PageEvent::DomContentLoaded => {
                if let Some(mut ready) = self.ready.take() {
                    if let Err(e) = ready.stop() {
                        tracing::warn!("Failed to stop ready listener: {}", e);
                    }
                    self.init_with_retry();
                }
            }
        }
    }

    /// Run a task handed back by the scheduler; tasks from before a teardown are dropped
    pub fn handle_scheduled(&mut self, generation: u64, task: ScheduledTask) {
        if generation != self.session.generation() {
            tracing::debug!("Dropping stale {:?} from generation {}", task, generation);
            return;
        }

        match task {
            ScheduledTask::Arm { surface, element } => {
                let armed = match surface {
                    Surface::Detail => self.detail.on_armed(element),
                    Surface::Rows => self.rows.on_armed(element),
                };
                if armed {
                    tracing::debug!("{} entity {} armed", surface.label(), element);
                }
            }
            ScheduledTask::ClickSettle { element } => {
                let (mut ctx, _, rows) = self.parts();
                rows.on_click_settled(&mut ctx, element);
            }
            ScheduledTask::Rebind => self.init_with_retry(),
            ScheduledTask::RetryInit { attempt } => {
                let (detail, rows) = self.init();
                let limit = self.session.settings().timing.init_retry_limit;
                if !(detail.is_bound() && rows.is_bound()) && attempt < limit {
                    self.scheduler.schedule(
                        self.session.settings().timing.init_retry(),
                        ScheduledTask::RetryInit {
                            attempt: attempt + 1,
                        },
                    );
                }
            }
        }
    }

    /// Compare the location path with the last one seen; tear down and schedule a rebind on change
    pub fn check_location(&mut self) -> bool {
        let path = self.page.location_path();
        if path == self.location {
            return false;
        }

        tracing::info!("Route change {} → {}, re-init", self.location, path);
        let from = std::mem::replace(&mut self.location, path.clone());
        self.session
            .emit(WatchEvent::RouteChanged { from, to: path });
        self.teardown();
        self.scheduler.schedule(
            self.session.settings().timing.rebind_delay(),
            ScheduledTask::Rebind,
        );
        true
    }

    /// Stop every observation, forget all entities and invalidate pending timers
    pub fn teardown(&mut self) -> TeardownReport {
        let report = self.session.teardown_mut().run_all();
        self.detail.reset();
        self.rows.reset();
        let generation = self.session.advance_generation();
        self.scheduler.generation = generation;

        if report.failed > 0 {
            tracing::warn!(
                "Teardown finished with {} of {} steps failing",
                report.failed,
                report.stopped + report.failed
            );
        } else {
            tracing::debug!("Teardown stopped {} observations", report.stopped);
        }
        self.session.emit(WatchEvent::TornDown { generation });
        report
    }

    /// Fire one effect on the detail element, else the first row control, bypassing every gate
    pub fn trigger_manual(&mut self) -> DispatchOutcome {
        let element = self
            .detail
            .resolve(&self.page)
            .or_else(|| self.rows.first(&self.page));
        tracing::info!(
            "Manual fire ({}), element: {:?}",
            self.session.settings().manual_trigger,
            element
        );
        match element {
            Some(element) => self
                .dispatcher
                .fire(&self.page, element, FireTrigger::Manual),
            None => DispatchOutcome::Skipped,
        }
    }

    /// Drive the watcher until its [`ShutdownHandle`] fires
    pub async fn run(mut self) {
        self.start();

        let mut poll = tokio::time::interval(self.session.settings().timing.route_poll());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        poll.tick().await;

        let mut stop_rx = self.stop_tx.subscribe();
        loop {
            if *stop_rx.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = stop_rx.changed() => {}
                Some(event) = self.page_rx.recv() => self.handle_page_event(event),
                Some((generation, task)) = self.task_rx.recv() => {
                    self.handle_scheduled(generation, task);
                }
                _ = poll.tick() => {
                    self.check_location();
                }
            }
        }

        tracing::info!("Watcher stopping");
        self.teardown();
        if let Some(mut keys) = self.keys.take() {
            if let Err(e) = keys.stop() {
                tracing::warn!("Failed to stop key listener: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ElementSpec, KeyChord, SimulatedPage};

    fn watcher(page: &SimulatedPage) -> Watcher<SimulatedPage> {
        Watcher::new(page.clone(), WatcherSettings::default(), EffectRegistry::new()).unwrap()
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_stale_tasks_are_dropped() {
        let page = SimulatedPage::new("/list");
        let el = page.append(
            page.body(),
            ElementSpec::new()
                .matching(r#"button[aria-label$="Change status"]"#)
                .attr("aria-label", "To Do - Change status"),
        );
        let mut w = watcher(&page);
        w.init();
        w.teardown();

        w.handle_scheduled(
            0,
            ScheduledTask::Arm {
                surface: Surface::Rows,
                element: el,
            },
        );
        assert!(w.rows().tracker().is_empty());
        assert_eq!(w.session().generation(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_loading_page_waits_for_ready() {
        let page = SimulatedPage::loading("/browse/A-1");
        let mut w = watcher(&page);
        w.start();
        assert_eq!(
            page.observer_count_where(|r| matches!(r, ObserveRequest::DomReady)),
            1
        );
        assert_eq!(
            page.observer_count_where(|r| matches!(r, ObserveRequest::Keys)),
            1
        );

        w.handle_page_event(PageEvent::DomContentLoaded);
        assert_eq!(
            page.observer_count_where(|r| matches!(r, ObserveRequest::DomReady)),
            0
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_other_chords_are_ignored() {
        let page = SimulatedPage::new("/");
        let mut w = watcher(&page);
        let mut rx = w.subscribe();
        w.handle_page_event(PageEvent::KeyDown(KeyChord::new("KeyJ").with_alt()));
        assert!(rx.try_recv().is_err());
    }

    fn drain_page_events(w: &mut Watcher<SimulatedPage>) -> Vec<PageEvent> {
        let mut out = Vec::new();
        while let Ok(event) = w.page_rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_mutations_reach_the_subscribing_source_only() {
        let page = SimulatedPage::new("/browse/A-1");
        let detail = page.append(
            page.body(),
            ElementSpec::new()
                .matching(&WatcherSettings::default().detail_selector)
                .text("To Do"),
        );
        let row = page.append(
            page.body(),
            ElementSpec::new()
                .matching(r#"button[aria-label$="Change status"]"#)
                .attr("aria-label", "To Do - Change status"),
        );
        let mut w = watcher(&page);
        w.init();
        drain_page_events(&mut w);

        // Outside the rows' attribute filter
        page.set_attribute(row, "data-x", "1");
        assert_eq!(
            drain_page_events(&mut w),
            vec![PageEvent::Mutation {
                surface: Surface::Detail
            }]
        );

        page.set_text(detail, "In Progress");
        let events = drain_page_events(&mut w);
        assert_eq!(events.len(), 2);
        w.handle_page_event(PageEvent::Mutation {
            surface: Surface::Rows,
        });
        assert_eq!(w.detail().tracker().get(&detail).unwrap().last_status, "to do");
        w.handle_page_event(PageEvent::Mutation {
            surface: Surface::Detail,
        });
        assert_eq!(
            w.detail().tracker().get(&detail).unwrap().last_status,
            "in progress"
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_manual_trigger_uses_first_row_in_document_order() {
        use crate::effects::{FnEffect, Placement};

        let page = SimulatedPage::new("/list");
        let first = page.append(
            page.body(),
            ElementSpec::new()
                .matching(r#"td button[aria-label*="Change status"]"#)
                .attr("aria-label", "Status: To Do"),
        );
        page.append(
            page.body(),
            ElementSpec::new()
                .matching(r#"button[aria-label$="Change status"]"#)
                .attr("aria-label", "To Do - Change status"),
        );
        let ok: Arc<dyn Effect> = Arc::new(FnEffect::new("ok", |_: &Placement| Ok(())));
        let mut registry = EffectRegistry::new();
        registry.register(ok);
        let mut w = Watcher::new(page.clone(), WatcherSettings::default(), registry).unwrap();

        assert!(matches!(w.trigger_manual(), DispatchOutcome::Fired { .. }));
        assert_eq!(w.dispatcher().overlay().following(), Some(first));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_location_unchanged() {
        let page = SimulatedPage::new("/a");
        let mut w = watcher(&page);
        assert!(!w.check_location());
        page.navigate("/b");
        assert!(w.check_location());
        assert!(!w.check_location());
    }
}
