//! Observation sources for the detail and rows surfaces.
//!
//! Sources are driven synchronously by the watcher loop. Each handler gets an
//! [`ObserveContext`] with the page, the session, the dispatcher and a
//! [`Scheduler`] for deferred work (arming, click settling).

mod detail;
mod rows;

pub use detail::DetailSource;
pub use rows::RowSource;

use std::time::Duration;
use tokio::time::Instant;

use crate::effects::EffectDispatcher;
use crate::events::{FireTrigger, Surface, WatchEvent};
use crate::page::{ElementId, ObserveRequest, Page, PageEventSink, Subscription};
use crate::status::became_target;
use crate::tracker::EntityTracker;
use crate::watcher::WatcherSession;

/// Deferred work scheduled by sources and the lifecycle controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledTask {
    /// The settling window of an entity elapsed
    Arm { surface: Surface, element: ElementId },
    /// Re-read a row control after a click
    ClickSettle { element: ElementId },
    /// Bind both surfaces after a route change
    Rebind,
    /// Retry binding surfaces that found nothing yet
    RetryInit { attempt: u32 },
}

/// Accepts tasks to hand back to the watcher after a delay
pub trait Scheduler {
    fn schedule(&mut self, delay: Duration, task: ScheduledTask);
}

/// Result of a bind attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// Elements found; observation started
    Bound { entities: usize },
    /// Already observing; nothing done
    AlreadyBound,
    /// No matching element yet; retry later
    NotFound,
}

impl BindOutcome {
    /// Whether the surface is observing after this attempt
    pub fn is_bound(&self) -> bool {
        !matches!(self, BindOutcome::NotFound)
    }
}

/// Everything a source handler needs from the watcher
pub struct ObserveContext<'a> {
    pub page: &'a dyn Page,
    pub session: &'a mut WatcherSession,
    pub dispatcher: &'a mut EffectDispatcher,
    pub scheduler: &'a mut dyn Scheduler,
    pub sink: &'a PageEventSink,
    pub now: Instant,
}

impl ObserveContext<'_> {
    /// Start an observation, logging instead of failing when the page refuses
    pub(crate) fn subscribe(&self, request: ObserveRequest) -> Option<Subscription> {
        let label = request.label();
        match self.page.observe(request, self.sink.clone()) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                tracing::warn!("Could not start {}: {}", label, e);
                None
            }
        }
    }

    /// Start an observation torn down on the next route change
    pub(crate) fn subscribe_until_teardown(&mut self, request: ObserveRequest) {
        if let Some(subscription) = self.subscribe(request) {
            self.session.teardown_mut().register(subscription);
        }
    }

    /// Record an entity's arming deadline and schedule the arm task for it
    pub(crate) fn arm_later(
        &mut self,
        tracker: &mut EntityTracker<ElementId>,
        surface: Surface,
        element: ElementId,
    ) {
        let delay = self.session.settings().timing.arm_delay();
        if tracker.arm_later(&element, delay, self.now).is_some() {
            self.scheduler
                .schedule(delay, ScheduledTask::Arm { surface, element });
        }
    }

    /// Feed one read through tracker, gate and evaluator; true when an effect was dispatched
    ///
    /// Empty reads mean "not rendered yet" and are ignored. Any change on an
    /// entity that is still unarmed restarts its settling window.
    pub(crate) fn process_read(
        &mut self,
        tracker: &mut EntityTracker<ElementId>,
        surface: Surface,
        element: ElementId,
        current: &str,
    ) -> bool {
        if current.is_empty() {
            return false;
        }
        let observation = tracker.observe(&element, Some(current));
        if !observation.changed {
            return false;
        }
        tracing::debug!(
            "{} change on {}: {:?} → {:?}",
            surface.label(),
            element,
            observation.previous,
            observation.current
        );
        self.session.emit(WatchEvent::StatusChanged {
            surface,
            element,
            previous: observation.previous.clone(),
            current: observation.current.clone(),
        });

        let Some(record) = tracker.get(&element) else {
            return false;
        };
        let armed = record.armed;
        let fire = self.session.gate().should_fire(record, self.now)
            && became_target(
                &observation.current,
                &observation.previous,
                self.session.targets(),
            );
        if fire {
            self.dispatcher
                .fire(self.page, element, FireTrigger::Transition(surface));
        }
        if !armed {
            self.arm_later(tracker, surface, element);
        }
        fire
    }
}
