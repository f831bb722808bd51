use std::collections::HashSet;

use super::{BindOutcome, ObserveContext, ScheduledTask};
use crate::config::WatcherSettings;
use crate::events::{Surface, WatchEvent};
use crate::page::{ElementId, ObserveRequest, Page};
use crate::status::StatusExtractor;
use crate::tracker::EntityTracker;

/// Watches every per-row status control of a list view
///
/// Rows are rediscovered on each mutation. New rows are registered with
/// their current status and armed later; rows that stop being discovered
/// are evicted. A row whose status reads blank is not tracked until it
/// renders text, whether it was found at bind or later.
#[derive(Debug)]
pub struct RowSource {
    /// Every row selector joined into one group
    selector: String,
    attribute_filter: Vec<String>,
    extractor: StatusExtractor,
    bound: bool,
    tracker: EntityTracker<ElementId>,
}

impl RowSource {
    pub fn new(settings: &WatcherSettings) -> Self {
        Self {
            selector: settings.row_selectors.join(", "),
            attribute_filter: settings.row_attribute_filter.clone(),
            extractor: StatusExtractor::new(
                &settings.status_attribute,
                &settings.status_text_selectors,
            ),
            bound: false,
            tracker: EntityTracker::new(),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn tracker(&self) -> &EntityTracker<ElementId> {
        &self.tracker
    }

    /// All row controls in document order, whichever selector they match
    pub fn discover(&self, page: &dyn Page) -> Vec<ElementId> {
        page.query_selector_all(&self.selector)
    }

    /// First row control in document order
    pub fn first(&self, page: &dyn Page) -> Option<ElementId> {
        page.query_selector(&self.selector)
    }

    pub fn bind(&mut self, ctx: &mut ObserveContext<'_>) -> BindOutcome {
        if self.bound {
            return BindOutcome::AlreadyBound;
        }
        let rows = self.discover(ctx.page);
        if rows.is_empty() {
            tracing::debug!("Row view: no status controls found yet");
            return BindOutcome::NotFound;
        }

        self.bound = true;
        tracing::info!("Row view: found {} status controls", rows.len());
        for &element in &rows {
            let status = self.extractor.read(ctx.page, element);
            if status.is_empty() {
                tracing::debug!("Row view: {} not rendered yet", element);
                continue;
            }
            self.register(ctx, element, status);
        }
        let entities = self.tracker.len();
        ctx.session.emit(WatchEvent::SurfaceBound {
            surface: Surface::Rows,
            entities,
        });

        ctx.subscribe_until_teardown(ObserveRequest::Intersection(rows));
        ctx.subscribe_until_teardown(ObserveRequest::Mutations {
            surface: Surface::Rows,
            attribute_filter: Some(self.attribute_filter.clone()),
        });
        ctx.subscribe_until_teardown(ObserveRequest::Clicks);
        BindOutcome::Bound { entities }
    }

    fn register(&mut self, ctx: &mut ObserveContext<'_>, element: ElementId, status: String) {
        self.tracker.register(element, Some(&status));
        ctx.arm_later(&mut self.tracker, Surface::Rows, element);
        ctx.session.emit(WatchEvent::EntityDiscovered {
            surface: Surface::Rows,
            element,
            status,
        });
    }

    /// Rediscover rows, process every status, and evict rows that went away
    pub fn on_mutation(&mut self, ctx: &mut ObserveContext<'_>) {
        if !self.bound {
            return;
        }
        let rows = self.discover(ctx.page);
        for &element in &rows {
            let status = self.extractor.read(ctx.page, element);
            if self.tracker.contains(&element) {
                ctx.process_read(&mut self.tracker, Surface::Rows, element, &status);
            } else if !status.is_empty() {
                tracing::debug!("Row view: new status control {} ({:?})", element, status);
                self.register(ctx, element, status);
            }
        }

        let seen: HashSet<ElementId> = rows.into_iter().collect();
        let evicted = self.tracker.retain_seen(&seen);
        if evicted > 0 {
            tracing::debug!("Row view: evicted {} status controls", evicted);
            ctx.session.emit(WatchEvent::EntitiesEvicted {
                surface: Surface::Rows,
                count: evicted,
            });
        }
    }

    /// Schedule a re-read of the row control containing `target`
    pub fn on_click(&mut self, ctx: &mut ObserveContext<'_>, target: ElementId) {
        if !self.bound {
            return;
        }
        let Some(element) = ctx.page.closest(target, &self.selector) else {
            return;
        };
        let delay = ctx.session.settings().timing.click_settle();
        ctx.scheduler
            .schedule(delay, ScheduledTask::ClickSettle { element });
    }

    /// Re-read a clicked row control once the UI had time to update
    pub fn on_click_settled(&mut self, ctx: &mut ObserveContext<'_>, element: ElementId) {
        if !self.bound {
            return;
        }
        let status = self.extractor.read(ctx.page, element);
        ctx.process_read(&mut self.tracker, Surface::Rows, element, &status);
    }

    /// A row control scrolled into or out of view
    pub fn on_intersection(
        &mut self,
        ctx: &mut ObserveContext<'_>,
        element: ElementId,
        visible: bool,
    ) {
        if self.bound && visible {
            ctx.dispatcher.align_overlay(ctx.page, element);
        }
    }

    /// The settling window of `element` elapsed
    pub fn on_armed(&mut self, element: ElementId) -> bool {
        self.tracker.mark_armed(&element)
    }

    pub fn reset(&mut self) {
        self.bound = false;
        self.tracker.clear();
    }
}
