use super::{BindOutcome, ObserveContext};
use crate::events::{Surface, WatchEvent};
use crate::page::{ElementId, ObserveRequest, Page, Subscription};
use crate::status::normalize;
use crate::tracker::EntityTracker;

/// Watches the single status element of a detail view
///
/// The element is re-resolved on every mutation. When the page swaps in a
/// new node, the new node is tracked as a fresh, unarmed entity seeded with
/// its current text: an edge may be missed, but a re-render never fires.
/// A blank element is followed but not tracked until it renders text; its
/// first text seeds the entity the same way.
#[derive(Debug)]
pub struct DetailSource {
    selector: String,
    bound: bool,
    element: Option<ElementId>,
    tracker: EntityTracker<ElementId>,
    resize: Option<Subscription>,
}

impl DetailSource {
    pub fn new(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            bound: false,
            element: None,
            tracker: EntityTracker::new(),
            resize: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Element currently tracked
    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    pub fn tracker(&self) -> &EntityTracker<ElementId> {
        &self.tracker
    }

    /// Resolve the status element now, ignoring what is tracked
    pub fn resolve(&self, page: &dyn Page) -> Option<ElementId> {
        page.query_selector(&self.selector)
    }

    fn read(page: &dyn Page, element: ElementId) -> String {
        normalize(page.text_content(element).as_deref())
    }

    pub fn bind(&mut self, ctx: &mut ObserveContext<'_>) -> BindOutcome {
        if self.bound {
            return BindOutcome::AlreadyBound;
        }
        let Some(element) = self.resolve(ctx.page) else {
            tracing::debug!("Detail view: status element not found yet");
            return BindOutcome::NotFound;
        };

        self.bound = true;
        let status = Self::read(ctx.page, element);
        tracing::info!("Detail view found, status: {:?}", status);
        self.track(ctx, element, status);
        ctx.session.emit(WatchEvent::SurfaceBound {
            surface: Surface::Detail,
            entities: 1,
        });

        ctx.subscribe_until_teardown(ObserveRequest::Mutations {
            surface: Surface::Detail,
            attribute_filter: None,
        });
        ctx.subscribe_until_teardown(ObserveRequest::Viewport);
        BindOutcome::Bound { entities: 1 }
    }

    /// Follow `element` with the overlay and track it as a fresh entity once it has text
    fn track(&mut self, ctx: &mut ObserveContext<'_>, element: ElementId, status: String) {
        self.element = Some(element);
        self.register(ctx, element, status);
        ctx.dispatcher.align_overlay(ctx.page, element);

        if let Some(mut previous) = self.resize.take() {
            if let Err(e) = previous.stop() {
                tracing::warn!("Failed to stop detail resize observer: {}", e);
            }
        }
        self.resize = ctx.subscribe(ObserveRequest::ElementResize(element));
    }

    fn register(&mut self, ctx: &mut ObserveContext<'_>, element: ElementId, status: String) {
        if status.is_empty() {
            tracing::debug!("Detail view: {} not rendered yet", element);
            return;
        }
        self.tracker.register(element, Some(&status));
        ctx.arm_later(&mut self.tracker, Surface::Detail, element);
        ctx.session.emit(WatchEvent::EntityDiscovered {
            surface: Surface::Detail,
            element,
            status,
        });
    }

    /// Re-resolve the element and process its text
    pub fn on_mutation(&mut self, ctx: &mut ObserveContext<'_>) {
        if !self.bound {
            return;
        }
        let Some(element) = self.resolve(ctx.page) else {
            return;
        };

        if let Some(previous) = self.element.filter(|prev| *prev != element) {
            let status = Self::read(ctx.page, element);
            tracing::info!(
                "Detail element replaced ({} → {}), status: {:?}",
                previous,
                element,
                status
            );
            self.tracker.remove(&previous);
            ctx.session.emit(WatchEvent::DetailReplaced {
                previous,
                current: element,
            });
            self.track(ctx, element, status);
            return;
        }

        let status = Self::read(ctx.page, element);
        if self.tracker.contains(&element) {
            ctx.process_read(&mut self.tracker, Surface::Detail, element, &status);
        } else {
            self.register(ctx, element, status);
        }
    }

    /// Keep the overlay over the element after scroll, resize or a size change
    pub fn on_viewport_change(&mut self, ctx: &mut ObserveContext<'_>) {
        if let Some(element) = self.element.filter(|_| self.bound) {
            ctx.dispatcher.align_overlay(ctx.page, element);
        }
    }

    /// The settling window of `element` elapsed
    pub fn on_armed(&mut self, element: ElementId) -> bool {
        self.tracker.mark_armed(&element)
    }

    /// Forget the element and stop its resize observer
    pub fn reset(&mut self) {
        if let Some(mut resize) = self.resize.take() {
            if let Err(e) = resize.stop() {
                tracing::warn!("Failed to stop detail resize observer: {}", e);
            }
        }
        self.bound = false;
        self.element = None;
        self.tracker.clear();
    }
}
