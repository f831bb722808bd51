use crate::page::{ElementId, Page};

use super::Placement;

/// The single positional overlay shared by every entity
///
/// It tracks the document-relative box of whichever element it was last
/// placed over. Effects and the glow ring are positioned from it.
#[derive(Debug, Default)]
pub struct Overlay {
    placement: Option<Placement>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the overlay over `element`; `None` when the element has no box
    pub fn place_over(&mut self, page: &dyn Page, element: ElementId) -> Option<Placement> {
        let rect = page.bounding_rect(element)?;
        let (scroll_x, scroll_y) = page.scroll_offset();
        let placement = Placement {
            element,
            rect,
            document_offset: (scroll_x + rect.left, scroll_y + rect.top),
            viewport: page.viewport_size(),
        };
        self.placement = Some(placement);
        Some(placement)
    }

    pub fn current(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    pub fn following(&self) -> Option<ElementId> {
        self.placement.map(|p| p.element)
    }
}
