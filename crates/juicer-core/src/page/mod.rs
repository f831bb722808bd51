//! Page query interface consumed by the detection core.
//!
//! A [`Page`] is the live document: it answers selector queries, exposes text,
//! attributes and geometry, and starts observations that push [`PageEvent`]s
//! into the watcher's event sink until their [`Subscription`] is stopped.
//! Every query is infallible from the caller's point of view: absence is an
//! `Option`, never an error.

mod sim;
mod subscription;

pub use sim::{ElementSpec, SimulatedPage};
pub use subscription::Subscription;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::events::Surface;

/// Opaque identity of a live element, stable for the lifetime of the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Viewport-relative bounding rectangle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Center point of the rectangle
    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Whether any part of the rectangle lies inside a viewport of the given size
    pub fn intersects_viewport(&self, width: f64, height: f64) -> bool {
        self.left < width
            && self.top < height
            && self.left + self.width > 0.0
            && self.top + self.height > 0.0
    }
}

/// A keyboard shortcut, matched against key-down events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    /// Physical key code (e.g. "KeyJ")
    pub code: String,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyChord {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            alt: false,
            shift: false,
            ctrl: false,
            meta: false,
        }
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.meta {
            write!(f, "Meta+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        write!(f, "{}", self.code.trim_start_matches("Key"))
    }
}

/// Kind of observation a source asks the page to start
#[derive(Debug, Clone, PartialEq)]
pub enum ObserveRequest {
    /// Document-wide subtree, text and attribute mutations on behalf of `surface`
    ///
    /// With an attribute filter, attribute changes outside the filter are not
    /// reported; child-list and text changes always are.
    Mutations {
        surface: Surface,
        attribute_filter: Option<Vec<String>>,
    },
    /// Window scroll and resize
    Viewport,
    /// Size changes of one element
    ElementResize(ElementId),
    /// Viewport intersection of a fixed set of elements
    Intersection(Vec<ElementId>),
    /// Document clicks (capture phase)
    Clicks,
    /// Document key-down events
    Keys,
    /// Document finished loading
    DomReady,
}

impl ObserveRequest {
    /// Short name for log messages
    pub fn label(&self) -> &'static str {
        match self {
            ObserveRequest::Mutations { .. } => "mutation observer",
            ObserveRequest::Viewport => "viewport listener",
            ObserveRequest::ElementResize(_) => "resize observer",
            ObserveRequest::Intersection(_) => "intersection observer",
            ObserveRequest::Clicks => "click listener",
            ObserveRequest::Keys => "key listener",
            ObserveRequest::DomReady => "ready listener",
        }
    }
}

/// Event delivered by an active observation
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// Something in the subtree observed for `surface` changed (coarse, batched)
    Mutation { surface: Surface },
    /// The window scrolled
    Scroll,
    /// The window resized
    Resize,
    /// An observed element changed size
    ElementResized(ElementId),
    /// An observed element entered or left the viewport
    Intersection { element: ElementId, visible: bool },
    /// A click landed on `target` (the innermost element)
    Click { target: ElementId },
    /// A key chord was pressed
    KeyDown(KeyChord),
    /// The document finished loading
    DomContentLoaded,
}

/// Channel the page pushes observation events into
pub type PageEventSink = mpsc::UnboundedSender<PageEvent>;

/// Errors starting an observation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    /// The page cannot provide this kind of observation
    #[error("{kind} is not available on this page")]
    ObserverUnavailable { kind: &'static str },

    /// The element to observe is no longer in the document
    #[error("element {element} is detached from the document")]
    Detached { element: ElementId },
}

/// Live document queries and observations
///
/// Selectors may be a comma-separated group; an element matches the group
/// when it matches any member.
pub trait Page: Send + 'static {
    /// First element in document order matching `selector`
    fn query_selector(&self, selector: &str) -> Option<ElementId>;

    /// All elements matching `selector`, in document order
    fn query_selector_all(&self, selector: &str) -> Vec<ElementId>;

    /// First descendant of `root` matching `selector`
    fn query_within(&self, root: ElementId, selector: &str) -> Option<ElementId>;

    /// `element` itself or its nearest ancestor matching `selector`
    fn closest(&self, element: ElementId, selector: &str) -> Option<ElementId>;

    /// Concatenated text of the element and its descendants
    fn text_content(&self, element: ElementId) -> Option<String>;

    /// Attribute value, if present
    fn attribute(&self, element: ElementId, name: &str) -> Option<String>;

    /// Viewport-relative bounding rectangle
    fn bounding_rect(&self, element: ElementId) -> Option<Rect>;

    /// Window scroll offset `(x, y)`
    fn scroll_offset(&self) -> (f64, f64);

    /// Window inner size `(width, height)`
    fn viewport_size(&self) -> (f64, f64);

    /// Current location path (without query or hash)
    fn location_path(&self) -> String;

    /// Whether the document is still loading
    fn is_loading(&self) -> bool;

    /// Start an observation that pushes events into `sink` until stopped
    fn observe(
        &self,
        request: ObserveRequest,
        sink: PageEventSink,
    ) -> Result<Subscription, PageError>;
}
