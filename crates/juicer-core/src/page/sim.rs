//! In-memory page used by tests and the demo.
//!
//! Elements carry a list of selector strings they answer to instead of a
//! real CSS engine; a query matches an element when the exact selector text
//! (or any member of a comma-separated group) is in that list. Mutations notify active observers the same way a browser
//! would: document-wide, coarse, and only for nodes still in the document.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use super::{
    ElementId, KeyChord, ObserveRequest, Page, PageError, PageEvent, PageEventSink, Rect,
    Subscription,
};

/// Description of an element to insert
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    selectors: Vec<String>,
    attributes: BTreeMap<String, String>,
    text: String,
    rect: Rect,
}

impl ElementSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the element match `selector`
    pub fn matching(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }
}

struct SimElement {
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    selectors: Vec<String>,
    attributes: BTreeMap<String, String>,
    text: String,
    rect: Rect,
}

struct SimObserver {
    id: u64,
    request: ObserveRequest,
    sink: PageEventSink,
}

struct SimDom {
    root: ElementId,
    next_element: u64,
    next_observer: u64,
    elements: HashMap<ElementId, SimElement>,
    observers: Vec<SimObserver>,
    path: String,
    loading: bool,
    scroll: (f64, f64),
    viewport: (f64, f64),
}

impl SimDom {
    fn new(path: &str) -> Self {
        let root = ElementId(0);
        let mut elements = HashMap::new();
        elements.insert(
            root,
            SimElement {
                parent: None,
                children: Vec::new(),
                selectors: vec!["body".to_string()],
                attributes: BTreeMap::new(),
                text: String::new(),
                rect: Rect::default(),
            },
        );
        Self {
            root,
            next_element: 1,
            next_observer: 1,
            elements,
            observers: Vec::new(),
            path: path.to_string(),
            loading: false,
            scroll: (0.0, 0.0),
            viewport: (1280.0, 800.0),
        }
    }

    fn is_attached(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == self.root {
                return true;
            }
            current = self.elements.get(&cur).and_then(|e| e.parent);
        }
        false
    }

    /// Pre-order traversal below `start` (excluding `start`)
    fn descendants(&self, start: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = match self.elements.get(&start) {
            Some(e) => e.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(e) = self.elements.get(&id) {
                stack.extend(e.children.iter().rev().copied());
            }
        }
        out
    }

    fn matches(&self, id: ElementId, selector: &str) -> bool {
        let Some(element) = self.elements.get(&id) else {
            return false;
        };
        selector_group(selector).any(|member| element.selectors.iter().any(|s| s == member))
    }

    fn text_of(&self, id: ElementId) -> String {
        let mut text = match self.elements.get(&id) {
            Some(e) => e.text.clone(),
            None => return String::new(),
        };
        for child in self.descendants(id) {
            if let Some(e) = self.elements.get(&child) {
                text.push_str(&e.text);
            }
        }
        text
    }

    fn insert(&mut self, parent: ElementId, spec: ElementSpec) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        self.elements.insert(
            id,
            SimElement {
                parent: Some(parent),
                children: Vec::new(),
                selectors: spec.selectors,
                attributes: spec.attributes,
                text: spec.text,
                rect: spec.rect,
            },
        );
        id
    }

    fn detach(&mut self, id: ElementId) -> Option<(ElementId, usize)> {
        let parent = self.elements.get(&id)?.parent?;
        let siblings = &mut self.elements.get_mut(&parent)?.children;
        let index = siblings.iter().position(|c| *c == id)?;
        siblings.remove(index);
        if let Some(e) = self.elements.get_mut(&id) {
            e.parent = None;
        }
        Some((parent, index))
    }

    fn emit<F>(&self, mut wants: F, event: PageEvent)
    where
        F: FnMut(&ObserveRequest) -> bool,
    {
        for observer in &self.observers {
            if wants(&observer.request) {
                let _ = observer.sink.send(event.clone());
            }
        }
    }

    /// Notify mutation observers; `attribute` is set for attribute changes
    fn emit_mutation(&self, attribute: Option<&str>) {
        for observer in &self.observers {
            let ObserveRequest::Mutations {
                surface,
                attribute_filter,
            } = &observer.request
            else {
                continue;
            };
            let wanted = match (attribute, attribute_filter) {
                (Some(name), Some(filter)) => filter.iter().any(|f| f == name),
                _ => true,
            };
            if wanted {
                let _ = observer.sink.send(PageEvent::Mutation { surface: *surface });
            }
        }
    }

    fn emit_child_list(&self) {
        self.emit_mutation(None);
    }

    fn emit_attribute(&self, name: &str) {
        self.emit_mutation(Some(name));
    }
}

/// Members of a comma-separated selector group; commas inside quotes or brackets do not split
fn selector_group(selector: &str) -> impl Iterator<Item = &str> {
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                members.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    members.push(&selector[start..]);
    members.into_iter().map(str::trim).filter(|m| !m.is_empty())
}

/// Cloneable handle to an in-memory document
#[derive(Clone)]
pub struct SimulatedPage {
    dom: Arc<RwLock<SimDom>>,
}

impl SimulatedPage {
    /// Create an empty, fully loaded page at `path`
    pub fn new(path: &str) -> Self {
        Self {
            dom: Arc::new(RwLock::new(SimDom::new(path))),
        }
    }

    /// Create an empty page that is still loading
    pub fn loading(path: &str) -> Self {
        let page = Self::new(path);
        page.dom.write().loading = true;
        page
    }

    /// The document body
    pub fn body(&self) -> ElementId {
        self.dom.read().root
    }

    /// Append a new element under `parent`
    pub fn append(&self, parent: ElementId, spec: ElementSpec) -> ElementId {
        let mut dom = self.dom.write();
        let id = dom.insert(parent, spec);
        if let Some(p) = dom.elements.get_mut(&parent) {
            p.children.push(id);
        }
        if dom.is_attached(id) {
            dom.emit_child_list();
        }
        id
    }

    /// Remove an element (and its subtree) from the document
    pub fn remove(&self, id: ElementId) {
        let mut dom = self.dom.write();
        let was_attached = dom.is_attached(id);
        if dom.detach(id).is_some() && was_attached {
            dom.emit_child_list();
        }
    }

    /// Replace an element with a new one at the same position
    ///
    /// Returns `None` when `old` has no parent.
    pub fn replace(&self, old: ElementId, spec: ElementSpec) -> Option<ElementId> {
        let mut dom = self.dom.write();
        let was_attached = dom.is_attached(old);
        let (parent, index) = dom.detach(old)?;
        let id = dom.insert(parent, spec);
        if let Some(p) = dom.elements.get_mut(&parent) {
            p.children.insert(index, id);
        }
        if was_attached {
            dom.emit_child_list();
        }
        Some(id)
    }

    /// Remove every child of the body (what a route change usually does)
    pub fn clear(&self) {
        let mut dom = self.dom.write();
        let root = dom.root;
        let children = dom
            .elements
            .get(&root)
            .map(|e| e.children.clone())
            .unwrap_or_default();
        for child in &children {
            dom.detach(*child);
        }
        if !children.is_empty() {
            dom.emit_child_list();
        }
    }

    /// Replace the own text of an element
    pub fn set_text(&self, id: ElementId, text: &str) {
        let mut dom = self.dom.write();
        let attached = dom.is_attached(id);
        if let Some(e) = dom.elements.get_mut(&id) {
            e.text = text.to_string();
            if attached {
                dom.emit_child_list();
            }
        }
    }

    /// Set an attribute value
    pub fn set_attribute(&self, id: ElementId, name: &str, value: &str) {
        let mut dom = self.dom.write();
        let attached = dom.is_attached(id);
        if let Some(e) = dom.elements.get_mut(&id) {
            e.attributes.insert(name.to_string(), value.to_string());
            if attached {
                dom.emit_attribute(name);
            }
        }
    }

    /// Move or resize an element, notifying its resize observers
    pub fn set_rect(&self, id: ElementId, rect: Rect) {
        let mut dom = self.dom.write();
        if let Some(e) = dom.elements.get_mut(&id) {
            e.rect = rect;
            dom.emit(
                |r| matches!(r, ObserveRequest::ElementResize(el) if *el == id),
                PageEvent::ElementResized(id),
            );
        }
    }

    /// Click an element; listeners see the innermost target
    pub fn click(&self, id: ElementId) {
        let dom = self.dom.read();
        if dom.is_attached(id) {
            dom.emit(
                |r| matches!(r, ObserveRequest::Clicks),
                PageEvent::Click { target: id },
            );
        }
    }

    /// Press a key chord
    pub fn key_down(&self, chord: KeyChord) {
        self.dom.read().emit(
            |r| matches!(r, ObserveRequest::Keys),
            PageEvent::KeyDown(chord),
        );
    }

    /// Scroll the window, reporting observed elements that are in view
    pub fn scroll_to(&self, x: f64, y: f64) {
        let mut dom = self.dom.write();
        dom.scroll = (x, y);
        dom.emit(|r| matches!(r, ObserveRequest::Viewport), PageEvent::Scroll);

        let (width, height) = dom.viewport;
        for observer in &dom.observers {
            if let ObserveRequest::Intersection(elements) = &observer.request {
                for el in elements {
                    let visible = dom
                        .elements
                        .get(el)
                        .map(|e| e.rect.intersects_viewport(width, height))
                        .unwrap_or(false);
                    if visible && dom.is_attached(*el) {
                        let _ = observer.sink.send(PageEvent::Intersection {
                            element: *el,
                            visible,
                        });
                    }
                }
            }
        }
    }

    /// Resize the window
    pub fn resize_viewport(&self, width: f64, height: f64) {
        let mut dom = self.dom.write();
        dom.viewport = (width, height);
        dom.emit(|r| matches!(r, ObserveRequest::Viewport), PageEvent::Resize);
    }

    /// Change the location path without touching the document
    pub fn navigate(&self, path: &str) {
        self.dom.write().path = path.to_string();
    }

    /// Mark the document as loaded and notify ready listeners
    pub fn finish_loading(&self) {
        let mut dom = self.dom.write();
        dom.loading = false;
        dom.emit(
            |r| matches!(r, ObserveRequest::DomReady),
            PageEvent::DomContentLoaded,
        );
    }

    /// Number of observations currently connected
    pub fn observer_count(&self) -> usize {
        self.dom.read().observers.len()
    }

    /// Number of connected observations matching a predicate
    pub fn observer_count_where<F>(&self, pred: F) -> usize
    where
        F: Fn(&ObserveRequest) -> bool,
    {
        self.dom
            .read()
            .observers
            .iter()
            .filter(|o| pred(&o.request))
            .count()
    }

    fn disconnect(dom: &Weak<RwLock<SimDom>>, id: u64) -> anyhow::Result<()> {
        // Page already gone: nothing left to disconnect.
        let Some(dom) = dom.upgrade() else {
            return Ok(());
        };
        let mut dom = dom.write();
        let before = dom.observers.len();
        dom.observers.retain(|o| o.id != id);
        if dom.observers.len() == before {
            anyhow::bail!("observer {} was not connected", id);
        }
        Ok(())
    }
}

impl Page for SimulatedPage {
    fn query_selector(&self, selector: &str) -> Option<ElementId> {
        let dom = self.dom.read();
        dom.descendants(dom.root)
            .into_iter()
            .find(|id| dom.matches(*id, selector))
    }

    fn query_selector_all(&self, selector: &str) -> Vec<ElementId> {
        let dom = self.dom.read();
        dom.descendants(dom.root)
            .into_iter()
            .filter(|id| dom.matches(*id, selector))
            .collect()
    }

    fn query_within(&self, root: ElementId, selector: &str) -> Option<ElementId> {
        let dom = self.dom.read();
        dom.descendants(root)
            .into_iter()
            .find(|id| dom.matches(*id, selector))
    }

    fn closest(&self, element: ElementId, selector: &str) -> Option<ElementId> {
        let dom = self.dom.read();
        let mut current = Some(element);
        while let Some(id) = current {
            if dom.matches(id, selector) {
                return Some(id);
            }
            current = dom.elements.get(&id).and_then(|e| e.parent);
        }
        None
    }

    fn text_content(&self, element: ElementId) -> Option<String> {
        let dom = self.dom.read();
        dom.elements.contains_key(&element).then(|| dom.text_of(element))
    }

    fn attribute(&self, element: ElementId, name: &str) -> Option<String> {
        self.dom
            .read()
            .elements
            .get(&element)
            .and_then(|e| e.attributes.get(name).cloned())
    }

    fn bounding_rect(&self, element: ElementId) -> Option<Rect> {
        let dom = self.dom.read();
        if !dom.is_attached(element) {
            return None;
        }
        dom.elements.get(&element).map(|e| e.rect)
    }

    fn scroll_offset(&self) -> (f64, f64) {
        self.dom.read().scroll
    }

    fn viewport_size(&self) -> (f64, f64) {
        self.dom.read().viewport
    }

    fn location_path(&self) -> String {
        self.dom.read().path.clone()
    }

    fn is_loading(&self) -> bool {
        self.dom.read().loading
    }

    fn observe(
        &self,
        request: ObserveRequest,
        sink: PageEventSink,
    ) -> Result<Subscription, PageError> {
        let mut dom = self.dom.write();
        if let ObserveRequest::ElementResize(el) = &request {
            if !dom.is_attached(*el) {
                return Err(PageError::Detached { element: *el });
            }
        }

        let id = dom.next_observer;
        dom.next_observer += 1;
        let label = request.label();
        dom.observers.push(SimObserver { id, request, sink });

        let weak = Arc::downgrade(&self.dom);
        Ok(Subscription::new(label, move || {
            SimulatedPage::disconnect(&weak, id)
        }))
    }
}
