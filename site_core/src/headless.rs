//! In-memory host - a [`Stage`] and [`ObjectiveSurface`] that record what
//! they are asked to do instead of touching a real page.
//!
//! Used by the test suite and by embedders that simulate pages, such as
//! server-side previews.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use crate::buddy::ElementSettings;
use crate::geometry::{Position, Rect};
use crate::objectives::{ObjectiveEntry, ObjectiveSurface};
use crate::stage::{ElementHandle, ElementRef, Stage};

/// One element mounted on the headless page.
#[derive(Debug, Clone, PartialEq)]
pub struct MountedElement {
    pub settings: ElementSettings,
    pub position: Option<Position>,
    pub chatter: Option<String>,
}

#[derive(Debug)]
struct StageInner {
    next_handle: u64,
    mounted: BTreeMap<ElementHandle, MountedElement>,
    detached: Vec<ElementHandle>,
    moves: Vec<(ElementHandle, Position, u64)>,
    observed: BTreeSet<ElementHandle>,
    chat_log: Vec<(String, String)>,
    readouts: Vec<String>,
    anchors: HashMap<String, Rect>,
    cursor: Option<Position>,
    viewport: Rect,
    page: Rect,
    overlay_open: bool,
}

/// Headless page.
#[derive(Debug)]
pub struct HeadlessStage {
    inner: RefCell<StageInner>,
}

impl HeadlessStage {
    /// A 1280x800 viewport at the top of a 1280x4000 page.
    pub fn new() -> Self {
        Self::with_bounds(
            Rect::new(0.0, 0.0, 1280.0, 800.0),
            Rect::new(0.0, 0.0, 1280.0, 4000.0),
        )
    }

    pub fn with_bounds(viewport: Rect, page: Rect) -> Self {
        Self {
            inner: RefCell::new(StageInner {
                next_handle: 0,
                mounted: BTreeMap::new(),
                detached: Vec::new(),
                moves: Vec::new(),
                observed: BTreeSet::new(),
                chat_log: Vec::new(),
                readouts: Vec::new(),
                anchors: HashMap::new(),
                cursor: None,
                viewport,
                page,
                overlay_open: false,
            }),
        }
    }

    pub fn set_cursor(&self, cursor: Option<Position>) {
        self.inner.borrow_mut().cursor = cursor;
    }

    pub fn set_overlay_open(&self, open: bool) {
        self.inner.borrow_mut().overlay_open = open;
    }

    /// Put a foreign element on the page.
    pub fn place_anchor(&self, selector: &str, rect: Rect) {
        self.inner
            .borrow_mut()
            .anchors
            .insert(selector.to_string(), rect);
    }

    /// Take a foreign element off the page.
    pub fn remove_anchor(&self, selector: &str) {
        self.inner.borrow_mut().anchors.remove(selector);
    }

    pub fn element(&self, handle: ElementHandle) -> Option<MountedElement> {
        self.inner.borrow().mounted.get(&handle).cloned()
    }

    /// Handle of the mounted element with the given id.
    pub fn find(&self, id: &str) -> Option<ElementHandle> {
        self.inner
            .borrow()
            .mounted
            .iter()
            .find(|(_, element)| element.settings.id == id)
            .map(|(handle, _)| *handle)
    }

    pub fn mounted_count(&self) -> usize {
        self.inner.borrow().mounted.len()
    }

    pub fn detached(&self) -> Vec<ElementHandle> {
        self.inner.borrow().detached.clone()
    }

    /// Animated moves requested for an element, oldest first.
    pub fn moves_of(&self, handle: ElementHandle) -> Vec<Position> {
        self.inner
            .borrow()
            .moves
            .iter()
            .filter(|(h, _, transition)| *h == handle && *transition > 0)
            .map(|(_, to, _)| *to)
            .collect()
    }

    pub fn is_observed(&self, handle: ElementHandle) -> bool {
        self.inner.borrow().observed.contains(&handle)
    }

    pub fn chat_log(&self) -> Vec<(String, String)> {
        self.inner.borrow().chat_log.clone()
    }

    pub fn readouts(&self) -> Vec<String> {
        self.inner.borrow().readouts.clone()
    }
}

impl Default for HeadlessStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for HeadlessStage {
    fn mount(&self, element: &ElementSettings) -> ElementHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next_handle += 1;
        let handle = ElementHandle(inner.next_handle);
        inner.mounted.insert(
            handle,
            MountedElement {
                settings: element.clone(),
                position: None,
                chatter: None,
            },
        );
        handle
    }

    fn detach(&self, element: ElementHandle) {
        let mut inner = self.inner.borrow_mut();
        if inner.mounted.remove(&element).is_some() {
            inner.detached.push(element);
        }
        inner.observed.remove(&element);
    }

    fn move_to(&self, element: ElementHandle, to: Position, transition_ms: u64) {
        let mut inner = self.inner.borrow_mut();
        if let Some(mounted) = inner.mounted.get_mut(&element) {
            mounted.position = Some(to);
        }
        inner.moves.push((element, to, transition_ms));
    }

    fn show_chatter(&self, element: ElementHandle, text: &str) {
        if let Some(mounted) = self.inner.borrow_mut().mounted.get_mut(&element) {
            mounted.chatter = Some(text.to_string());
        }
    }

    fn clear_chatter(&self, element: ElementHandle) {
        if let Some(mounted) = self.inner.borrow_mut().mounted.get_mut(&element) {
            mounted.chatter = None;
        }
    }

    fn observe(&self, element: ElementHandle) {
        self.inner.borrow_mut().observed.insert(element);
    }

    fn unobserve(&self, element: ElementHandle) {
        self.inner.borrow_mut().observed.remove(&element);
    }

    fn cursor(&self) -> Option<Position> {
        self.inner.borrow().cursor
    }

    fn viewport(&self) -> Rect {
        self.inner.borrow().viewport
    }

    fn page_bounds(&self) -> Rect {
        self.inner.borrow().page
    }

    fn element_rect(&self, target: &ElementRef) -> Option<Rect> {
        self.inner.borrow().anchors.get(target.selector()).copied()
    }

    fn overlay_open(&self) -> bool {
        self.inner.borrow().overlay_open
    }

    fn log_chatter(&self, speaker: &str, text: &str) {
        self.inner
            .borrow_mut()
            .chat_log
            .push((speaker.to_string(), text.to_string()));
    }

    fn readout(&self, text: &str) {
        self.inner.borrow_mut().readouts.push(text.to_string());
    }
}

#[derive(Debug, Default)]
struct SurfaceInner {
    renders: Vec<Vec<ObjectiveEntry>>,
    detached: bool,
}

/// Headless objective list view. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    inner: Rc<RefCell<SurfaceInner>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries from the latest render.
    pub fn entries(&self) -> Vec<ObjectiveEntry> {
        self.inner.borrow().renders.last().cloned().unwrap_or_default()
    }

    pub fn render_count(&self) -> usize {
        self.inner.borrow().renders.len()
    }

    pub fn is_detached(&self) -> bool {
        self.inner.borrow().detached
    }
}

impl ObjectiveSurface for HeadlessSurface {
    fn render(&mut self, entries: &[ObjectiveEntry]) {
        let mut inner = self.inner.borrow_mut();
        inner.detached = false;
        inner.renders.push(entries.to_vec());
    }

    fn detach(&mut self) {
        self.inner.borrow_mut().detached = true;
    }
}
