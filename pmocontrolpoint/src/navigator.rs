//! Current-directory model over a browse, plus an owned stack of levels.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use pmodidl::ContentObject;
use tracing::{debug, warn};

use crate::browser::{BrowseHandle, BrowseListener, BrowseState, ContentDirectoryBrowser};
use crate::errors::ControlPointError;
use crate::listeners::ListenerList;
use crate::media_server::{ContentSource, ROOT_OBJECT_ID};

/// Receives the full entry list and the in-progress flag on every change.
pub trait EntryListener: Send + Sync {
    fn on_entries(&self, entries: &[ContentObject], in_progress: bool);
}

struct NavigatorState {
    entries: Vec<ContentObject>,
    selected: Option<usize>,
    descended_from: Option<usize>,
    in_progress: bool,
    handle: Option<BrowseHandle>,
    generation: u64,
}

struct NavigatorShared {
    parent_id: String,
    parent_title: String,
    state: Mutex<NavigatorState>,
    listeners: ListenerList<dyn EntryListener>,
}

impl NavigatorShared {
    fn publish(&self, entries: &[ContentObject], in_progress: bool) {
        self.listeners
            .for_each("entries", |listener| listener.on_entries(entries, in_progress));
    }
}

impl Drop for NavigatorShared {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().handle.take() {
            handle.cancel();
        }
    }
}

/// Relaie les lots d'un browse vers le navigateur, tant que la génération correspond.
struct BrowseBridge {
    navigator: Weak<NavigatorShared>,
    generation: u64,
}

impl BrowseListener for BrowseBridge {
    fn on_batch(&self, batch: &[ContentObject], in_progress: bool) {
        let Some(shared) = self.navigator.upgrade() else {
            return;
        };
        let (entries, in_progress) = {
            let mut state = shared.state.lock();
            if state.generation != self.generation {
                return;
            }
            state.entries.extend_from_slice(batch);
            state.in_progress = in_progress;
            (state.entries.clone(), state.in_progress)
        };
        shared.publish(&entries, in_progress);
    }
}

/// One directory level: parent id/title, children, selection and in-progress flag.
///
/// Cloning yields another handle on the same level.
#[derive(Clone)]
pub struct DirectoryTreeNavigator {
    shared: Arc<NavigatorShared>,
}

impl DirectoryTreeNavigator {
    /// Root level: empty id and empty title.
    pub fn root() -> Self {
        Self::new("", "")
    }

    pub fn new(parent_id: impl Into<String>, parent_title: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(NavigatorShared {
                parent_id: parent_id.into(),
                parent_title: parent_title.into(),
                state: Mutex::new(NavigatorState {
                    entries: Vec::new(),
                    selected: None,
                    descended_from: None,
                    in_progress: true,
                    handle: None,
                    generation: 0,
                }),
                listeners: ListenerList::new(),
            }),
        }
    }

    pub fn parent_id(&self) -> &str {
        &self.shared.parent_id
    }

    pub fn parent_title(&self) -> &str {
        &self.shared.parent_title
    }

    pub fn is_root(&self) -> bool {
        self.shared.parent_id.is_empty()
    }

    /// Object id to browse for this level (the root maps to `"0"`).
    pub fn browse_id(&self) -> &str {
        if self.is_root() {
            ROOT_OBJECT_ID
        } else {
            &self.shared.parent_id
        }
    }

    /// Attaches a browse, cancelling and discarding any previous one.
    ///
    /// An idle handle is started; a running one keeps running and its
    /// already-delivered results are replayed.
    pub fn bind_browse(&self, handle: BrowseHandle) -> Result<(), ControlPointError> {
        let (previous, generation) = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.entries.clear();
            state.selected = None;
            state.in_progress = true;
            let previous = state.handle.replace(handle.clone());
            (previous, state.generation)
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
        self.shared.publish(&[], true);

        debug!(
            container = handle.container_id(),
            generation,
            "Navigator bound to browse"
        );

        let bridge: Arc<dyn BrowseListener> = Arc::new(BrowseBridge {
            navigator: Arc::downgrade(&self.shared),
            generation,
        });
        handle.add_listener(bridge);

        if handle.state() == BrowseState::Idle {
            handle.start()?;
        }
        Ok(())
    }

    /// Cancels the active browse, empties the list and marks in-progress.
    pub fn clear_state(&self) {
        let previous = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.entries.clear();
            state.selected = None;
            state.in_progress = true;
            state.handle.take()
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
        self.shared.publish(&[], true);
    }

    /// Cancels the active browse. Entries stay; in-progress is cleared.
    pub fn cancel(&self) {
        let (previous, entries) = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.in_progress = false;
            (state.handle.take(), state.entries.clone())
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
        self.shared.publish(&entries, false);
    }

    /// Registers a listener; it immediately receives the current state.
    pub fn add_listener(&self, listener: Arc<dyn EntryListener>) -> bool {
        if !self.shared.listeners.add(Arc::clone(&listener)) {
            return false;
        }
        let (entries, in_progress) = {
            let state = self.shared.state.lock();
            (state.entries.clone(), state.in_progress)
        };
        listener.on_entries(&entries, in_progress);
        true
    }

    pub fn remove_listener(&self, listener: &Arc<dyn EntryListener>) -> bool {
        self.shared.listeners.remove(listener)
    }

    pub fn entries(&self) -> Vec<ContentObject> {
        self.shared.state.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_in_progress(&self) -> bool {
        self.shared.state.lock().in_progress
    }

    /// Selects entry `index`; an out-of-range index clears the selection.
    pub fn select(&self, index: usize) -> bool {
        let mut state = self.shared.state.lock();
        if index < state.entries.len() {
            state.selected = Some(index);
            true
        } else {
            state.selected = None;
            false
        }
    }

    pub fn clear_selection(&self) {
        self.shared.state.lock().selected = None;
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.shared.state.lock().selected
    }

    pub fn selected_object(&self) -> Option<ContentObject> {
        let state = self.shared.state.lock();
        state.selected.and_then(|i| state.entries.get(i).cloned())
    }

    /// Selection held when this level was last descended from.
    pub fn descended_from(&self) -> Option<usize> {
        self.shared.state.lock().descended_from
    }

    /// New navigator scoped to container `index`.
    ///
    /// The current selection is recorded as the descended-from index, then
    /// cleared. Fails when `index` is out of range or designates an item.
    pub fn enter_child(&self, index: usize) -> Result<DirectoryTreeNavigator, ControlPointError> {
        let child = {
            let mut state = self.shared.state.lock();
            let len = state.entries.len();
            let object = state
                .entries
                .get(index)
                .ok_or(ControlPointError::IndexOutOfRange { index, len })?;
            if !object.is_container {
                return Err(ControlPointError::NotAContainer(object.id.clone()));
            }
            let child = DirectoryTreeNavigator::new(object.id.clone(), object.title());
            state.descended_from = state.selected.take();
            child
        };
        Ok(child)
    }
}

/// Owned stack of navigator levels; the root is at the bottom.
pub struct NavigatorStack {
    browser: ContentDirectoryBrowser,
    source: Arc<dyn ContentSource>,
    levels: Vec<DirectoryTreeNavigator>,
}

impl NavigatorStack {
    pub fn new(browser: ContentDirectoryBrowser, source: Arc<dyn ContentSource>) -> Self {
        Self {
            browser,
            source,
            levels: vec![DirectoryTreeNavigator::root()],
        }
    }

    pub fn current(&self) -> &DirectoryTreeNavigator {
        // levels n'est jamais vide
        &self.levels[self.levels.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Titles from the root (excluded) to the current level.
    pub fn path(&self) -> Vec<String> {
        self.levels
            .iter()
            .skip(1)
            .map(|level| level.parent_title().to_string())
            .collect()
    }

    /// Restarts the browse of the current level from scratch.
    pub fn reload(&self) -> Result<(), ControlPointError> {
        let navigator = self.current();
        navigator.clear_state();
        let handle = self
            .browser
            .prepare(Arc::clone(&self.source), navigator.browse_id());
        navigator.bind_browse(handle)
    }

    /// Descends into container `index` of the current level and browses it.
    pub fn enter_child(&mut self, index: usize) -> Result<&DirectoryTreeNavigator, ControlPointError> {
        let child = self.current().enter_child(index)?;
        self.levels.push(child);
        if let Err(err) = self.reload() {
            warn!(error = %err, "Cannot browse child container");
            self.levels.pop();
            return Err(err);
        }
        Ok(self.current())
    }

    /// Pops the current level. Returns `false` at the root.
    pub fn ascend(&mut self) -> bool {
        if self.levels.len() <= 1 {
            return false;
        }
        if let Some(level) = self.levels.pop() {
            level.cancel();
        }
        self.current().clear_selection();
        true
    }
}
