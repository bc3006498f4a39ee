//! Streaming browse of a ContentDirectory container.
//!
//! A [`BrowseHandle`] owns two threads once started: a fetch thread that
//! pages through `Browse` results and a delivery thread that batches them
//! (N items or T milliseconds, whichever comes first) before handing them to
//! listeners. Delivery and cancellation share a lock, so no listener is
//! called once [`BrowseHandle::cancel`] has returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use pmoconfig::Config;
use pmodidl::ContentObject;
use tracing::{debug, info, warn};

use crate::errors::ControlPointError;
use crate::listeners::ListenerList;
use crate::media_server::ContentSource;

/// Batching and paging parameters of a browse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseOptions {
    pub batch_size: usize,
    pub batch_interval: Duration,
    pub page_size: u32,
}

impl Default for BrowseOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_interval: Duration::from_millis(200),
            page_size: 100,
        }
    }
}

impl BrowseOptions {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            batch_size: config
                .get_browse_batch_size()
                .unwrap_or(defaults.batch_size)
                .max(1),
            batch_interval: config
                .get_browse_batch_interval_ms()
                .map(|ms| Duration::from_millis(ms as u64))
                .unwrap_or(defaults.batch_interval),
            page_size: config
                .get_browse_page_size()
                .map(|n| n.clamp(1, u32::MAX as usize) as u32)
                .unwrap_or(defaults.page_size),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseState {
    Idle,
    Browsing,
    Completed,
    Cancelled,
    Failed,
}

impl BrowseState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BrowseState::Completed | BrowseState::Cancelled | BrowseState::Failed
        )
    }
}

/// Receives the results of a browse, batch by batch.
///
/// The last call of a completed or failed browse has `in_progress == false`
/// (its batch may be empty). A listener registered late first receives
/// everything accumulated so far as a single batch.
pub trait BrowseListener: Send + Sync {
    fn on_batch(&self, batch: &[ContentObject], in_progress: bool);
}

enum FetchMessage {
    Objects(Vec<ContentObject>),
    Done,
    Failed(String),
}

struct Progress {
    state: BrowseState,
    results: Vec<ContentObject>,
    error: Option<String>,
}

struct BrowseShared {
    container_id: String,
    source: Arc<dyn ContentSource>,
    options: BrowseOptions,
    progress: Mutex<Progress>,
    finished: Condvar,
    cancelled: AtomicBool,
    // Réentrant : un listener peut appeler cancel() depuis son callback
    delivery: ReentrantMutex<()>,
    listeners: ListenerList<dyn BrowseListener>,
}

/// Cloneable handle on one browse operation.
#[derive(Clone)]
pub struct BrowseHandle {
    shared: Arc<BrowseShared>,
}

/// Factory of browse handles sharing the same options.
#[derive(Debug, Clone, Default)]
pub struct ContentDirectoryBrowser {
    options: BrowseOptions,
}

impl ContentDirectoryBrowser {
    pub fn new(options: BrowseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BrowseOptions {
        &self.options
    }

    /// Prepares a browse of the children of `container_id`, in `Idle` state.
    pub fn prepare(&self, source: Arc<dyn ContentSource>, container_id: &str) -> BrowseHandle {
        BrowseHandle {
            shared: Arc::new(BrowseShared {
                container_id: container_id.to_string(),
                source,
                options: self.options.clone(),
                progress: Mutex::new(Progress {
                    state: BrowseState::Idle,
                    results: Vec::new(),
                    error: None,
                }),
                finished: Condvar::new(),
                cancelled: AtomicBool::new(false),
                delivery: ReentrantMutex::new(()),
                listeners: ListenerList::new(),
            }),
        }
    }

    /// Prepares and starts a browse.
    pub fn browse(
        &self,
        source: Arc<dyn ContentSource>,
        container_id: &str,
    ) -> Result<BrowseHandle, ControlPointError> {
        let handle = self.prepare(source, container_id);
        handle.start()?;
        Ok(handle)
    }
}

impl BrowseHandle {
    pub fn container_id(&self) -> &str {
        &self.shared.container_id
    }

    pub fn state(&self) -> BrowseState {
        self.shared.progress.lock().state
    }

    pub fn is_in_progress(&self) -> bool {
        self.state() == BrowseState::Browsing
    }

    /// Snapshot of every object delivered so far.
    pub fn results(&self) -> Vec<ContentObject> {
        self.shared.progress.lock().results.clone()
    }

    /// Transport error of a failed browse.
    pub fn error(&self) -> Option<String> {
        self.shared.progress.lock().error.clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn BrowseListener>) -> bool {
        let _delivery = self.shared.delivery.lock();
        if !self.shared.listeners.add(Arc::clone(&listener)) {
            return false;
        }
        if self.shared.cancelled.load(Ordering::SeqCst) {
            return true;
        }

        let (state, results) = {
            let progress = self.shared.progress.lock();
            (progress.state, progress.results.clone())
        };
        let terminal = matches!(state, BrowseState::Completed | BrowseState::Failed);
        if !results.is_empty() || terminal {
            listener.on_batch(&results, state == BrowseState::Browsing);
        }
        true
    }

    pub fn remove_listener(&self, listener: &Arc<dyn BrowseListener>) -> bool {
        self.shared.listeners.remove(listener)
    }

    /// Starts fetching. A handle can only be started once.
    pub fn start(&self) -> Result<(), ControlPointError> {
        {
            let mut progress = self.shared.progress.lock();
            if progress.state != BrowseState::Idle {
                return Err(ControlPointError::BrowseAlreadyStarted);
            }
            progress.state = BrowseState::Browsing;
        }

        info!(container = self.container_id(), "Browse started");

        let (tx, rx) = bounded::<FetchMessage>(4);
        let fetch_shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("browse-fetch".into())
            .spawn(move || run_fetch(fetch_shared, tx));
        if let Err(err) = spawned {
            self.fail_to_start(&err);
            return Err(err.into());
        }

        let delivery_shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("browse-delivery".into())
            .spawn(move || run_delivery(delivery_shared, rx));
        if let Err(err) = spawned {
            self.shared.cancelled.store(true, Ordering::SeqCst);
            self.fail_to_start(&err);
            return Err(err.into());
        }

        Ok(())
    }

    fn fail_to_start(&self, err: &std::io::Error) {
        warn!(container = self.container_id(), error = %err, "Cannot spawn browse thread");
        let mut progress = self.shared.progress.lock();
        progress.state = BrowseState::Failed;
        progress.error = Some(err.to_string());
        self.shared.finished.notify_all();
    }

    /// Stops the browse. Once this returns no listener is called anymore.
    ///
    /// Cancelling a terminal browse only silences further listener calls.
    pub fn cancel(&self) {
        let _delivery = self.shared.delivery.lock();
        self.shared.cancelled.store(true, Ordering::SeqCst);
        let mut progress = self.shared.progress.lock();
        if !progress.state.is_terminal() {
            progress.state = BrowseState::Cancelled;
            debug!(container = self.container_id(), "Browse cancelled");
        }
        self.shared.finished.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Blocks until the browse reaches a terminal state or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> BrowseState {
        let deadline = Instant::now() + timeout;
        let mut progress = self.shared.progress.lock();
        while !progress.state.is_terminal() && progress.state != BrowseState::Idle {
            if self
                .shared
                .finished
                .wait_until(&mut progress, deadline)
                .timed_out()
            {
                break;
            }
        }
        progress.state
    }
}

fn run_fetch(shared: Arc<BrowseShared>, tx: Sender<FetchMessage>) {
    let page_size = shared.options.page_size.max(1);
    let mut start = 0u32;

    loop {
        if shared.cancelled.load(Ordering::SeqCst) {
            return;
        }

        let page = match shared
            .source
            .browse_children(&shared.container_id, start, page_size)
        {
            Ok(page) => page,
            Err(err) => {
                let _ = tx.send(FetchMessage::Failed(err.to_string()));
                return;
            }
        };

        let received = page.objects.len() as u32;
        start = start.saturating_add(received);
        let exhausted =
            received == 0 || (page.total_matches != 0 && start >= page.total_matches);

        if received > 0 && tx.send(FetchMessage::Objects(page.objects)).is_err() {
            return;
        }
        if exhausted {
            let _ = tx.send(FetchMessage::Done);
            return;
        }
    }
}

fn run_delivery(shared: Arc<BrowseShared>, rx: Receiver<FetchMessage>) {
    let batch_size = shared.options.batch_size.max(1);
    let mut buffer: Vec<ContentObject> = Vec::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let message = match deadline {
            Some(at) => match rx.recv_deadline(at) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    Some(FetchMessage::Failed("fetch thread stopped".into()))
                }
            },
            None => match rx.recv() {
                Ok(message) => Some(message),
                Err(_) => Some(FetchMessage::Failed("fetch thread stopped".into())),
            },
        };

        match message {
            None => {
                deliver(&shared, std::mem::take(&mut buffer), None);
                deadline = None;
            }
            Some(FetchMessage::Objects(objects)) => {
                for object in objects {
                    buffer.push(object);
                    if buffer.len() >= batch_size {
                        deliver(&shared, std::mem::take(&mut buffer), None);
                        deadline = None;
                    }
                }
                if !buffer.is_empty() && deadline.is_none() {
                    deadline = Some(Instant::now() + shared.options.batch_interval);
                }
            }
            Some(FetchMessage::Done) => {
                deliver(&shared, buffer, Some(Ok(())));
                return;
            }
            Some(FetchMessage::Failed(error)) => {
                deliver(&shared, buffer, Some(Err(error)));
                return;
            }
        }

        if shared.cancelled.load(Ordering::SeqCst) {
            return;
        }
    }
}

/// Hands one batch to the listeners. `outcome` is set on the final batch.
///
/// The terminal state is published after the listeners ran, so `wait()`
/// returns only once the final callback is done.
fn deliver(shared: &BrowseShared, batch: Vec<ContentObject>, outcome: Option<Result<(), String>>) {
    let _delivery = shared.delivery.lock();
    if shared.cancelled.load(Ordering::SeqCst) {
        return;
    }

    let in_progress = outcome.is_none();
    shared.progress.lock().results.extend(batch.iter().cloned());

    shared
        .listeners
        .for_each("browse_batch", |listener| listener.on_batch(&batch, in_progress));

    let Some(outcome) = outcome else {
        return;
    };
    let mut progress = shared.progress.lock();
    if progress.state.is_terminal() {
        // annulé depuis un callback
        return;
    }
    match outcome {
        Ok(()) => {
            progress.state = BrowseState::Completed;
            info!(
                container = shared.container_id.as_str(),
                count = progress.results.len(),
                "Browse completed"
            );
        }
        Err(error) => {
            warn!(
                container = shared.container_id.as_str(),
                error = error.as_str(),
                "Browse failed"
            );
            progress.state = BrowseState::Failed;
            progress.error = Some(error);
        }
    }
    shared.finished.notify_all();
}
