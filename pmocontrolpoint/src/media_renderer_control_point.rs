use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::errors::ControlPointError;
use crate::media_renderer::MediaRendererProxy;
use crate::raw::RawControlPoint;
use crate::typed_control_point::{DeviceListener, TypedControlPoint};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Thread unique qui sérialise les appels sortants vers les renderers.
struct Executor {
    jobs: Sender<Job>,
    thread: JoinHandle<()>,
}

impl Executor {
    fn spawn() -> Result<Self, ControlPointError> {
        let (jobs, rx) = unbounded::<Job>();
        let thread = thread::Builder::new()
            .name("renderer-invoke".into())
            .spawn(move || {
                for job in rx {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!("Renderer invocation panicked");
                    }
                }
                debug!("Renderer invocation thread stopped");
            })?;
        Ok(Self { jobs, thread })
    }

    fn shutdown(self) {
        drop(self.jobs);
        if self.thread.thread().id() == thread::current().id() {
            return;
        }
        if self.thread.join().is_err() {
            warn!("Renderer invocation thread ended with a panic");
        }
    }
}

/// Typed control point for MediaRenderer devices.
///
/// Each session owns one invocation thread; [`submit`](Self::submit) queues
/// calls on it so actions against renderers never interleave.
pub struct MediaRendererControlPoint {
    typed: TypedControlPoint<MediaRendererProxy>,
    executor: Mutex<Option<Executor>>,
}

impl Default for MediaRendererControlPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaRendererControlPoint {
    pub fn new() -> Self {
        Self {
            typed: TypedControlPoint::new(),
            executor: Mutex::new(None),
        }
    }

    pub fn initialize(&self, raw: &Arc<dyn RawControlPoint>) -> Result<(), ControlPointError> {
        self.terminate();
        *self.executor.lock() = Some(Executor::spawn()?);
        self.typed.initialize(raw);
        Ok(())
    }

    /// Waits for queued invocations to finish, then releases the thread.
    pub fn terminate(&self) {
        self.typed.terminate();
        let executor = self.executor.lock().take();
        if let Some(executor) = executor {
            executor.shutdown();
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.typed.is_initialized()
    }

    /// Queues `call` against `renderer` and returns a receiver for its result.
    pub fn submit<T, F>(
        &self,
        renderer: Arc<MediaRendererProxy>,
        call: F,
    ) -> Result<Receiver<Result<T, ControlPointError>>, ControlPointError>
    where
        T: Send + 'static,
        F: FnOnce(&MediaRendererProxy) -> Result<T, ControlPointError> + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let job: Job = Box::new(move || {
            let _ = tx.send(call(&renderer));
        });

        let guard = self.executor.lock();
        let executor = guard
            .as_ref()
            .ok_or(ControlPointError::NotInitialized("submit"))?;
        executor
            .jobs
            .send(job)
            .map_err(|_| ControlPointError::ControlPoint("renderer executor stopped".into()))?;
        Ok(rx)
    }

    pub fn add_listener(&self, listener: Arc<dyn DeviceListener<MediaRendererProxy>>) -> bool {
        self.typed.add_listener(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DeviceListener<MediaRendererProxy>>) -> bool {
        self.typed.remove_listener(listener)
    }

    pub fn device_list(&self) -> Vec<Arc<MediaRendererProxy>> {
        self.typed.device_list()
    }

    pub fn device(&self, udn: &str) -> Option<Arc<MediaRendererProxy>> {
        self.typed.device(udn)
    }
}
