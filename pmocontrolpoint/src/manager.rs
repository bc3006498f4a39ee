//! Propriétaire unique du control point brut et des deux control points typés.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::errors::ControlPointError;
use crate::icon::{IconSelector, ScoredIconSelector};
use crate::media_renderer_control_point::MediaRendererControlPoint;
use crate::media_server_control_point::MediaServerControlPoint;
use crate::raw::{RawControlPoint, RawControlPointFactory};

/// Coordinates the lifecycle of one raw control point and the typed
/// control points layered on it.
///
/// At most one raw control point exists at a time; re-initializing tears
/// the previous one down synchronously before building the next.
pub struct ControlPointManager {
    factory: Arc<dyn RawControlPointFactory>,
    icon_selector: Arc<dyn IconSelector>,
    servers: MediaServerControlPoint,
    renderers: MediaRendererControlPoint,
    raw: Mutex<Option<Arc<dyn RawControlPoint>>>,
}

impl ControlPointManager {
    pub fn new(factory: Arc<dyn RawControlPointFactory>) -> Self {
        Self::with_icon_selector(factory, Arc::new(ScoredIconSelector::default()))
    }

    pub fn with_icon_selector(
        factory: Arc<dyn RawControlPointFactory>,
        icon_selector: Arc<dyn IconSelector>,
    ) -> Self {
        Self {
            factory,
            icon_selector,
            servers: MediaServerControlPoint::new(),
            renderers: MediaRendererControlPoint::new(),
            raw: Mutex::new(None),
        }
    }

    pub fn servers(&self) -> &MediaServerControlPoint {
        &self.servers
    }

    pub fn renderers(&self) -> &MediaRendererControlPoint {
        &self.renderers
    }

    pub fn is_initialized(&self) -> bool {
        self.raw.lock().is_some()
    }

    /// Builds a fresh raw control point on `interfaces` (all usable ones when
    /// `None`), layers both typed control points on it and starts discovery.
    pub fn initialize(&self, interfaces: Option<&[String]>) -> Result<(), ControlPointError> {
        let mut slot = self.raw.lock();
        if let Some(previous) = slot.take() {
            self.teardown(previous);
        }

        let interfaces = interfaces.map(<[String]>::to_vec).unwrap_or_default();
        let raw = self.factory.create(&interfaces)?;
        raw.set_icon_selector(Arc::clone(&self.icon_selector));
        if let Err(err) = raw.initialize() {
            warn!(error = %err, "Raw control point initialization failed");
            raw.terminate();
            return Err(err);
        }

        self.servers.initialize(&raw);
        if let Err(err) = self.renderers.initialize(&raw) {
            self.servers.terminate();
            raw.terminate();
            return Err(err);
        }

        if let Err(err) = raw.start() {
            self.servers.terminate();
            self.renderers.terminate();
            raw.terminate();
            return Err(err);
        }

        info!(interfaces = ?interfaces, "Control point manager initialized");
        *slot = Some(raw);
        Ok(())
    }

    /// Re-initializes on a new set of interfaces.
    pub fn on_interfaces_changed(&self, interfaces: Option<&[String]>) -> Result<(), ControlPointError> {
        info!(interfaces = ?interfaces, "Network interfaces changed, re-initializing");
        self.initialize(interfaces)
    }

    fn current(&self, operation: &'static str) -> Result<Arc<dyn RawControlPoint>, ControlPointError> {
        self.raw
            .lock()
            .as_ref()
            .map(Arc::clone)
            .ok_or(ControlPointError::NotInitialized(operation))
    }

    pub fn start(&self) -> Result<(), ControlPointError> {
        self.current("start")?.start()
    }

    pub fn stop(&self) -> Result<(), ControlPointError> {
        self.current("stop")?.stop()
    }

    pub fn search(&self) -> Result<(), ControlPointError> {
        self.current("search")?.search()
    }

    pub fn add_pinned_device(&self, location: &str) -> Result<(), ControlPointError> {
        self.current("add_pinned_device")?.add_pinned_device(location)
    }

    /// Tears down typed control points, then the raw one. No-op when not initialized.
    pub fn terminate(&self) {
        let previous = self.raw.lock().take();
        if let Some(previous) = previous {
            self.teardown(previous);
            info!("Control point manager terminated");
        }
    }

    fn teardown(&self, raw: Arc<dyn RawControlPoint>) {
        self.servers.terminate();
        self.renderers.terminate();
        if let Err(err) = raw.stop() {
            warn!(error = %err, "Failed to stop raw control point");
        }
        raw.terminate();
    }
}

impl Drop for ControlPointManager {
    fn drop(&mut self) {
        self.terminate();
    }
}
