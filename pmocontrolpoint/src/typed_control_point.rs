//! Registre typé de devices construit au-dessus du control point brut.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::listeners::ListenerList;
use crate::proxy::DeviceProxy;
use crate::raw::{DiscoveryListener, RawControlPoint, RawDevice};

/// Typed discover/lost callbacks.
pub trait DeviceListener<P>: Send + Sync {
    fn on_discover(&self, device: &Arc<P>);

    fn on_lost(&self, device: &Arc<P>);
}

/// Device map in discovery order, at most one proxy per UDN.
pub(crate) struct Registry<P: DeviceProxy> {
    devices: RwLock<Vec<Arc<P>>>,
    listeners: ListenerList<dyn DeviceListener<P>>,
}

impl<P: DeviceProxy> Registry<P> {
    fn new() -> Self {
        Self {
            devices: RwLock::new(Vec::new()),
            listeners: ListenerList::new(),
        }
    }

    pub(crate) fn get(&self, udn: &str) -> Option<Arc<P>> {
        self.devices.read().iter().find(|d| d.udn() == udn).cloned()
    }

    fn contains(&self, udn: &str) -> bool {
        self.devices.read().iter().any(|d| d.udn() == udn)
    }

    fn clear(&self) {
        self.devices.write().clear();
    }

    /// Désactive `active` et vide la map sous le même verrou d'écriture.
    ///
    /// Any insert still in flight checks `active` under that lock, so nothing
    /// is added once this returns.
    fn deactivate(&self, active: &AtomicBool) {
        let mut devices = self.devices.write();
        active.store(false, Ordering::SeqCst);
        devices.clear();
    }

    fn handle_discover(
        &self,
        device: Arc<dyn RawDevice>,
        icons: &dyn RawControlPoint,
        active: &AtomicBool,
    ) {
        if !P::accepts(device.as_ref()) {
            debug!(
                udn = device.udn(),
                device_type = device.device_type(),
                kind = P::KIND,
                "Device rejected by type filter"
            );
            return;
        }
        if self.contains(device.udn()) {
            return;
        }

        let udn = device.udn().to_string();
        let proxy = match P::from_device(device, icons.icon_selector()) {
            Ok(proxy) => Arc::new(proxy),
            Err(err) => {
                debug!(udn = udn.as_str(), kind = P::KIND, error = %err, "Device rejected");
                return;
            }
        };

        {
            let mut devices = self.devices.write();
            if !active.load(Ordering::SeqCst) {
                debug!(udn = udn.as_str(), kind = P::KIND, "Discovery finished after terminate, dropped");
                return;
            }
            if devices.iter().any(|d| d.udn() == udn) {
                return;
            }
            devices.push(Arc::clone(&proxy));
        }

        info!(
            udn = udn.as_str(),
            name = proxy.handle().friendly_name(),
            kind = P::KIND,
            "Device discovered"
        );
        self.listeners
            .for_each("discover", |listener| listener.on_discover(&proxy));
    }

    fn handle_lost(&self, device: &dyn RawDevice) {
        let removed = {
            let mut devices = self.devices.write();
            devices
                .iter()
                .position(|d| d.udn() == device.udn())
                .map(|pos| devices.remove(pos))
        };

        if let Some(proxy) = removed {
            info!(udn = device.udn(), kind = P::KIND, "Device lost");
            self.listeners
                .for_each("lost", |listener| listener.on_lost(&proxy));
        }
    }
}

/// Adaptateur enregistré auprès du control point brut.
///
/// Deactivated on terminate so that late callbacks from an in-flight
/// fan-out cannot repopulate the map.
struct DiscoveryBridge<P: DeviceProxy> {
    registry: Arc<Registry<P>>,
    raw: Arc<dyn RawControlPoint>,
    active: AtomicBool,
}

impl<P: DeviceProxy> DiscoveryListener for DiscoveryBridge<P> {
    fn on_discover(&self, device: Arc<dyn RawDevice>) {
        if self.active.load(Ordering::SeqCst) {
            self.registry
                .handle_discover(device, self.raw.as_ref(), &self.active);
        }
    }

    fn on_lost(&self, device: Arc<dyn RawDevice>) {
        if self.active.load(Ordering::SeqCst) {
            self.registry.handle_lost(device.as_ref());
        }
    }
}

struct Session<P: DeviceProxy> {
    raw: Arc<dyn RawControlPoint>,
    bridge: Arc<DiscoveryBridge<P>>,
}

/// Discovery filter and device map for one device type.
pub struct TypedControlPoint<P: DeviceProxy> {
    registry: Arc<Registry<P>>,
    session: Mutex<Option<Session<P>>>,
}

impl<P: DeviceProxy> Default for TypedControlPoint<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: DeviceProxy> TypedControlPoint<P> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            session: Mutex::new(None),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<Registry<P>> {
        &self.registry
    }

    /// Subscribes to `raw` and starts from an empty map.
    ///
    /// A previous session is terminated first.
    pub fn initialize(&self, raw: &Arc<dyn RawControlPoint>) {
        let mut session = self.session.lock();
        match session.take() {
            Some(previous) => self.close(previous),
            None => self.registry.clear(),
        }

        let bridge = Arc::new(DiscoveryBridge {
            registry: Arc::clone(&self.registry),
            raw: Arc::clone(raw),
            active: AtomicBool::new(true),
        });
        let as_listener: Arc<dyn DiscoveryListener> = bridge.clone();
        raw.add_discovery_listener(as_listener);

        debug!(kind = P::KIND, "Typed control point initialized");
        *session = Some(Session {
            raw: Arc::clone(raw),
            bridge,
        });
    }

    /// Unsubscribes and empties the map. No-op when not initialized.
    pub fn terminate(&self) {
        let previous = self.session.lock().take();
        if let Some(previous) = previous {
            self.close(previous);
            debug!(kind = P::KIND, "Typed control point terminated");
        }
    }

    fn close(&self, session: Session<P>) {
        self.registry.deactivate(&session.bridge.active);
        let as_listener: Arc<dyn DiscoveryListener> = session.bridge;
        session.raw.remove_discovery_listener(&as_listener);
    }

    pub fn is_initialized(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Raw control point of the current session.
    pub fn raw(&self) -> Option<Arc<dyn RawControlPoint>> {
        self.session.lock().as_ref().map(|s| Arc::clone(&s.raw))
    }

    /// Returns `false` if the listener was already registered.
    pub fn add_listener(&self, listener: Arc<dyn DeviceListener<P>>) -> bool {
        self.registry.listeners.add(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DeviceListener<P>>) -> bool {
        self.registry.listeners.remove(listener)
    }

    /// Snapshot of known devices, in discovery order.
    pub fn device_list(&self) -> Vec<Arc<P>> {
        self.registry.devices.read().clone()
    }

    pub fn device(&self, udn: &str) -> Option<Arc<P>> {
        self.registry.get(udn)
    }

    pub fn device_count(&self) -> usize {
        self.registry.devices.read().len()
    }
}
