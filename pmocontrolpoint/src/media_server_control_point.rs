use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::listeners::ListenerList;
use crate::media_server::{CONTENT_DIRECTORY_SERVICE_ID, MediaServerProxy};
use crate::raw::{NotifyListener, RawControlPoint, RawNotification};
use crate::typed_control_point::{DeviceListener, Registry, TypedControlPoint};
use crate::update_ids::{CONTAINER_UPDATE_IDS, changed_container_ids};

/// Notified when a known server reports changed containers.
pub trait ContentUpdateListener: Send + Sync {
    fn on_container_update_ids(&self, server: &Arc<MediaServerProxy>, container_ids: &[String]);
}

struct NotifyBridge {
    registry: Arc<Registry<MediaServerProxy>>,
    listeners: Arc<ListenerList<dyn ContentUpdateListener>>,
    active: AtomicBool,
}

impl NotifyListener for NotifyBridge {
    fn on_notify(&self, notification: &RawNotification) {
        if !self.active.load(Ordering::SeqCst)
            || notification.service_id != CONTENT_DIRECTORY_SERVICE_ID
            || notification.variable != CONTAINER_UPDATE_IDS
        {
            return;
        }

        let Some(container_ids) = changed_container_ids(&notification.value) else {
            debug!(
                udn = notification.udn.as_str(),
                value = notification.value.as_str(),
                "Dropping malformed ContainerUpdateIDs payload"
            );
            return;
        };

        // Un device perdu entre-temps n'est plus connu : l'événement est abandonné
        let Some(server) = self.registry.get(&notification.udn) else {
            debug!(
                udn = notification.udn.as_str(),
                "Dropping ContainerUpdateIDs for unknown server"
            );
            return;
        };

        debug!(
            server = server.friendly_name(),
            changed_containers = container_ids.join(",").as_str(),
            "Broadcasting container update ids"
        );
        self.listeners.for_each("update_ids", |listener| {
            listener.on_container_update_ids(&server, &container_ids)
        });
    }
}

/// Typed control point for MediaServer devices, with container-update eventing.
pub struct MediaServerControlPoint {
    typed: TypedControlPoint<MediaServerProxy>,
    update_listeners: Arc<ListenerList<dyn ContentUpdateListener>>,
    notify: Mutex<Option<(Arc<dyn RawControlPoint>, Arc<NotifyBridge>)>>,
}

impl Default for MediaServerControlPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaServerControlPoint {
    pub fn new() -> Self {
        Self {
            typed: TypedControlPoint::new(),
            update_listeners: Arc::new(ListenerList::new()),
            notify: Mutex::new(None),
        }
    }

    pub fn initialize(&self, raw: &Arc<dyn RawControlPoint>) {
        self.close_notify();
        self.typed.initialize(raw);

        let bridge = Arc::new(NotifyBridge {
            registry: Arc::clone(self.typed.registry()),
            listeners: Arc::clone(&self.update_listeners),
            active: AtomicBool::new(true),
        });
        let as_listener: Arc<dyn NotifyListener> = bridge.clone();
        raw.add_notify_listener(as_listener);
        *self.notify.lock() = Some((Arc::clone(raw), bridge));
    }

    pub fn terminate(&self) {
        self.close_notify();
        self.typed.terminate();
    }

    fn close_notify(&self) {
        let previous = self.notify.lock().take();
        if let Some((raw, bridge)) = previous {
            bridge.active.store(false, Ordering::SeqCst);
            let as_listener: Arc<dyn NotifyListener> = bridge;
            raw.remove_notify_listener(&as_listener);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.typed.is_initialized()
    }

    pub fn add_listener(&self, listener: Arc<dyn DeviceListener<MediaServerProxy>>) -> bool {
        self.typed.add_listener(listener)
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DeviceListener<MediaServerProxy>>) -> bool {
        self.typed.remove_listener(listener)
    }

    pub fn add_update_listener(&self, listener: Arc<dyn ContentUpdateListener>) -> bool {
        self.update_listeners.add(listener)
    }

    pub fn remove_update_listener(&self, listener: &Arc<dyn ContentUpdateListener>) -> bool {
        self.update_listeners.remove(listener)
    }

    pub fn device_list(&self) -> Vec<Arc<MediaServerProxy>> {
        self.typed.device_list()
    }

    pub fn device(&self, udn: &str) -> Option<Arc<MediaServerProxy>> {
        self.typed.device(udn)
    }
}
