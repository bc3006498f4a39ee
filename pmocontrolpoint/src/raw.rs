//! Contract with the discovery/control protocol engine.
//!
//! Everything above this module only talks to devices through these traits.
//! The bundled [`crate::upnp::UpnpControlPoint`] implements them over
//! SSDP/SOAP/GENA; tests implement them in memory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::ControlPointError;
use crate::icon::IconSelector;

/// Icône déclarée dans la description d'un device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIcon {
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub url: String,
}

/// Result of an action invocation, keyed by output argument name.
pub type ActionResult = HashMap<String, String>;

pub trait RawService: Send + Sync {
    fn service_id(&self) -> &str;

    fn service_type(&self) -> &str;

    fn has_action(&self, action: &str) -> bool;

    /// Invokes `action` synchronously. Arguments are sent in the given order.
    fn invoke(&self, action: &str, args: &[(&str, &str)]) -> Result<ActionResult, ControlPointError>;

    /// Allowed values of a state variable; empty when unconstrained or unknown.
    fn allowed_values(&self, variable: &str) -> Vec<String>;
}

impl fmt::Debug for dyn RawService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawService")
            .field("service_id", &self.service_id())
            .field("service_type", &self.service_type())
            .finish()
    }
}

pub trait RawDevice: Send + Sync {
    fn udn(&self) -> &str;

    fn device_type(&self) -> &str;

    fn friendly_name(&self) -> &str;

    fn manufacturer(&self) -> &str {
        ""
    }

    fn model_name(&self) -> &str {
        ""
    }

    /// URL of the device description.
    fn location(&self) -> &str;

    fn icons(&self) -> &[DeviceIcon];

    /// Looks a service up by its service id (`urn:upnp-org:serviceId:...`).
    fn service(&self, service_id: &str) -> Option<Arc<dyn RawService>>;
}

/// One evented state variable change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub udn: String,
    pub service_id: String,
    pub sequence: u32,
    pub variable: String,
    pub value: String,
}

pub trait DiscoveryListener: Send + Sync {
    fn on_discover(&self, device: Arc<dyn RawDevice>);

    fn on_lost(&self, device: Arc<dyn RawDevice>);
}

pub trait NotifyListener: Send + Sync {
    fn on_notify(&self, notification: &RawNotification);
}

/// Moteur de découverte partagé par les control points typés.
///
/// Listeners are identified by `Arc` identity: adding the same `Arc` twice is
/// a no-op and removal needs the `Arc` that was added.
pub trait RawControlPoint: Send + Sync {
    fn initialize(&self) -> Result<(), ControlPointError>;

    fn start(&self) -> Result<(), ControlPointError>;

    fn stop(&self) -> Result<(), ControlPointError>;

    /// Releases sockets and threads and forgets every device. Idempotent.
    fn terminate(&self);

    /// Sends one discovery probe.
    fn search(&self) -> Result<(), ControlPointError>;

    /// Registers a device from a known description URL, bypassing discovery.
    fn add_pinned_device(&self, location: &str) -> Result<(), ControlPointError>;

    fn add_discovery_listener(&self, listener: Arc<dyn DiscoveryListener>);

    fn remove_discovery_listener(&self, listener: &Arc<dyn DiscoveryListener>);

    fn add_notify_listener(&self, listener: Arc<dyn NotifyListener>);

    fn remove_notify_listener(&self, listener: &Arc<dyn NotifyListener>);

    fn set_icon_selector(&self, selector: Arc<dyn IconSelector>);

    fn icon_selector(&self) -> Arc<dyn IconSelector>;
}

/// Builds raw control points bound to a set of network interfaces.
///
/// An empty interface list means "every usable interface".
pub trait RawControlPointFactory: Send + Sync {
    fn create(&self, interfaces: &[String]) -> Result<Arc<dyn RawControlPoint>, ControlPointError>;
}
