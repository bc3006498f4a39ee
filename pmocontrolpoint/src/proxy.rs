//! Socle commun des proxies typés (MediaServer, MediaRenderer).

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::device_tag::DeviceTag;
use crate::errors::ControlPointError;
use crate::icon::{IconChoice, IconSelector};
use crate::raw::{ActionResult, RawDevice, RawService};

/// A device-type-specialised wrapper around a raw device.
///
/// `accepts` is the cheap discovery filter; `from_device` validates the
/// services and actions the proxy needs and may still reject the device.
pub trait DeviceProxy: Send + Sync + Sized + 'static {
    /// Short name used in logs ("MediaServer", "MediaRenderer").
    const KIND: &'static str;

    /// Device type prefix, version excluded (`urn:...:device:MediaServer:`).
    const TYPE_PREFIX: &'static str;

    fn accepts(device: &dyn RawDevice) -> bool {
        device.device_type().starts_with(Self::TYPE_PREFIX)
    }

    fn from_device(
        device: Arc<dyn RawDevice>,
        icons: Arc<dyn IconSelector>,
    ) -> Result<Self, ControlPointError>;

    fn handle(&self) -> &DeviceHandle;

    fn udn(&self) -> &str {
        self.handle().udn()
    }
}

/// Shared part of every proxy: the raw device, its cached best icon and its tag.
///
/// The raw device may be referenced by proxies of several control points.
pub struct DeviceHandle {
    device: Arc<dyn RawDevice>,
    icon_selector: Arc<dyn IconSelector>,
    best_icon: OnceLock<IconChoice>,
    tag: RwLock<DeviceTag>,
}

impl DeviceHandle {
    pub fn new(device: Arc<dyn RawDevice>, icon_selector: Arc<dyn IconSelector>) -> Self {
        Self {
            device,
            icon_selector,
            best_icon: OnceLock::new(),
            tag: RwLock::new(DeviceTag::default()),
        }
    }

    pub fn device(&self) -> &Arc<dyn RawDevice> {
        &self.device
    }

    pub fn udn(&self) -> &str {
        self.device.udn()
    }

    pub fn friendly_name(&self) -> &str {
        self.device.friendly_name()
    }

    pub fn device_type(&self) -> &str {
        self.device.device_type()
    }

    pub fn location(&self) -> &str {
        self.device.location()
    }

    /// Meilleure icône, calculée au premier appel puis figée.
    pub fn best_icon(&self) -> &IconChoice {
        self.best_icon
            .get_or_init(|| self.icon_selector.select(self.device.icons()))
    }

    pub fn tag(&self) -> DeviceTag {
        self.tag.read().clone()
    }

    pub fn update_tag<F>(&self, f: F)
    where
        F: FnOnce(&mut DeviceTag),
    {
        f(&mut self.tag.write());
    }

    /// Looks up a service and checks that it exposes every listed action.
    pub fn require_service(
        &self,
        service_id: &str,
        actions: &[&str],
    ) -> Result<Arc<dyn RawService>, ControlPointError> {
        let service = self
            .device
            .service(service_id)
            .ok_or_else(|| ControlPointError::missing_service(self.udn(), service_id))?;
        for action in actions {
            if !service.has_action(action) {
                return Err(ControlPointError::missing_action(service_id, action));
            }
        }
        Ok(service)
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("udn", &self.udn())
            .field("friendly_name", &self.friendly_name())
            .field("device_type", &self.device_type())
            .finish()
    }
}

impl PartialEq for DeviceHandle {
    fn eq(&self, other: &Self) -> bool {
        self.udn() == other.udn()
    }
}

impl Eq for DeviceHandle {}

/// Returns the output argument `name` or a missing-value error.
pub(crate) fn required_value<'a>(
    result: &'a ActionResult,
    name: &str,
) -> Result<&'a str, ControlPointError> {
    result
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ControlPointError::upnp_missing_return_value(name))
}

/// Parses a numeric output argument.
pub(crate) fn required_number<T: std::str::FromStr>(
    result: &ActionResult,
    name: &str,
) -> Result<T, ControlPointError> {
    let raw = required_value(result, name)?;
    raw.trim()
        .parse()
        .map_err(|_| ControlPointError::upnp_bad_return_value(name, raw))
}

pub(crate) fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
