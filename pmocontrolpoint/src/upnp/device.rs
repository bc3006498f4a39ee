use std::sync::Arc;

use tracing::debug;
use ureq::Agent;

use super::description::{DeviceDescription, Scpd, ServiceDescription};
use super::soap;
use crate::errors::ControlPointError;
use crate::raw::{ActionResult, DeviceIcon, RawDevice, RawService};

pub struct UpnpService {
    agent: Agent,
    description: ServiceDescription,
    // None quand le SCPD n'a pas pu être lu
    scpd: Option<Scpd>,
}

impl UpnpService {
    pub fn new(agent: Agent, description: ServiceDescription, scpd: Option<Scpd>) -> Self {
        Self {
            agent,
            description,
            scpd,
        }
    }

    pub fn description(&self) -> &ServiceDescription {
        &self.description
    }
}

impl RawService for UpnpService {
    fn service_id(&self) -> &str {
        &self.description.service_id
    }

    fn service_type(&self) -> &str {
        &self.description.service_type
    }

    /// Without an SCPD every action is assumed present; the device answers
    /// with a fault if it is not.
    fn has_action(&self, action: &str) -> bool {
        match &self.scpd {
            Some(scpd) => scpd.actions.contains(action),
            None => true,
        }
    }

    fn invoke(&self, action: &str, args: &[(&str, &str)]) -> Result<ActionResult, ControlPointError> {
        if self.description.control_url.is_empty() {
            return Err(ControlPointError::UpnpError(format!(
                "{} has no control URL",
                self.description.service_id
            )));
        }
        debug!(
            service = self.description.service_id.as_str(),
            action, "Invoking action"
        );
        soap::invoke_action(
            &self.agent,
            &self.description.control_url,
            &self.description.service_type,
            action,
            args,
        )
    }

    fn allowed_values(&self, variable: &str) -> Vec<String> {
        self.scpd
            .as_ref()
            .and_then(|scpd| scpd.allowed_values.get(variable).cloned())
            .unwrap_or_default()
    }
}

pub struct UpnpDevice {
    description: DeviceDescription,
    location: String,
    services: Vec<Arc<UpnpService>>,
}

impl UpnpDevice {
    pub fn new(description: DeviceDescription, location: String, services: Vec<Arc<UpnpService>>) -> Self {
        Self {
            description,
            location,
            services,
        }
    }

    pub fn services(&self) -> &[Arc<UpnpService>] {
        &self.services
    }
}

impl RawDevice for UpnpDevice {
    fn udn(&self) -> &str {
        &self.description.udn
    }

    fn device_type(&self) -> &str {
        &self.description.device_type
    }

    fn friendly_name(&self) -> &str {
        &self.description.friendly_name
    }

    fn manufacturer(&self) -> &str {
        &self.description.manufacturer
    }

    fn model_name(&self) -> &str {
        &self.description.model_name
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn icons(&self) -> &[DeviceIcon] {
        &self.description.icons
    }

    fn service(&self, service_id: &str) -> Option<Arc<dyn RawService>> {
        self.services
            .iter()
            .find(|s| s.description.service_id == service_id)
            .map(|s| Arc::clone(s) as Arc<dyn RawService>)
    }
}
