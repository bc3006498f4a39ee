//! Device description and SCPD documents.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};
use ureq::Agent;
use xmltree::{Element, XMLNode};

use crate::errors::ControlPointError;
use crate::raw::DeviceIcon;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    pub service_type: String,
    pub service_id: String,
    pub control_url: String,
    pub event_sub_url: String,
    pub scpd_url: String,
}

/// One `<device>` element, root or embedded. URLs are absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescription {
    pub udn: String,
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub icons: Vec<DeviceIcon>,
    pub services: Vec<ServiceDescription>,
}

/// Actions and allowed values declared by a service's SCPD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scpd {
    pub actions: HashSet<String>,
    pub allowed_values: HashMap<String, Vec<String>>,
}

pub fn fetch_text(agent: &Agent, url: &str) -> Result<String, ControlPointError> {
    let mut response = agent.get(url).call()?;
    let status = response.status();
    if !status.is_success() {
        return Err(ControlPointError::Http(format!("GET {} returned {}", url, status)));
    }
    Ok(response.body_mut().read_to_string()?)
}

/// Résout une URL éventuellement relative par rapport à `base`.
///
/// A leading `/` is resolved against the authority of `base`; any other
/// relative path against the directory of `base`.
pub fn resolve_url(base: &str, url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }

    let Some((scheme, rest)) = base.split_once("://") else {
        return url.to_string();
    };
    let (authority, path) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, "/"),
    };

    if url.starts_with('/') {
        format!("{}://{}{}", scheme, authority, url)
    } else {
        let dir = match path.rfind('/') {
            Some(pos) => &path[..=pos],
            None => "/",
        };
        format!("{}://{}{}{}", scheme, authority, dir, url)
    }
}

fn child_text(elem: &Element, name: &str) -> Option<String> {
    elem.get_child(name)
        .and_then(|child| child.get_text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn xml_children<'a>(elem: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
    elem.children.iter().filter_map(move |node| match node {
        XMLNode::Element(child) if child.name == name => Some(child),
        _ => None,
    })
}

/// Parses a description document fetched from `location`.
///
/// The root device comes first, followed by its embedded devices in
/// document order.
pub fn parse_description(xml: &str, location: &str) -> Result<Vec<DeviceDescription>, ControlPointError> {
    let root = Element::parse(xml.as_bytes())?;
    let base = child_text(&root, "URLBase").unwrap_or_else(|| location.to_string());
    let device = root
        .get_child("device")
        .ok_or_else(|| ControlPointError::xml("description has no <device> element"))?;

    let mut devices = Vec::new();
    collect_devices(device, &base, &mut devices)?;
    Ok(devices)
}

fn collect_devices(
    device: &Element,
    base: &str,
    out: &mut Vec<DeviceDescription>,
) -> Result<(), ControlPointError> {
    let udn = child_text(device, "UDN").ok_or_else(|| ControlPointError::xml("device without UDN"))?;
    let device_type = child_text(device, "deviceType")
        .ok_or_else(|| ControlPointError::xml(format!("device {} without deviceType", udn)))?;
    let friendly_name = child_text(device, "friendlyName").unwrap_or_else(|| udn.clone());

    let icons = device
        .get_child("iconList")
        .map(|list| xml_children(list, "icon").filter_map(|icon| parse_icon(icon, base)).collect())
        .unwrap_or_default();

    let services = device
        .get_child("serviceList")
        .map(|list| {
            xml_children(list, "service")
                .filter_map(|service| parse_service(service, base))
                .collect()
        })
        .unwrap_or_default();

    trace!(udn = udn.as_str(), device_type = device_type.as_str(), "Parsed device description");
    out.push(DeviceDescription {
        udn,
        device_type,
        friendly_name,
        manufacturer: child_text(device, "manufacturer").unwrap_or_default(),
        model_name: child_text(device, "modelName").unwrap_or_default(),
        icons,
        services,
    });

    if let Some(list) = device.get_child("deviceList") {
        for embedded in xml_children(list, "device") {
            collect_devices(embedded, base, out)?;
        }
    }
    Ok(())
}

fn parse_icon(icon: &Element, base: &str) -> Option<DeviceIcon> {
    let number = |name: &str| {
        child_text(icon, name)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0)
    };
    let url = child_text(icon, "url")?;
    Some(DeviceIcon {
        mime_type: child_text(icon, "mimetype").unwrap_or_default(),
        width: number("width"),
        height: number("height"),
        depth: number("depth"),
        url: resolve_url(base, &url),
    })
}

fn parse_service(service: &Element, base: &str) -> Option<ServiceDescription> {
    let service_type = child_text(service, "serviceType")?;
    let service_id = child_text(service, "serviceId")?;
    let url = |name: &str| {
        child_text(service, name)
            .map(|u| resolve_url(base, &u))
            .unwrap_or_default()
    };
    Some(ServiceDescription {
        control_url: url("controlURL"),
        event_sub_url: url("eventSubURL"),
        scpd_url: url("SCPDURL"),
        service_type,
        service_id,
    })
}

pub fn parse_scpd(xml: &str) -> Result<Scpd, ControlPointError> {
    let root = Element::parse(xml.as_bytes())?;
    let mut scpd = Scpd::default();

    if let Some(list) = root.get_child("actionList") {
        for action in xml_children(list, "action") {
            if let Some(name) = child_text(action, "name") {
                scpd.actions.insert(name);
            }
        }
    }

    if let Some(table) = root.get_child("serviceStateTable") {
        for variable in xml_children(table, "stateVariable") {
            let Some(name) = child_text(variable, "name") else {
                continue;
            };
            let Some(list) = variable.get_child("allowedValueList") else {
                continue;
            };
            let values = xml_children(list, "allowedValue")
                .filter_map(|v| v.get_text().map(|t| t.trim().to_string()))
                .collect();
            scpd.allowed_values.insert(name, values);
        }
    }

    debug!(actions = scpd.actions.len(), "Parsed SCPD");
    Ok(scpd)
}
