//! SOAP action invocation (requête construite avec xmltree, réponse lue par suffixe de nom).

use std::collections::HashMap;

use tracing::{debug, trace};
use ureq::Agent;
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::errors::ControlPointError;
use crate::raw::ActionResult;

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_ENCODING: &str = "http://schemas.xmlsoap.org/soap/encoding/";

pub fn build_soap_request(
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, ControlPointError> {
    let mut request_elem = Element::new(&format!("u:{}", action));
    request_elem
        .attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (name, value) in args {
        let mut child = Element::new(name);
        child.children.push(XMLNode::Text((*value).to_string()));
        request_elem.children.push(XMLNode::Element(child));
    }

    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(request_elem));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), SOAP_ENVELOPE_NS.to_string());
    envelope
        .attributes
        .insert("s:encodingStyle".to_string(), SOAP_ENCODING.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(true)
        .indent_string("  ");
    envelope
        .write_with_config(&mut buf, config)
        .map_err(ControlPointError::xml)?;

    String::from_utf8(buf).map_err(ControlPointError::xml)
}

/// POSTs `action` to `control_url` and returns the output arguments.
pub fn invoke_action(
    agent: &Agent,
    control_url: &str,
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<ActionResult, ControlPointError> {
    let body_xml = build_soap_request(service_type, action, args)?;
    let soap_action_header = format!(r#""{}#{}""#, service_type, action);

    trace!(control_url, action, "SOAP request");
    let mut response = agent
        .post(control_url)
        .header("Content-Type", r#"text/xml; charset="utf-8""#)
        .header("SOAPAction", &soap_action_header)
        .send(body_xml)?;

    let status = response.status().as_u16() as u32;
    let raw_body = response.body_mut().read_to_string()?;
    debug!(control_url, action, status, "SOAP response");

    parse_action_response(action, status, &raw_body)
}

/// Interprets a SOAP response body for `action`.
pub fn parse_action_response(
    action: &str,
    status: u32,
    raw_body: &str,
) -> Result<ActionResult, ControlPointError> {
    let envelope = match Element::parse(raw_body.as_bytes()) {
        Ok(envelope) if envelope.name == "Envelope" => envelope,
        _ if !(200..300).contains(&status) => {
            return Err(ControlPointError::SoapActionWrongBody(
                action.to_string(),
                status,
                raw_body.to_string(),
            ));
        }
        _ => return Err(ControlPointError::SoapNoEnvelop(action.to_string())),
    };

    let body = find_child_with_suffix(&envelope, "Body")
        .ok_or_else(|| ControlPointError::SoapNoEnvelop(action.to_string()))?;

    if let Some((code, description)) = parse_upnp_error(body) {
        return Err(ControlPointError::SoapUpnpParseError(
            action.to_string(),
            code,
            description,
            status,
        ));
    }

    if !(200..300).contains(&status) {
        return Err(ControlPointError::SoapActionWrongBody(
            action.to_string(),
            status,
            raw_body.to_string(),
        ));
    }

    let response_name = format!("{}Response", action);
    let response = find_child_with_suffix(body, &response_name)
        .ok_or_else(|| ControlPointError::upnp_missing_return_value(&response_name))?;

    let mut values = HashMap::new();
    for node in &response.children {
        if let XMLNode::Element(elem) = node {
            let text = elem.get_text().map(|t| t.to_string()).unwrap_or_default();
            values.insert(elem.name.clone(), text);
        }
    }
    Ok(values)
}

fn find_child_with_suffix<'a>(parent: &'a Element, suffix: &str) -> Option<&'a Element> {
    parent.children.iter().find_map(|node| match node {
        XMLNode::Element(elem) if elem.name.ends_with(suffix) => Some(elem),
        _ => None,
    })
}

fn parse_upnp_error(body: &Element) -> Option<(u32, String)> {
    let fault = find_child_with_suffix(body, "Fault")?;
    let detail = find_child_with_suffix(fault, "detail")?;
    let upnp_error = find_child_with_suffix(detail, "UPnPError")?;

    let code = find_child_with_suffix(upnp_error, "errorCode")?
        .get_text()?
        .trim()
        .parse::<u32>()
        .ok()?;
    let description = find_child_with_suffix(upnp_error, "errorDescription")
        .and_then(|e| e.get_text().map(|t| t.trim().to_string()))
        .unwrap_or_default();

    Some((code, description))
}

#[cfg(test)]
mod tests {
    use super::*;

    const AVT: &str = "urn:schemas-upnp-org:service:AVTransport:1";

    #[test]
    fn test_build_request() {
        let xml = build_soap_request(AVT, "Play", &[("InstanceID", "0"), ("Speed", "1")]).unwrap();
        assert!(xml.contains("<u:Play xmlns:u=\"urn:schemas-upnp-org:service:AVTransport:1\">"));
        assert!(xml.contains("<InstanceID>0</InstanceID>"));
        assert!(xml.contains("xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\""));
        assert!(xml.find("InstanceID").unwrap() < xml.find("Speed").unwrap());
    }

    #[test]
    fn test_parse_success() {
        let body = r#"<?xml version="1.0"?>
        <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
          <s:Body>
            <u:GetVolumeResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1">
              <CurrentVolume>42</CurrentVolume>
              <Empty/>
            </u:GetVolumeResponse>
          </s:Body>
        </s:Envelope>"#;
        let values = parse_action_response("GetVolume", 200, body).unwrap();
        assert_eq!(values.get("CurrentVolume").map(String::as_str), Some("42"));
        assert_eq!(values.get("Empty").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_fault() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
          <s:Body>
            <s:Fault>
              <faultcode>s:Client</faultcode>
              <faultstring>UPnPError</faultstring>
              <detail>
                <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                  <errorCode>701</errorCode>
                  <errorDescription>Transition not available</errorDescription>
                </UPnPError>
              </detail>
            </s:Fault>
          </s:Body>
        </s:Envelope>"#;
        match parse_action_response("Pause", 500, body) {
            Err(ControlPointError::SoapUpnpParseError(action, 701, description, 500)) => {
                assert_eq!(action, "Pause");
                assert_eq!(description, "Transition not available");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_parse_non_soap_error() {
        assert!(matches!(
            parse_action_response("Play", 404, "Not Found"),
            Err(ControlPointError::SoapActionWrongBody(_, 404, _))
        ));
        assert!(matches!(
            parse_action_response("Play", 200, "<html/>"),
            Err(ControlPointError::SoapNoEnvelop(_))
        ));
    }
}
