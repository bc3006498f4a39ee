use pmodidl::DidlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlPointError {
    // Appel d'une opération de cycle de vie avant initialize()
    #[error("{0} called before initialize")]
    NotInitialized(&'static str),
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("{0} is not a container")]
    NotAContainer(String),
    #[error("Browse handle already started")]
    BrowseAlreadyStarted,
    #[error("{0} is not a MediaServer")]
    IsNotAMediaServer(String),
    #[error("{0} is not a MediaRenderer")]
    IsNotAMediaRenderer(String),
    #[error("Device {udn} does not expose service {service}")]
    MissingService { udn: String, service: String },
    #[error("Service {service} does not expose action {action}")]
    MissingAction { service: String, action: String },
    #[error("UpnpError Error: {0}")]
    UpnpError(String),
    #[error("Missing {0} element in SOAP body")]
    UpnpMissingReturnValue(String),
    #[error("Invalid {0} value: {1}")]
    UpnpBadReturnValue(String, String),
    #[error("{0} returned UPnP error {1}: {2} (HTTP status {3})")]
    SoapUpnpParseError(String, u32, String, u32),
    #[error("{0} failed with HTTP status {1} and body: {2}")]
    SoapActionWrongBody(String, u32, String),
    #[error("Soap Error: No envelop for action {0}")]
    SoapNoEnvelop(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("XML error: {0}")]
    Xml(String),
    #[error(transparent)]
    Didl(#[from] DidlError),
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),
    #[error("Error on ControlPoint: {0}")]
    ControlPoint(String),
}

impl ControlPointError {
    pub fn missing_service(udn: &str, service: &str) -> Self {
        ControlPointError::MissingService {
            udn: udn.to_string(),
            service: service.to_string(),
        }
    }

    pub fn missing_action(service: &str, action: &str) -> Self {
        ControlPointError::MissingAction {
            service: service.to_string(),
            action: action.to_string(),
        }
    }

    pub fn upnp_missing_return_value(value: &str) -> Self {
        ControlPointError::UpnpMissingReturnValue(value.to_string())
    }

    pub fn upnp_bad_return_value(name: &str, value: &str) -> Self {
        ControlPointError::UpnpBadReturnValue(name.to_string(), value.to_string())
    }

    pub fn http(err: impl std::fmt::Display) -> Self {
        ControlPointError::Http(err.to_string())
    }

    pub fn xml(err: impl std::fmt::Display) -> Self {
        ControlPointError::Xml(err.to_string())
    }
}

impl From<quick_xml::Error> for ControlPointError {
    fn from(err: quick_xml::Error) -> Self {
        ControlPointError::Xml(err.to_string())
    }
}

impl From<xmltree::ParseError> for ControlPointError {
    fn from(err: xmltree::ParseError) -> Self {
        ControlPointError::Xml(err.to_string())
    }
}

impl From<ureq::Error> for ControlPointError {
    fn from(err: ureq::Error) -> Self {
        ControlPointError::Http(err.to_string())
    }
}

impl From<std::io::Error> for ControlPointError {
    fn from(err: std::io::Error) -> Self {
        ControlPointError::ControlPoint(err.to_string())
    }
}
