//! # pmodidl - DIDL-Lite records
//!
//! Modèle et parser pour le format DIDL-Lite utilisé dans UPnP/DLNA.
//!
//! A DIDL-Lite document is read into a flat list of [`ContentObject`]s. Each
//! object keeps every child element as an ordered multimap of tag name to
//! [`TagValue`] (value + attributes), so repeated tags such as several
//! `upnp:artist` or several `res` entries are preserved in document order.

mod object;
mod parser;
mod writer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use object::{ContentObject, Resource, TagValue};
pub use parser::parse_didl;
pub use writer::to_didl;

/// Namespace URI of the DIDL-Lite root element.
pub const DIDL_NAMESPACE: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";

/// Well-known prefixes declared when serializing a record.
pub const KNOWN_NAMESPACES: &[(&str, &str)] = &[
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("upnp", "urn:schemas-upnp-org:metadata-1-0/upnp/"),
    ("dlna", "urn:schemas-dlna-org:metadata-1-0/"),
    ("sec", "http://www.sec.co.kr/"),
    ("pv", "http://www.pv.com/pvns/"),
    ("av", "urn:schemas-sony-com:av"),
];

#[derive(Debug, Error)]
pub enum DidlError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("DIDL-Lite document ended inside <{0}>")]
    Truncated(String),

    #[error("Resource index {index} out of range (object has {count} resources)")]
    ResourceIndexOutOfRange { index: usize, count: usize },

    #[error("Failed to write DIDL-Lite: {0}")]
    Write(String),
}

// ============= Couche d'abstraction générique =============

/// Trait pour tout parser de métadonnées média
pub trait MediaMetadataParser: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse une chaîne de métadonnées
    fn parse(input: &str) -> Result<Self, Self::Error>;

    /// Retourne le format du parser
    fn format_name() -> &'static str;
}

/// Enveloppe générique pour tout type de métadonnées parsées
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMetadata<T> {
    /// Format du document (ex: "DIDL-Lite")
    pub format: String,

    /// Données parsées
    pub data: T,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_at: Option<std::time::SystemTime>,
}

impl<T> ParsedMetadata<T> {
    pub fn new(format: impl Into<String>, data: T) -> Self {
        Self {
            format: format.into(),
            data,
            parsed_at: Some(std::time::SystemTime::now()),
        }
    }

    /// Transforme les données avec une fonction
    pub fn map<U, F>(self, f: F) -> ParsedMetadata<U>
    where
        F: FnOnce(T) -> U,
    {
        ParsedMetadata {
            format: self.format,
            data: f(self.data),
            parsed_at: self.parsed_at,
        }
    }
}

/// Fonction helper pour parser et envelopper automatiquement
pub fn parse_metadata<P: MediaMetadataParser>(input: &str) -> Result<ParsedMetadata<P>, P::Error> {
    let data = P::parse(input)?;
    Ok(ParsedMetadata::new(P::format_name(), data))
}

/// Ordered list of objects of one DIDL-Lite document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DidlDocument {
    pub objects: Vec<ContentObject>,
}

impl MediaMetadataParser for DidlDocument {
    type Error = DidlError;

    fn parse(input: &str) -> Result<Self, Self::Error> {
        Ok(DidlDocument {
            objects: parse_didl(input)?,
        })
    }

    fn format_name() -> &'static str {
        "DIDL-Lite"
    }
}

/// Type alias pour faciliter l'utilisation
pub type DidlMetadata = ParsedMetadata<DidlDocument>;
