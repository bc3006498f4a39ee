use std::collections::BTreeSet;
use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::{ContentObject, DidlError, DIDL_NAMESPACE, KNOWN_NAMESPACES};

fn write_err(e: impl std::fmt::Display) -> DidlError {
    DidlError::Write(e.to_string())
}

/// Préfixes utilisés par les tags et attributs des objets.
fn used_prefixes(objects: &[ContentObject]) -> BTreeSet<&str> {
    let mut prefixes = BTreeSet::new();
    for obj in objects {
        for (name, values) in &obj.tags {
            if let Some((prefix, _)) = name.split_once(':') {
                prefixes.insert(prefix);
            }
            for value in values {
                for attr in value.attributes.keys() {
                    if let Some((prefix, _)) = attr.split_once(':') {
                        prefixes.insert(prefix);
                    }
                }
            }
        }
    }
    prefixes
}

/// Serializes objects into a DIDL-Lite document.
///
/// Only the namespaces listed in [`KNOWN_NAMESPACES`] that are actually used
/// are declared on the root element.
pub fn to_didl(objects: &[ContentObject]) -> Result<String, DidlError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut root = BytesStart::new("DIDL-Lite");
    root.push_attribute(("xmlns", DIDL_NAMESPACE));
    let prefixes = used_prefixes(objects);
    for (prefix, uri) in KNOWN_NAMESPACES {
        if prefixes.contains(prefix) {
            root.push_attribute((format!("xmlns:{prefix}").as_str(), *uri));
        }
    }
    writer.write_event(Event::Start(root)).map_err(write_err)?;

    for obj in objects {
        let element = if obj.is_container { "container" } else { "item" };
        let mut start = BytesStart::new(element);
        start.push_attribute(("id", obj.id.as_str()));
        start.push_attribute(("parentID", obj.parent_id.as_str()));
        for (key, value) in &obj.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        writer.write_event(Event::Start(start)).map_err(write_err)?;

        for (name, values) in &obj.tags {
            for value in values {
                let mut tag = BytesStart::new(name.as_str());
                for (key, attr) in &value.attributes {
                    tag.push_attribute((key.as_str(), attr.as_str()));
                }
                if value.value.is_empty() {
                    writer.write_event(Event::Empty(tag)).map_err(write_err)?;
                } else {
                    writer.write_event(Event::Start(tag)).map_err(write_err)?;
                    writer
                        .write_event(Event::Text(BytesText::new(&value.value)))
                        .map_err(write_err)?;
                    writer
                        .write_event(Event::End(BytesEnd::new(name.as_str())))
                        .map_err(write_err)?;
                }
            }
        }

        writer
            .write_event(Event::End(BytesEnd::new(element)))
            .map_err(write_err)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("DIDL-Lite")))
        .map_err(write_err)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(write_err)
}

impl ContentObject {
    /// DIDL-Lite document holding only this object.
    pub fn to_didl(&self) -> Result<String, DidlError> {
        to_didl(std::slice::from_ref(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse_didl, TagValue};

    #[test]
    fn test_declares_used_namespaces_only() {
        let obj = ContentObject::new_item("1", "0")
            .with_tag("dc:title", TagValue::new("Night & Day"))
            .with_tag(
                "res",
                TagValue::new("http://srv/1.flac").with_attribute("protocolInfo", "http-get:*:audio/flac:*"),
            );
        let xml = obj.to_didl().unwrap();

        assert!(xml.starts_with("<DIDL-Lite xmlns=\"urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/\""));
        assert!(xml.contains("xmlns:dc=\"http://purl.org/dc/elements/1.1/\""));
        assert!(!xml.contains("xmlns:upnp"));
        assert!(xml.contains("Night &amp; Day"));
    }

    #[test]
    fn test_written_document_parses_back() {
        let obj = ContentObject::new_container("c", "0")
            .with_tag("dc:title", TagValue::new("Jazz"))
            .with_tag("upnp:albumArtURI", TagValue::new(""));
        let objects = parse_didl(&obj.to_didl().unwrap()).unwrap();

        assert_eq!(objects.len(), 1);
        assert!(objects[0].is_container);
        assert_eq!(objects[0].title(), "Jazz");
        assert_eq!(objects[0].tag("upnp:albumArtURI").len(), 1);
    }
}
