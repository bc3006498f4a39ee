use std::collections::BTreeMap;

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::trace;

use crate::{ContentObject, DidlError, TagValue};

/// Tag en cours de lecture à l'intérieur d'un objet.
struct OpenTag {
    name: String,
    attributes: BTreeMap<String, String>,
    text: String,
    depth: usize,
}

fn element_attributes(e: &BytesStart<'_>) -> Result<BTreeMap<String, String>, DidlError> {
    let mut attributes = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

fn object_from_element(e: &BytesStart<'_>, is_container: bool) -> Result<ContentObject, DidlError> {
    let mut attributes = element_attributes(e)?;
    let id = attributes.remove("id").unwrap_or_default();
    let parent_id = attributes.remove("parentID").unwrap_or_default();
    let mut object = if is_container {
        ContentObject::new_container(id, parent_id)
    } else {
        ContentObject::new_item(id, parent_id)
    };
    object.attributes = attributes;
    Ok(object)
}

fn object_kind(name: &[u8]) -> Option<bool> {
    match name {
        b"container" => Some(true),
        b"item" => Some(false),
        _ => None,
    }
}

/// Parse un document DIDL-Lite en liste plate d'objets, dans l'ordre du document.
///
/// Elements nested below a tag (for instance inside `<desc>`) contribute their
/// text to that tag. Whitespace around tag values is trimmed.
pub fn parse_didl(xml: &str) -> Result<Vec<ContentObject>, DidlError> {
    let mut reader = Reader::from_str(xml);
    let mut objects = Vec::new();
    let mut current: Option<ContentObject> = None;
    let mut open: Option<OpenTag> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if current.is_none() {
                    if let Some(is_container) = object_kind(e.local_name().as_ref()) {
                        current = Some(object_from_element(&e, is_container)?);
                    }
                } else if open.is_none() {
                    open = Some(OpenTag {
                        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                        attributes: element_attributes(&e)?,
                        text: String::new(),
                        depth,
                    });
                }
            }
            Event::Empty(e) => match current.as_mut() {
                None => {
                    if let Some(is_container) = object_kind(e.local_name().as_ref()) {
                        objects.push(object_from_element(&e, is_container)?);
                    }
                }
                Some(obj) if open.is_none() => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    obj.push_tag(
                        name,
                        TagValue {
                            value: String::new(),
                            attributes: element_attributes(&e)?,
                        },
                    );
                }
                Some(_) => {}
            },
            Event::Text(e) => {
                if let Some(tag) = open.as_mut() {
                    tag.text.push_str(&e.decode().map_err(quick_xml::Error::Encoding)?);
                }
            }
            Event::CData(e) => {
                if let Some(tag) = open.as_mut() {
                    tag.text.push_str(&e.decode().map_err(quick_xml::Error::Encoding)?);
                }
            }
            Event::GeneralRef(e) => {
                if let Some(tag) = open.as_mut() {
                    if let Some(ch) = e.resolve_char_ref()? {
                        tag.text.push(ch);
                    } else {
                        let name = e.decode().map_err(quick_xml::Error::Encoding)?;
                        match resolve_predefined_entity(&name) {
                            Some(resolved) => tag.text.push_str(resolved),
                            None => {
                                trace!(entity = %name, "Unknown entity kept verbatim");
                                tag.text.push('&');
                                tag.text.push_str(&name);
                                tag.text.push(';');
                            }
                        }
                    }
                }
            }
            Event::End(_) => {
                let closing_tag = open.as_ref().is_some_and(|t| t.depth == depth);
                if closing_tag {
                    if let (Some(obj), Some(tag)) = (current.as_mut(), open.take()) {
                        obj.push_tag(
                            tag.name,
                            TagValue {
                                value: tag.text.trim().to_string(),
                                attributes: tag.attributes,
                            },
                        );
                    }
                } else if open.is_none() {
                    if let Some(obj) = current.take() {
                        objects.push(obj);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(tag) = open {
        return Err(DidlError::Truncated(tag.name));
    }
    if let Some(obj) = current {
        let kind = if obj.is_container { "container" } else { "item" };
        return Err(DidlError::Truncated(kind.to_string()));
    }

    Ok(objects)
}
