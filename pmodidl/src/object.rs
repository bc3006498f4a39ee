use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::DidlError;

/// One occurrence of a tag inside a DIDL-Lite object: its text and attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl TagValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Typed view over a `<res>` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    pub protocol_info: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl From<&TagValue> for Resource {
    fn from(tag: &TagValue) -> Self {
        Resource {
            uri: tag.value.clone(),
            protocol_info: tag.attribute("protocolInfo").unwrap_or_default().to_string(),
            duration: tag.attribute("duration").map(str::to_string),
            size: tag.attribute("size").and_then(|s| s.trim().parse().ok()),
            resolution: tag.attribute("resolution").map(str::to_string),
        }
    }
}

/// An item or a container of a ContentDirectory listing.
///
/// Tags are stored by qualified name (`dc:title`, `upnp:artist`, `res`...);
/// each name maps to every occurrence in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentObject {
    pub id: String,
    pub parent_id: String,
    pub is_container: bool,
    /// Attributes of the `<item>`/`<container>` element other than `id` and `parentID`.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<TagValue>>,
    #[serde(default)]
    selected_resource: usize,
}

impl ContentObject {
    pub fn new_item(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            is_container: false,
            ..Default::default()
        }
    }

    pub fn new_container(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            is_container: true,
            ..Default::default()
        }
    }

    /// Ajoute une occurrence de `name` en fin de liste.
    pub fn push_tag(&mut self, name: impl Into<String>, value: TagValue) {
        self.tags.entry(name.into()).or_default().push(value);
    }

    /// Builder form of [`push_tag`](Self::push_tag).
    pub fn with_tag(mut self, name: impl Into<String>, value: TagValue) -> Self {
        self.push_tag(name, value);
        self
    }

    pub fn tag(&self, name: &str) -> &[TagValue] {
        self.tags.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Looks up a value by path.
    ///
    /// `"dc:title"` returns the text of the first `dc:title`;
    /// `"res@protocolInfo"` returns the first non-empty `protocolInfo`
    /// attribute across all `res` entries.
    pub fn value(&self, path: &str) -> Option<&str> {
        match path.split_once('@') {
            Some((tag, attr)) => self
                .tag(tag)
                .iter()
                .filter_map(|t| t.attribute(attr))
                .find(|v| !v.is_empty()),
            None => self.tag(path).first().map(|t| t.value.as_str()),
        }
    }

    pub fn title(&self) -> &str {
        self.value("dc:title").unwrap_or_default()
    }

    pub fn class(&self) -> &str {
        self.value("upnp:class").unwrap_or_default()
    }

    pub fn child_count(&self) -> Option<u32> {
        self.attributes
            .get("childCount")
            .and_then(|c| c.trim().parse().ok())
    }

    pub fn resource_count(&self) -> usize {
        self.tag("res").len()
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.tag("res").iter().map(Resource::from).collect()
    }

    /// Selects the resource used for playback.
    pub fn select_resource(&mut self, index: usize) -> Result<(), DidlError> {
        let count = self.resource_count();
        if index >= count {
            return Err(DidlError::ResourceIndexOutOfRange { index, count });
        }
        self.selected_resource = index;
        Ok(())
    }

    pub fn selected_resource_index(&self) -> usize {
        self.selected_resource
    }

    /// Resource currently selected, `None` when the object has no `res`.
    pub fn selected_resource(&self) -> Option<Resource> {
        self.tag("res").get(self.selected_resource).map(Resource::from)
    }
}
