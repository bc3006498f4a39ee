use std::sync::Arc;

use pmodidl::{ContentObject, parse_didl};
use tracing::debug;

use crate::errors::ControlPointError;
use crate::icon::IconSelector;
use crate::proxy::{DeviceHandle, DeviceProxy, required_number, required_value, split_csv};
use crate::raw::{RawDevice, RawService};

pub const MEDIA_SERVER_TYPE_PREFIX: &str = "urn:schemas-upnp-org:device:MediaServer:";
pub const CONTENT_DIRECTORY_SERVICE_ID: &str = "urn:upnp-org:serviceId:ContentDirectory";

/// Reserved object id of the ContentDirectory root.
pub const ROOT_OBJECT_ID: &str = "0";

/// One page of a `Browse` call.
#[derive(Debug, Clone, Default)]
pub struct BrowsePage {
    pub objects: Vec<ContentObject>,
    pub number_returned: u32,
    /// 0 when the server does not know the total.
    pub total_matches: u32,
    pub update_id: u32,
}

/// Anything that can list the children of a container, page by page.
///
/// Implemented by [`MediaServerProxy`]; the browser only depends on this.
pub trait ContentSource: Send + Sync {
    fn browse_children(
        &self,
        container_id: &str,
        starting_index: u32,
        requested_count: u32,
    ) -> Result<BrowsePage, ControlPointError>;
}

/// Proxy typé vers un MediaServer UPnP (ContentDirectory).
#[derive(Debug)]
pub struct MediaServerProxy {
    handle: DeviceHandle,
    content_directory: Arc<dyn RawService>,
}

impl DeviceProxy for MediaServerProxy {
    const KIND: &'static str = "MediaServer";
    const TYPE_PREFIX: &'static str = MEDIA_SERVER_TYPE_PREFIX;

    fn from_device(
        device: Arc<dyn RawDevice>,
        icons: Arc<dyn IconSelector>,
    ) -> Result<Self, ControlPointError> {
        if !Self::accepts(device.as_ref()) {
            return Err(ControlPointError::IsNotAMediaServer(device.udn().to_string()));
        }
        let handle = DeviceHandle::new(device, icons);
        let content_directory = handle.require_service(CONTENT_DIRECTORY_SERVICE_ID, &["Browse"])?;
        Ok(Self {
            handle,
            content_directory,
        })
    }

    fn handle(&self) -> &DeviceHandle {
        &self.handle
    }
}

impl PartialEq for MediaServerProxy {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl MediaServerProxy {
    pub fn friendly_name(&self) -> &str {
        self.handle.friendly_name()
    }

    fn browse(
        &self,
        object_id: &str,
        flag: &str,
        starting_index: u32,
        requested_count: u32,
        sort_criteria: &str,
    ) -> Result<BrowsePage, ControlPointError> {
        let start = starting_index.to_string();
        let count = requested_count.to_string();
        let result = self.content_directory.invoke(
            "Browse",
            &[
                ("ObjectID", object_id),
                ("BrowseFlag", flag),
                ("Filter", "*"),
                ("StartingIndex", start.as_str()),
                ("RequestedCount", count.as_str()),
                ("SortCriteria", sort_criteria),
            ],
        )?;

        let didl = required_value(&result, "Result")?;
        let objects = parse_didl(didl)?;
        let number_returned = result
            .get("NumberReturned")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(objects.len() as u32);
        let total_matches = result
            .get("TotalMatches")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        let update_id = result
            .get("UpdateID")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);

        debug!(
            server = self.friendly_name(),
            object_id,
            flag,
            returned = number_returned,
            total = total_matches,
            "Browse page received"
        );

        Ok(BrowsePage {
            objects,
            number_returned,
            total_matches,
            update_id,
        })
    }

    /// `BrowseDirectChildren` avec critère de tri explicite.
    pub fn browse_sorted(
        &self,
        container_id: &str,
        starting_index: u32,
        requested_count: u32,
        sort_criteria: &str,
    ) -> Result<BrowsePage, ControlPointError> {
        self.browse(
            container_id,
            "BrowseDirectChildren",
            starting_index,
            requested_count,
            sort_criteria,
        )
    }

    /// `BrowseMetadata` of a single object.
    pub fn browse_metadata(&self, object_id: &str) -> Result<Option<ContentObject>, ControlPointError> {
        let page = self.browse(object_id, "BrowseMetadata", 0, 0, "")?;
        Ok(page.objects.into_iter().next())
    }

    pub fn search_capabilities(&self) -> Result<Vec<String>, ControlPointError> {
        let result = self.content_directory.invoke("GetSearchCapabilities", &[])?;
        Ok(split_csv(required_value(&result, "SearchCaps")?))
    }

    pub fn sort_capabilities(&self) -> Result<Vec<String>, ControlPointError> {
        let result = self.content_directory.invoke("GetSortCapabilities", &[])?;
        Ok(split_csv(required_value(&result, "SortCaps")?))
    }

    pub fn system_update_id(&self) -> Result<u32, ControlPointError> {
        let result = self.content_directory.invoke("GetSystemUpdateID", &[])?;
        required_number(&result, "Id")
    }
}

impl ContentSource for MediaServerProxy {
    fn browse_children(
        &self,
        container_id: &str,
        starting_index: u32,
        requested_count: u32,
    ) -> Result<BrowsePage, ControlPointError> {
        self.browse_sorted(container_id, starting_index, requested_count, "")
    }
}
