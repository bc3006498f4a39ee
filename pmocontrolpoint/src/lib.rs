mod listeners;

pub mod browser;
pub mod chapters;
pub mod device_tag;
pub mod errors;
pub mod icon;
pub mod manager;
pub mod media_renderer;
pub mod media_renderer_control_point;
pub mod media_server;
pub mod media_server_control_point;
pub mod navigator;
pub mod proxy;
pub mod raw;
pub mod time_utils;
pub mod typed_control_point;
pub mod update_ids;
pub mod upnp;

pub use browser::{BrowseHandle, BrowseListener, BrowseOptions, BrowseState, ContentDirectoryBrowser};
pub use chapters::{
    ChapterFetchChain, ChapterFetcher, ChapterList, ChapterListFetcher, ChapterOptions,
    ContentInfoFetcher, HttpFetcher, UreqFetcher,
};
pub use device_tag::DeviceTag;
pub use errors::ControlPointError;
pub use icon::{IconChoice, IconSelector, ScoredIconSelector};
pub use listeners::ListenerList;
pub use manager::ControlPointManager;
pub use media_renderer::{MediaRendererProxy, PositionInfo, TransportInfo};
pub use media_renderer_control_point::MediaRendererControlPoint;
pub use media_server::{BrowsePage, ContentSource, MediaServerProxy, ROOT_OBJECT_ID};
pub use media_server_control_point::{ContentUpdateListener, MediaServerControlPoint};
pub use navigator::{DirectoryTreeNavigator, EntryListener, NavigatorStack};
pub use proxy::{DeviceHandle, DeviceProxy};
pub use raw::{
    ActionResult, DeviceIcon, DiscoveryListener, NotifyListener, RawControlPoint,
    RawControlPointFactory, RawDevice, RawNotification, RawService,
};
pub use typed_control_point::{DeviceListener, TypedControlPoint};
pub use update_ids::UpdateNotification;
pub use upnp::{UpnpControlPoint, UpnpControlPointFactory, UpnpOptions};

pub use pmodidl::{ContentObject, Resource, TagValue};
