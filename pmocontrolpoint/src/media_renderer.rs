use std::sync::Arc;

use pmodidl::ContentObject;
use tracing::debug;

use crate::errors::ControlPointError;
use crate::icon::IconSelector;
use crate::proxy::{DeviceHandle, DeviceProxy, required_number, required_value};
use crate::raw::{RawDevice, RawService};
use crate::time_utils::{format_ms_as_hms, parse_optional_hms};

pub const MEDIA_RENDERER_TYPE_PREFIX: &str = "urn:schemas-upnp-org:device:MediaRenderer:";
pub const AV_TRANSPORT_SERVICE_ID: &str = "urn:upnp-org:serviceId:AVTransport";
pub const RENDERING_CONTROL_SERVICE_ID: &str = "urn:upnp-org:serviceId:RenderingControl";

const INSTANCE_ID: &str = "0";
const MASTER_CHANNEL: &str = "Master";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInfo {
    pub current_transport_state: String,
    pub current_transport_status: String,
    pub current_speed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionInfo {
    pub track: u32,
    pub track_duration_ms: Option<u64>,
    pub rel_time_ms: Option<u64>,
    pub track_uri: String,
    pub track_metadata: String,
}

/// Proxy typé vers un MediaRenderer UPnP.
///
/// AVTransport is required; RenderingControl is optional and volume/mute
/// calls fail with [`ControlPointError::MissingService`] without it.
#[derive(Debug)]
pub struct MediaRendererProxy {
    handle: DeviceHandle,
    av_transport: Arc<dyn RawService>,
    rendering_control: Option<Arc<dyn RawService>>,
}

impl DeviceProxy for MediaRendererProxy {
    const KIND: &'static str = "MediaRenderer";
    const TYPE_PREFIX: &'static str = MEDIA_RENDERER_TYPE_PREFIX;

    fn accepts(device: &dyn RawDevice) -> bool {
        device.device_type().starts_with(Self::TYPE_PREFIX)
            && device.service(AV_TRANSPORT_SERVICE_ID).is_some()
    }

    fn from_device(
        device: Arc<dyn RawDevice>,
        icons: Arc<dyn IconSelector>,
    ) -> Result<Self, ControlPointError> {
        if !device.device_type().starts_with(Self::TYPE_PREFIX) {
            return Err(ControlPointError::IsNotAMediaRenderer(device.udn().to_string()));
        }
        let handle = DeviceHandle::new(device, icons);
        let av_transport = handle.require_service(
            AV_TRANSPORT_SERVICE_ID,
            &["SetAVTransportURI", "Play", "Stop"],
        )?;
        let rendering_control = handle.device().service(RENDERING_CONTROL_SERVICE_ID);
        Ok(Self {
            handle,
            av_transport,
            rendering_control,
        })
    }

    fn handle(&self) -> &DeviceHandle {
        &self.handle
    }
}

impl PartialEq for MediaRendererProxy {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl MediaRendererProxy {
    pub fn friendly_name(&self) -> &str {
        self.handle.friendly_name()
    }

    fn rendering_control(&self) -> Result<&Arc<dyn RawService>, ControlPointError> {
        self.rendering_control.as_ref().ok_or_else(|| {
            ControlPointError::missing_service(self.handle.udn(), RENDERING_CONTROL_SERVICE_ID)
        })
    }

    fn transport_call(&self, action: &str, extra: &[(&str, &str)]) -> Result<(), ControlPointError> {
        let mut args = vec![("InstanceID", INSTANCE_ID)];
        args.extend_from_slice(extra);
        self.av_transport.invoke(action, &args)?;
        debug!(renderer = self.friendly_name(), action, "AVTransport action done");
        Ok(())
    }

    pub fn set_av_transport_uri(&self, uri: &str, metadata: &str) -> Result<(), ControlPointError> {
        self.transport_call(
            "SetAVTransportURI",
            &[("CurrentURI", uri), ("CurrentURIMetaData", metadata)],
        )
    }

    /// Charge la ressource sélectionnée d'un objet, avec ses métadonnées DIDL.
    pub fn load_object(&self, object: &ContentObject) -> Result<(), ControlPointError> {
        let resource = object.selected_resource().ok_or_else(|| {
            ControlPointError::IndexOutOfRange {
                index: object.selected_resource_index(),
                len: object.resource_count(),
            }
        })?;
        let metadata = object.to_didl()?;
        self.set_av_transport_uri(&resource.uri, &metadata)
    }

    pub fn play(&self) -> Result<(), ControlPointError> {
        self.transport_call("Play", &[("Speed", "1")])
    }

    pub fn pause(&self) -> Result<(), ControlPointError> {
        self.transport_call("Pause", &[])
    }

    pub fn stop(&self) -> Result<(), ControlPointError> {
        self.transport_call("Stop", &[])
    }

    pub fn next(&self) -> Result<(), ControlPointError> {
        self.transport_call("Next", &[])
    }

    pub fn previous(&self) -> Result<(), ControlPointError> {
        self.transport_call("Previous", &[])
    }

    /// Seeks to an absolute position within the current track.
    pub fn seek(&self, position_ms: u64) -> Result<(), ControlPointError> {
        let target = format_ms_as_hms(position_ms);
        self.transport_call("Seek", &[("Unit", "REL_TIME"), ("Target", target.as_str())])
    }

    pub fn transport_info(&self) -> Result<TransportInfo, ControlPointError> {
        let result = self
            .av_transport
            .invoke("GetTransportInfo", &[("InstanceID", INSTANCE_ID)])?;
        Ok(TransportInfo {
            current_transport_state: required_value(&result, "CurrentTransportState")?.to_string(),
            current_transport_status: required_value(&result, "CurrentTransportStatus")?
                .to_string(),
            current_speed: result
                .get("CurrentSpeed")
                .cloned()
                .unwrap_or_else(|| "1".to_string()),
        })
    }

    pub fn position_info(&self) -> Result<PositionInfo, ControlPointError> {
        let result = self
            .av_transport
            .invoke("GetPositionInfo", &[("InstanceID", INSTANCE_ID)])?;
        let text = |name: &str| result.get(name).cloned().unwrap_or_default();
        Ok(PositionInfo {
            track: result
                .get("Track")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            track_duration_ms: parse_optional_hms(&text("TrackDuration")),
            rel_time_ms: parse_optional_hms(&text("RelTime")),
            track_uri: text("TrackURI"),
            track_metadata: text("TrackMetaData"),
        })
    }

    /// Play modes advertised by the `CurrentPlayMode` state variable.
    pub fn allowed_play_modes(&self) -> Vec<String> {
        self.av_transport.allowed_values("CurrentPlayMode")
    }

    pub fn volume(&self) -> Result<u16, ControlPointError> {
        let result = self.rendering_control()?.invoke(
            "GetVolume",
            &[("InstanceID", INSTANCE_ID), ("Channel", MASTER_CHANNEL)],
        )?;
        required_number(&result, "CurrentVolume")
    }

    pub fn set_volume(&self, volume: u16) -> Result<(), ControlPointError> {
        let volume = volume.to_string();
        self.rendering_control()?.invoke(
            "SetVolume",
            &[
                ("InstanceID", INSTANCE_ID),
                ("Channel", MASTER_CHANNEL),
                ("DesiredVolume", volume.as_str()),
            ],
        )?;
        Ok(())
    }

    pub fn mute(&self) -> Result<bool, ControlPointError> {
        let result = self.rendering_control()?.invoke(
            "GetMute",
            &[("InstanceID", INSTANCE_ID), ("Channel", MASTER_CHANNEL)],
        )?;
        let raw = required_value(&result, "CurrentMute")?;
        match raw.trim() {
            "1" | "true" | "True" => Ok(true),
            "0" | "false" | "False" => Ok(false),
            _ => Err(ControlPointError::upnp_bad_return_value("CurrentMute", raw)),
        }
    }

    pub fn set_mute(&self, mute: bool) -> Result<(), ControlPointError> {
        self.rendering_control()?.invoke(
            "SetMute",
            &[
                ("InstanceID", INSTANCE_ID),
                ("Channel", MASTER_CHANNEL),
                ("DesiredMute", if mute { "1" } else { "0" }),
            ],
        )?;
        Ok(())
    }
}
