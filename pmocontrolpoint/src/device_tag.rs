/// Valeurs dérivées mises en cache sur un device, à l'usage de l'UI.
///
/// Kept apart from the protocol data of the device; never sent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceTag {
    /// ARGB accent color extracted from the device icon.
    pub accent_color: Option<u32>,
    /// ARGB color readable on top of `accent_color`.
    pub text_color: Option<u32>,
    pub favourite: bool,
    pub hidden: bool,
}
