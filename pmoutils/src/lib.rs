/// Utilitaires réseau et système partagés par le control point.
///
/// # Fonctions principales
///
/// - [`guess_local_ip`] : devine l'adresse IP locale utilisée pour les connexions sortantes
/// - [`local_ip_for`] : adresse locale utilisée pour joindre un hôte donné
/// - [`usable_interfaces`] : interfaces IPv4 non-loopback, éventuellement filtrées par nom
/// - [`user_agent`] : chaîne `OS/version UPnP/1.1 PMOBrowse/x.y`
mod ip_utils;

pub use ip_utils::{NetworkInterface, guess_local_ip, local_ip_for, usable_interfaces};

/// Retourne une chaîne décrivant le système d'exploitation et sa version.
///
/// # Format
/// - macOS: "Mac OS/15.1"
/// - Linux: "Linux/6.5.0" ou "Ubuntu/22.04"
/// - Autre: "{OS}/Unknown"
pub fn get_os_string() -> String {
    let info = os_info::get();
    let os_type = format!("{:?}", info.os_type());

    let version = info.version();
    if version != &os_info::Version::Unknown {
        format!("{}/{}", os_type, version)
    } else {
        format!("{}/Unknown", os_type)
    }
}

/// User-Agent advertised in M-SEARCH and SUBSCRIBE requests.
pub fn user_agent() -> String {
    format!(
        "{} UPnP/1.1 PMOBrowse/{}",
        get_os_string().replace(' ', "_"),
        env!("CARGO_PKG_VERSION")
    )
}
