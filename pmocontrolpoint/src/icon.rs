//! Sélection de la meilleure icône d'un device.

use crate::raw::DeviceIcon;

/// Outcome of an icon selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconChoice {
    Selected(DeviceIcon),
    /// The device declares no icon, or none with a usable URL and size.
    NoAcceptableIcon,
}

impl IconChoice {
    pub fn icon(&self) -> Option<&DeviceIcon> {
        match self {
            IconChoice::Selected(icon) => Some(icon),
            IconChoice::NoAcceptableIcon => None,
        }
    }
}

pub trait IconSelector: Send + Sync {
    fn select(&self, icons: &[DeviceIcon]) -> IconChoice;
}

/// Picks the icon with the largest `width * height * depth`.
///
/// Equal scores are broken toward the preferred MIME type (PNG by default),
/// otherwise the first declared icon wins.
#[derive(Debug, Clone)]
pub struct ScoredIconSelector {
    preferred_mime: String,
}

impl Default for ScoredIconSelector {
    fn default() -> Self {
        Self {
            preferred_mime: "image/png".to_string(),
        }
    }
}

impl ScoredIconSelector {
    pub fn new(preferred_mime: impl Into<String>) -> Self {
        Self {
            preferred_mime: preferred_mime.into(),
        }
    }

    pub fn score(icon: &DeviceIcon) -> u64 {
        icon.width as u64 * icon.height as u64 * icon.depth as u64
    }

    fn is_preferred(&self, icon: &DeviceIcon) -> bool {
        icon.mime_type.eq_ignore_ascii_case(&self.preferred_mime)
    }
}

impl IconSelector for ScoredIconSelector {
    fn select(&self, icons: &[DeviceIcon]) -> IconChoice {
        let mut best: Option<(&DeviceIcon, u64)> = None;

        for icon in icons {
            let score = Self::score(icon);
            if score == 0 || icon.url.trim().is_empty() {
                continue;
            }
            best = match best {
                None => Some((icon, score)),
                Some((current, best_score)) => {
                    if score > best_score
                        || (score == best_score && self.is_preferred(icon) && !self.is_preferred(current))
                    {
                        Some((icon, score))
                    } else {
                        Some((current, best_score))
                    }
                }
            };
        }

        match best {
            Some((icon, _)) => IconChoice::Selected(icon.clone()),
            None => IconChoice::NoAcceptableIcon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn icon(mime: &str, w: u32, h: u32, depth: u32, url: &str) -> DeviceIcon {
        DeviceIcon {
            mime_type: mime.to_string(),
            width: w,
            height: h,
            depth,
            url: url.to_string(),
        }
    }

    #[test]
    fn test_largest_score_wins() {
        let icons = vec![
            icon("image/png", 48, 48, 24, "/small.png"),
            icon("image/jpeg", 120, 120, 24, "/large.jpg"),
            icon("image/png", 120, 120, 8, "/large8.png"),
        ];
        let choice = ScoredIconSelector::default().select(&icons);
        assert_eq!(choice.icon().unwrap().url, "/large.jpg");
    }

    #[test]
    fn test_tie_prefers_png() {
        let icons = vec![
            icon("image/jpeg", 120, 120, 24, "/a.jpg"),
            icon("image/png", 120, 120, 24, "/a.png"),
            icon("image/bmp", 120, 120, 24, "/a.bmp"),
        ];
        let choice = ScoredIconSelector::default().select(&icons);
        assert_eq!(choice.icon().unwrap().url, "/a.png");
    }

    #[test]
    fn test_no_acceptable_icon() {
        assert_eq!(ScoredIconSelector::default().select(&[]), IconChoice::NoAcceptableIcon);

        let icons = vec![
            icon("image/png", 0, 0, 24, "/empty.png"),
            icon("image/png", 48, 48, 24, "  "),
        ];
        assert_eq!(
            ScoredIconSelector::default().select(&icons),
            IconChoice::NoAcceptableIcon
        );
    }
}
