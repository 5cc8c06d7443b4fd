use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Grouping used by the catalog and the CLI listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PresetCategory {
    Social,
    Highres,
    Mobile,
}

impl PresetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetCategory::Social => "social",
            PresetCategory::Highres => "highres",
            PresetCategory::Mobile => "mobile",
        }
    }
}

impl std::fmt::Display for PresetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long to let a page load before the readiness stages take over.
///
/// The variant docs double as CLI help text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WaitStrategy {
    /// Wait until no network requests for 500ms (best for JS-heavy sites)
    #[default]
    NetworkIdle,
    /// Wait for the load event to fire
    Load,
    /// Wait for the DOMContentLoaded event
    DomReady,
    /// Wait for the first server response (fastest)
    FirstResponse,
}

impl WaitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitStrategy::NetworkIdle => "network-idle",
            WaitStrategy::Load => "load",
            WaitStrategy::DomReady => "dom-ready",
            WaitStrategy::FirstResponse => "first-response",
        }
    }
}

impl std::fmt::Display for WaitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named viewport configuration.
///
/// `pixel_width` and `pixel_height` are the output image dimensions; the CSS
/// viewport the page is laid out in is derived by dividing through the device
/// scale factor (see [`CapturePreset::css_viewport`]). Rendering a high
/// resolution preset therefore zooms content proportionately instead of
/// laying the page out across a giant viewport in miniature.
#[derive(Debug, Clone, Serialize)]
pub struct CapturePreset {
    pub key: &'static str,
    pub label: &'static str,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub device_scale_factor: f64,
    pub category: PresetCategory,
    pub description: &'static str,
    pub aspect_ratio: &'static str,
}

impl CapturePreset {
    /// CSS viewport dimensions: `round(pixel / device_scale_factor)`.
    pub fn css_viewport(&self) -> (u32, u32) {
        let w = (self.pixel_width as f64 / self.device_scale_factor).round() as u32;
        let h = (self.pixel_height as f64 / self.device_scale_factor).round() as u32;
        (w, h)
    }

    /// Output pixel area, the sort key for capture ordering.
    pub fn pixel_area(&self) -> u64 {
        self.pixel_width as u64 * self.pixel_height as u64
    }
}

/// The full preset catalog. Static data, never mutated at runtime.
pub static PRESETS: &[CapturePreset] = &[
    // Social card sizes, 1x density
    CapturePreset {
        key: "og-facebook",
        label: "OG / Facebook",
        pixel_width: 1200,
        pixel_height: 630,
        device_scale_factor: 1.0,
        category: PresetCategory::Social,
        description: "Open Graph and Facebook share card",
        aspect_ratio: "1.91:1",
    },
    CapturePreset {
        key: "twitter",
        label: "Twitter / X",
        pixel_width: 1200,
        pixel_height: 675,
        device_scale_factor: 1.0,
        category: PresetCategory::Social,
        description: "Twitter summary large image card",
        aspect_ratio: "16:9",
    },
    CapturePreset {
        key: "linkedin",
        label: "LinkedIn",
        pixel_width: 1200,
        pixel_height: 627,
        device_scale_factor: 1.0,
        category: PresetCategory::Social,
        description: "LinkedIn share post image",
        aspect_ratio: "1.91:1",
    },
    CapturePreset {
        key: "instagram-square",
        label: "Instagram Square",
        pixel_width: 1080,
        pixel_height: 1080,
        device_scale_factor: 1.0,
        category: PresetCategory::Social,
        description: "Instagram feed square post",
        aspect_ratio: "1:1",
    },
    CapturePreset {
        key: "instagram-portrait",
        label: "Instagram Portrait",
        pixel_width: 1080,
        pixel_height: 1350,
        device_scale_factor: 1.0,
        category: PresetCategory::Social,
        description: "Instagram feed portrait post",
        aspect_ratio: "4:5",
    },
    CapturePreset {
        key: "instagram-story",
        label: "Instagram Story",
        pixel_width: 1080,
        pixel_height: 1920,
        device_scale_factor: 1.0,
        category: PresetCategory::Social,
        description: "Instagram story and reel cover",
        aspect_ratio: "9:16",
    },
    CapturePreset {
        key: "pinterest",
        label: "Pinterest",
        pixel_width: 1000,
        pixel_height: 1500,
        device_scale_factor: 1.0,
        category: PresetCategory::Social,
        description: "Pinterest pin image",
        aspect_ratio: "2:3",
    },
    // Mobile portrait devices
    CapturePreset {
        key: "mobile-iphone",
        label: "Mobile (iPhone)",
        pixel_width: 390,
        pixel_height: 844,
        device_scale_factor: 3.0,
        category: PresetCategory::Mobile,
        description: "iPhone 14/15 viewport, standard mobile portrait",
        aspect_ratio: "9:19.5",
    },
    CapturePreset {
        key: "mobile-android",
        label: "Mobile (Android)",
        pixel_width: 412,
        pixel_height: 915,
        device_scale_factor: 3.0,
        category: PresetCategory::Mobile,
        description: "Pixel 7 viewport, standard Android portrait",
        aspect_ratio: "9:20",
    },
    CapturePreset {
        key: "tablet-portrait",
        label: "Tablet Portrait",
        pixel_width: 768,
        pixel_height: 1024,
        device_scale_factor: 2.0,
        category: PresetCategory::Mobile,
        description: "iPad portrait, 768x1024",
        aspect_ratio: "3:4",
    },
    // High resolution landscape. The scale factor doubles as the pixel
    // density, so content zooms instead of shrinking.
    CapturePreset {
        key: "2k",
        label: "2K QHD",
        pixel_width: 2560,
        pixel_height: 1440,
        device_scale_factor: 2.0,
        category: PresetCategory::Highres,
        description: "2560x1440, 2x pixel density on a 1280x720 viewport",
        aspect_ratio: "16:9",
    },
    CapturePreset {
        key: "4k",
        label: "4K UHD",
        pixel_width: 3840,
        pixel_height: 2160,
        device_scale_factor: 2.0,
        category: PresetCategory::Highres,
        description: "3840x2160, 2x pixel density on a 1920x1080 viewport",
        aspect_ratio: "16:9",
    },
    CapturePreset {
        key: "8k",
        label: "8K UHD",
        pixel_width: 7680,
        pixel_height: 4320,
        device_scale_factor: 4.0,
        category: PresetCategory::Highres,
        description: "7680x4320, 4x pixel density on a 1920x1080 viewport",
        aspect_ratio: "16:9",
    },
    CapturePreset {
        key: "16k",
        label: "16K",
        pixel_width: 15360,
        pixel_height: 8640,
        device_scale_factor: 8.0,
        category: PresetCategory::Highres,
        description: "15360x8640, 8x pixel density on a 1920x1080 viewport",
        aspect_ratio: "16:9",
    },
    // High resolution portrait, same densities with swapped dimensions
    CapturePreset {
        key: "2k-portrait",
        label: "2K Portrait",
        pixel_width: 1440,
        pixel_height: 2560,
        device_scale_factor: 2.0,
        category: PresetCategory::Highres,
        description: "1440x2560, 2x pixel density on a 720x1280 portrait viewport",
        aspect_ratio: "9:16",
    },
    CapturePreset {
        key: "4k-portrait",
        label: "4K Portrait",
        pixel_width: 2160,
        pixel_height: 3840,
        device_scale_factor: 2.0,
        category: PresetCategory::Highres,
        description: "2160x3840, 2x pixel density on a 1080x1920 portrait viewport",
        aspect_ratio: "9:16",
    },
    CapturePreset {
        key: "8k-portrait",
        label: "8K Portrait",
        pixel_width: 4320,
        pixel_height: 7680,
        device_scale_factor: 4.0,
        category: PresetCategory::Highres,
        description: "4320x7680, 4x pixel density on a 1080x1920 portrait viewport",
        aspect_ratio: "9:16",
    },
    CapturePreset {
        key: "16k-portrait",
        label: "16K Portrait",
        pixel_width: 8640,
        pixel_height: 15360,
        device_scale_factor: 8.0,
        category: PresetCategory::Highres,
        description: "8640x15360, 8x pixel density on a 1080x1920 portrait viewport",
        aspect_ratio: "9:16",
    },
];

/// Looks up a preset by key.
pub fn find_preset(key: &str) -> Option<&'static CapturePreset> {
    PRESETS.iter().find(|p| p.key == key)
}

/// Resolves caller-supplied keys against the catalog, preserving first
/// occurrence order. Unknown keys are dropped and duplicates collapse to the
/// first mention; request-shape validation belongs to the caller.
pub fn resolve_presets(keys: &[String]) -> Vec<&'static CapturePreset> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter_map(|key| find_preset(key))
        .filter(|preset| seen.insert(preset.key))
        .collect()
}

/// All presets in one category, in catalog order.
pub fn presets_in_category(
    category: PresetCategory,
) -> impl Iterator<Item = &'static CapturePreset> {
    PRESETS.iter().filter(move |p| p.category == category)
}
