use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

fn default_solo_hover() -> bool {
    true
}

fn default_font_multiplier() -> f64 {
    1.0
}

fn default_bounding_box_adjustment() -> f64 {
    0.5
}

fn default_prefetch_margin() -> f64 {
    200.0
}

/// How text flow is chosen for blocks without a forced orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextOrientation {
    /// Tall boxes read vertically, everything else horizontally.
    #[default]
    Smart,
    ForceHorizontal,
    ForceVertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorTheme {
    #[default]
    Dark,
    Light,
    Sepia,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayConfig {
    #[serde(default = "default_enabled")]
    pub enable_overlay: bool,
    /// Only the hovered or active block is painted at full opacity
    #[serde(default = "default_solo_hover")]
    pub solo_hover: bool,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default)]
    pub text_orientation: TextOrientation,
    #[serde(default)]
    pub color_theme: ColorTheme,
    #[serde(default = "default_font_multiplier")]
    pub font_multiplier_horizontal: f64,
    #[serde(default = "default_font_multiplier")]
    pub font_multiplier_vertical: f64,
    /// Symmetric padding around each block, in percent of the image size
    #[serde(default = "default_bounding_box_adjustment")]
    pub bounding_box_adjustment: f64,
    /// Overlays are shown this many pixels before the image scrolls into view
    #[serde(default = "default_prefetch_margin")]
    pub prefetch_margin: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enable_overlay: default_enabled(),
            solo_hover: default_solo_hover(),
            debug_mode: false,
            text_orientation: TextOrientation::default(),
            color_theme: ColorTheme::default(),
            font_multiplier_horizontal: default_font_multiplier(),
            font_multiplier_vertical: default_font_multiplier(),
            bounding_box_adjustment: default_bounding_box_adjustment(),
            prefetch_margin: default_prefetch_margin(),
        }
    }
}
