use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionMode {
    #[default]
    Hover,
    Click,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModifierKey {
    #[default]
    None,
    Alt,
    Ctrl,
    Shift,
    Meta,
}

fn default_delete_modifier() -> ModifierKey {
    ModifierKey::Alt
}

fn default_merge_modifier() -> ModifierKey {
    ModifierKey::Ctrl
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionConfig {
    pub mode: InteractionMode,
    /// Touch-first behavior: first tap arms a block, second tap looks up
    pub mobile_mode: bool,
    #[serde(default = "default_delete_modifier")]
    pub delete_modifier: ModifierKey,
    #[serde(default = "default_merge_modifier")]
    pub merge_modifier: ModifierKey,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            mode: InteractionMode::default(),
            mobile_mode: false,
            delete_modifier: default_delete_modifier(),
            merge_modifier: default_merge_modifier(),
        }
    }
}
