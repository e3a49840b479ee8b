use serde::{Deserialize, Serialize};

/// A fetched emote package
///
/// Serialized field names follow the persisted JSON layout
/// (`text`, `icon`, `emote`), not the Rust field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,

    #[serde(rename = "text")]
    pub display_text: String,

    #[serde(rename = "icon")]
    pub icon_url: String,

    pub resource_type: i64,

    /// Emotes in the package, when the payload lists them
    #[serde(rename = "emote", default, skip_serializing_if = "Option::is_none")]
    pub sub_items: Option<Vec<SubItem>>,
}

impl Resource {
    /// Number of sub-items, zero when none were listed
    pub fn sub_item_count(&self) -> usize {
        self.sub_items.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// One emote inside a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubItem {
    pub text: String,

    #[serde(rename = "url")]
    pub primary_url: String,

    /// Animated variant, only present for animated emotes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gif_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webp_url: Option<String>,
}
