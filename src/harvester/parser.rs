//! Payload parsing for listing and detail responses
//!
//! Raw payloads are deserialized into loose `Raw*` types first, then converted
//! into the domain `Resource`. Conversion strips bracket decoration from text,
//! upgrades every URL to https, and keeps animated variants only when present.

use crate::model::{Resource, SubItem};
use serde::Deserialize;

/// `data` of a detail response
#[derive(Debug, Clone, Deserialize)]
pub struct DetailData {
    pub package: Option<RawPackage>,
}

/// `data` of a listing response
#[derive(Debug, Clone, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub total: i64,

    pub packages: Option<Vec<ListedPackage>>,
}

/// The only listing field range discovery needs
#[derive(Debug, Clone, Deserialize)]
pub struct ListedPackage {
    pub id: i64,
}

/// A package exactly as the detail endpoint returns it
#[derive(Debug, Clone, Deserialize)]
pub struct RawPackage {
    pub id: i64,
    pub text: String,
    pub url: String,

    #[serde(default)]
    pub resource_type: Option<i64>,

    #[serde(default, alias = "emote")]
    pub emotes: Option<Vec<RawEmote>>,
}

/// An emote exactly as the detail endpoint returns it
#[derive(Debug, Clone, Deserialize)]
pub struct RawEmote {
    pub text: String,
    pub url: String,

    #[serde(default)]
    pub gif_url: Option<String>,

    #[serde(default)]
    pub webp_url: Option<String>,
}

/// Converts a raw package into a `Resource`
///
/// # Examples
///
/// ```
/// use emote_harvester::harvester::parse_package;
///
/// let raw = serde_json::from_str(
///     r#"{"id": 3, "text": "[Cats]", "url": "http://i0.example.com/c.png"}"#,
/// ).unwrap();
/// let resource = parse_package(raw);
/// assert_eq!(resource.display_text, "Cats");
/// assert_eq!(resource.icon_url, "https://i0.example.com/c.png");
/// ```
pub fn parse_package(raw: RawPackage) -> Resource {
    Resource {
        id: raw.id,
        display_text: strip_brackets(&raw.text),
        icon_url: normalize_url(&raw.url),
        resource_type: raw.resource_type.unwrap_or(0),
        sub_items: raw
            .emotes
            .map(|emotes| emotes.into_iter().map(parse_emote).collect()),
    }
}

fn parse_emote(raw: RawEmote) -> SubItem {
    SubItem {
        text: strip_brackets(&raw.text),
        primary_url: normalize_url(&raw.url),
        gif_url: optional_url(raw.gif_url),
        webp_url: optional_url(raw.webp_url),
    }
}

fn optional_url(url: Option<String>) -> Option<String> {
    url.filter(|u| !u.trim().is_empty())
        .map(|u| normalize_url(&u))
}

/// Removes `[` and `]` decoration from display text
pub fn strip_brackets(text: &str) -> String {
    text.chars().filter(|c| *c != '[' && *c != ']').collect()
}

/// Rewrites a URL to the https scheme
///
/// `http://` is replaced and protocol-relative `//host` URLs get a scheme.
/// Anything else is returned unchanged.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("https://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        trimmed.to_string()
    }
}

/// Largest package ID in a listing page
pub fn max_listed_id(data: &ListingData) -> Option<i64> {
    data.packages
        .as_ref()
        .and_then(|packages| packages.iter().map(|p| p.id).max())
}
