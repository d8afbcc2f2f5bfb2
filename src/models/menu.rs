use serde::{Deserialize, Serialize};

use super::Coordinates;

/// A menu item as returned by the nearby-menus list endpoint.
///
/// The list view never includes the long description; that only arrives
/// from the detail endpoint and is folded in with [`Menu::merge_detail`].
/// `image` is hydrated locally from the image cache, never sent by the
/// list endpoint itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub mid: i64,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub location: Option<Coordinates>,
    pub image_version: i64,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    /// Estimated delivery time in minutes.
    #[serde(default)]
    pub delivery_time: Option<i64>,
    /// Base64 data URI resolved from the image cache.
    #[serde(default)]
    pub image: Option<String>,
}

impl Menu {
    /// Fold a detail response into this menu.
    ///
    /// Only the enumerated fields may be overwritten, and only when the
    /// detail endpoint actually sent a value; the cached image and the
    /// item id are never touched.
    pub fn merge_detail(&mut self, detail: &MenuDetails) {
        if let Some(v) = &detail.name {
            self.name = v.clone();
        }
        if let Some(v) = detail.price {
            self.price = v;
        }
        if let Some(v) = detail.location {
            self.location = Some(v);
        }
        if let Some(v) = detail.image_version {
            self.image_version = v;
        }
        if let Some(v) = &detail.short_description {
            self.short_description = Some(v.clone());
        }
        if let Some(v) = &detail.long_description {
            self.long_description = Some(v.clone());
        }
        if let Some(v) = detail.delivery_time {
            self.delivery_time = Some(v);
        }
    }
}

/// Partial menu record from `GET /menu/{mid}`; every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub location: Option<Coordinates>,
    #[serde(default)]
    pub image_version: Option<i64>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub delivery_time: Option<i64>,
}

/// One ingredient of a menu item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bio: Option<bool>,
    #[serde(default)]
    pub origin: Option<String>,
}

/// Payload of `GET /menu/{mid}/image`: base64 image bytes plus the
/// server-side version of the asset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuImage {
    pub base64: String,
    #[serde(default)]
    pub image_version: Option<i64>,
}
