use serde::{Deserialize, Serialize};

use crate::domain::GalleryItem;

/// JSON body of `GET /api/gallery`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryResponse {
    pub items: Vec<GalleryItem>,
    /// Whether a classifier was available to label the items.
    pub classified: bool,
}

pub fn gallery_route() -> &'static str {
    "/api/gallery"
}

pub fn health_route() -> &'static str {
    "/healthz"
}
