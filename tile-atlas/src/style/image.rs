use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{error::AtlasError, image::PremultipliedImage};

/// Stretch zones of a stretchable image along one axis, in image pixels.
pub type ImageStretches = Vec<(f32, f32)>;

/// The content box of a stretchable image, in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// A request for an image under a specific display scale.
///
/// Two variants with the same base id and scale factors always produce the
/// same [key](ImageVariant::key), regardless of which thread built them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageVariant {
    pub id: String,
    pub sx: f32,
    pub sy: f32,
}

impl ImageVariant {
    pub fn new(id: impl Into<String>, sx: f32, sy: f32) -> Self {
        Self {
            id: id.into(),
            sx,
            sy,
        }
    }

    /// The stringified form under which this variant is requested and under
    /// which its position is stored in an atlas.
    pub fn key(&self) -> String {
        // Serialization of a struct with a fixed field order is
        // deterministic, so equal variants map to equal keys.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn parse(key: &str) -> Result<ImageVariant, AtlasError> {
        serde_json::from_str(key).map_err(|_| AtlasError::InvalidVariantKey(key.to_string()))
    }
}

/// An image as supplied by the image management collaborator.
///
/// `data` is absent for vector sources which have not been rasterized yet;
/// such images still reserve space in the atlas at their declared size
/// scaled by the variant's scale factors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StyleImage {
    pub data: Option<PremultipliedImage>,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub version: u32,
    pub stretch_x: ImageStretches,
    pub stretch_y: ImageStretches,
    pub content: Option<ImageContent>,
    pub sdf: bool,
    pub vector: bool,
    pub has_render_callback: bool,
}

/// Images keyed by their stringified variant.
pub type StyleImageMap = HashMap<String, StyleImage>;

/// The image management collaborator, queried while patching an atlas whose
/// source images changed.
pub trait ImageManager {
    fn has_image(&self, id: &str) -> bool;

    fn get_image(&self, id: &str) -> Option<&StyleImage>;

    /// Base ids of images whose pixels changed since the last patch.
    fn updated_images(&self) -> Vec<String>;

    /// Notifies images which want a callback before every frame.
    fn dispatch_render_callbacks(&mut self, ids: &[String]);
}
