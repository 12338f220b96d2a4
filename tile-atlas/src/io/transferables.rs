//! Values crossing the worker/orchestrator boundary.

use serde::{Deserialize, Serialize};

use crate::{
    image::Lut,
    render::image_atlas::{ImageAtlas, ImageAtlasReference},
};

/// Atlas handoff value.
///
/// Workers send a full atlas for a fresh build and only a reference when the
/// receiving side already holds an atlas covering the request. Carrying the
/// distinction as an explicit variant keeps the channel free of structural
/// sniffing on the receiving side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AtlasTransferable {
    Atlas(ImageAtlas),
    Reference(ImageAtlasReference),
}

impl AtlasTransferable {
    /// The LUT is large and shared, so it is excluded from the transfer.
    /// The receiving side reattaches its own copy here.
    pub fn reattach_lut(&mut self, lut: Option<&Lut>) {
        if let AtlasTransferable::Atlas(atlas) = self {
            atlas.lut = lut.cloned();
        }
    }
}
