//! Worker-side atlas construction and the handoff towards the orchestrator.

pub mod apc;
pub mod transferables;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::AtlasError,
    image::Lut,
    io::transferables::AtlasTransferable,
    render::{
        atlas_cache::ImageAtlasCache,
        descriptor::{AtlasContentDescriptor, ImageVersionMap},
        image_atlas::{ImageAtlas, ImageAtlasReference, ImagePositions},
        texture::TextureContext,
    },
    style::image::StyleImageMap,
};

/// What a worker hands back for one tile: the transferable atlas plus the
/// positions of exactly the requested variants, ready for geometry baking.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileAtlas {
    pub transferable: AtlasTransferable,
    pub icon_positions: ImagePositions,
    pub pattern_positions: ImagePositions,
}

/// Builds the atlas answer for one tile's image request set.
///
/// If an atlas in the worker-side cache already covers the request (subset
/// match, valid because no geometry references its coordinates yet), only a
/// reference to it is returned. Otherwise a full atlas is built, merged into
/// the cache for future requests, and returned whole.
///
/// The returned handle is the worker's pin on the cache entry: the entry
/// stays alive for matching follow-up requests as long as the handle (or
/// any other consumer) holds the atlas, and expires once all are dropped.
pub fn build_tile_atlas<C: TextureContext>(
    cache: &mut ImageAtlasCache<C>,
    icons: &StyleImageMap,
    patterns: &StyleImageMap,
    lut: Option<&Lut>,
    image_versions: &ImageVersionMap,
) -> Result<(TileAtlas, Arc<ImageAtlas>), AtlasError> {
    let descriptor = AtlasContentDescriptor::new(icons, patterns, image_versions, lut);

    if let Some(cached) = cache.find_cached_atlas(&descriptor) {
        if let Some(hash) = cached.content_descriptor.as_ref().map(|d| d.hash()) {
            if let Some((icon_positions, pattern_positions)) =
                cached.positions_for(icons.keys(), patterns.keys())
            {
                let tile_atlas = TileAtlas {
                    transferable: AtlasTransferable::Reference(ImageAtlasReference::new(hash)),
                    icon_positions,
                    pattern_positions,
                };
                return Ok((tile_atlas, cached));
            }
        }
    }

    let atlas = ImageAtlas::new(icons, patterns, lut, Some(image_versions))?;
    let atlas = cache.get_or_cache_atlas(atlas);
    let tile_atlas = TileAtlas {
        transferable: AtlasTransferable::Atlas((*atlas).clone()),
        icon_positions: atlas.icon_positions.clone(),
        pattern_positions: atlas.pattern_positions.clone(),
    };
    Ok((tile_atlas, atlas))
}
