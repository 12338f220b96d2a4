//! # tile-atlas
//!
//! Packs the bitmap images requested while rendering map tiles — icons and
//! tiling patterns — into one shared raster, and caches both the packed
//! raster and its GPU texture so that identical image sets are neither
//! repacked nor re-uploaded.
//!
//! Atlases are fingerprinted by an order-independent
//! [content descriptor](render::descriptor::AtlasContentDescriptor), so
//! producer and consumer threads agree on cache keys no matter how they
//! enumerate an image set. The
//! [cache](render::atlas_cache::ImageAtlasCache) holds packed rasters
//! weakly and their GPU textures under a byte budget with LRU eviction;
//! evicted textures are transparently recreated from the surviving raster.
//!
//! Atlas construction usually happens on worker threads via
//! [`io::build_tile_atlas`], which answers repeated requests with a
//! lightweight reference instead of a fresh atlas. Results cross to the
//! rendering thread as [`io::TileAtlas`] messages and are merged with
//! [`get_or_cache`](render::atlas_cache::ImageAtlasCache::get_or_cache).

pub mod error;
pub mod image;
pub mod io;
pub mod render;
pub mod style;

// Internal modules
pub(crate) mod util;
