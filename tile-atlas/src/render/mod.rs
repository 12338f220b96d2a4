//! Atlas packing, content fingerprinting, caching and GPU texture handling.

pub mod atlas_cache;
pub mod descriptor;
pub mod image_atlas;
pub mod packer;
pub mod texture;
