//! Two-tier cache of packed atlases and their GPU textures.
//!
//! The content cache holds weak references keyed by content hash, so equal
//! image sets are packed once and shared across tiles. The texture cache
//! holds the resident GPU textures under a byte budget with LRU eviction;
//! evicting a texture never touches the CPU-side raster, which stays
//! available to recreate it.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use instant::Instant;

use crate::{
    io::transferables::AtlasTransferable,
    render::{
        descriptor::AtlasContentDescriptor,
        image_atlas::{AtlasId, ImageAtlas},
        texture::{AtlasTexture, TextureContext},
    },
    util::warn_once,
};

#[derive(Clone, Copy, Debug)]
pub struct AtlasCacheSettings {
    /// Byte budget for resident atlas textures. Best-effort: a single atlas
    /// larger than the budget stays resident anyway.
    pub max_texture_memory: u64,
}

impl Default for AtlasCacheSettings {
    fn default() -> Self {
        Self {
            max_texture_memory: 256 * 1024 * 1024,
        }
    }
}

struct TextureEntry<T> {
    texture: T,
    /// Owning atlas, used to expire the texture once the atlas is dropped.
    atlas: Weak<ImageAtlas>,
    memory: u64,
    last_access: Instant,
}

pub struct ImageAtlasCache<C: TextureContext> {
    cache: HashMap<i32, Weak<ImageAtlas>>,
    textures: HashMap<AtlasId, TextureEntry<C::Texture>>,
    texture_memory_used: u64,
    max_texture_memory: u64,
}

impl<C: TextureContext> ImageAtlasCache<C> {
    pub fn new(settings: AtlasCacheSettings) -> Self {
        Self {
            cache: HashMap::new(),
            textures: HashMap::new(),
            texture_memory_used: 0,
            max_texture_memory: settings.max_texture_memory,
        }
    }

    /// GPU memory cost of an atlas texture: base RGBA8 size plus the mipmap
    /// chain overhead (geometric series, ~1/3) when patterns force mipmaps.
    fn calculate_texture_memory(atlas: &ImageAtlas) -> u64 {
        let base = atlas.image.width() as u64 * atlas.image.height() as u64 * 4;
        if atlas.pattern_positions.is_empty() {
            base
        } else {
            (base as f64 * 1.33).ceil() as u64
        }
    }

    /// A cached atlas can stand in for a requested one only if the request
    /// doesn't need mipmaps, or the cached atlas has them.
    fn is_mipmap_compatible(
        new_descriptor: &AtlasContentDescriptor,
        cached_descriptor: &AtlasContentDescriptor,
    ) -> bool {
        !new_descriptor.requires_mip_maps() || cached_descriptor.requires_mip_maps()
    }

    /// Finds a cached atlas whose content matches `descriptor` exactly or is
    /// a superset of it.
    ///
    /// Only valid before a consumer has baked atlas-local coordinates into
    /// its geometry; afterwards substituting a differently packed atlas
    /// would corrupt them, and only [`get_or_cache`](Self::get_or_cache)
    /// may be used.
    pub fn find_cached_atlas(&self, descriptor: &AtlasContentDescriptor) -> Option<Arc<ImageAtlas>> {
        if let Some(cached) = self.cache.get(&descriptor.hash()).and_then(Weak::upgrade) {
            if let Some(cached_descriptor) = cached.content_descriptor.as_ref() {
                if Self::is_mipmap_compatible(descriptor, cached_descriptor) {
                    return Some(cached);
                }
            }
        }

        for weak in self.cache.values() {
            let Some(cached) = weak.upgrade() else {
                continue;
            };
            let Some(cached_descriptor) = cached.content_descriptor.as_ref() else {
                continue;
            };
            if descriptor.subset_of(cached_descriptor)
                && Self::is_mipmap_compatible(descriptor, cached_descriptor)
            {
                return Some(cached);
            }
        }

        None
    }

    /// Merges a worker result into the cache.
    ///
    /// References resolve against the content cache; a reference to an atlas
    /// which is no longer alive is a cache-consistency fault, reported once
    /// and answered with `None` so the caller falls back to a full rebuild.
    pub fn get_or_cache(&mut self, transferable: AtlasTransferable) -> Option<Arc<ImageAtlas>> {
        match transferable {
            AtlasTransferable::Reference(reference) => {
                self.prune();
                if let Some(atlas) = self
                    .cache
                    .get(&reference.source_atlas_hash)
                    .and_then(Weak::upgrade)
                {
                    return Some(atlas);
                }
                warn_once("atlas reference points to a dropped atlas; falling back to a rebuild");
                None
            }
            AtlasTransferable::Atlas(atlas) => Some(self.get_or_cache_atlas(atlas)),
        }
    }

    /// Caches `atlas` under its content hash, or returns the already cached
    /// atlas with equal content and discards the new one.
    ///
    /// An atlas without a content descriptor is returned as-is, uncached.
    /// Unlike [`find_cached_atlas`](Self::find_cached_atlas) this never
    /// substitutes a superset: by this point a consumer has baked this
    /// layout's coordinates into its geometry.
    pub fn get_or_cache_atlas(&mut self, atlas: ImageAtlas) -> Arc<ImageAtlas> {
        self.prune();

        let hash = match atlas.content_descriptor.as_ref() {
            None => return Arc::new(atlas),
            Some(descriptor) => {
                if let Some(cached) = self.cache.get(&descriptor.hash()).and_then(Weak::upgrade) {
                    if let Some(cached_descriptor) = cached.content_descriptor.as_ref() {
                        if Self::is_mipmap_compatible(descriptor, cached_descriptor) {
                            return cached;
                        }
                    }
                }
                descriptor.hash()
            }
        };

        let atlas = Arc::new(atlas);
        self.cache.insert(hash, Arc::downgrade(&atlas));
        atlas
    }

    /// Returns the resident texture for `atlas`, creating it if necessary.
    ///
    /// Tiles sharing an atlas share its texture. Creation evicts the least
    /// recently used textures until the byte budget accommodates the new
    /// one; if nothing remains to evict the budget is exceeded rather than
    /// failing.
    pub fn get_texture_for_atlas(
        &mut self,
        atlas: &Arc<ImageAtlas>,
        context: &C,
        format: wgpu::TextureFormat,
    ) -> Option<&C::Texture> {
        self.prune();

        let id = atlas.id();
        if !self.textures.contains_key(&id) {
            let memory = Self::calculate_texture_memory(atlas);
            self.evict_textures_if_needed(memory);

            let has_pattern = !atlas.pattern_positions.is_empty();
            let texture = context.create_texture(&atlas.image, format, has_pattern);
            self.textures.insert(
                id,
                TextureEntry {
                    texture,
                    atlas: Arc::downgrade(atlas),
                    memory,
                    last_access: Instant::now(),
                },
            );
            self.texture_memory_used += memory;
        }

        let entry = self.textures.get_mut(&id)?;
        entry.last_access = Instant::now();
        Some(&entry.texture)
    }

    fn evict_textures_if_needed(&mut self, required_memory: u64) {
        while self.texture_memory_used + required_memory > self.max_texture_memory
            && !self.textures.is_empty()
        {
            let lru = self
                .textures
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(id, _)| *id);
            match lru {
                Some(id) => self.evict_texture(id),
                None => break,
            }
        }
    }

    /// Destroys one resident texture. The owning atlas stays in the content
    /// cache and can have its texture recreated later.
    fn evict_texture(&mut self, id: AtlasId) {
        if let Some(entry) = self.textures.remove(&id) {
            entry.texture.destroy();
            self.texture_memory_used = self.texture_memory_used.saturating_sub(entry.memory);
        }
    }

    /// Drops content entries whose atlas is no longer referenced anywhere
    /// and destroys the textures those atlases owned.
    ///
    /// Runs at the head of every mutating cache operation; call it directly
    /// after tearing down consumers to release memory eagerly.
    pub fn prune(&mut self) {
        self.cache.retain(|_, weak| weak.strong_count() > 0);

        let expired: Vec<AtlasId> = self
            .textures
            .iter()
            .filter(|(_, entry)| entry.atlas.strong_count() == 0)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.evict_texture(id);
        }
    }

    /// Destroys all resident textures, e.g. after a device loss. Content
    /// cache entries are preserved so textures can be recreated.
    pub fn destroy_textures(&mut self) {
        for (_, entry) in self.textures.drain() {
            entry.texture.destroy();
        }
        self.texture_memory_used = 0;
    }

    /// Destroys all resident textures and discards the entire content cache.
    pub fn clear(&mut self) {
        self.destroy_textures();
        self.cache.clear();
    }
}

impl<C: TextureContext> Default for ImageAtlasCache<C> {
    fn default() -> Self {
        Self::new(AtlasCacheSettings::default())
    }
}
