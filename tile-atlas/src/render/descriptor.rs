//! Canonical, order-independent fingerprinting of atlas contents.
//!
//! Producer and consumer threads may enumerate the same logical image set in
//! different orders. The descriptor sorts every entry into a canonical order
//! before hashing, so equal content always yields the same fingerprint.

use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};

use crate::{
    image::Lut,
    style::image::{ImageVariant, StyleImageMap},
    util::warn_once,
};

/// Base image id to its current monotonic version.
pub type ImageVersionMap = HashMap<String, u32>;

/// Fingerprint record of a single requested image.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub id: String,
    pub version: u32,
    pub sx: f32,
    pub sy: f32,
}

impl Ord for ImageDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.version.cmp(&other.version))
            .then_with(|| self.sx.total_cmp(&other.sx))
            .then_with(|| self.sy.total_cmp(&other.sy))
    }
}

impl PartialOrd for ImageDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ImageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ImageDescriptor {}

/// One multiply-add step of the running 32-bit hash.
///
/// Every step wraps in `i32`. Wider intermediate arithmetic would make
/// hashes diverge between builds of the producer and consumer sides.
fn combine_hash(hash: i32, value: i32) -> i32 {
    hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(value)
}

fn hash_str(value: &str) -> i32 {
    value
        .encode_utf16()
        .fold(0, |hash, unit| combine_hash(hash, unit as i32))
}

fn hash_bytes(value: &[u8]) -> i32 {
    value
        .iter()
        .fold(0, |hash, byte| combine_hash(hash, *byte as i32))
}

fn add_descriptors<'a>(
    keys: impl Iterator<Item = &'a String>,
    image_versions: &ImageVersionMap,
    descriptors: &mut Vec<ImageDescriptor>,
) {
    for key in keys {
        let variant = match ImageVariant::parse(key) {
            Ok(variant) => variant,
            Err(_) => {
                warn_once(&format!("skipping unparseable image variant key `{key}`"));
                continue;
            }
        };
        descriptors.push(descriptor_for(&variant, image_versions));
    }
}

fn descriptor_for(variant: &ImageVariant, image_versions: &ImageVersionMap) -> ImageDescriptor {
    ImageDescriptor {
        version: image_versions.get(&variant.id).copied().unwrap_or(0),
        id: variant.id.clone(),
        sx: variant.sx,
        sy: variant.sy,
    }
}

/// Describes the content of an image atlas based on the requested images.
/// Used for caching and reusing atlases with the same content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AtlasContentDescriptor {
    hash: i32,
    requires_mip_maps: bool,
    icon_descriptors: Vec<ImageDescriptor>,
    pattern_descriptors: Vec<ImageDescriptor>,
}

impl AtlasContentDescriptor {
    pub fn new(
        icons: &StyleImageMap,
        patterns: &StyleImageMap,
        image_versions: &ImageVersionMap,
        lut: Option<&Lut>,
    ) -> Self {
        let mut icon_descriptors = Vec::with_capacity(icons.len());
        let mut pattern_descriptors = Vec::with_capacity(patterns.len());
        add_descriptors(icons.keys(), image_versions, &mut icon_descriptors);
        add_descriptors(patterns.keys(), image_versions, &mut pattern_descriptors);

        Self::build(icon_descriptors, pattern_descriptors, lut)
    }

    /// Builds a descriptor from variants which were already parsed, e.g. by
    /// the sorting helper, avoiding a second parse of every key.
    pub(crate) fn from_variants<'a>(
        icons: impl Iterator<Item = &'a ImageVariant>,
        patterns: impl Iterator<Item = &'a ImageVariant>,
        image_versions: &ImageVersionMap,
        lut: Option<&Lut>,
    ) -> Self {
        let icon_descriptors = icons
            .map(|variant| descriptor_for(variant, image_versions))
            .collect();
        let pattern_descriptors = patterns
            .map(|variant| descriptor_for(variant, image_versions))
            .collect();

        Self::build(icon_descriptors, pattern_descriptors, lut)
    }

    fn build(
        mut icon_descriptors: Vec<ImageDescriptor>,
        mut pattern_descriptors: Vec<ImageDescriptor>,
        lut: Option<&Lut>,
    ) -> Self {
        // Sort all descriptors to ensure a stable hash.
        icon_descriptors.sort();
        pattern_descriptors.sort();

        let mut seed = 0;
        if let Some(lut) = lut.filter(|lut| !lut.data().is_empty()) {
            seed = combine_hash(seed, hash_bytes(lut.data()));
        }
        seed = combine_hash(seed, 1); // separator

        for descriptor in &icon_descriptors {
            seed = combine_hash(seed, hash_str(&descriptor.id));
            seed = combine_hash(seed, descriptor.version as i32);
            seed = combine_hash(seed, descriptor.sx.to_bits() as i32);
            seed = combine_hash(seed, descriptor.sy.to_bits() as i32);
        }
        seed = combine_hash(seed, 1);
        for descriptor in &pattern_descriptors {
            seed = combine_hash(seed, hash_str(&descriptor.id));
            seed = combine_hash(seed, descriptor.version as i32);
            seed = combine_hash(seed, descriptor.sx.to_bits() as i32);
            seed = combine_hash(seed, descriptor.sy.to_bits() as i32);
        }

        Self {
            hash: seed,
            // Mipmaps are required when patterns are present.
            requires_mip_maps: !pattern_descriptors.is_empty(),
            icon_descriptors,
            pattern_descriptors,
        }
    }

    pub fn hash(&self) -> i32 {
        self.hash
    }

    pub fn requires_mip_maps(&self) -> bool {
        self.requires_mip_maps
    }

    /// Whether every image described by `self` is also described by `other`.
    pub fn subset_of(&self, other: &AtlasContentDescriptor) -> bool {
        is_subset(&self.icon_descriptors, &other.icon_descriptors)
            && is_subset(&self.pattern_descriptors, &other.pattern_descriptors)
    }
}

/// Subset test over two sorted slices via a linear merge scan.
fn is_subset(subset: &[ImageDescriptor], superset: &[ImageDescriptor]) -> bool {
    if subset.len() > superset.len() {
        return false;
    }

    let mut i = 0;
    let mut j = 0;
    while i < subset.len() && j < superset.len() {
        match subset[i].cmp(&superset[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            // Element in subset is not in superset.
            Ordering::Less => return false,
            Ordering::Greater => j += 1,
        }
    }
    i == subset.len()
}
