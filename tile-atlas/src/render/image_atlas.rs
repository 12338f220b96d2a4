//! Packing of requested icons and patterns into one shared raster.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering as AtomicOrdering},
};

use geo_types::Rect;
use serde::{Deserialize, Serialize};

use crate::{
    error::AtlasError,
    image::{Lut, PremultipliedImage},
    render::{
        descriptor::{AtlasContentDescriptor, ImageVersionMap},
        packer,
        texture::TextureContext,
    },
    style::image::{ImageContent, ImageManager, ImageStretches, ImageVariant, StyleImage, StyleImageMap},
    util::warn_once,
};

pub const ICON_PADDING: u16 = 1;
pub const PATTERN_PADDING: u16 = 2;

/// Display scale of a packed image per axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImagePositionScale {
    pub x: f32,
    pub y: f32,
}

/// Placement and metadata of one packed image inside an atlas raster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImagePosition {
    pub padded_rect: Rect<u16>,
    pub pixel_ratio: f32,
    pub version: u32,
    pub stretch_x: ImageStretches,
    pub stretch_y: ImageStretches,
    pub content: Option<ImageContent>,
    pub padding: u16,
    pub sdf: bool,
    pub vector: bool,
    pub scale: ImagePositionScale,
}

impl ImagePosition {
    fn image_position_scale(variant: &ImageVariant, vector: bool, pixel_ratio: f32) -> ImagePositionScale {
        if vector {
            ImagePositionScale {
                x: variant.sx,
                y: variant.sy,
            }
        } else {
            ImagePositionScale {
                x: pixel_ratio,
                y: pixel_ratio,
            }
        }
    }

    pub fn new(padded_rect: Rect<u16>, image: &StyleImage, padding: u16, variant: &ImageVariant) -> Self {
        Self {
            padded_rect,
            pixel_ratio: image.pixel_ratio,
            version: image.version,
            stretch_x: image.stretch_x.clone(),
            stretch_y: image.stretch_y.clone(),
            content: image.content,
            padding,
            sdf: image.sdf,
            vector: image.vector,
            scale: Self::image_position_scale(variant, image.vector, image.pixel_ratio),
        }
    }

    /// Top-left corner of the image content, inside the padding.
    pub fn tl(&self) -> [u16; 2] {
        [
            self.padded_rect.min().x + self.padding,
            self.padded_rect.min().y + self.padding,
        ]
    }

    /// Bottom-right corner of the image content, inside the padding.
    pub fn br(&self) -> [u16; 2] {
        [
            self.padded_rect.min().x + self.padded_rect.width() - self.padding,
            self.padded_rect.min().y + self.padded_rect.height() - self.padding,
        ]
    }

    pub fn display_size(&self) -> [f32; 2] {
        [
            (self.padded_rect.width() - self.padding * 2) as f32 / self.scale.x,
            (self.padded_rect.height() - self.padding * 2) as f32 / self.scale.y,
        ]
    }
}

/// Positions of packed images keyed by their stringified variant.
pub type ImagePositions = HashMap<String, ImagePosition>;

/// An image map entry with its parsed variant.
pub struct SortedImage<'a> {
    pub key: &'a str,
    pub image: &'a StyleImage,
    pub variant: ImageVariant,
}

fn parse_images(images: &StyleImageMap) -> Vec<SortedImage> {
    let mut entries = Vec::with_capacity(images.len());
    for (key, image) in images {
        match ImageVariant::parse(key) {
            Ok(variant) => entries.push(SortedImage {
                key,
                image,
                variant,
            }),
            Err(_) => warn_once(&format!("skipping unparseable image variant key `{key}`")),
        }
    }
    entries
}

/// Sorts images deterministically by base id and scale for consistent atlas
/// packing. Used by worker threads to sort images before checking the atlas
/// cache. Entries whose key does not parse are skipped.
pub fn sort_images(images: &StyleImageMap) -> Vec<SortedImage> {
    let mut entries = parse_images(images);
    entries.sort_by(|a, b| {
        a.variant
            .id
            .cmp(&b.variant.id)
            .then_with(|| a.variant.sx.total_cmp(&b.variant.sx))
            .then_with(|| a.variant.sy.total_cmp(&b.variant.sy))
    });
    entries
}

/// Stable token identifying one atlas instance, usable as a map key where
/// object identity would otherwise be needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtlasId(u64);

impl AtlasId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        AtlasId(NEXT.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Lightweight reference to an atlas which the receiving side already holds.
/// Workers send this instead of a full atlas on a cache hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAtlasReference {
    pub source_atlas_hash: i32,
}

impl ImageAtlasReference {
    pub fn new(source_atlas_hash: i32) -> Self {
        Self { source_atlas_hash }
    }
}

/// One packed raster combining all icons and patterns a tile requested.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageAtlas {
    pub image: PremultipliedImage,
    pub icon_positions: ImagePositions,
    pub pattern_positions: ImagePositions,
    /// Base ids of packed images which want a callback before every frame.
    pub have_render_callbacks: Vec<String>,
    /// Excluded from cross-thread transfer; reattached on the receiving side.
    #[serde(skip)]
    pub lut: Option<Lut>,
    pub content_descriptor: Option<AtlasContentDescriptor>,
    id: AtlasId,
}

impl ImageAtlas {
    /// Packs `icons` and `patterns` into a fresh raster.
    ///
    /// Supplying `image_versions` enables caching for this atlas: both sets
    /// are deterministically reordered before layout, so equal content
    /// yields byte-identical rasters, and a content descriptor is computed.
    /// Without it the atlas is never cache-eligible.
    pub fn new(
        icons: &StyleImageMap,
        patterns: &StyleImageMap,
        lut: Option<&Lut>,
        image_versions: Option<&ImageVersionMap>,
    ) -> Result<Self, AtlasError> {
        let (sorted_icons, sorted_patterns) = if image_versions.is_some() {
            (sort_images(icons), sort_images(patterns))
        } else {
            (parse_images(icons), parse_images(patterns))
        };

        let mut bins = Vec::with_capacity(sorted_icons.len() + sorted_patterns.len());
        add_bins(&sorted_icons, ICON_PADDING, &mut bins);
        add_bins(&sorted_patterns, PATTERN_PADDING, &mut bins);

        let layout = packer::pack(&bins)?;
        let mut image = PremultipliedImage::new(layout.width.max(1), layout.height.max(1));

        let mut have_render_callbacks = Vec::new();
        let icon_positions = make_positions(
            &sorted_icons,
            ICON_PADDING,
            &bins,
            &layout.placements,
            0,
            &mut have_render_callbacks,
        );
        let pattern_positions = make_positions(
            &sorted_patterns,
            PATTERN_PADDING,
            &bins,
            &layout.placements,
            sorted_icons.len(),
            &mut have_render_callbacks,
        );

        for (entry, placement) in sorted_icons.iter().zip(&layout.placements) {
            let Some(data) = entry.image.data.as_ref() else {
                continue;
            };
            // For SDF icons the RGB channels are overridden with white; only
            // the distance channel is read downstream. The LUT is not applied
            // here because icon color correction happens on the GPU.
            image.copy_from(
                data,
                (0, 0),
                (
                    placement.0 + ICON_PADDING as u32,
                    placement.1 + ICON_PADDING as u32,
                ),
                (data.width(), data.height()),
                None,
                entry.image.sdf,
            );
        }

        let pattern_placements = &layout.placements[sorted_icons.len()..];
        for (entry, placement) in sorted_patterns.iter().zip(pattern_placements) {
            let Some(data) = entry.image.data.as_ref() else {
                continue;
            };
            let x = placement.0 + PATTERN_PADDING as u32;
            let y = placement.1 + PATTERN_PADDING as u32;
            let w = data.width();
            let h = data.height();
            if w == 0 || h == 0 {
                continue;
            }
            image.copy_from(data, (0, 0), (x, y), (w, h), lut, false);

            // Wrapped copies of the opposite edges on each side make the
            // pattern tile seam-free. The outermost pixel ring stays
            // transparent so nothing bleeds into neighbouring images.
            let pad = (PATTERN_PADDING - 1) as u32;
            image.copy_from(data, (0, h - pad), (x, y - pad), (w, pad), lut, false); // T
            image.copy_from(data, (0, 0), (x, y + h), (w, pad), lut, false); // B
            image.copy_from(data, (w - pad, 0), (x - pad, y), (pad, h), lut, false); // L
            image.copy_from(data, (0, 0), (x + w, y), (pad, h), lut, false); // R
            image.copy_from(data, (w - pad, h - pad), (x - pad, y - pad), (pad, pad), lut, false); // TL
            image.copy_from(data, (0, h - pad), (x + w, y - pad), (pad, pad), lut, false); // TR
            image.copy_from(data, (w - pad, 0), (x - pad, y + h), (pad, pad), lut, false); // BL
            image.copy_from(data, (0, 0), (x + w, y + h), (pad, pad), lut, false); // BR
        }

        let content_descriptor = image_versions.map(|versions| {
            AtlasContentDescriptor::from_variants(
                sorted_icons.iter().map(|entry| &entry.variant),
                sorted_patterns.iter().map(|entry| &entry.variant),
                versions,
                lut,
            )
        });

        Ok(Self {
            image,
            icon_positions,
            pattern_positions,
            have_render_callbacks,
            lut: lut.cloned(),
            content_descriptor,
            id: AtlasId::next(),
        })
    }

    pub fn id(&self) -> AtlasId {
        self.id
    }

    /// Positions of the given variant keys, or `None` if any of them is not
    /// packed into this atlas.
    pub fn positions_for<'a>(
        &self,
        icons: impl Iterator<Item = &'a String>,
        patterns: impl Iterator<Item = &'a String>,
    ) -> Option<(ImagePositions, ImagePositions)> {
        Some((
            positions_subset(&self.icon_positions, icons)?,
            positions_subset(&self.pattern_positions, patterns)?,
        ))
    }

    /// Re-blits every packed image whose source pixels changed since this
    /// atlas was built and uploads the affected sub-rectangles.
    pub fn patch_updated_images<M: ImageManager, C: TextureContext>(
        &mut self,
        image_manager: &mut M,
        texture: &C::Texture,
        context: &C,
        lut: Option<&Lut>,
    ) {
        let ImageAtlas {
            icon_positions,
            pattern_positions,
            have_render_callbacks,
            lut: own_lut,
            ..
        } = self;

        have_render_callbacks.retain(|id| image_manager.has_image(id));
        image_manager.dispatch_render_callbacks(have_render_callbacks);

        let pattern_lut = lut.or(own_lut.as_ref());

        for image_id in image_manager.updated_images() {
            for (key, position) in icon_positions.iter_mut() {
                let Ok(variant) = ImageVariant::parse(key) else {
                    continue;
                };
                if variant.id == image_id {
                    if let Some(image) = image_manager.get_image(&image_id) {
                        // No LUT for icons; it is applied on the GPU.
                        Self::patch_updated_image(position, image, texture, context, None);
                    }
                }
            }

            for (key, position) in pattern_positions.iter_mut() {
                let Ok(variant) = ImageVariant::parse(key) else {
                    continue;
                };
                if variant.id == image_id {
                    if let Some(image) = image_manager.get_image(&image_id) {
                        Self::patch_updated_image(position, image, texture, context, pattern_lut);
                    }
                }
            }
        }
    }

    /// Uploads `image` into the sub-rectangle recorded in `position` if its
    /// version moved on. No-op when the versions already match, so calling
    /// this repeatedly is safe.
    pub fn patch_updated_image<C: TextureContext>(
        position: &mut ImagePosition,
        image: &StyleImage,
        texture: &C::Texture,
        context: &C,
        lut: Option<&Lut>,
    ) {
        let Some(data) = image.data.as_ref() else {
            return;
        };
        if position.version == image.version {
            return;
        }
        position.version = image.version;

        let [x, y] = position.tl();
        let override_rgb = position.sdf;
        if lut.is_some() || override_rgb {
            let mut upload = PremultipliedImage::new(data.width(), data.height());
            upload.copy_from(
                data,
                (0, 0),
                (0, 0),
                (data.width(), data.height()),
                lut,
                override_rgb,
            );
            context.update_texture(texture, &upload, (x as u32, y as u32));
        } else {
            context.update_texture(texture, data, (x as u32, y as u32));
        }
    }
}

fn add_bins(entries: &[SortedImage], padding: u16, bins: &mut Vec<(u32, u32)>) {
    for entry in entries {
        let (width, height) = match entry.image.data.as_ref() {
            Some(data) => (data.width(), data.height()),
            // A vector image reserves its natural size scaled by the variant.
            None => (
                (entry.image.width as f32 * entry.variant.sx).round() as u32,
                (entry.image.height as f32 * entry.variant.sy).round() as u32,
            ),
        };
        bins.push((width + 2 * padding as u32, height + 2 * padding as u32));
    }
}

fn make_positions(
    entries: &[SortedImage],
    padding: u16,
    bins: &[(u32, u32)],
    placements: &[(u32, u32)],
    offset: usize,
    have_render_callbacks: &mut Vec<String>,
) -> ImagePositions {
    let mut positions = ImagePositions::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let (x, y) = placements[offset + i];
        let (w, h) = bins[offset + i];
        let padded_rect = Rect::new(
            (x as u16, y as u16),
            ((x + w) as u16, (y + h) as u16),
        );
        positions.insert(
            entry.key.to_string(),
            ImagePosition::new(padded_rect, entry.image, padding, &entry.variant),
        );

        if entry.image.has_render_callback {
            have_render_callbacks.push(entry.variant.id.clone());
        }
    }
    positions
}

fn positions_subset<'a>(
    positions: &ImagePositions,
    keys: impl Iterator<Item = &'a String>,
) -> Option<ImagePositions> {
    let mut subset = ImagePositions::new();
    for key in keys {
        subset.insert(key.clone(), positions.get(key)?.clone());
    }
    Some(subset)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::render::texture::AtlasTexture;

    pub(crate) struct TestTexture;

    impl AtlasTexture for TestTexture {
        fn destroy(&self) {}
    }

    #[derive(Default)]
    pub(crate) struct TestTextures {
        pub updates: RefCell<Vec<((u32, u32), (u32, u32))>>,
    }

    impl TextureContext for TestTextures {
        type Texture = TestTexture;

        fn create_texture(
            &self,
            _image: &PremultipliedImage,
            _format: wgpu::TextureFormat,
            _use_mipmap: bool,
        ) -> TestTexture {
            TestTexture
        }

        fn update_texture(
            &self,
            _texture: &TestTexture,
            image: &PremultipliedImage,
            origin: (u32, u32),
        ) {
            self.updates
                .borrow_mut()
                .push((origin, (image.width(), image.height())));
        }
    }

    struct TestImageManager {
        images: StyleImageMap,
        updated: Vec<String>,
        dispatched: Vec<String>,
    }

    impl ImageManager for TestImageManager {
        fn has_image(&self, id: &str) -> bool {
            self.images.contains_key(id)
        }

        fn get_image(&self, id: &str) -> Option<&StyleImage> {
            self.images.get(id)
        }

        fn updated_images(&self) -> Vec<String> {
            self.updated.clone()
        }

        fn dispatch_render_callbacks(&mut self, ids: &[String]) {
            self.dispatched.extend_from_slice(ids);
        }
    }

    fn raster(width: u32, height: u32, pixel: [u8; 4]) -> PremultipliedImage {
        let data = (0..width * height).flat_map(|_| pixel).collect();
        PremultipliedImage::from_raw(width, height, data).unwrap()
    }

    fn style_image(data: Option<PremultipliedImage>) -> StyleImage {
        StyleImage {
            width: data.as_ref().map(|data| data.width()).unwrap_or(8),
            height: data.as_ref().map(|data| data.height()).unwrap_or(8),
            data,
            pixel_ratio: 1.0,
            version: 0,
            stretch_x: Vec::new(),
            stretch_y: Vec::new(),
            content: None,
            sdf: false,
            vector: false,
            has_render_callback: false,
        }
    }

    fn image_map(entries: Vec<(&str, StyleImage)>) -> StyleImageMap {
        entries
            .into_iter()
            .map(|(id, image)| (ImageVariant::new(id, 1.0, 1.0).key(), image))
            .collect()
    }

    #[test]
    fn empty_atlas_is_a_valid_texture() {
        let atlas = ImageAtlas::new(
            &StyleImageMap::new(),
            &StyleImageMap::new(),
            None,
            None,
        )
        .unwrap();

        assert_eq!(atlas.image.width(), 1);
        assert_eq!(atlas.image.height(), 1);
        assert!(atlas.content_descriptor.is_none());
    }

    #[test]
    fn caching_requires_a_version_lookup() {
        let icons = image_map(vec![("icon", style_image(Some(raster(2, 2, [9, 9, 9, 255]))))]);
        let versions = ImageVersionMap::new();

        let cached = ImageAtlas::new(&icons, &StyleImageMap::new(), None, Some(&versions)).unwrap();
        let uncached = ImageAtlas::new(&icons, &StyleImageMap::new(), None, None).unwrap();

        assert!(cached.content_descriptor.is_some());
        assert!(uncached.content_descriptor.is_none());
    }

    #[test]
    fn icon_is_blitted_inside_its_padding() {
        let icons = image_map(vec![(
            "icon",
            style_image(Some(raster(2, 2, [10, 20, 30, 255]))),
        )]);
        let atlas = ImageAtlas::new(&icons, &StyleImageMap::new(), None, None).unwrap();

        let position = atlas.icon_positions.values().next().unwrap();
        assert_eq!(position.padding, ICON_PADDING);
        assert_eq!(position.padded_rect.width(), 4);

        let [x, y] = position.tl();
        assert_eq!(atlas.image.pixel(x as u32, y as u32), [10, 20, 30, 255]);
        // Padding ring stays transparent for icons.
        let min = position.padded_rect.min();
        assert_eq!(atlas.image.pixel(min.x as u32, min.y as u32), [0, 0, 0, 0]);
    }

    #[test]
    fn equal_content_packs_to_identical_bytes() {
        let entries = vec![
            ("icon-a", style_image(Some(raster(3, 2, [1, 2, 3, 255])))),
            ("icon-b", style_image(Some(raster(5, 4, [4, 5, 6, 255])))),
            ("icon-c", style_image(Some(raster(2, 7, [7, 8, 9, 255])))),
        ];
        let mut reversed = entries.clone();
        reversed.reverse();
        let versions = ImageVersionMap::new();

        let first = ImageAtlas::new(
            &image_map(entries),
            &StyleImageMap::new(),
            None,
            Some(&versions),
        )
        .unwrap();
        let second = ImageAtlas::new(
            &image_map(reversed),
            &StyleImageMap::new(),
            None,
            Some(&versions),
        )
        .unwrap();

        assert_eq!(first.image, second.image);
        assert_eq!(
            first.content_descriptor.as_ref().unwrap().hash(),
            second.content_descriptor.as_ref().unwrap().hash()
        );
    }

    #[test]
    fn sdf_icons_get_premultiplied_white_rgb() {
        let mut sdf = style_image(Some(raster(2, 2, [10, 20, 30, 200])));
        sdf.sdf = true;
        let icons = image_map(vec![("sdf-icon", sdf)]);
        let atlas = ImageAtlas::new(&icons, &StyleImageMap::new(), None, None).unwrap();

        let position = atlas.icon_positions.values().next().unwrap();
        let [x, y] = position.tl();
        assert_eq!(atlas.image.pixel(x as u32, y as u32), [200, 200, 200, 200]);
    }

    #[test]
    fn lut_applies_to_patterns_but_not_icons() {
        // Table which maps every color to solid green.
        let table = vec![0, 255, 0].repeat(8);
        let lut = Lut::new(2, table).unwrap();

        let icons = image_map(vec![(
            "icon",
            style_image(Some(raster(2, 2, [255, 0, 0, 255]))),
        )]);
        let patterns = image_map(vec![(
            "pattern",
            style_image(Some(raster(2, 2, [255, 0, 0, 255]))),
        )]);
        let atlas = ImageAtlas::new(&icons, &patterns, Some(&lut), None).unwrap();

        let icon = atlas.icon_positions.values().next().unwrap();
        let [x, y] = icon.tl();
        assert_eq!(atlas.image.pixel(x as u32, y as u32), [255, 0, 0, 255]);

        let pattern = atlas.pattern_positions.values().next().unwrap();
        let [x, y] = pattern.tl();
        assert_eq!(atlas.image.pixel(x as u32, y as u32), [0, 255, 0, 255]);
    }

    #[test]
    fn pattern_padding_wraps_opposite_edges() {
        // 2x2 pattern with four distinct pixels.
        let data = PremultipliedImage::from_raw(
            2,
            2,
            vec![
                1, 0, 0, 255, /* */ 2, 0, 0, 255, //
                3, 0, 0, 255, /* */ 4, 0, 0, 255,
            ],
        )
        .unwrap();
        let patterns = image_map(vec![("pattern", style_image(Some(data)))]);
        let atlas = ImageAtlas::new(&StyleImageMap::new(), &patterns, None, None).unwrap();

        let position = atlas.pattern_positions.values().next().unwrap();
        assert_eq!(position.padding, PATTERN_PADDING);
        let [x, y] = position.tl().map(|v| v as u32);

        // Content.
        assert_eq!(atlas.image.pixel(x, y)[0], 1);
        assert_eq!(atlas.image.pixel(x + 1, y + 1)[0], 4);
        // One-pixel wrap band: above the top row sits the bottom row, left
        // of the first column sits the last column.
        assert_eq!(atlas.image.pixel(x, y - 1)[0], 3);
        assert_eq!(atlas.image.pixel(x - 1, y)[0], 2);
        assert_eq!(atlas.image.pixel(x, y + 2)[0], 1);
        assert_eq!(atlas.image.pixel(x + 2, y)[0], 1);
        // Wrapped corner.
        assert_eq!(atlas.image.pixel(x - 1, y - 1)[0], 4);
        // Outermost ring stays transparent.
        let min = position.padded_rect.min();
        assert_eq!(
            atlas.image.pixel(min.x as u32, min.y as u32),
            [0, 0, 0, 0]
        );
    }

    #[test]
    fn display_scale_prefers_variant_for_vector_images() {
        let mut vector = style_image(None);
        vector.vector = true;
        vector.width = 10;
        vector.height = 10;
        let key = ImageVariant::new("vector", 2.0, 2.0).key();
        let icons = StyleImageMap::from([(key.clone(), vector)]);
        let atlas = ImageAtlas::new(&icons, &StyleImageMap::new(), None, None).unwrap();

        let position = &atlas.icon_positions[&key];
        assert_eq!(position.scale.x, 2.0);
        assert_eq!(position.display_size(), [10.0, 10.0]);

        let mut bitmap = style_image(Some(raster(8, 8, [0, 0, 0, 255])));
        bitmap.pixel_ratio = 2.0;
        let icons = image_map(vec![("bitmap", bitmap)]);
        let atlas = ImageAtlas::new(&icons, &StyleImageMap::new(), None, None).unwrap();
        let position = atlas.icon_positions.values().next().unwrap();
        assert_eq!(position.display_size(), [4.0, 4.0]);
    }

    #[test]
    fn render_callback_ids_are_collected() {
        let mut image = style_image(Some(raster(2, 2, [0, 0, 0, 255])));
        image.has_render_callback = true;
        let icons = image_map(vec![("animated", image)]);
        let atlas = ImageAtlas::new(&icons, &StyleImageMap::new(), None, None).unwrap();

        assert_eq!(atlas.have_render_callbacks, vec!["animated".to_string()]);
    }

    #[test]
    fn patch_reuploads_only_changed_versions() {
        let icons = image_map(vec![("icon", style_image(Some(raster(2, 2, [1, 1, 1, 255]))))]);
        let mut atlas = ImageAtlas::new(&icons, &StyleImageMap::new(), None, None).unwrap();

        let mut updated = style_image(Some(raster(2, 2, [5, 5, 5, 255])));
        updated.version = 1;
        let mut manager = TestImageManager {
            images: StyleImageMap::from([("icon".to_string(), updated)]),
            updated: vec!["icon".to_string()],
            dispatched: Vec::new(),
        };

        let context = TestTextures::default();
        let texture = context.create_texture(&atlas.image, wgpu::TextureFormat::Rgba8UnormSrgb, false);

        atlas.patch_updated_images(&mut manager, &texture, &context, None);
        assert_eq!(context.updates.borrow().len(), 1);
        let ((x, y), (w, h)) = context.updates.borrow()[0];
        let position = atlas.icon_positions.values().next().unwrap();
        assert_eq!([x as u16, y as u16], position.tl());
        assert_eq!((w, h), (2, 2));
        assert_eq!(position.version, 1);

        // Versions now match, a second patch is a no-op.
        atlas.patch_updated_images(&mut manager, &texture, &context, None);
        assert_eq!(context.updates.borrow().len(), 1);
    }

    #[test]
    fn patch_drops_stale_render_callbacks() {
        let mut image = style_image(Some(raster(2, 2, [0, 0, 0, 255])));
        image.has_render_callback = true;
        let icons = image_map(vec![("gone", image)]);
        let mut atlas = ImageAtlas::new(&icons, &StyleImageMap::new(), None, None).unwrap();

        let mut manager = TestImageManager {
            images: StyleImageMap::new(),
            updated: Vec::new(),
            dispatched: Vec::new(),
        };
        let context = TestTextures::default();
        let texture = context.create_texture(&atlas.image, wgpu::TextureFormat::Rgba8UnormSrgb, false);

        atlas.patch_updated_images(&mut manager, &texture, &context, None);
        assert!(atlas.have_render_callbacks.is_empty());
        assert!(manager.dispatched.is_empty());
    }

    #[test]
    fn positions_for_reports_missing_keys() {
        let icons = image_map(vec![("icon", style_image(Some(raster(2, 2, [1, 1, 1, 255]))))]);
        let atlas = ImageAtlas::new(&icons, &StyleImageMap::new(), None, None).unwrap();

        let present = ImageVariant::new("icon", 1.0, 1.0).key();
        let missing = ImageVariant::new("other", 1.0, 1.0).key();

        assert!(atlas
            .positions_for([present.clone()].iter(), std::iter::empty())
            .is_some());
        assert!(atlas
            .positions_for([missing].iter(), std::iter::empty())
            .is_none());
    }
}
