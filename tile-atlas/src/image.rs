//! Raster pixel storage and blitting primitives used by the atlas.

use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

/// An RGBA8 raster with premultiplied alpha.
///
/// Freshly allocated rasters are fully transparent. Pixel copies between
/// rasters clamp to the bounds of both images.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremultipliedImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Debug for PremultipliedImage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PremultipliedImage({}x{})", self.width, self.height)
    }
}

impl PremultipliedImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Wraps an existing RGBA8 byte buffer. Returns `None` if the buffer
    /// length does not match `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    fn put_pixel(&mut self, x: u32, y: u32, pixel: [u8; 4]) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 4].copy_from_slice(&pixel);
    }

    /// Copies a `size` region from `src` at `src_pt` into `self` at `dst_pt`.
    ///
    /// The region is clamped to the bounds of both rasters. `lut` is applied
    /// to the RGB channels of every copied pixel. `override_rgb` replaces the
    /// RGB channels with premultiplied white, leaving only the alpha channel
    /// meaningful.
    pub fn copy_from(
        &mut self,
        src: &PremultipliedImage,
        src_pt: (u32, u32),
        dst_pt: (u32, u32),
        size: (u32, u32),
        lut: Option<&Lut>,
        override_rgb: bool,
    ) {
        let width = size
            .0
            .min(src.width.saturating_sub(src_pt.0))
            .min(self.width.saturating_sub(dst_pt.0));
        let height = size
            .1
            .min(src.height.saturating_sub(src_pt.1))
            .min(self.height.saturating_sub(dst_pt.1));

        for y in 0..height {
            for x in 0..width {
                let mut pixel = src.pixel(src_pt.0 + x, src_pt.1 + y);
                if let Some(lut) = lut {
                    pixel = lut.apply(pixel);
                }
                if override_rgb {
                    let alpha = pixel[3];
                    pixel = [alpha, alpha, alpha, alpha];
                }
                self.put_pixel(dst_pt.0 + x, dst_pt.1 + y, pixel);
            }
        }
    }
}

impl From<image::RgbaImage> for PremultipliedImage {
    fn from(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.into_raw();
        for pixel in data.chunks_exact_mut(4) {
            let alpha = pixel[3] as u16;
            pixel[0] = (pixel[0] as u16 * alpha / 255) as u8;
            pixel[1] = (pixel[1] as u16 * alpha / 255) as u8;
            pixel[2] = (pixel[2] as u16 * alpha / 255) as u8;
        }
        Self {
            width,
            height,
            data,
        }
    }
}

/// A color lookup table applied to pattern pixels while they are blitted
/// into the atlas. Icon color correction happens later on the GPU, so icons
/// never go through the table.
///
/// The table holds `size³` RGB triplets with the red coordinate varying
/// fastest. Lookup is nearest-neighbor.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lut {
    size: u32,
    data: Vec<u8>,
}

impl Debug for Lut {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Lut({}x{0}x{0})", self.size)
    }
}

impl Lut {
    /// Returns `None` if the table length does not match `size³ * 3`.
    pub fn new(size: u32, data: Vec<u8>) -> Option<Self> {
        if size == 0 || data.len() != (size as usize).pow(3) * 3 {
            return None;
        }
        Some(Self { size, data })
    }

    /// The raw table bytes. Folded into content hashes so that atlases built
    /// under different tables never collide.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn index(&self, channel: u8) -> usize {
        (channel as usize * (self.size as usize - 1) + 127) / 255
    }

    pub fn apply(&self, pixel: [u8; 4]) -> [u8; 4] {
        let size = self.size as usize;
        let i = ((self.index(pixel[2]) * size + self.index(pixel[1])) * size
            + self.index(pixel[0]))
            * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2], pixel[3]]
    }
}
