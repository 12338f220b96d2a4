//! GPU texture collaborator.
//!
//! The cache is generic over [`TextureContext`] so that worker-side cache
//! instances and tests never need a graphics device. The wgpu
//! implementation lives behind the same seam.

use crate::image::PremultipliedImage;

/// A resident GPU texture owned by the atlas cache.
pub trait AtlasTexture {
    /// Releases the GPU resources behind this texture. Idempotent.
    fn destroy(&self);
}

/// Creates and updates atlas textures on a graphics device.
pub trait TextureContext {
    type Texture: AtlasTexture;

    fn create_texture(
        &self,
        image: &PremultipliedImage,
        format: wgpu::TextureFormat,
        use_mipmap: bool,
    ) -> Self::Texture;

    /// Re-uploads `image` into the sub-rectangle at `origin`.
    fn update_texture(
        &self,
        texture: &Self::Texture,
        image: &PremultipliedImage,
        origin: (u32, u32),
    );
}

pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: wgpu::Extent3d,
}

impl AtlasTexture for Texture {
    fn destroy(&self) {
        self.texture.destroy();
    }
}

/// Device and queue pair performing the actual texture uploads.
pub struct WgpuTextures {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

impl TextureContext for WgpuTextures {
    type Texture = Texture;

    fn create_texture(
        &self,
        image: &PremultipliedImage,
        format: wgpu::TextureFormat,
        use_mipmap: bool,
    ) -> Texture {
        let size = wgpu::Extent3d {
            width: image.width(),
            height: image.height(),
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas texture"),
            size,
            mip_level_count: if use_mipmap {
                mip_level_count(image.width(), image.height())
            } else {
                1
            },
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // Only the base level is written here; the renderer regenerates the
        // mip chain after uploads.
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            image.data(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width()),
                rows_per_image: Some(image.height()),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Texture {
            texture,
            view,
            size,
        }
    }

    fn update_texture(
        &self,
        texture: &Texture,
        image: &PremultipliedImage,
        origin: (u32, u32),
    ) {
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                aspect: wgpu::TextureAspect::All,
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: origin.0,
                    y: origin.1,
                    z: 0,
                },
            },
            image.data(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width()),
                rows_per_image: Some(image.height()),
            },
            wgpu::Extent3d {
                width: image.width(),
                height: image.height(),
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Texture context for cache instances which never touch a device, e.g. the
/// worker-side cache used while building atlases off the render thread.
pub struct NopTextures;

impl AtlasTexture for () {
    fn destroy(&self) {}
}

impl TextureContext for NopTextures {
    type Texture = ();

    fn create_texture(
        &self,
        _image: &PremultipliedImage,
        _format: wgpu::TextureFormat,
        _use_mipmap: bool,
    ) {
    }

    fn update_texture(&self, _texture: &(), _image: &PremultipliedImage, _origin: (u32, u32)) {}
}
