use std::collections::HashMap;

use super::driver::{DriverError, GpuDriver, PixelFormat, TextureHandle, TextureUpload, WrapMode};
use crate::assets::PixelBuffer;

/// A resident texture and its dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to decode {asset}: {message}")]
    Decode { asset: String, message: String },
    #[error("image has zero width or height")]
    EmptyImage,
    #[error("pixel buffer holds {actual} bytes, {expected} needed for {width}x{height}")]
    BufferTooSmall {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Creates a texture object from decoded pixels and uploads it.
///
/// The texture is deleted again if the upload does not go through, so an
/// error never leaves a half-initialised object behind.
pub fn upload<D>(
    driver: &mut D,
    image: &PixelBuffer,
    wrap: WrapMode,
) -> Result<Texture, TextureError>
where
    D: GpuDriver + ?Sized,
{
    if image.width == 0 || image.height == 0 {
        return Err(TextureError::EmptyImage);
    }
    if !matches!(image.channels, 1 | 3 | 4) {
        tracing::warn!(
            channels = image.channels,
            "unsupported channel count; uploading as RGB"
        );
    }
    let format = PixelFormat::from_channels(image.channels);
    let expected = image.width as usize * image.height as usize * format.bytes_per_pixel();
    if image.pixels.len() < expected {
        return Err(TextureError::BufferTooSmall {
            width: image.width,
            height: image.height,
            expected,
            actual: image.pixels.len(),
        });
    }

    let handle = driver.create_texture()?;
    let upload = TextureUpload {
        width: image.width,
        height: image.height,
        format,
        wrap,
        pixels: &image.pixels[..expected],
    };
    if let Err(err) = driver.upload_texture(handle, &upload) {
        driver.delete_texture(handle);
        return Err(err.into());
    }

    Ok(Texture {
        handle,
        width: image.width,
        height: image.height,
    })
}

/// Textures keyed by asset identifier. A slot, once filled, is never
/// reloaded until [`TextureCache::release`].
#[derive(Debug, Default)]
pub struct TextureCache {
    slots: HashMap<String, Slot>,
    order: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    texture: Texture,
    wrap: WrapMode,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads `image` into the slot for `asset`, or returns the texture
    /// already resident there without touching the driver.
    pub fn load<D>(
        &mut self,
        driver: &mut D,
        asset: &str,
        image: &PixelBuffer,
        wrap: WrapMode,
    ) -> Result<Texture, TextureError>
    where
        D: GpuDriver + ?Sized,
    {
        self.load_with(driver, asset, wrap, || Ok(image.clone()))
    }

    /// Same as [`TextureCache::load`], with decoding deferred until the slot
    /// is known to be empty. A resident texture keeps the wrap mode it was
    /// first uploaded with.
    pub fn load_with<D, F>(
        &mut self,
        driver: &mut D,
        asset: &str,
        wrap: WrapMode,
        decode: F,
    ) -> Result<Texture, TextureError>
    where
        D: GpuDriver + ?Sized,
        F: FnOnce() -> Result<PixelBuffer, TextureError>,
    {
        if let Some(slot) = self.slots.get(asset) {
            if slot.wrap != wrap {
                tracing::warn!(
                    asset,
                    resident = ?slot.wrap,
                    requested = ?wrap,
                    "texture already resident with a different wrap mode; keeping it"
                );
            } else {
                tracing::trace!(asset, "texture already resident");
            }
            return Ok(slot.texture);
        }
        let image = decode()?;
        let texture = upload(driver, &image, wrap)?;
        tracing::debug!(
            asset,
            handle = texture.handle.0,
            width = texture.width,
            height = texture.height,
            channels = image.channels,
            "texture uploaded"
        );
        self.slots.insert(asset.to_owned(), Slot { texture, wrap });
        self.order.push(asset.to_owned());
        Ok(texture)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn release<D>(&mut self, driver: &mut D)
    where
        D: GpuDriver + ?Sized,
    {
        for asset in self.order.drain(..).rev() {
            if let Some(slot) = self.slots.remove(&asset) {
                driver.delete_texture(slot.texture.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDriver;

    fn rgba(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer {
            width,
            height,
            channels: 4,
            pixels: vec![0xff; (width * height * 4) as usize],
        }
    }

    #[test]
    fn second_load_of_a_slot_is_a_no_op() {
        let mut driver = HeadlessDriver::standalone();
        let probe = driver.probe();
        let mut cache = TextureCache::new();
        let image = rgba(16, 16);

        let first = cache
            .load(&mut driver, "Textures/snow.png", &image, WrapMode::ClampToEdge)
            .expect("first load");
        assert_eq!((first.width, first.height), (16, 16));
        assert!(first.handle.is_valid());

        let mut decoded = false;
        let second = cache
            .load_with(&mut driver, "Textures/snow.png", WrapMode::ClampToEdge, || {
                decoded = true;
                Ok(rgba(16, 16))
            })
            .expect("second load");
        assert_eq!(second, first);
        assert!(!decoded);
        assert_eq!(probe.texture_allocations(), 1);
        assert_eq!(probe.texture_uploads(), 1);
    }

    #[test]
    fn shared_slot_keeps_first_wrap_mode() {
        let mut driver = HeadlessDriver::standalone();
        let probe = driver.probe();
        let mut cache = TextureCache::new();

        let tiled = cache
            .load(&mut driver, "Textures/snow.png", &rgba(4, 4), WrapMode::Repeat)
            .expect("repeat load");
        let clamped = cache
            .load(&mut driver, "Textures/snow.png", &rgba(4, 4), WrapMode::ClampToEdge)
            .expect("clamp load");

        assert_eq!(clamped, tiled);
        assert_eq!(probe.texture_uploads(), 1);
        assert_eq!(
            probe.texture_info(tiled.handle),
            Some((4, 4, WrapMode::Repeat))
        );
    }

    #[test]
    fn short_buffers_are_rejected_before_upload() {
        let mut driver = HeadlessDriver::standalone();
        let probe = driver.probe();
        let image = PixelBuffer {
            width: 4,
            height: 4,
            channels: 2,
            pixels: vec![0; 32],
        };
        let err = upload(&mut driver, &image, WrapMode::ClampToEdge).unwrap_err();
        assert!(matches!(
            err,
            TextureError::BufferTooSmall {
                expected: 48,
                actual: 32,
                ..
            }
        ));
        assert_eq!(probe.texture_allocations(), 0);
    }

    #[test]
    fn empty_images_are_rejected() {
        let mut driver = HeadlessDriver::standalone();
        let image = PixelBuffer {
            width: 0,
            height: 8,
            channels: 4,
            pixels: Vec::new(),
        };
        assert!(matches!(
            upload(&mut driver, &image, WrapMode::ClampToEdge),
            Err(TextureError::EmptyImage)
        ));
    }

    #[test]
    fn failed_upload_deletes_texture() {
        let mut driver = HeadlessDriver::standalone();
        let probe = driver.probe();
        probe.force_upload_failure(true);
        let err = upload(&mut driver, &rgba(2, 2), WrapMode::Repeat).unwrap_err();
        assert!(matches!(err, TextureError::Driver(_)));
        assert_eq!(probe.live_textures(), 0);
    }

    #[test]
    fn release_frees_every_slot() {
        let mut driver = HeadlessDriver::standalone();
        let probe = driver.probe();
        let mut cache = TextureCache::new();
        cache
            .load(&mut driver, "a", &rgba(1, 1), WrapMode::ClampToEdge)
            .expect("a");
        cache
            .load(&mut driver, "b", &rgba(1, 1), WrapMode::Repeat)
            .expect("b");
        assert_eq!(probe.live_textures(), 2);
        cache.release(&mut driver);
        assert!(cache.is_empty());
        assert_eq!(probe.live_textures(), 0);
    }
}
