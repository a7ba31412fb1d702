use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::gpu::TextureError;

/// Decoded pixels, tightly packed rows of `channels` bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Solid RGBA image, handy for placeholders and tests.
    pub fn solid_rgba(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            channels: 4,
            pixels,
        }
    }
}

/// Turns an asset identifier into pixels.
pub trait ImageDecoder {
    fn decode(&self, asset: &str) -> Result<PixelBuffer, TextureError>;
}

/// Reads assets from a directory on disk through the `image` crate.
#[derive(Clone, Debug)]
pub struct FsImageDecoder {
    root: PathBuf,
    flip_vertically: bool,
}

impl FsImageDecoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            flip_vertically: true,
        }
    }

    /// Keep rows in file order instead of flipping them for GL's bottom-left
    /// origin.
    pub fn without_flip(mut self) -> Self {
        self.flip_vertically = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, asset: &str) -> PathBuf {
        self.root.join(asset)
    }
}

impl ImageDecoder for FsImageDecoder {
    fn decode(&self, asset: &str) -> Result<PixelBuffer, TextureError> {
        let path = self.resolve(asset);
        let image = image::open(&path).map_err(|err| TextureError::Decode {
            asset: asset.to_owned(),
            message: format!("{}: {err}", path.display()),
        })?;
        let image = if self.flip_vertically {
            image.flipv()
        } else {
            image
        };
        Ok(into_pixel_buffer(image))
    }
}

/// Keeps 8-bit grey, RGB and RGBA layouts as they are; everything else is
/// converted to RGBA.
fn into_pixel_buffer(image: DynamicImage) -> PixelBuffer {
    let (width, height) = (image.width(), image.height());
    let (channels, pixels) = match image {
        DynamicImage::ImageLuma8(buffer) => (1, buffer.into_raw()),
        DynamicImage::ImageRgb8(buffer) => (3, buffer.into_raw()),
        DynamicImage::ImageRgba8(buffer) => (4, buffer.into_raw()),
        other => (4, other.to_rgba8().into_raw()),
    };
    PixelBuffer {
        width,
        height,
        channels,
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn decodes_png_keeping_channel_count() {
        let dir = TempDir::new().expect("tempdir");
        let textures = dir.path().join("Textures");
        std::fs::create_dir_all(&textures).expect("create dir");
        let mut image = RgbaImage::new(2, 3);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image
            .save_with_format(textures.join("snow.png"), ImageFormat::Png)
            .expect("write png");

        let decoder = FsImageDecoder::new(dir.path());
        let buffer = decoder.decode("Textures/snow.png").expect("decode");
        assert_eq!((buffer.width, buffer.height, buffer.channels), (2, 3, 4));
        assert_eq!(buffer.pixels.len(), 24);
        // Top-left of the file ends up in the last row after the flip.
        assert_eq!(&buffer.pixels[16..20], &[255, 0, 0, 255]);

        let unflipped = decoder.clone().without_flip();
        let buffer = unflipped.decode("Textures/snow.png").expect("decode");
        assert_eq!(&buffer.pixels[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn greyscale_stays_single_channel() {
        let dir = TempDir::new().expect("tempdir");
        let image = GrayImage::from_pixel(4, 4, Luma([7]));
        image
            .save_with_format(dir.path().join("grey.png"), ImageFormat::Png)
            .expect("write png");
        let buffer = FsImageDecoder::new(dir.path())
            .decode("grey.png")
            .expect("decode");
        assert_eq!(buffer.channels, 1);
        assert_eq!(buffer.pixels, vec![7; 16]);
    }

    #[test]
    fn missing_asset_is_a_decode_error() {
        let dir = TempDir::new().expect("tempdir");
        let err = FsImageDecoder::new(dir.path())
            .decode("Textures/missing.png")
            .unwrap_err();
        assert!(matches!(err, TextureError::Decode { ref asset, .. } if asset == "Textures/missing.png"));
    }

    #[test]
    fn solid_buffer_has_expected_length() {
        let buffer = PixelBuffer::solid_rgba(3, 2, [1, 2, 3, 4]);
        assert_eq!(buffer.pixels.len(), 24);
        assert_eq!(&buffer.pixels[4..8], &[1, 2, 3, 4]);
    }
}
