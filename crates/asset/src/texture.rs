//! Texture loading and data structures.
//! Decodes BMP/PNG into tightly packed RGBA8 ready for GPU upload.

use std::path::Path;

use anyhow::{Context, Result, bail};

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Supported texture formats.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgba8 => 4,
        }
    }
}

impl TextureData {
    /// Wrap raw RGBA8 pixels, checking the buffer matches the dimensions.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("Texture has zero size ({width}x{height})");
        }
        let bpp = TextureFormat::Rgba8.bytes_per_pixel() as usize;
        let expected = width as usize * height as usize * bpp;
        if data.len() != expected {
            bail!(
                "RGBA8 texture {width}x{height} needs {expected} bytes, got {}",
                data.len()
            );
        }
        Ok(Self {
            data,
            width,
            height,
            format: TextureFormat::Rgba8,
        })
    }

    /// Load and decode an image file (BMP or PNG).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        let img = image::open(path).with_context(|| format!("Failed to open image {path:?}"))?;
        let tex = Self::from_image(img)?;

        log::info!(
            "Loaded texture {}x{} with {} bytes",
            tex.width,
            tex.height,
            tex.data.len()
        );
        Ok(tex)
    }

    /// Decode an in-memory image; the format is sniffed from its header.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).context("Failed to decode image")?;
        Self::from_image(img)
    }

    fn from_image(img: image::DynamicImage) -> Result<Self> {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    /// Get the number of bytes per pixel for the format.
    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.bytes_per_pixel()
    }

    /// Bytes in one tightly packed row.
    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.bytes_per_pixel()
    }

    /// Check if the texture data is valid.
    pub fn is_valid(&self) -> bool {
        let expected_size = (self.bytes_per_row() * self.height) as usize;
        self.data.len() == expected_size && self.width > 0 && self.height > 0
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;

    const UVMAP_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets/uvmap.bmp");

    fn encode(img: image::DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, format).expect("encode test image");
        bytes.into_inner()
    }

    #[test]
    fn bmp_decodes_to_rgba8() {
        let img = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8 * 80, y as u8 * 120, 7]));
        let tex = TextureData::decode(&encode(img.into(), ImageFormat::Bmp)).expect("decode bmp");
        assert_eq!((tex.width, tex.height), (3, 2));
        assert_eq!(tex.data.len(), 3 * 2 * 4);
        assert!(tex.is_valid());
        // Pixel (2, 1), alpha filled in as opaque.
        let at = ((1 * 3 + 2) * 4) as usize;
        assert_eq!(&tex.data[at..at + 4], &[160, 120, 7, 255]);
    }

    #[test]
    fn png_keeps_alpha() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 40]));
        let tex = TextureData::decode(&encode(img.into(), ImageFormat::Png)).expect("decode png");
        assert_eq!(tex.data.len(), 4 * 4 * 4);
        assert_eq!(&tex.data[..4], &[10, 20, 30, 40]);
    }

    #[test]
    fn bundled_uvmap_loads() {
        let tex = TextureData::load(UVMAP_PATH).expect("load uvmap");
        assert!(tex.is_valid());
        assert_eq!(tex.data.len(), (tex.width * tex.height * 4) as usize);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(TextureData::decode(b"definitely not an image").is_err());
        assert!(TextureData::load("missing/uvmap.bmp").is_err());
    }

    #[test]
    fn size_mismatch_is_rejected() {
        assert!(TextureData::from_rgba8(2, 2, vec![0; 15]).is_err());
        assert!(TextureData::from_rgba8(0, 2, Vec::new()).is_err());
        assert!(TextureData::from_rgba8(2, 2, vec![0; 16]).is_ok());
    }
}
