use image::{DynamicImage, ImageError, ImageOutputFormat, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::canvas::Surface;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ImageIoError {
    Io(std::io::Error),
    Image(ImageError),
    UnsupportedFormat(String),
}

impl std::fmt::Display for ImageIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageIoError::Io(e) => write!(f, "I/O error: {}", e),
            ImageIoError::Image(e) => write!(f, "Image error: {}", e),
            ImageIoError::UnsupportedFormat(ext) => write!(f, "Unsupported output format '{}'", ext),
        }
    }
}

impl std::error::Error for ImageIoError {}

impl From<std::io::Error> for ImageIoError {
    fn from(e: std::io::Error) -> Self {
        ImageIoError::Io(e)
    }
}

impl From<ImageError> for ImageIoError {
    fn from(e: ImageError) -> Self {
        ImageIoError::Image(e)
    }
}

// ============================================================================
// DECODING — the image service behind paste commands and backdrops
// ============================================================================

/// Decode an in-memory encoded image (format sniffed from the bytes).
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ImageIoError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Load any raster format the `image` crate can sniff, as RGBA8.
pub fn load_image(path: &Path) -> Result<RgbaImage, ImageIoError> {
    let reader = image::io::Reader::open(path)?.with_guessed_format()?;
    Ok(reader.decode()?.to_rgba8())
}

// ============================================================================
// ENCODING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Bmp,
    Tga,
    Ico,
    Tiff,
}

impl SaveFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            "ico" => Some(SaveFormat::Ico),
            "tif" | "tiff" => Some(SaveFormat::Tiff),
            _ => None,
        }
    }

    /// Format implied by `path`'s extension; PNG when there is none.
    pub fn from_path(path: &Path) -> Result<Self, ImageIoError> {
        match path.extension().and_then(|e| e.to_str()) {
            None => Ok(SaveFormat::Png),
            Some(ext) => {
                Self::from_extension(ext).ok_or_else(|| ImageIoError::UnsupportedFormat(ext.to_string()))
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
            SaveFormat::Ico => "ico",
            SaveFormat::Tiff => "tiff",
        }
    }
}

/// Encode `image` as `format` into `path`. JPEG drops alpha; ICO is scaled
/// down to fit 256×256.
pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageIoError> {
    let mut writer = BufWriter::new(File::create(path)?);

    match format {
        SaveFormat::Png => {
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut writer, ImageOutputFormat::Png)?
        }
        SaveFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            DynamicImage::ImageRgb8(rgb).write_to(&mut writer, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))?
        }
        SaveFormat::Bmp => {
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut writer, ImageOutputFormat::Bmp)?
        }
        SaveFormat::Tga => {
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut writer, ImageOutputFormat::Tga)?
        }
        SaveFormat::Tiff => {
            DynamicImage::ImageRgba8(image.clone()).write_to(&mut writer, ImageOutputFormat::Tiff)?
        }
        SaveFormat::Ico => {
            let dyn_img = if image.width() > 256 || image.height() > 256 {
                let scale = 256.0 / image.width().max(image.height()) as f32;
                let new_w = ((image.width() as f32 * scale) as u32).max(1);
                let new_h = ((image.height() as f32 * scale) as u32).max(1);
                DynamicImage::ImageRgba8(image::imageops::resize(
                    image,
                    new_w,
                    new_h,
                    image::imageops::FilterType::Lanczos3,
                ))
            } else {
                DynamicImage::ImageRgba8(image.clone())
            };
            dyn_img.write_to(&mut writer, ImageOutputFormat::Ico)?
        }
    }
    Ok(())
}

/// Write the surface with the format implied by `path`.
pub fn save_surface(surface: &Surface, path: &Path) -> Result<(), ImageIoError> {
    let format = SaveFormat::from_path(path)?;
    encode_and_write(surface.image(), path, format, 90)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Position;
    use image::Rgba;

    fn scratch_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("pixelsides-io-{}-{}", tag, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn formats_follow_extensions() {
        assert_eq!(SaveFormat::from_path(Path::new("a.PNG")).unwrap(), SaveFormat::Png);
        assert_eq!(SaveFormat::from_path(Path::new("a.jpeg")).unwrap(), SaveFormat::Jpeg);
        assert_eq!(SaveFormat::from_path(Path::new("noext")).unwrap(), SaveFormat::Png);
        assert!(matches!(
            SaveFormat::from_path(Path::new("a.xyz")),
            Err(ImageIoError::UnsupportedFormat(ext)) if ext == "xyz"
        ));
    }

    #[test]
    fn png_keeps_pixels_exactly() {
        let dir = scratch_dir("png");
        let path = dir.join("out.png");
        let mut surface = Surface::new(3, 2);
        surface.set_pixel(Position::new(2, 1), Rgba([10, 20, 30, 40]));
        save_surface(&surface, &path).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.dimensions(), (3, 2));
        assert_eq!(*loaded.get_pixel(2, 1), Rgba([10, 20, 30, 40]));
        assert_eq!(*loaded.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(decode_image(b"not an image"), Err(ImageIoError::Image(_))));
    }

    #[test]
    fn missing_input_is_io_error() {
        assert!(matches!(
            load_image(Path::new("/no/such/dir/in.png")),
            Err(ImageIoError::Io(_))
        ));
    }
}
