//! Image reader and writer.
//!
//! Images are decoded fully into memory before `read_image` returns, so the
//! source file can be removed as soon as the call completes.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use super::LoaderConfig;
use crate::error::AnyloadError;

/// Target color mode for `mode`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Luma,
    LumaAlpha,
    Rgb,
    Rgba,
}

impl ColorMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "L" | "GRAY" | "GREY" => Some(ColorMode::Luma),
            "LA" => Some(ColorMode::LumaAlpha),
            "RGB" => Some(ColorMode::Rgb),
            "RGBA" => Some(ColorMode::Rgba),
            _ => None,
        }
    }

    fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            ColorMode::Luma => DynamicImage::ImageLuma8(image.to_luma8()),
            ColorMode::LumaAlpha => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
            ColorMode::Rgb => DynamicImage::ImageRgb8(image.to_rgb8()),
            ColorMode::Rgba => DynamicImage::ImageRgba8(image.to_rgba8()),
        }
    }
}

/// Options for reading images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageReadOptions {
    pub mode: Option<ColorMode>,
    pub resize: Option<(u32, u32)>,
}

impl ImageReadOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("image");
        let mode = match reader.string("mode")? {
            None => None,
            Some(name) => Some(ColorMode::from_name(&name).ok_or_else(|| {
                AnyloadError::InvalidOption {
                    loader: "image",
                    key: "mode".to_string(),
                    message: format!("unknown color mode '{name}' (supported: L, LA, RGB, RGBA)"),
                }
            })?),
        };
        let resize = reader.u32_pair("resize")?;
        reader.finish();
        Ok(Self { mode, resize })
    }
}

/// Options for writing images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageWriteOptions {
    /// JPEG quality, 1-100.
    pub quality: Option<u8>,
}

impl ImageWriteOptions {
    pub fn from_config(config: &LoaderConfig) -> Result<Self, AnyloadError> {
        let mut reader = config.reader("image");
        let quality = match reader.u32("quality")? {
            None => None,
            Some(q @ 1..=100) => Some(q as u8),
            Some(other) => {
                return Err(AnyloadError::InvalidOption {
                    loader: "image",
                    key: "quality".to_string(),
                    message: format!("expected 1-100, got {other}"),
                })
            }
        };
        reader.finish();
        Ok(Self { quality })
    }
}

/// Decodes an image file, applying color conversion and resize.
pub fn read_image(path: &Path, options: &ImageReadOptions) -> Result<DynamicImage, AnyloadError> {
    let mut image = image::open(path).map_err(|source| AnyloadError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(mode) = options.mode {
        image = mode.apply(image);
    }
    if let Some((width, height)) = options.resize {
        image = image.resize_exact(width, height, FilterType::Triangle);
    }
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "decoded image"
    );
    Ok(image)
}

/// Encodes an image; the container is chosen from the path's extension.
pub fn write_image(
    path: &Path,
    image: &DynamicImage,
    options: &ImageWriteOptions,
) -> Result<(), AnyloadError> {
    let encode_error = |source| AnyloadError::ImageEncode {
        path: path.to_path_buf(),
        source,
    };

    let format = ImageFormat::from_path(path).map_err(encode_error)?;
    if format == ImageFormat::Jpeg {
        // JPEG has no alpha channel.
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let file = File::create(path).map_err(AnyloadError::Io)?;
        let mut writer = BufWriter::new(file);
        let encoder = JpegEncoder::new_with_quality(&mut writer, options.quality.unwrap_or(75));
        return rgb.write_with_encoder(encoder).map_err(encode_error);
    }

    image.save_with_format(path, format).map_err(encode_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 10) as u8, (y * 10) as u8, 128])
        }))
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("g.png");
        let original = gradient(8, 4);
        write_image(&path, &original, &ImageWriteOptions::default()).expect("write");
        let back = read_image(&path, &ImageReadOptions::default()).expect("read");
        assert_eq!(back.to_rgb8(), original.to_rgb8());
    }

    #[test]
    fn mode_and_resize_apply_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("g.bmp");
        write_image(&path, &gradient(8, 4), &ImageWriteOptions::default()).expect("write");
        let options = ImageReadOptions {
            mode: Some(ColorMode::Luma),
            resize: Some((4, 2)),
        };
        let image = read_image(&path, &options).expect("read");
        assert_eq!(image.dimensions(), (4, 2));
        assert!(matches!(image, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn jpeg_accepts_alpha_images() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.jpg");
        let rgba = DynamicImage::new_rgba8(4, 4);
        let options = ImageWriteOptions { quality: Some(90) };
        write_image(&path, &rgba, &options).expect("write");
        assert_eq!(read_image(&path, &ImageReadOptions::default()).expect("read").dimensions(), (4, 4));
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        let config = LoaderConfig::new().with("quality", 0);
        assert!(ImageWriteOptions::from_config(&config).is_err());
    }
}
