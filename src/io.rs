// ============================================================================
// IMAGE FILE I/O: decode any supported input, encode 8-bit grayscale output
// ============================================================================

use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::io::{Limits, Reader};
use image::{ColorType, DynamicImage, GrayImage, ImageEncoder, ImageError, ImageOutputFormat};

/// Output formats for the filtered grayscale image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
    Tga,
    Tiff,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
            SaveFormat::Tiff => "tiff",
        }
    }

    /// Parse a format name or file extension (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpeg" | "jpg" => Some(SaveFormat::Jpeg),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            "tiff" | "tif" => Some(SaveFormat::Tiff),
            _ => None,
        }
    }

    /// Choose the format from an explicit `--format`, else the output file
    /// extension, else `fallback`.
    pub fn resolve(format_arg: Option<&str>, output: Option<&Path>, fallback: SaveFormat) -> Self {
        if let Some(f) = format_arg.and_then(SaveFormat::from_name) {
            return f;
        }
        output
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .and_then(SaveFormat::from_name)
            .unwrap_or(fallback)
    }
}

/// Decode an image file; the container format is detected from its content.
pub fn load_image(path: &Path) -> Result<DynamicImage, ImageError> {
    Reader::open(path)?.with_guessed_format()?.decode()
}

/// Decode an in-memory image (the client's reply).
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    image::load_from_memory(bytes)
}

/// Decode an in-memory image whose width and height must both stay within
/// `max_dimension`. The header is checked before any pixel buffer is allocated.
pub fn decode_bytes_limited(bytes: &[u8], max_dimension: u32) -> Result<DynamicImage, ImageError> {
    let mut reader = Reader::new(Cursor::new(bytes)).with_guessed_format()?;
    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    reader.limits(limits);
    reader.decode()
}

/// Stream `image` as PNG into any writer (no seeking needed).
pub fn encode_png<W: Write>(image: &GrayImage, writer: W) -> Result<(), ImageError> {
    PngEncoder::new(writer).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::L8,
    )
}

pub fn encode_and_write(
    image: &GrayImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            encode_png(image, &mut writer)?;
        }
        SaveFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ColorType::L8,
            )?;
        }
        SaveFormat::Bmp => {
            BmpEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ColorType::L8,
            )?;
        }
        SaveFormat::Tga => {
            DynamicImage::ImageLuma8(image.clone()).write_to(&mut writer, ImageOutputFormat::Tga)?;
        }
        SaveFormat::Tiff => {
            DynamicImage::ImageLuma8(image.clone()).write_to(&mut writer, ImageOutputFormat::Tiff)?;
        }
    }

    writer.flush()?;
    Ok(())
}
