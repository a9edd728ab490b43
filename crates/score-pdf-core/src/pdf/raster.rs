//! Raster page images prepared for embedding as PDF image XObjects.

use std::path::Path;

use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageFormat, ImageReader, Rgb, RgbImage};
use lopdf::{Dictionary, Object, Stream};

use crate::error::{Error, Result};

/// How the pixel data is stored in the PDF stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    /// Original JPEG bytes, decoded by the viewer (`DCTDecode`)
    Jpeg,
    /// Uncompressed 8-bit samples, Flate-compressed when the document is saved
    Raw,
}

/// A decoded (or pass-through) page image.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    pub color_space: &'static str,
    pub encoding: ImageEncoding,
    pub data: Vec<u8>,
}

impl PageImage {
    /// Load an image file.
    ///
    /// Grey and RGB JPEGs are embedded unchanged. Everything else is decoded,
    /// with transparency flattened onto white.
    pub fn load(path: &Path) -> Result<Self> {
        let fail = |reason: String| Error::ImageDecode {
            path: path.to_path_buf(),
            reason,
        };

        let reader = ImageReader::open(path)
            .map_err(|e| fail(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| fail(e.to_string()))?;

        if reader.format() == Some(ImageFormat::Jpeg) {
            if let Some(image) = Self::jpeg_passthrough(path).map_err(fail)? {
                return Ok(image);
            }
        }

        let decoded = reader.decode().map_err(|e| fail(e.to_string()))?;
        Ok(Self::from_decoded(&decoded))
    }

    /// Keep the JPEG stream as is when its colour model maps onto DeviceGray
    /// or DeviceRGB; `None` for anything else (CMYK, 16-bit).
    fn jpeg_passthrough(path: &Path) -> std::result::Result<Option<Self>, String> {
        let decoder = ImageReader::open(path)
            .and_then(ImageReader::with_guessed_format)
            .map_err(|e| e.to_string())?
            .into_decoder()
            .map_err(|e| e.to_string())?;

        let (width, height) = decoder.dimensions();
        let color_space = match decoder.original_color_type() {
            ExtendedColorType::L8 => "DeviceGray",
            ExtendedColorType::Rgb8 => "DeviceRGB",
            _ => return Ok(None),
        };

        let data = std::fs::read(path).map_err(|e| e.to_string())?;
        Ok(Some(Self {
            width,
            height,
            color_space,
            encoding: ImageEncoding::Jpeg,
            data,
        }))
    }

    /// Convert decoded pixels to 8-bit grey (opaque grey input) or RGB.
    pub fn from_decoded(image: &DynamicImage) -> Self {
        let color = image.color();

        if !color.has_color() && !color.has_alpha() {
            let luma = image.to_luma8();
            return Self {
                width: luma.width(),
                height: luma.height(),
                color_space: "DeviceGray",
                encoding: ImageEncoding::Raw,
                data: luma.into_raw(),
            };
        }

        let rgb = if color.has_alpha() {
            flatten_onto_white(image)
        } else {
            image.to_rgb8()
        };

        Self {
            width: rgb.width(),
            height: rgb.height(),
            color_space: "DeviceRGB",
            encoding: ImageEncoding::Raw,
            data: rgb.into_raw(),
        }
    }

    /// Build the image XObject stream.
    pub fn into_stream(self) -> Stream {
        let mut dict = Dictionary::from_iter([
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(i64::from(self.width))),
            ("Height", Object::Integer(i64::from(self.height))),
            ("ColorSpace", Object::Name(self.color_space.as_bytes().to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
        ]);

        match self.encoding {
            ImageEncoding::Jpeg => {
                dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
                Stream::new(dict, self.data).with_compression(false)
            }
            ImageEncoding::Raw => Stream::new(dict, self.data),
        }
    }
}

/// Alpha-composite over a white background.
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        #[allow(clippy::cast_possible_truncation)] // result is at most 255
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }

    out
}
