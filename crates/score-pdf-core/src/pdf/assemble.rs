//! Multi-page PDF assembly from raster page images.
//!
//! Each image becomes one page. The page width is fixed (A4 width in points
//! by default) and the height follows the image's aspect ratio, so nothing is
//! stretched or cropped.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat};
use tracing::{debug, info};

use super::raster::PageImage;
use crate::error::{Error, Result};

/// Name the page image is registered under in each page's resources.
const IMAGE_NAME: &str = "Im0";

const PRODUCER: &str = concat!("score-pdf ", env!("CARGO_PKG_VERSION"));

/// Document-level metadata written to the Info dictionary.
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Builds one PDF from an ordered list of page images.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    page_width: f32,
    metadata: DocumentMetadata,
}

impl DocumentAssembler {
    pub fn new(page_width: f32) -> Self {
        Self {
            page_width,
            metadata: DocumentMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, title: impl Into<String>, author: impl Into<String>) -> Self {
        self.metadata = DocumentMetadata {
            title: Some(title.into()),
            author: Some(author.into()),
        };
        self
    }

    pub const fn page_width(&self) -> f32 {
        self.page_width
    }

    /// Write `images` (in order, one page each) to `out`. Returns the page count.
    ///
    /// An empty list is an error; there is no such thing as a zero-page score.
    pub fn assemble(&self, images: &[PathBuf], out: &Path) -> Result<usize> {
        if images.is_empty() {
            return Err(Error::PdfAssemble("no page images to assemble".to_string()));
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(images.len());

        for path in images {
            let image = PageImage::load(path)?;
            let page_height = page_height_for(self.page_width, image.width, image.height);
            debug!(
                "Page {}: {}x{} px -> {} x {} pt",
                kids.len() + 1,
                image.width,
                image.height,
                self.page_width,
                page_height
            );

            let image_id = doc.add_object(image.into_stream());

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            self.page_width.into(),
                            0.into(),
                            0.into(),
                            page_height.into(),
                            0.into(),
                            0.into(),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_bytes = content
                .encode()
                .map_err(|e| Error::PdfAssemble(format!("Failed to encode page content: {e}")))?;
            let content_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), content_bytes));

            let resources = lopdf::Dictionary::from_iter([(
                "XObject",
                Object::Dictionary(lopdf::Dictionary::from_iter([(
                    IMAGE_NAME,
                    Object::Reference(image_id),
                )])),
            )]);

            let page_id = doc.add_object(lopdf::Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
                ("Resources", Object::Dictionary(resources)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        0.into(),
                        0.into(),
                        Object::Real(self.page_width),
                        Object::Real(page_height),
                    ]),
                ),
            ]));
            kids.push(Object::Reference(page_id));
        }

        let page_count = kids.len();

        #[allow(clippy::cast_possible_wrap)]
        let pages_dict = lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(page_count as i64)),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(lopdf::Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let info_id = doc.add_object(self.info_dictionary());
        doc.trailer.set("Info", Object::Reference(info_id));

        doc.compress();
        doc.save(out)
            .map_err(|e| Error::PdfSave(format!("Failed to write {}: {e}", out.display())))?;

        info!("Wrote {} pages to {}", page_count, out.display());
        Ok(page_count)
    }

    fn info_dictionary(&self) -> lopdf::Dictionary {
        let mut info = lopdf::Dictionary::from_iter([("Producer", text_string(PRODUCER))]);
        if let Some(title) = &self.metadata.title {
            info.set("Title", text_string(title));
        }
        if let Some(author) = &self.metadata.author {
            info.set("Author", text_string(author));
        }
        info
    }
}

/// Height in points of a page `page_width` wide showing a `width`x`height` image.
#[allow(clippy::cast_precision_loss)]
pub fn page_height_for(page_width: f32, width: u32, height: u32) -> f32 {
    page_width * height as f32 / width.max(1) as f32
}

/// PDF text string: a literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }

    let mut bytes = vec![0xfe, 0xff];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}
