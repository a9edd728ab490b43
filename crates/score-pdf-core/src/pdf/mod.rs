mod assemble;
mod raster;

pub use assemble::{DocumentAssembler, DocumentMetadata, page_height_for};
pub use raster::{ImageEncoding, PageImage};
