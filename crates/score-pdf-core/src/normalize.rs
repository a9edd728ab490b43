//! SVG page normalization.
//!
//! Score viewers often serve pages as SVG, which the PDF assembler cannot
//! embed. Each SVG is rasterized to a fixed-width PNG next to the original.
//!
//! Some dash patterns in exported scores break rendering, so the
//! `stroke-dasharray`/`stroke-dashoffset` declarations are stripped first.
//! Only those two families are touched; the rest of the markup is left as is.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use resvg::{tiny_skia, usvg};
use tracing::debug;

use crate::error::{Error, Result};

/// `stroke-dasharray="..."` / `stroke-dashoffset='...'` presentation attributes.
#[allow(clippy::expect_used)] // Literal patterns, covered by tests
static DASH_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"stroke-dash(?:array|offset)\s*=\s*(?:"[^"]*"|'[^']*')"#)
        .expect("dash attribute pattern is valid")
});

/// CSS declarations, in `style` attributes and `<style>` blocks. The value
/// ends at the declaration, rule or attribute boundary.
#[allow(clippy::expect_used)]
static DASH_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"stroke-dash(?:array|offset)\s*:\s*[^;"'}<]*;?"#)
        .expect("dash declaration pattern is valid")
});

/// System fonts, loaded once for the whole run.
static FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    debug!("Loaded {} font faces", db.len());
    Arc::new(db)
});

/// Remove dash-pattern declarations in both attribute and CSS form.
pub fn sanitize_svg(markup: &str) -> Cow<'_, str> {
    match DASH_ATTRIBUTE.replace_all(markup, "") {
        Cow::Borrowed(unchanged) => DASH_DECLARATION.replace_all(unchanged, ""),
        Cow::Owned(stripped) => {
            Cow::Owned(DASH_DECLARATION.replace_all(&stripped, "").into_owned())
        }
    }
}

/// Rasterize SVG markup to PNG bytes, `width` pixels wide, height to scale.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn rasterize(markup: &str, width: u32) -> std::result::Result<Vec<u8>, String> {
    let options = usvg::Options {
        fontdb: Arc::clone(&FONTS),
        ..usvg::Options::default()
    };

    let tree = usvg::Tree::from_str(markup, &options).map_err(|e| format!("invalid SVG: {e}"))?;

    let size = tree.size();
    if size.width() <= 0.0 || size.height() <= 0.0 {
        return Err(format!("empty SVG canvas {}x{}", size.width(), size.height()));
    }

    let scale = width as f32 / size.width();
    let height = (size.height() * scale).round().max(1.0) as u32;

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| format!("cannot allocate a {width}x{height} pixmap"))?;
    resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap.encode_png().map_err(|e| format!("PNG encoding failed: {e}"))
}

/// Convert the SVG at `path` to a sibling PNG and return the PNG's path.
///
/// Undecodable bytes are replaced rather than rejected. Any parse or render
/// failure is reported as [`Error::Rasterize`].
pub fn normalize_svg(path: &Path, width: u32) -> Result<PathBuf> {
    let fail = |reason: String| Error::Rasterize {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| fail(e.to_string()))?;
    let markup = String::from_utf8_lossy(&bytes);
    let sanitized = sanitize_svg(&markup);

    let png = rasterize(&sanitized, width).map_err(fail)?;

    let png_path = path.with_extension("png");
    std::fs::write(&png_path, png).map_err(|e| fail(e.to_string()))?;

    debug!("Rasterized {} -> {}", path.display(), png_path.display());
    Ok(png_path)
}
