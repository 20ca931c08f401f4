//! PDF text extraction: read every page as two columns via pdfium.
//!
//! The gazette is laid out in two columns. Each page is cropped into a left
//! and a right rectangle and the text inside each is read separately, so
//! reading order is left column top-to-bottom, then right column. The top
//! masthead strip and the bottom footer strip are cut away by the crop.
//!
//! pdfium is not async-safe, so all work runs inside `spawn_blocking`.
//! Extraction never fails the caller: a document pdfium cannot open yields an
//! empty string and a logged error, and the pipeline treats it as a document
//! with zero blocks.

use crate::config::ColumnLayout;
use crate::error::DiarioError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Bind to pdfium: from `lib_dir` when given, else the system library.
pub fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, DiarioError> {
    let bindings = match lib_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| DiarioError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Extract the two-column text of every page of `pdf_path`.
///
/// Returns an empty string when the library cannot be bound or the document
/// cannot be opened.
pub async fn extract_text(pdf_path: &Path, lib_dir: Option<&Path>, layout: ColumnLayout) -> String {
    let path = pdf_path.to_path_buf();
    let lib_dir: Option<PathBuf> = lib_dir.map(Path::to_path_buf);

    let joined = tokio::task::spawn_blocking(move || {
        extract_text_blocking(&path, lib_dir.as_deref(), layout)
    })
    .await;

    match joined {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            error!("Text extraction failed for {}: {}", pdf_path.display(), e);
            String::new()
        }
        Err(e) => {
            error!("Text extraction task panicked for {}: {}", pdf_path.display(), e);
            String::new()
        }
    }
}

/// Blocking implementation of [`extract_text`].
fn extract_text_blocking(
    pdf_path: &Path,
    lib_dir: Option<&Path>,
    layout: ColumnLayout,
) -> Result<String, DiarioError> {
    let pdfium = bind_pdfium(lib_dir)?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| DiarioError::Internal(format!("pdfium could not open document: {e:?}")))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut out = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let text = match page.text() {
            Ok(t) => t,
            Err(e) => {
                warn!("Page {}: no text layer ({:?})", idx + 1, e);
                continue;
            }
        };

        let [left, right] = column_rects(page.width().value, page.height().value, layout);
        let left_text = text.inside_rect(left);
        let right_text = text.inside_rect(right);
        debug!(
            "Page {}: {} + {} chars",
            idx + 1,
            left_text.len(),
            right_text.len()
        );

        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&left_text);
        out.push(' ');
        out.push_str(&right_text);
    }

    Ok(out)
}

/// Left and right column rectangles in PDF user space (origin bottom-left).
fn column_rects(width: f32, height: f32, layout: ColumnLayout) -> [PdfRect; 2] {
    let [bottom, left, top, right_edge] = column_bounds(width, height, layout);
    let gutter = width * layout.split;
    [
        PdfRect::new_from_values(bottom, left, top, gutter),
        PdfRect::new_from_values(bottom, gutter, top, right_edge),
    ]
}

/// `[bottom, left, top, right]` of the text area; vertical fractions in the
/// layout are measured from the top of the page.
fn column_bounds(width: f32, height: f32, layout: ColumnLayout) -> [f32; 4] {
    let top = height * (1.0 - layout.top);
    let bottom = height * (1.0 - layout.bottom);
    [bottom, 0.0, top, width]
}
