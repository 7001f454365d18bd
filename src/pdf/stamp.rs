//! Page compositing: stamping the watermark overlay onto PDF pages
//!
//! Each page gets a Form XObject holding the overlay content stream, plus an
//! appended content stream that invokes it. The XObject carries its own
//! Resources (font and alpha graphics state) and a BBox equal to the page
//! box, so page content and overlay share the bottom-left origin with no
//! scaling involved. Appending (rather than prepending) keeps the watermark
//! on top of filled backgrounds.

use std::fs;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};
use crate::pdf::metadata::page_geometry;
use crate::pdf::overlay::{
    generate_overlay, OverlayGraphic, OverlaySpec, FONT_RESOURCE, GSTATE_RESOURCE,
};

/// Stamp the watermark onto every page of a PDF
///
/// Loads `input`, overlays the watermark described by `spec` on each page in
/// order, and writes the result to `output` (parent directories are created
/// as needed). The source file is never modified. Output is written through a
/// temporary sibling path and renamed into place, so a failure never leaves a
/// partial file at `output`.
///
/// A page that cannot be stamped aborts the whole file: the output either has
/// every page watermarked or does not exist at all.
///
/// # Example
///
/// ```no_run
/// use pdf_watermark::pdf::{watermark_pdf, OverlaySpec};
/// use std::path::Path;
///
/// let spec = OverlaySpec::new("CONFIDENTIAL");
/// watermark_pdf(Path::new("in.pdf"), Path::new("out.pdf"), &spec)
///     .expect("failed to watermark");
/// ```
pub fn watermark_pdf(input: &Path, output: &Path, spec: &OverlaySpec) -> Result<()> {
    spec.validate()?;

    let mut doc = Document::load(input).map_err(|e| Error::SourceUnreadable {
        path: input.to_path_buf(),
        reason: e.to_string(),
    })?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(Error::SourceUnreadable {
            path: input.to_path_buf(),
            reason: "encrypted documents are not supported".to_string(),
        });
    }

    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    if pages.is_empty() {
        return Err(Error::EmptyPdf(input.to_path_buf()));
    }

    // Font and graphics state are shared by every page's overlay
    let shared = OverlayResources::install(&mut doc, spec);

    for &(page_num, page_id) in &pages {
        let geometry = page_geometry(&doc, page_id).map_err(|e| Error::Composition {
            page: page_num,
            reason: e.to_string(),
        })?;

        if !geometry.is_valid() {
            // A degenerate page box means the file itself is malformed
            return Err(Error::SourceUnreadable {
                path: input.to_path_buf(),
                reason: format!(
                    "page {} has a degenerate MediaBox ({} x {})",
                    page_num, geometry.width, geometry.height
                ),
            });
        }

        // Always generated from this page's own geometry, so the overlay's
        // bounding box matches the page by construction
        let overlay = generate_overlay(spec, geometry)?;
        stamp_page(&mut doc, page_id, page_num, &overlay, &shared)?;
    }

    write_document(&mut doc, output)
}

/// Watermark resources shared across all pages of one document
struct OverlayResources {
    font: ObjectId,
    gstate: ObjectId,
}

impl OverlayResources {
    fn install(doc: &mut Document, spec: &OverlaySpec) -> Self {
        // Helvetica-Bold is one of the 14 standard PDF fonts, so no font file
        // is embedded; WinAnsiEncoding covers Latin-1 watermark text
        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Helvetica-Bold".to_vec()));
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        let font = doc.add_object(Object::Dictionary(font));

        let mut gstate = Dictionary::new();
        gstate.set("Type", Object::Name(b"ExtGState".to_vec()));
        gstate.set("ca", Object::Real(spec.opacity));
        gstate.set("CA", Object::Real(spec.opacity));
        let gstate = doc.add_object(Object::Dictionary(gstate));

        Self { font, gstate }
    }
}

/// Merge one overlay onto one page
fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    page_num: u32,
    overlay: &OverlayGraphic,
    shared: &OverlayResources,
) -> Result<()> {
    let xobject_id = create_overlay_xobject(doc, overlay, shared);

    // Unique per page, so pages sharing a Resources dictionary never clash
    let name = format!("Wm{}", page_num);

    add_xobject_to_page_resources(doc, page_id, &name, xobject_id).map_err(|e| {
        Error::Composition {
            page: page_num,
            reason: e.to_string(),
        }
    })?;

    let invoke = format!("q\n/{} Do\nQ\n", name);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), invoke.into_bytes()));

    append_content_to_page(doc, page_id, content_id).map_err(|e| Error::Composition {
        page: page_num,
        reason: e.to_string(),
    })
}

/// Create a Form XObject carrying the overlay content stream
fn create_overlay_xobject(
    doc: &mut Document,
    overlay: &OverlayGraphic,
    shared: &OverlayResources,
) -> ObjectId {
    let mut fonts = Dictionary::new();
    fonts.set(FONT_RESOURCE, Object::Reference(shared.font));

    let mut gstates = Dictionary::new();
    gstates.set(GSTATE_RESOURCE, Object::Reference(shared.gstate));

    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    resources.set("ExtGState", Object::Dictionary(gstates));

    let mut xobject_dict = Dictionary::new();
    xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
    xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    xobject_dict.set("FormType", Object::Integer(1));

    // BBox equals the target page box so the overlay aligns without scaling
    xobject_dict.set(
        "BBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(overlay.geometry.width),
            Object::Real(overlay.geometry.height),
        ]),
    );
    xobject_dict.set("Resources", Object::Dictionary(resources));

    let stream = Stream {
        dict: xobject_dict,
        content: overlay.content.clone().into_bytes(),
        allows_compression: true,
        start_position: None,
    };

    doc.add_object(Object::Stream(stream))
}

/// Add an XObject reference to a page's Resources dictionary
fn add_xobject_to_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobject_id: ObjectId,
) -> Result<()> {
    // Resources may be inline or a reference shared with other pages; take a
    // copy first so the page ends up with its own dictionary
    let resources_dict = {
        let page_dict = doc.get_object(page_id)?.as_dict()?;
        match page_dict.get(b"Resources") {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            Ok(Object::Reference(res_id)) => match doc.get_object(*res_id) {
                Ok(Object::Dictionary(dict)) => dict.clone(),
                _ => Dictionary::new(),
            },
            _ => Dictionary::new(),
        }
    };

    let page_obj = doc.get_object_mut(page_id)?;
    if let Object::Dictionary(ref mut page_dict) = page_obj {
        let mut new_resources = resources_dict;

        let mut xobjects = match new_resources.get(b"XObject") {
            Ok(Object::Dictionary(xo)) => xo.clone(),
            _ => Dictionary::new(),
        };
        xobjects.set(name, Object::Reference(xobject_id));
        new_resources.set("XObject", Object::Dictionary(xobjects));

        page_dict.set("Resources", Object::Dictionary(new_resources));
    }

    Ok(())
}

/// Append a content stream to a page's Contents
///
/// Appending after the original content draws the watermark on top, so it
/// stays visible over filled backgrounds.
fn append_content_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    new_content_id: ObjectId,
) -> Result<()> {
    // A direct (non-reference) Contents stream must be hoisted into its own
    // object before it can sit in a Contents array
    let hoisted = {
        let page_dict = doc.get_object(page_id)?.as_dict()?;
        match page_dict.get(b"Contents") {
            Ok(Object::Stream(stream)) => Some(stream.clone()),
            _ => None,
        }
    }
    .map(|stream| doc.add_object(Object::Stream(stream)));

    let page_obj = doc.get_object_mut(page_id)?;
    if let Object::Dictionary(ref mut page_dict) = page_obj {
        let existing_content = page_dict.get(b"Contents").ok().cloned();

        let contents = match (hoisted, existing_content) {
            (Some(moved_id), _) => vec![
                Object::Reference(moved_id),
                Object::Reference(new_content_id),
            ],
            (None, Some(Object::Reference(content_id))) => vec![
                Object::Reference(content_id),
                Object::Reference(new_content_id),
            ],
            (None, Some(Object::Array(mut content_array))) => {
                content_array.push(Object::Reference(new_content_id));
                content_array
            }
            _ => vec![Object::Reference(new_content_id)],
        };

        page_dict.set("Contents", Object::Array(contents));
    }

    Ok(())
}

/// Write the stamped document to its destination atomically
fn write_document(doc: &mut Document, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::OutputWrite {
            path: output.to_path_buf(),
            source: e,
        })?;
    }

    let tmp = output.with_extension("pdf.tmp");

    doc.compress();
    if let Err(e) = doc.save(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::OutputWrite {
            path: output.to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        });
    }

    fs::rename(&tmp, output).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::OutputWrite {
            path: output.to_path_buf(),
            source: e,
        }
    })
}
