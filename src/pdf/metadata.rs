//! PDF page metadata extraction
//!
//! Page counts and page geometry, used for the per-file progress output and
//! by the test suite to check the page-count and dimension invariants.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::pdf::overlay::PageGeometry;

/// Count pages by reading the Count field from the Pages dictionary
/// This is more reliable than get_pages() which doesn't handle nested page trees
fn count_pages_from_catalog(doc: &Document) -> Result<usize> {
    let catalog_ref = doc
        .trailer
        .get(b"Root")
        .map_err(|_| Error::General("No Root in trailer".to_string()))?;

    let catalog_id = match catalog_ref {
        Object::Reference(id) => *id,
        _ => return Err(Error::General("Root is not a reference".to_string())),
    };

    let catalog = doc
        .get_object(catalog_id)?
        .as_dict()
        .map_err(|_| Error::General("Catalog is not a dictionary".to_string()))?;

    let pages_id = match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => *id,
        _ => return Err(Error::General("No Pages reference in catalog".to_string())),
    };

    let pages_dict = doc
        .get_object(pages_id)?
        .as_dict()
        .map_err(|_| Error::General("Pages is not a dictionary".to_string()))?;

    match pages_dict.get(b"Count") {
        Ok(Object::Integer(n)) => Ok(*n as usize),
        _ => Err(Error::General("No integer Count in Pages".to_string())),
    }
}

/// Count the number of pages in a PDF file
///
/// This is a quick operation that reads the Count field from the Pages dictionary.
pub fn count_pages(path: &Path) -> Result<usize> {
    let doc = Document::load(path)?;
    let page_count = count_pages_from_catalog(&doc)?;

    if page_count == 0 {
        return Err(Error::EmptyPdf(path.to_path_buf()));
    }

    Ok(page_count)
}

/// Read the geometry of every page of a PDF file, in page order
pub fn page_geometries(path: &Path) -> Result<Vec<PageGeometry>> {
    let doc = Document::load(path)?;
    doc.get_pages()
        .values()
        .map(|&page_id| page_geometry(&doc, page_id))
        .collect()
}

/// Read a page's geometry from its (possibly inherited) MediaBox
///
/// MediaBox is an inheritable page attribute: when a page dictionary does not
/// carry one, the Parent chain of Pages nodes is searched.
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> Result<PageGeometry> {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")?
        .ok_or_else(|| Error::General("page has no MediaBox".to_string()))?;

    let rect = rectangle(doc, &media_box)?;
    Ok(PageGeometry::new(rect[2] - rect[0], rect[3] - rect[1]))
}

/// Look up a page attribute, walking up the Parent chain if absent
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Result<Option<Object>> {
    let mut current = page_id;
    // Bounded walk in case of a cyclic Parent chain in a malformed file
    for _ in 0..64 {
        let dict: &Dictionary = doc
            .get_object(current)?
            .as_dict()
            .map_err(|_| Error::General("page tree node is not a dictionary".to_string()))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value.clone()));
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => current = *parent_id,
            _ => return Ok(None),
        }
    }
    Ok(None)
}

/// Resolve a MediaBox object into [x0, y0, x1, y1]
fn rectangle(doc: &Document, object: &Object) -> Result<[f32; 4]> {
    let resolved = match object {
        Object::Reference(id) => doc.get_object(*id)?,
        other => other,
    };

    let array = resolved
        .as_array()
        .map_err(|_| Error::General("MediaBox is not an array".to_string()))?;

    if array.len() != 4 {
        return Err(Error::General(format!(
            "MediaBox has {} elements, expected 4",
            array.len()
        )));
    }

    let mut rect = [0.0f32; 4];
    for (slot, value) in rect.iter_mut().zip(array) {
        let resolved = match value {
            Object::Reference(id) => doc.get_object(*id)?,
            other => other,
        };
        *slot = match resolved {
            Object::Integer(n) => *n as f32,
            Object::Real(r) => *r,
            _ => return Err(Error::General("MediaBox entry is not a number".to_string())),
        };
    }
    Ok(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Dictionary;

    #[test]
    fn test_count_pages_nonexistent_file() {
        let result = count_pages(Path::new("nonexistent.pdf"));
        assert!(result.is_err());
    }

    #[test]
    fn test_page_geometry_direct_mediabox() {
        let mut doc = Document::with_version("1.5");
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(612.0),
                Object::Real(792.0),
            ]),
        );
        let page_id = doc.add_object(Object::Dictionary(page));

        let geometry = page_geometry(&doc, page_id).unwrap();
        assert_eq!(geometry, PageGeometry::new(612.0, 792.0));
    }

    #[test]
    fn test_page_geometry_inherited_from_parent() {
        let mut doc = Document::with_version("1.5");

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ]),
        );
        let pages_id = doc.add_object(Object::Dictionary(pages));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        let page_id = doc.add_object(Object::Dictionary(page));

        let geometry = page_geometry(&doc, page_id).unwrap();
        assert_eq!(geometry, PageGeometry::new(595.0, 842.0));
    }

    #[test]
    fn test_page_geometry_missing_mediabox() {
        let mut doc = Document::with_version("1.5");
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        let page_id = doc.add_object(Object::Dictionary(page));

        assert!(page_geometry(&doc, page_id).is_err());
    }

    #[test]
    fn test_page_geometry_offset_mediabox() {
        let mut doc = Document::with_version("1.5");
        let mut page = Dictionary::new();
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(10),
                Object::Integer(20),
                Object::Integer(110),
                Object::Integer(220),
            ]),
        );
        let page_id = doc.add_object(Object::Dictionary(page));

        let geometry = page_geometry(&doc, page_id).unwrap();
        assert_eq!(geometry, PageGeometry::new(100.0, 200.0));
    }
}
