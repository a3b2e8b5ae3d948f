//! Page-level structural operations.
//!
//! Unlike overlay edits these rewrite the document bytes directly, so the
//! caller snapshots the previous bytes first when the change must be
//! undoable. All page indices are zero-based here; lopdf numbers pages
//! from 1.

use lopdf::{Document, Object, ObjectId};

use crate::error::EditError;
use crate::geometry::WrapperBox;

pub fn page_count(pdf_bytes: &[u8]) -> Result<usize, EditError> {
    let doc = load(pdf_bytes)?;
    Ok(doc.get_pages().len())
}

/// Width and height of a page in points.
pub fn page_size(pdf_bytes: &[u8], page_index: usize) -> Result<(f64, f64), EditError> {
    let doc = load(pdf_bytes)?;
    let page_id = resolve_page_id(&doc, page_index)?;
    page_dimensions(&doc, page_id)
}

/// Turns the page a quarter turn clockwise, accumulating into the page's
/// existing rotation.
pub fn rotate_page(pdf_bytes: &[u8], page_index: usize) -> Result<Vec<u8>, EditError> {
    let mut doc = load(pdf_bytes)?;
    let page_id = resolve_page_id(&doc, page_index)?;

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| EditError::Commit(e.to_string()))?;
    let current = match page.get(b"Rotate") {
        Ok(Object::Integer(deg)) => *deg,
        _ => 0,
    };
    page.set("Rotate", Object::Integer((current + 90) % 360));

    save(&mut doc)
}

pub fn delete_page(pdf_bytes: &[u8], page_index: usize) -> Result<Vec<u8>, EditError> {
    let mut doc = load(pdf_bytes)?;
    let count = doc.get_pages().len();
    if count <= 1 {
        return Err(EditError::LastPage);
    }
    if page_index >= count {
        return Err(EditError::PageOutOfBounds {
            index: page_index,
            count,
        });
    }

    doc.delete_pages(&[page_index as u32 + 1]);
    doc.prune_objects();
    doc.compress();
    save(&mut doc)
}

/// Moves a page from one position to another, shifting the pages between
/// them. The page tree is flattened to a single Kids array in the process.
pub fn reorder_page(
    pdf_bytes: &[u8],
    from_index: usize,
    to_index: usize,
) -> Result<Vec<u8>, EditError> {
    let mut doc = load(pdf_bytes)?;
    let mut page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let count = page_ids.len();
    for index in [from_index, to_index] {
        if index >= count {
            return Err(EditError::PageOutOfBounds { index, count });
        }
    }
    if from_index == to_index {
        return Ok(pdf_bytes.to_vec());
    }

    let moved = page_ids.remove(from_index);
    page_ids.insert(to_index, moved);

    set_page_order(&mut doc, &page_ids)?;
    save(&mut doc)
}

/// Applies a full permutation of the document's pages. `order[i]` names the
/// current index of the page that ends up at position `i`; every page must
/// appear exactly once.
pub fn reorder_pages(pdf_bytes: &[u8], order: &[usize]) -> Result<Vec<u8>, EditError> {
    let mut doc = load(pdf_bytes)?;
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let count = page_ids.len();

    let mut seen = vec![false; count];
    for &index in order {
        if index >= count {
            return Err(EditError::PageOutOfBounds { index, count });
        }
        seen[index] = true;
    }
    if order.len() != count || seen.iter().any(|used| !used) {
        return Err(EditError::Commit(
            "page order must name every page exactly once".into(),
        ));
    }

    let reordered: Vec<ObjectId> = order.iter().map(|&index| page_ids[index]).collect();
    set_page_order(&mut doc, &reordered)?;
    save(&mut doc)
}

fn set_page_order(doc: &mut Document, page_ids: &[ObjectId]) -> Result<(), EditError> {
    let pages_id = root_pages_id(doc)?;
    for &page_id in page_ids {
        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| EditError::Commit(e.to_string()))?;
        page.set("Parent", Object::Reference(pages_id));
    }

    let pages_dict = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| EditError::Commit(e.to_string()))?;
    pages_dict.set(
        "Kids",
        Object::Array(page_ids.iter().map(|&id| Object::Reference(id)).collect()),
    );
    pages_dict.set("Count", Object::Integer(page_ids.len() as i64));
    Ok(())
}

/// Sets the page's CropBox to the given region, given in top-left page
/// coordinates.
pub fn crop_page(
    pdf_bytes: &[u8],
    page_index: usize,
    region: &WrapperBox,
) -> Result<Vec<u8>, EditError> {
    crop_pages(pdf_bytes, &[(page_index, *region)])
}

/// Sets crop boxes on several pages in one pass.
pub fn crop_pages(
    pdf_bytes: &[u8],
    regions: &[(usize, WrapperBox)],
) -> Result<Vec<u8>, EditError> {
    let mut doc = load(pdf_bytes)?;
    for (page_index, region) in regions {
        let page_id = resolve_page_id(&doc, *page_index)?;
        let (_, page_height) = page_dimensions(&doc, page_id)?;

        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| EditError::Commit(e.to_string()))?;
        page.set(
            "CropBox",
            Object::Array(vec![
                Object::Real(region.x as f32),
                Object::Real((page_height - region.y - region.height) as f32),
                Object::Real((region.x + region.width) as f32),
                Object::Real((page_height - region.y) as f32),
            ]),
        );
    }
    save(&mut doc)
}

/// Builds a new single-page document from one page, dropping everything the
/// page does not reference.
pub fn extract_page(pdf_bytes: &[u8], page_index: usize) -> Result<Vec<u8>, EditError> {
    let mut doc = load(pdf_bytes)?;
    let count = doc.get_pages().len();
    if page_index >= count {
        return Err(EditError::PageOutOfBounds {
            index: page_index,
            count,
        });
    }

    let keep = page_index as u32 + 1;
    let others: Vec<u32> = (1..=count as u32).filter(|&n| n != keep).collect();
    doc.delete_pages(&others);
    doc.prune_objects();
    doc.compress();
    save(&mut doc)
}

fn load(pdf_bytes: &[u8]) -> Result<Document, EditError> {
    Document::load_mem(pdf_bytes).map_err(|e| EditError::Parse(e.to_string()))
}

fn save(doc: &mut Document) -> Result<Vec<u8>, EditError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| EditError::Save(e.to_string()))?;
    Ok(buffer)
}

fn resolve_page_id(doc: &Document, page_index: usize) -> Result<ObjectId, EditError> {
    let pages = doc.get_pages();
    let count = pages.len();
    u32::try_from(page_index)
        .ok()
        .and_then(|n| pages.get(&(n + 1)).copied())
        .ok_or(EditError::PageOutOfBounds {
            index: page_index,
            count,
        })
}

fn root_pages_id(doc: &Document) -> Result<ObjectId, EditError> {
    let catalog = doc
        .catalog()
        .map_err(|e| EditError::Commit(e.to_string()))?;
    catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|e| EditError::Commit(e.to_string()))
}

/// Width and height from the page's MediaBox, following the Parent chain
/// when the box is inherited.
pub(crate) fn page_dimensions(doc: &Document, page_id: ObjectId) -> Result<(f64, f64), EditError> {
    let mut current = page_id;
    loop {
        let dict = doc
            .get_object(current)
            .and_then(Object::as_dict)
            .map_err(|e| EditError::Commit(e.to_string()))?;

        if let Ok(obj) = dict.get(b"MediaBox") {
            let resolved = match obj {
                Object::Reference(id) => doc
                    .get_object(*id)
                    .map_err(|e| EditError::Commit(e.to_string()))?,
                other => other,
            };
            let media_box = resolved
                .as_array()
                .map_err(|e| EditError::Commit(e.to_string()))?;
            if media_box.len() != 4 {
                return Err(EditError::Commit("malformed MediaBox".into()));
            }
            let mut coords = [0.0f64; 4];
            for (slot, value) in coords.iter_mut().zip(media_box) {
                *slot = object_to_f64(value)
                    .ok_or_else(|| EditError::Commit("malformed MediaBox".into()))?;
            }
            return Ok((coords[2] - coords[0], coords[3] - coords[1]));
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return Err(EditError::Commit("page has no MediaBox".into())),
        }
    }
}

fn object_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}
