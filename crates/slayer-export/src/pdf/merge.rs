//! Merge chunk documents into the final PDF and wire up links
//!
//! Object ids of each chunk are shifted past the destination's highest id,
//! pages are appended in chunk order, and link annotations are written once
//! every page has its final number.

use std::collections::BTreeMap;

use lopdf::{dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::chunk::ExportChunk;
use crate::error::{ExportError, Stage};

/// Link with both ends expressed as final 1-based page numbers
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLink {
    pub from_page: usize,
    pub rect: [f64; 4],
    pub to_page: usize,
}

#[derive(Debug, Clone)]
pub struct MergedDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Pages preceding each chunk in the merged document
    pub chunk_offsets: Vec<usize>,
    pub links: Vec<ResolvedLink>,
}

/// Merge chunks in order; chunk `i` page `p` becomes page `offset_i + p`
pub fn merge_chunks(chunks: &[ExportChunk]) -> Result<MergedDocument, ExportError> {
    let Some((first, rest)) = chunks.split_first() else {
        return Err(ExportError::NothingToExport);
    };

    let mut dest = load_chunk(first)?;
    let mut dest_max_id = dest.max_id;
    let mut page_refs = page_references(&dest);
    let mut chunk_offsets = vec![0];

    // one parsed chunk at a time next to the growing destination
    for chunk in rest {
        let source = load_chunk(chunk)?;
        chunk_offsets.push(page_refs.len());
        let source_pages = page_references(&source);
        let id_offset = dest_max_id;

        for (old_id, object) in source.objects {
            dest.objects.insert(
                (old_id.0 + id_offset, old_id.1),
                remap_object_refs(object, id_offset),
            );
        }
        page_refs.extend(source_pages.iter().map(|id| (id.0 + id_offset, id.1)));
        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
        debug!(
            chunk = chunk.index,
            id_offset,
            pages = source_pages.len(),
            "Merged chunk objects"
        );
    }
    dest.max_id = dest_max_id;

    let mut links = Vec::new();
    for (chunk, &offset) in chunks.iter().zip(&chunk_offsets) {
        for link in &chunk.links {
            let resolved = ResolvedLink {
                from_page: offset + link.from_page,
                rect: link.rect,
                to_page: offset + link.to_page,
            };
            add_link(&mut dest, &page_refs, &resolved, chunk.index)?;
            links.push(resolved);
        }
    }

    update_page_tree(&mut dest, &page_refs)?;
    dest.prune_objects();
    dest.compress();

    let mut bytes = Vec::new();
    dest.save_to(&mut bytes).map_err(|e| {
        ExportError::pdf(Stage::Merge, 0, format!("failed to save merged PDF: {}", e))
    })?;

    Ok(MergedDocument {
        bytes,
        page_count: page_refs.len(),
        chunk_offsets,
        links,
    })
}

/// Parse a chunk and check it holds the pages it claims
fn load_chunk(chunk: &ExportChunk) -> Result<Document, ExportError> {
    let doc = Document::load_mem(&chunk.bytes).map_err(|e| {
        ExportError::pdf(Stage::Merge, chunk.index, format!("failed to load chunk: {}", e))
    })?;
    let page_count = doc.get_pages().len();
    if page_count != chunk.page_count {
        return Err(ExportError::pdf(
            Stage::Merge,
            chunk.index,
            format!("expected {} pages, found {}", chunk.page_count, page_count),
        ));
    }
    Ok(doc)
}

fn page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Add a `/Link` annotation jumping to a whole page
fn add_link(
    doc: &mut Document,
    page_refs: &[ObjectId],
    link: &ResolvedLink,
    chunk: usize,
) -> Result<(), ExportError> {
    let resolve = |page: usize| {
        page.checked_sub(1)
            .and_then(|i| page_refs.get(i))
            .copied()
            .ok_or(ExportError::UnresolvedLink {
                from: link.from_page,
                target: link.to_page,
                page_count: page_refs.len(),
            })
    };
    let from = resolve(link.from_page)?;
    let target = resolve(link.to_page)?;

    let rect: Vec<Object> = link.rect.iter().map(|&v| Object::Real(v as f32)).collect();
    let annot_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => rect,
        "Border" => Object::Array(vec![0.into(), 0.into(), 0.into()]),
        "Dest" => Object::Array(vec![target.into(), "Fit".into()]),
    });

    let page = doc
        .get_object_mut(from)
        .and_then(Object::as_dict_mut)
        .map_err(|e| ExportError::pdf(Stage::Merge, chunk, e))?;
    let mut annots = page
        .get(b"Annots")
        .and_then(Object::as_array)
        .cloned()
        .unwrap_or_default();
    annots.push(annot_id.into());
    page.set("Annots", annots);
    Ok(())
}

fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), ExportError> {
    let fail = |reason: &str| ExportError::pdf(Stage::Merge, 0, reason);

    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| fail("no Root in trailer"))?;
    let pages_id = doc
        .get_object(catalog_id)
        .and_then(Object::as_dict)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| fail("catalog has no Pages reference"))?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages)) => {
            let kids: Vec<Object> = page_refs.iter().map(|&id| id.into()).collect();
            pages.set("Kids", kids);
            pages.set("Count", page_refs.len() as i64);
        }
        _ => return Err(fail("invalid pages dictionary")),
    }

    for id in page_refs {
        if let Some(Object::Dictionary(page)) = doc.objects.get_mut(id) {
            page.set("Parent", pages_id);
        }
    }
    Ok(())
}

/// Final page number of every source page and detail page across chunks
pub fn global_maps(
    chunks: &[ExportChunk],
    offsets: &[usize],
) -> (BTreeMap<u32, usize>, BTreeMap<String, usize>) {
    let mut pages = BTreeMap::new();
    let mut details = BTreeMap::new();
    for (chunk, &offset) in chunks.iter().zip(offsets) {
        pages.extend(chunk.page_map.iter().map(|(&p, &local)| (p, offset + local)));
        details.extend(
            chunk
                .detail_map
                .iter()
                .map(|(id, &local)| (id.clone(), offset + local)),
        );
    }
    (pages, details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::chunk::LocalLink;
    use lopdf::{Dictionary, Stream};
    use pretty_assertions::assert_eq;

    fn chunk_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for i in 0..pages {
            let content = doc.add_object(Stream::new(
                Dictionary::new(),
                format!("BT /F1 12 Tf 50 700 Td (p{}) Tj ET", i).into_bytes(),
            ));
            let page = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
                "Contents" => content,
            });
            kids.push(Object::from(page));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn chunk(index: usize, pages: usize, links: Vec<LocalLink>) -> ExportChunk {
        ExportChunk {
            index,
            bytes: chunk_pdf(pages),
            page_count: pages,
            page_map: BTreeMap::new(),
            detail_map: BTreeMap::new(),
            links,
        }
    }

    fn link(from_page: usize, to_page: usize) -> LocalLink {
        LocalLink {
            from_page,
            rect: [0.0, 0.0, 10.0, 10.0],
            to_page,
        }
    }

    #[test]
    fn test_page_counts_add_up_and_links_are_offset() {
        let chunks = vec![
            chunk(0, 2, vec![link(1, 2)]),
            chunk(1, 3, vec![link(3, 1)]),
        ];
        let merged = merge_chunks(&chunks).unwrap();
        assert_eq!(merged.page_count, 5);
        assert_eq!(merged.chunk_offsets, vec![0, 2]);
        assert_eq!(merged.links[1].from_page, 5);
        assert_eq!(merged.links[1].to_page, 3);

        let doc = Document::load_mem(&merged.bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 5);

        let fifth = doc.get_object(pages[&5]).unwrap().as_dict().unwrap();
        let annots = fifth.get(b"Annots").unwrap().as_array().unwrap();
        let annot = doc
            .get_object(annots[0].as_reference().unwrap())
            .unwrap()
            .as_dict()
            .unwrap();
        let dest = annot.get(b"Dest").unwrap().as_array().unwrap();
        assert_eq!(dest[0].as_reference().unwrap(), pages[&3]);
    }

    #[test]
    fn test_link_to_missing_page_is_rejected() {
        let chunks = vec![chunk(0, 1, vec![link(1, 4)])];
        let err = merge_chunks(&chunks).unwrap_err();
        assert!(matches!(
            err,
            ExportError::UnresolvedLink {
                target: 4,
                page_count: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_declared_page_count_mismatch_fails() {
        let mut bad = chunk(0, 2, vec![]);
        bad.page_count = 3;
        let err = merge_chunks(&[bad]).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Merge));
    }

    #[test]
    fn test_unreadable_later_chunk_names_its_index() {
        let mut broken = chunk(2, 1, vec![]);
        broken.bytes = b"%PDF-1.5 not really".to_vec();
        let chunks = vec![chunk(0, 1, vec![]), chunk(1, 2, vec![]), broken];

        let err = merge_chunks(&chunks).unwrap_err();
        assert!(matches!(
            err,
            ExportError::Pdf {
                stage: Stage::Merge,
                chunk: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_global_maps_apply_offsets() {
        let mut first = chunk(0, 2, vec![]);
        first.page_map.insert(1, 1);
        first.page_map.insert(3, 2);
        let mut second = chunk(1, 2, vec![]);
        second.page_map.insert(4, 1);
        second.detail_map.insert("d9".into(), 2);

        let (pages, details) = global_maps(&[first, second], &[0, 2]);
        assert_eq!(pages.get(&4), Some(&3));
        assert_eq!(details.get("d9"), Some(&4));
    }
}
