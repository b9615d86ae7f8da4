//! Concatenate converted PDFs into one document with lopdf.
//!
//! Pages are deep-copied into a fresh document rather than spliced into the
//! first input, so no source's catalog-level state (outlines, AcroForm, page
//! labels) leaks into the result. Attributes a page inherits from its ancestors
//! in the page tree are written onto the page itself before it is re-parented,
//! otherwise documents that keep `MediaBox` or `Resources` on an intermediate
//! `Pages` node would lose them.

use crate::error::MergeError;
use crate::output::MergedArtifact;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Page attributes that may be inherited from the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `/Parent` chains in damaged files.
const MAX_TREE_DEPTH: usize = 64;

/// One converted document, named for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct SourcePdf<'a> {
    pub name: &'a str,
    pub pdf: &'a [u8],
}

impl<'a> SourcePdf<'a> {
    pub fn new(name: &'a str, pdf: &'a [u8]) -> Self {
        Self { name, pdf }
    }
}

/// Merge `sources` in order into a single PDF.
///
/// Sources whose page tree is genuinely empty are skipped with a warning. A
/// page tree that is dangling, mistyped or disagrees with its `/Count` is
/// [`MergeError::Malformed`]. When only one source has pages its bytes are
/// returned unchanged.
pub fn merge_pdfs(sources: &[SourcePdf<'_>]) -> Result<MergedArtifact, MergeError> {
    let mut loaded = Vec::with_capacity(sources.len());
    for source in sources {
        let doc = load_source(source)?;
        let page_count = checked_page_count(source, &doc)?;
        if page_count == 0 {
            warn!("'{}' has no pages, skipping it in the merge", source.name);
            continue;
        }
        loaded.push((source, doc, page_count));
    }

    match loaded.len() {
        0 => Err(MergeError::Empty),
        1 => {
            let (source, _, page_count) = &loaded[0];
            debug!("Single document '{}' ({} pages), no merge needed", source.name, page_count);
            Ok(MergedArtifact {
                pdf: source.pdf.to_vec(),
                page_count: *page_count,
            })
        }
        _ => concatenate(&loaded),
    }
}

fn load_source(source: &SourcePdf<'_>) -> Result<Document, MergeError> {
    let doc = Document::load_mem(source.pdf).map_err(|e| {
        if contains(source.pdf, b"/Encrypt") {
            MergeError::Encrypted {
                source_name: source.name.to_string(),
            }
        } else {
            MergeError::Malformed {
                source_name: source.name.to_string(),
                detail: e.to_string(),
            }
        }
    })?;
    if doc.is_encrypted() {
        return Err(MergeError::Encrypted {
            source_name: source.name.to_string(),
        });
    }
    Ok(doc)
}

/// Count the pages reachable from the catalog, requiring the root `Pages`
/// node to exist and its `/Count` to match.
fn checked_page_count(source: &SourcePdf<'_>, doc: &Document) -> Result<usize, MergeError> {
    let malformed = |detail: String| MergeError::Malformed {
        source_name: source.name.to_string(),
        detail,
    };

    let catalog = doc
        .catalog()
        .map_err(|e| malformed(format!("no document catalog: {e}")))?;
    let root = match catalog.get(b"Pages") {
        Ok(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .map_err(|_| malformed(format!("page tree root {} {} R is missing", id.0, id.1)))?,
        Ok(Object::Dictionary(dict)) => dict,
        _ => return Err(malformed("catalog has no /Pages entry".to_string())),
    };
    if node_type(root) != Some(b"Pages".as_slice()) {
        return Err(malformed("catalog /Pages is not a page tree node".to_string()));
    }

    let declared = root
        .get(b"Count")
        .and_then(Object::as_i64)
        .map_err(|_| malformed("page tree has no /Count".to_string()))?;
    let found = doc.get_pages().len();
    if usize::try_from(declared).ok() != Some(found) {
        return Err(malformed(format!(
            "page tree declares {declared} pages but {found} are reachable"
        )));
    }
    Ok(found)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn concatenate(loaded: &[(&SourcePdf<'_>, Document, usize)]) -> Result<MergedArtifact, MergeError> {
    let mut target = Document::with_version("1.7");
    let pages_id = target.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for (source, doc, _) in loaded {
        let mut copier = PageCopier::new(doc, &mut target);
        // get_pages() is keyed by page number, so iteration is in page order.
        for page_id in doc.get_pages().into_values() {
            let new_id = copier
                .copy_page(page_id, pages_id)
                .map_err(|e| MergeError::CopyFailed {
                    source_name: source.name.to_string(),
                    detail: e.to_string(),
                })?;
            kids.push(Object::Reference(new_id));
        }
        debug!("Copied {} pages from '{}'", doc.get_pages().len(), source.name);
    }

    let page_count = kids.len();
    target.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = target.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    target.trailer.set("Root", catalog_id);
    target.compress();

    let mut pdf = Vec::new();
    target
        .save_to(&mut pdf)
        .map_err(|e| MergeError::Write(e.to_string()))?;

    Ok(MergedArtifact { pdf, page_count })
}

/// Copies pages, and everything they reference, from one source document.
///
/// `id_map` ensures shared objects (fonts, images, resource dictionaries) are
/// copied once per source. Page-tree nodes and the catalog are never copied:
/// references to them become `null`.
struct PageCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            id_map: HashMap::new(),
        }
    }

    fn copy_page(&mut self, page_id: ObjectId, parent: ObjectId) -> Result<ObjectId, lopdf::Error> {
        // An annotation or link may already have pulled this page in.
        let new_id = match self.id_map.get(&page_id) {
            Some(id) => *id,
            None => self.reserve(page_id),
        };

        let mut page = self.source.get_dictionary(page_id)?.clone();
        for key in INHERITABLE {
            if !page.has(key) {
                if let Some(value) = inherited(self.source, &page, key) {
                    page.set(key, value.clone());
                }
            }
        }
        if !page.has(b"MediaBox") {
            // Required attribute; US Letter is the conventional fallback.
            page.set(
                "MediaBox",
                vec![0.into(), 0.into(), 612.into(), 792.into()],
            );
        }
        page.remove(b"Parent");

        let mut page = self.remap_dict(page)?;
        page.set("Parent", parent);
        self.target.objects.insert(new_id, Object::Dictionary(page));
        Ok(new_id)
    }

    fn reserve(&mut self, source_id: ObjectId) -> ObjectId {
        let new_id = self.target.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);
        new_id
    }

    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        if let Some(id) = self.id_map.get(&source_id) {
            return Ok(*id);
        }
        // Reserve before recursing so reference cycles terminate.
        let new_id = self.reserve(source_id);

        let copied = match self.source.get_object(source_id) {
            Ok(Object::Dictionary(dict)) => match node_type(dict) {
                Some(b"Pages") | Some(b"Catalog") => Object::Null,
                Some(b"Page") => {
                    let mut dict = dict.clone();
                    dict.remove(b"Parent");
                    Object::Dictionary(self.remap_dict(dict)?)
                }
                _ => Object::Dictionary(self.remap_dict(dict.clone())?),
            },
            Ok(obj) => self.remap(obj.clone())?,
            // Dangling references are legal and read as null.
            Err(_) => Object::Null,
        };
        self.target.objects.insert(new_id, copied);
        Ok(new_id)
    }

    fn remap(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.copy_object(id)?)),
            Object::Array(items) => items
                .into_iter()
                .map(|o| self.remap(o))
                .collect::<Result<Vec<_>, _>>()
                .map(Object::Array),
            Object::Dictionary(dict) => self.remap_dict(dict).map(Object::Dictionary),
            Object::Stream(mut stream) => {
                stream.dict = self.remap_dict(stream.dict)?;
                Ok(Object::Stream(stream))
            }
            other => Ok(other),
        }
    }

    fn remap_dict(&mut self, mut dict: Dictionary) -> Result<Dictionary, lopdf::Error> {
        for (_, value) in dict.iter_mut() {
            let original = std::mem::replace(value, Object::Null);
            *value = self.remap(original)?;
        }
        Ok(dict)
    }
}

fn node_type(dict: &Dictionary) -> Option<&[u8]> {
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Look `key` up on the ancestors of `page`.
fn inherited<'d>(doc: &'d Document, page: &Dictionary, key: &[u8]) -> Option<&'d Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Stream, StringFormat};

    /// A document with `num_pages` pages of the given width, each showing
    /// "`label` N".
    fn create_dummy_pdf(num_pages: u32, width: i64, label: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut page_ids = vec![];
        for i in 1..=num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![20.into(), 20.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("{label} {i}").into_bytes(),
                            StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            page_ids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids,
                "Count" => num_pages as i64,
            }
            .into(),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// Two pages that inherit MediaBox and Resources from their `Pages` node.
    fn create_inheriting_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let mut kids = vec![];
        for _ in 0..2 {
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT /F1 10 Tf ET".to_vec()));
            kids.push(
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                })
                .into(),
            );
        }
        doc.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 300.into(), 400.into()],
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
                "Rotate" => 90,
            }
            .into(),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn empty_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn page_widths(pdf: &[u8]) -> Vec<i64> {
        let doc = Document::load_mem(pdf).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let page = doc.get_dictionary(id).unwrap();
                page.get(b"MediaBox").unwrap().as_array().unwrap()[2]
                    .as_i64()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn pages_are_concatenated_in_order() {
        let a = create_dummy_pdf(2, 100, "A");
        let b = create_dummy_pdf(1, 200, "B");
        let c = create_dummy_pdf(3, 300, "C");
        let merged = merge_pdfs(&[
            SourcePdf::new("a.pdf", &a),
            SourcePdf::new("b.pdf", &b),
            SourcePdf::new("c.pdf", &c),
        ])
        .unwrap();

        assert_eq!(merged.page_count, 6);
        assert_eq!(page_widths(&merged.pdf), vec![100, 100, 200, 300, 300, 300]);

        let doc = Document::load_mem(&merged.pdf).unwrap();
        let pages = doc.get_pages();
        let content = doc.get_page_content(pages[&3]).unwrap();
        assert!(String::from_utf8_lossy(&content).contains("B 1"));
    }

    #[test]
    fn single_source_is_returned_unchanged() {
        let a = create_dummy_pdf(2, 100, "A");
        let merged = merge_pdfs(&[SourcePdf::new("a.pdf", &a)]).unwrap();
        assert_eq!(merged.pdf, a);
        assert_eq!(merged.page_count, 2);
    }

    #[test]
    fn inherited_attributes_are_materialised() {
        let inheriting = create_inheriting_pdf();
        let plain = create_dummy_pdf(1, 500, "P");
        let merged = merge_pdfs(&[
            SourcePdf::new("tree.pdf", &inheriting),
            SourcePdf::new("plain.pdf", &plain),
        ])
        .unwrap();
        assert_eq!(page_widths(&merged.pdf), vec![300, 300, 500]);

        let doc = Document::load_mem(&merged.pdf).unwrap();
        let first = doc.get_dictionary(doc.get_pages()[&1]).unwrap();
        assert!(first.has(b"Resources"));
        assert_eq!(first.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
    }

    #[test]
    fn empty_documents_are_skipped() {
        let a = create_dummy_pdf(1, 100, "A");
        let empty = empty_pdf();
        let b = create_dummy_pdf(1, 200, "B");
        let merged = merge_pdfs(&[
            SourcePdf::new("a.pdf", &a),
            SourcePdf::new("empty.pdf", &empty),
            SourcePdf::new("b.pdf", &b),
        ])
        .unwrap();
        assert_eq!(page_widths(&merged.pdf), vec![100, 200]);
    }

    #[test]
    fn only_empty_documents_is_an_error() {
        let empty = empty_pdf();
        let err = merge_pdfs(&[SourcePdf::new("empty.pdf", &empty)]).unwrap_err();
        assert!(matches!(err, MergeError::Empty));
        assert!(matches!(merge_pdfs(&[]).unwrap_err(), MergeError::Empty));
    }

    #[test]
    fn malformed_source_is_named() {
        let a = create_dummy_pdf(1, 100, "A");
        let err = merge_pdfs(&[
            SourcePdf::new("a.pdf", &a),
            SourcePdf::new("broken.pdf", b"%PDF-1.4 garbage"),
        ])
        .unwrap_err();
        match err {
            MergeError::Malformed { source_name, .. } => assert_eq!(source_name, "broken.pdf"),
            other => panic!("unexpected error: {other}"),
        }
    }

    /// Rewrite the catalog of a one-page document so `/Pages` points at `target`.
    fn with_pages_entry(target: Object) -> Vec<u8> {
        let mut doc = Document::load_mem(&create_dummy_pdf(1, 100, "X")).unwrap();
        let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
        doc.get_dictionary_mut(catalog_id).unwrap().set("Pages", target);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn dangling_page_tree_is_malformed() {
        let a = create_dummy_pdf(1, 100, "A");
        let broken = with_pages_entry(Object::Reference((999, 0)));
        let err = merge_pdfs(&[
            SourcePdf::new("a.pdf", &a),
            SourcePdf::new("broken.pdf", &broken),
        ])
        .unwrap_err();
        match err {
            MergeError::Malformed { source_name, .. } => assert_eq!(source_name, "broken.pdf"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn page_tree_root_must_be_a_pages_node() {
        let mut doc = Document::load_mem(&create_dummy_pdf(1, 100, "X")).unwrap();
        let font_id = doc.add_object(dictionary! { "Type" => "Font", "Subtype" => "Type1" });
        let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
        doc.get_dictionary_mut(catalog_id).unwrap().set("Pages", font_id);
        let mut wrong_type = Vec::new();
        doc.save_to(&mut wrong_type).unwrap();

        let err = merge_pdfs(&[SourcePdf::new("font.pdf", &wrong_type)]).unwrap_err();
        assert!(matches!(err, MergeError::Malformed { .. }), "got: {err}");
    }

    #[test]
    fn page_count_mismatch_is_malformed() {
        let mut doc = Document::load_mem(&create_dummy_pdf(2, 100, "X")).unwrap();
        let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
        let pages_id = doc
            .get_dictionary(catalog_id)
            .unwrap()
            .get(b"Pages")
            .unwrap()
            .as_reference()
            .unwrap();
        doc.get_dictionary_mut(pages_id).unwrap().set("Count", 5);
        let mut miscounted = Vec::new();
        doc.save_to(&mut miscounted).unwrap();

        let err = merge_pdfs(&[SourcePdf::new("count.pdf", &miscounted)]).unwrap_err();
        match err {
            MergeError::Malformed { source_name, detail } => {
                assert_eq!(source_name, "count.pdf");
                assert!(detail.contains("declares 5"), "got: {detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn encrypted_source_is_rejected() {
        let mut doc = Document::load_mem(&create_dummy_pdf(1, 100, "A")).unwrap();
        doc.trailer.set(
            "Encrypt",
            dictionary! {
                "Filter" => "Standard",
                "V" => 1,
                "R" => 2,
                "O" => Object::String(vec![0u8; 32], StringFormat::Hexadecimal),
                "U" => Object::String(vec![0u8; 32], StringFormat::Hexadecimal),
                "P" => -4,
            },
        );
        let mut locked = Vec::new();
        doc.save_to(&mut locked).unwrap();

        let err = merge_pdfs(&[SourcePdf::new("locked.pdf", &locked)]).unwrap_err();
        match err {
            MergeError::Encrypted { source_name } => assert_eq!(source_name, "locked.pdf"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
