//! The accumulator: an output PDF that grows page by page.
//!
//! Source PDFs are merged at the object level. Each source is renumbered
//! past the accumulator's highest object id, its pages are re-parented under
//! the accumulator's single page tree, and every other object is copied
//! verbatim, so page content streams come through byte-for-byte. The
//! source's own catalog and page-tree nodes are dropped; attributes a page
//! inherited from them (`MediaBox`, `CropBox`, `Resources`, `Rotate`) are
//! copied onto the page first.
//!
//! Objects that end up unreachable (outlines, info dictionaries, …) are
//! pruned when the document is serialised.

use crate::error::{ItemError, PipelineError};
use crate::pipeline::image_page::{self, DecodedImage, PAGE_HEIGHT, PAGE_WIDTH};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeSet;
use tracing::debug;

/// Page attributes that may be inherited from ancestor page-tree nodes.
const INHERITABLE: [&str; 4] = ["MediaBox", "CropBox", "Resources", "Rotate"];

/// Guard against cyclic `Parent` chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// Name under which an image page refers to its picture.
const IMAGE_RESOURCE: &str = "Im0";

/// The in-progress merged document.
pub struct Accumulator {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    /// An empty document with a reserved page-tree root.
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append every page of `bytes`, in order. Returns the number of pages added,
    /// which is zero for a document with an empty page tree.
    pub fn append_pdf(&mut self, bytes: &[u8]) -> Result<usize, ItemError> {
        let mut src = Document::load_mem(bytes).map_err(|e| ItemError::CorruptPdf {
            detail: e.to_string(),
        })?;
        if src.is_encrypted() {
            return Err(ItemError::CorruptPdf {
                detail: "document is encrypted".into(),
            });
        }

        src.renumber_objects_with(self.doc.max_id + 1);

        let page_ids: Vec<ObjectId> = src.get_pages().into_values().collect();
        if page_ids.is_empty() {
            debug!("Source PDF has an empty page tree, nothing to append");
            return Ok(0);
        }

        // Flatten inherited attributes while the source page tree still exists.
        let mut pages = Vec::with_capacity(page_ids.len());
        for &id in &page_ids {
            let mut page = src
                .get_object(id)
                .and_then(|o| o.as_dict())
                .map_err(|e| ItemError::CorruptPdf {
                    detail: format!("page {} {}: {}", id.0, id.1, e),
                })?
                .clone();
            for key in INHERITABLE {
                if !page.has(key.as_bytes()) {
                    if let Some(value) = inherited(&src, &page, key) {
                        page.set(key, value);
                    }
                }
            }
            page.set("Parent", self.pages_id);
            pages.push((id, page));
        }

        let page_set: BTreeSet<ObjectId> = page_ids.iter().copied().collect();
        for (id, object) in std::mem::take(&mut src.objects) {
            if page_set.contains(&id) || is_tree_node(&object) {
                continue;
            }
            self.doc.objects.insert(id, object);
        }
        for (id, page) in pages {
            self.doc.objects.insert(id, Object::Dictionary(page));
            self.kids.push(id);
        }
        self.doc.max_id = self.doc.max_id.max(src.max_id);

        debug!(
            "Appended {} PDF pages (total {})",
            page_ids.len(),
            self.kids.len()
        );
        Ok(page_ids.len())
    }

    /// Append a new page holding `image`, fitted and centred.
    pub fn append_image(&mut self, image: &DecodedImage) {
        let width = i64::from(image.width);
        let height = i64::from(image.height);

        let mut xobject = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
        };
        if let Some(ref alpha) = image.alpha {
            let mask = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8_i64,
            };
            let mask_id = self.doc.add_object(compressed(mask, alpha.clone()));
            xobject.set("SMask", mask_id);
        }
        let image_id = self.doc.add_object(compressed(xobject, image.rgb.clone()));

        let placement = image_page::fit_on_page(image.width, image.height);
        let content_id = self.doc.add_object(Stream::new(
            Dictionary::new(),
            image_page::draw_operations(&placement, IMAGE_RESOURCE),
        ));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(PAGE_WIDTH),
                Object::Real(PAGE_HEIGHT),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    IMAGE_RESOURCE => image_id,
                },
            },
        });
        self.kids.push(page_id);
        debug!(
            "Appended image page {}x{} px (total {})",
            image.width,
            image.height,
            self.kids.len()
        );
    }

    /// Close the page tree and serialise the document.
    pub fn finish(mut self) -> Result<Vec<u8>, PipelineError> {
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.prune_objects();

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| PipelineError::Serialize(e.to_string()))?;
        Ok(out)
    }
}

fn compressed(dict: Dictionary, content: Vec<u8>) -> Stream {
    let mut stream = Stream::new(dict, content);
    // Left uncompressed if deflate does not help.
    let _ = stream.compress();
    stream
}

/// Look up `key` on the nearest ancestor page-tree node that defines it.
fn inherited(doc: &Document, page: &Dictionary, key: &str) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(|p| p.as_reference()).ok();
    let mut depth = 0;
    while let Some(id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            return None;
        }
        let node = doc.get_object(id).and_then(|o| o.as_dict()).ok()?;
        if let Ok(value) = node.get(key.as_bytes()) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    None
}

/// The source's catalog and intermediate `Pages` nodes are replaced by ours.
fn is_tree_node(object: &Object) -> bool {
    match object {
        Object::Dictionary(dict) => dict
            .get(b"Type")
            .and_then(|t| t.as_name())
            .map(|name| name == b"Catalog" || name == b"Pages")
            .unwrap_or(false),
        _ => false,
    }
}

/// Build a small PDF whose pages show `(label N) Tj`, with `MediaBox`
/// inherited from the page tree.
#[cfg(test)]
pub(crate) fn sample_pdf(label: &str, pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for n in 1..=pages {
        let ops = format!("BT /F1 24 Tf 72 720 Td ({label}{n}) Tj ET\n");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), ops.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Resources" => resources_id,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save sample pdf");
    out
}

/// A well-formed PDF whose page tree has no kids.
#[cfg(test)]
pub(crate) fn empty_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0_i64,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("save empty pdf");
    out
}
