// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Copying pages between documents. Used by the fixes that replace the whole
// document (split, scale): each source page becomes a Form XObject in a fresh
// document, and new pages draw it.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use preflight_core::error::{PreflightError, Result};
use tracing::{debug, warn};

use super::geometry::Rect;
use super::objects::{catalog_id, compress_stream, entry, inherited, page_content};

/// Letter size, used when a page declares no MediaBox at all.
const FALLBACK_MEDIA_BOX: Rect = Rect {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

/// Deep-copies objects from `source` into `target`, mapping each source
/// object id to exactly one target id so shared resources stay shared.
pub struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    copied: &'a mut BTreeMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    pub fn new(
        source: &'a Document,
        target: &'a mut Document,
        copied: &'a mut BTreeMap<ObjectId, ObjectId>,
    ) -> Self {
        Self {
            source,
            target,
            copied,
        }
    }

    /// Copy an object. `/Parent` links are dropped; the caller re-parents.
    pub fn copy(&mut self, object: &Object) -> Object {
        match object {
            Object::Reference(id) => Object::Reference(self.copy_reference(*id)),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(dict)),
            Object::Array(items) => Object::Array(items.iter().map(|i| self.copy(i)).collect()),
            Object::Stream(stream) => {
                let dict = self.copy_dict(&stream.dict);
                Object::Stream(Stream::new(dict, stream.content.clone()))
            }
            other => other.clone(),
        }
    }

    fn copy_dict(&mut self, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.copy(value));
        }
        copy
    }

    fn copy_reference(&mut self, id: ObjectId) -> ObjectId {
        if let Some(existing) = self.copied.get(&id) {
            return *existing;
        }
        // Reserve the target id before recursing so cycles terminate.
        let new_id = self.target.new_object_id();
        self.copied.insert(id, new_id);
        let object = match self.source.get_object(id) {
            Ok(object) => self.copy(object),
            Err(err) => {
                warn!(?id, %err, "Cannot resolve reference, using Null");
                Object::Null
            }
        };
        self.target.objects.insert(new_id, object);
        new_id
    }
}

/// A fresh document carrying over the source's version, Info dictionary and
/// OutputIntents, with a page tree filled one page at a time.
pub struct PageTreeBuilder<'a> {
    source: &'a Document,
    document: Document,
    copied: BTreeMap<ObjectId, ObjectId>,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl<'a> PageTreeBuilder<'a> {
    pub fn new(source: &'a Document) -> Self {
        let mut document = Document::with_version(source.version.clone());
        let pages_id = document.new_object_id();
        let mut copied = BTreeMap::new();

        let mut copier = ObjectCopier::new(source, &mut document, &mut copied);
        let info = source.trailer.get(b"Info").ok().map(|info| copier.copy(info));
        let intents = catalog_id(source)
            .and_then(|id| source.get_dictionary(id).ok())
            .and_then(|catalog| catalog.get(b"OutputIntents").ok())
            .map(|intents| copier.copy(intents));

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some(intents) = intents {
            catalog.set("OutputIntents", intents);
        }
        let catalog_id = document.add_object(catalog);
        document.trailer.set("Root", catalog_id);
        if let Some(info) = info {
            let info_id = match info {
                Object::Reference(id) => id,
                other => document.add_object(other),
            };
            document.trailer.set("Info", info_id);
        }

        Self {
            source,
            document,
            copied,
            pages_id,
            kids: Vec::new(),
        }
    }

    fn copier(&mut self) -> ObjectCopier<'_> {
        ObjectCopier::new(self.source, &mut self.document, &mut self.copied)
    }

    /// Wrap a source page's content and resources into a Form XObject.
    /// Returns the form id and the page's MediaBox, which is the form's BBox.
    pub fn page_as_form(&mut self, page_id: ObjectId) -> Result<(ObjectId, Rect)> {
        let source = self.source;
        let page = source.get_dictionary(page_id).map_err(|err| {
            PreflightError::PdfError(format!("cannot read page {:?}: {}", page_id, err))
        })?;
        let media_box = effective_media_box(source, page_id);

        let mut form = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => media_box.to_object(),
        };
        let mut copier = self.copier();
        if let Some(resources) = inherited(source, page_id, b"Resources") {
            form.set("Resources", copier.copy(resources));
        }
        if let Some(group) = entry(source, page, b"Group") {
            form.set("Group", copier.copy(group));
        }

        let content = page_content(source, page_id).ok_or_else(|| {
            PreflightError::PdfError(format!("content of page {:?} cannot be decoded", page_id))
        })?;
        let mut stream = Stream::new(form, content);
        compress_stream(&mut stream);
        let form_id = self.document.add_object(stream);
        debug!(?page_id, ?form_id, "Page wrapped as form");
        Ok((form_id, media_box))
    }

    /// Add a page with the given MediaBox whose content draws `form_id`
    /// under `placement`, a `cm` matrix `[a b c d e f]`. Returns the new
    /// page's id.
    pub fn push_form_page(&mut self, media_box: Rect, form_id: ObjectId, placement: [f32; 6]) -> ObjectId {
        let operations = format!(
            "q {} {} {} {} {} {} cm /P0 Do Q",
            placement[0], placement[1], placement[2], placement[3], placement[4], placement[5]
        );
        let mut content = Stream::new(Dictionary::new(), operations.into_bytes());
        compress_stream(&mut content);
        let content_id = self.document.add_object(content);
        let page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => media_box.to_object(),
            "Resources" => dictionary! {
                "XObject" => dictionary! { "P0" => form_id },
            },
            "Contents" => content_id,
        };
        let page_id = self.document.add_object(page);
        self.kids.push(page_id.into());
        page_id
    }

    /// Set a box on a page this builder created.
    pub fn set_page_box(&mut self, page_id: ObjectId, key: &str, rect: Rect) -> Result<()> {
        self.document
            .get_dictionary_mut(page_id)
            .map_err(|err| PreflightError::PdfError(format!("cannot update page {:?}: {}", page_id, err)))?
            .set(key, rect.to_object());
        Ok(())
    }

    /// Copy a page through unchanged, apart from materializing inherited
    /// attributes onto it.
    pub fn push_copied_page(&mut self, page_id: ObjectId) -> Result<()> {
        let source = self.source;
        let page = source.get_dictionary(page_id).map_err(|err| {
            PreflightError::PdfError(format!("cannot read page {:?}: {}", page_id, err))
        })?;
        let mut copier = self.copier();
        let mut copy = Dictionary::new();
        for (key, value) in page.iter() {
            if key != b"Parent" {
                copy.set(key.clone(), copier.copy(value));
            }
        }
        for key in INHERITABLE_KEYS {
            if copy.get(key).is_err()
                && let Some(value) = inherited(source, page_id, key)
            {
                copy.set(key.to_vec(), copier.copy(value));
            }
        }
        copy.set("Parent", self.pages_id);
        let id = self.document.add_object(copy);
        self.kids.push(id.into());
        Ok(())
    }

    /// Write the page tree and return the finished document.
    pub fn finish(mut self) -> Document {
        let count = self.kids.len() as i64;
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        self.document
    }
}

/// Attributes a page may inherit from its ancestors.
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// The MediaBox a page ends up with, falling back to Letter.
pub(crate) fn effective_media_box(doc: &Document, page_id: ObjectId) -> Rect {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|object| Rect::from_object(doc, object))
        .unwrap_or(FALLBACK_MEDIA_BOX)
}

/// The page's own dictionary entry for `key`, resolved.
pub(crate) fn page_rect(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Rect> {
    let page = doc.get_dictionary(page_id).ok()?;
    Rect::from_object(doc, page.get(key).ok()?)
}
