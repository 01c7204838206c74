// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Immutable document snapshot.
//
// The lopdf object graph is walked once and flattened into plain owned data:
// pages with their boxes, every content stream reachable from a page (page
// content and Form XObjects), and the fonts, images, color spaces and
// graphics states those streams reference. Analyzers are pure functions of
// this snapshot, which is `Send + Sync` and can be shared across threads.

use std::collections::{BTreeMap, BTreeSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use preflight_core::error::{PreflightError, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use super::geometry::{Matrix, Rect};
use super::objects::{
    catalog_id, entry, entry_dict, entry_name, entry_number, inherited, name, page_content,
    resolve, resolve_dict, stream_bytes, text,
};

/// Forms nested deeper than this are not followed.
const MAX_FORM_DEPTH: usize = 16;

const FONT_PROGRAM_KEYS: [&[u8]; 3] = [b"FontFile", b"FontFile2", b"FontFile3"];

/// Load raw bytes into an lopdf document, rejecting empty input.
#[instrument(skip_all, fields(bytes_len = data.len()))]
pub fn load_document(data: &[u8]) -> Result<Document> {
    if data.is_empty() {
        return Err(PreflightError::DocumentLoad("document is empty".into()));
    }
    let document = Document::load_mem(data)
        .map_err(|err| PreflightError::DocumentLoad(format!("failed to parse PDF: {}", err)))?;
    if document.get_pages().is_empty() {
        return Err(PreflightError::DocumentLoad("document has no pages".into()));
    }
    debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
    Ok(document)
}

// -- Snapshot types -----------------------------------------------------------

/// Document-level metadata.
#[derive(Debug, Clone, Default)]
pub struct SnapshotMetadata {
    pub version: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub gts_pdfx_version: Option<String>,
    pub encrypted: bool,
    pub file_size: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct OutputIntent {
    /// `/S`, e.g. `GTS_PDFX`.
    pub subtype: String,
    pub condition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// 1-based page number.
    pub number: u32,
    pub media_box: Option<Rect>,
    pub crop_box: Option<Rect>,
    pub trim_box: Option<Rect>,
    pub bleed_box: Option<Rect>,
    /// Page-level `/Group` with `/S /Transparency`.
    pub transparency_group: bool,
    /// Index into [`DocumentSnapshot::streams`] of the page content.
    pub content: usize,
}

impl PageSnapshot {
    /// The page's visible area: CropBox, else MediaBox.
    pub fn visible_box(&self) -> Option<Rect> {
        self.crop_box.or(self.media_box)
    }
}

/// How a color-space resource paints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpaceKind {
    Gray,
    Rgb,
    Cmyk,
    /// Separation or DeviceN; the colorant name(s).
    Spot(String),
    Pattern,
    Other(String),
}

impl ColorSpaceKind {
    /// Classify a device family name, if it is one.
    pub fn from_device_name(name: &str) -> Option<Self> {
        match name {
            "DeviceGray" | "G" | "CalGray" => Some(Self::Gray),
            "DeviceRGB" | "RGB" | "CalRGB" => Some(Self::Rgb),
            "DeviceCMYK" | "CMYK" => Some(Self::Cmyk),
            "Pattern" => Some(Self::Pattern),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectTarget {
    /// Index into [`DocumentSnapshot::images`].
    Image(usize),
    /// Index into [`DocumentSnapshot::streams`].
    Form(usize),
}

#[derive(Debug, Clone, Default)]
pub struct ExtGState {
    pub blend_mode: Option<String>,
    pub soft_mask: bool,
    pub stroke_alpha: Option<f32>,
    pub fill_alpha: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct Resources {
    pub color_spaces: BTreeMap<String, ColorSpaceKind>,
    pub xobjects: BTreeMap<String, XObjectTarget>,
    /// Indices into [`DocumentSnapshot::fonts`].
    pub fonts: Vec<usize>,
    pub ext_gstates: BTreeMap<String, ExtGState>,
}

/// Page content or a Form XObject.
#[derive(Debug, Clone, Default)]
pub struct ContentStream {
    /// Decoded operators; `None` when a filter could not be undone.
    pub bytes: Option<Vec<u8>>,
    pub resources: Resources,
    /// Form `/Matrix`; identity for page content.
    pub matrix: Matrix,
    /// Form `/Group` with `/S /Transparency`.
    pub transparency_group: bool,
}

#[derive(Debug, Clone)]
pub struct ImageObject {
    pub object_id: Option<ObjectId>,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u32,
    /// Human-readable description of `/ColorSpace`, e.g. `ICCBased RGB`.
    pub color_space: String,
    pub filters: Vec<String>,
    pub byte_size: usize,
    pub soft_mask: bool,
    /// JFIF density in dots per inch, when present and meaningful.
    pub density: Option<(f32, f32)>,
}

#[derive(Debug, Clone)]
pub struct FontObject {
    pub base_font: String,
    /// Subtype used for classification (descendant subtype for Type0).
    pub subtype: String,
    pub embedded: bool,
}

/// Everything the analyzers need, detached from lopdf.
#[derive(Debug, Clone, Default)]
pub struct DocumentSnapshot {
    pub metadata: SnapshotMetadata,
    pub output_intents: Vec<OutputIntent>,
    pub pages: Vec<PageSnapshot>,
    pub streams: Vec<ContentStream>,
    pub images: Vec<ImageObject>,
    pub fonts: Vec<FontObject>,
}

impl DocumentSnapshot {
    /// Build a snapshot from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = load_document(data)?;
        Ok(Self::from_document(&document, data))
    }

    /// Build a snapshot from a loaded document. `data` is the byte buffer it
    /// was loaded from, used for size and fingerprint.
    #[instrument(skip_all, fields(pages = document.get_pages().len()))]
    pub fn from_document(document: &Document, data: &[u8]) -> Self {
        let mut builder = SnapshotBuilder {
            doc: document,
            snapshot: DocumentSnapshot::default(),
            forms: BTreeMap::new(),
            images: BTreeMap::new(),
            fonts: BTreeMap::new(),
        };
        builder.snapshot.metadata = read_metadata(document, data);
        builder.snapshot.output_intents = read_output_intents(document);
        for (number, page_id) in document.get_pages() {
            builder.add_page(number, page_id);
        }
        debug!(
            streams = builder.snapshot.streams.len(),
            images = builder.snapshot.images.len(),
            fonts = builder.snapshot.fonts.len(),
            "Snapshot built"
        );
        builder.snapshot
    }

    /// Indices of every stream reachable from a page: the page content first,
    /// then Form XObjects in discovery order, each once.
    pub fn page_streams(&self, page: &PageSnapshot) -> Vec<usize> {
        let mut order = vec![page.content];
        let mut seen = BTreeSet::from([page.content]);
        let mut cursor = 0;
        while cursor < order.len() {
            let stream = &self.streams[order[cursor]];
            for target in stream.resources.xobjects.values() {
                if let XObjectTarget::Form(index) = target
                    && seen.insert(*index)
                {
                    order.push(*index);
                }
            }
            cursor += 1;
        }
        order
    }
}

// -- Builder ------------------------------------------------------------------

struct SnapshotBuilder<'a> {
    doc: &'a Document,
    snapshot: DocumentSnapshot,
    forms: BTreeMap<ObjectId, usize>,
    images: BTreeMap<ObjectId, usize>,
    fonts: BTreeMap<ObjectId, usize>,
}

impl SnapshotBuilder<'_> {
    fn add_page(&mut self, number: u32, page_id: ObjectId) {
        let doc = self.doc;
        let boxed = |key: &[u8], inheritable: bool| -> Option<Rect> {
            let object = if inheritable {
                inherited(doc, page_id, key)?
            } else {
                entry(doc, doc.get_dictionary(page_id).ok()?, key)?
            };
            Rect::from_object(doc, object)
        };
        let media_box = boxed(b"MediaBox", true);
        let crop_box = boxed(b"CropBox", true);
        let trim_box = boxed(b"TrimBox", false);
        let bleed_box = boxed(b"BleedBox", false);

        let transparency_group = doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| entry_dict(doc, page, b"Group"))
            .is_some_and(|group| is_transparency_group(doc, group));

        let resources = inherited(doc, page_id, b"Resources").and_then(|r| resolve_dict(doc, r));
        let content_index = self.snapshot.streams.len();
        self.snapshot.streams.push(ContentStream::default());
        let resources = self.collect_resources(resources, 0);
        self.snapshot.streams[content_index] = ContentStream {
            bytes: page_content(doc, page_id),
            resources,
            matrix: Matrix::IDENTITY,
            transparency_group: false,
        };

        self.snapshot.pages.push(PageSnapshot {
            number,
            media_box,
            crop_box,
            trim_box,
            bleed_box,
            transparency_group,
            content: content_index,
        });
    }

    fn collect_resources(&mut self, dict: Option<&Dictionary>, depth: usize) -> Resources {
        let mut resources = Resources::default();
        let Some(dict) = dict else {
            return resources;
        };
        let doc = self.doc;

        if let Some(spaces) = entry_dict(doc, dict, b"ColorSpace") {
            for (key, value) in spaces.iter() {
                let kind = classify_color_space(doc, value);
                resources
                    .color_spaces
                    .insert(String::from_utf8_lossy(key).into_owned(), kind);
            }
        }

        if let Some(states) = entry_dict(doc, dict, b"ExtGState") {
            for (key, value) in states.iter() {
                if let Some(state) = resolve_dict(doc, value) {
                    resources
                        .ext_gstates
                        .insert(String::from_utf8_lossy(key).into_owned(), read_ext_gstate(doc, state));
                }
            }
        }

        if let Some(fonts) = entry_dict(doc, dict, b"Font") {
            for (_, value) in fonts.iter() {
                if let Some(index) = self.font_index(value) {
                    resources.fonts.push(index);
                }
            }
        }

        if let Some(xobjects) = entry_dict(doc, dict, b"XObject") {
            for (key, value) in xobjects.iter() {
                let key = String::from_utf8_lossy(key).into_owned();
                if let Some(target) = self.xobject_target(value, depth) {
                    resources.xobjects.insert(key, target);
                }
            }
        }

        resources
    }

    fn xobject_target(&mut self, value: &Object, depth: usize) -> Option<XObjectTarget> {
        let doc = self.doc;
        let object_id = match value {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let Object::Stream(stream) = resolve(doc, value)? else {
            return None;
        };
        match entry_name(doc, &stream.dict, b"Subtype").as_deref() {
            Some("Image") => {
                if matches!(entry(doc, &stream.dict, b"ImageMask"), Some(Object::Boolean(true))) {
                    return None;
                }
                if let Some(id) = object_id
                    && let Some(index) = self.images.get(&id)
                {
                    return Some(XObjectTarget::Image(*index));
                }
                let index = self.snapshot.images.len();
                self.snapshot.images.push(read_image(doc, object_id, stream));
                if let Some(id) = object_id {
                    self.images.insert(id, index);
                }
                Some(XObjectTarget::Image(index))
            }
            Some("Form") => {
                if let Some(id) = object_id
                    && let Some(index) = self.forms.get(&id)
                {
                    return Some(XObjectTarget::Form(*index));
                }
                if depth >= MAX_FORM_DEPTH {
                    warn!(depth, "Form XObject nesting too deep, not followed");
                    return None;
                }
                // Reserve the slot first so self-referencing forms terminate.
                let index = self.snapshot.streams.len();
                self.snapshot.streams.push(ContentStream::default());
                if let Some(id) = object_id {
                    self.forms.insert(id, index);
                }
                let resources = entry_dict(doc, &stream.dict, b"Resources");
                let resources = self.collect_resources(resources, depth + 1);
                let matrix = entry(doc, &stream.dict, b"Matrix")
                    .and_then(|m| match m {
                        Object::Array(items) => Matrix::from_objects(items),
                        _ => None,
                    })
                    .unwrap_or(Matrix::IDENTITY);
                let transparency_group = entry_dict(doc, &stream.dict, b"Group")
                    .is_some_and(|group| is_transparency_group(doc, group));
                self.snapshot.streams[index] = ContentStream {
                    bytes: stream_bytes(stream),
                    resources,
                    matrix,
                    transparency_group,
                };
                Some(XObjectTarget::Form(index))
            }
            _ => None,
        }
    }

    fn font_index(&mut self, value: &Object) -> Option<usize> {
        let object_id = match value {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        if let Some(id) = object_id
            && let Some(index) = self.fonts.get(&id)
        {
            return Some(*index);
        }
        let dict = resolve_dict(self.doc, value)?;
        let index = self.snapshot.fonts.len();
        self.snapshot.fonts.push(read_font(self.doc, dict));
        if let Some(id) = object_id {
            self.fonts.insert(id, index);
        }
        Some(index)
    }
}

// -- Readers ------------------------------------------------------------------

fn is_transparency_group(doc: &Document, group: &Dictionary) -> bool {
    entry_name(doc, group, b"S").as_deref() == Some("Transparency")
}

fn read_metadata(doc: &Document, data: &[u8]) -> SnapshotMetadata {
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| resolve_dict(doc, info));
    let field = |key: &[u8]| -> Option<String> {
        info.and_then(|dict| entry(doc, dict, key))
            .and_then(text)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let digest = Sha256::digest(data);
    SnapshotMetadata {
        version: doc.version.clone(),
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        creator: field(b"Creator"),
        producer: field(b"Producer"),
        creation_date: field(b"CreationDate"),
        modification_date: field(b"ModDate"),
        gts_pdfx_version: field(b"GTS_PDFXVersion"),
        encrypted: doc.trailer.get(b"Encrypt").is_ok(),
        file_size: data.len(),
        sha256: hex::encode(digest),
    }
}

fn read_output_intents(doc: &Document) -> Vec<OutputIntent> {
    let Some(catalog) = catalog_id(doc).and_then(|id| doc.get_dictionary(id).ok()) else {
        return Vec::new();
    };
    let Some(Object::Array(intents)) = entry(doc, catalog, b"OutputIntents") else {
        return Vec::new();
    };
    intents
        .iter()
        .filter_map(|intent| resolve_dict(doc, intent))
        .map(|intent| OutputIntent {
            subtype: entry_name(doc, intent, b"S").unwrap_or_default(),
            condition: entry(doc, intent, b"OutputConditionIdentifier").and_then(text),
        })
        .collect()
}

/// Classify a color-space value from a `/ColorSpace` resource dictionary.
pub(crate) fn classify_color_space(doc: &Document, value: &Object) -> ColorSpaceKind {
    match resolve(doc, value) {
        Some(Object::Name(raw)) => {
            let family = String::from_utf8_lossy(raw).into_owned();
            ColorSpaceKind::from_device_name(&family).unwrap_or(ColorSpaceKind::Other(family))
        }
        Some(Object::Array(items)) => {
            let family = items.first().and_then(|f| resolve(doc, f)).and_then(name);
            match family.as_deref() {
                Some("ICCBased") => {
                    let components = items
                        .get(1)
                        .and_then(|profile| resolve_dict(doc, profile))
                        .and_then(|profile| entry_number(doc, profile, b"N"));
                    match components.map(|n| n as u32) {
                        Some(1) => ColorSpaceKind::Gray,
                        Some(3) => ColorSpaceKind::Rgb,
                        Some(4) => ColorSpaceKind::Cmyk,
                        _ => ColorSpaceKind::Other("ICCBased".into()),
                    }
                }
                Some("Indexed") | Some("I") => items
                    .get(1)
                    .map(|base| classify_color_space(doc, base))
                    .unwrap_or(ColorSpaceKind::Other("Indexed".into())),
                Some("Separation") => {
                    let colorant = items
                        .get(1)
                        .and_then(|n| resolve(doc, n))
                        .and_then(name)
                        .unwrap_or_else(|| "Unnamed".into());
                    ColorSpaceKind::Spot(colorant)
                }
                Some("DeviceN") => {
                    let names = match items.get(1).and_then(|n| resolve(doc, n)) {
                        Some(Object::Array(names)) => names
                            .iter()
                            .filter_map(|n| resolve(doc, n).and_then(name))
                            .collect::<Vec<_>>()
                            .join("+"),
                        _ => "DeviceN".into(),
                    };
                    ColorSpaceKind::Spot(names)
                }
                Some("Pattern") => ColorSpaceKind::Pattern,
                Some("CalRGB") => ColorSpaceKind::Rgb,
                Some("CalGray") => ColorSpaceKind::Gray,
                Some(other) => ColorSpaceKind::Other(other.to_string()),
                None => ColorSpaceKind::Other(String::new()),
            }
        }
        _ => ColorSpaceKind::Other(String::new()),
    }
}

/// Describe an image `/ColorSpace` in a form the analyzer can normalize.
fn describe_image_color_space(doc: &Document, value: Option<&Object>) -> String {
    let Some(value) = value.and_then(|v| resolve(doc, v)) else {
        return String::new();
    };
    match value {
        Object::Name(raw) => String::from_utf8_lossy(raw).into_owned(),
        Object::Array(items) => {
            let family = items
                .first()
                .and_then(|f| resolve(doc, f))
                .and_then(name)
                .unwrap_or_default();
            match family.as_str() {
                "ICCBased" => match classify_color_space(doc, value) {
                    ColorSpaceKind::Gray => "ICCBased Gray".into(),
                    ColorSpaceKind::Rgb => "ICCBased RGB".into(),
                    ColorSpaceKind::Cmyk => "ICCBased CMYK".into(),
                    _ => "ICCBased".into(),
                },
                "Indexed" | "I" => {
                    let base = describe_image_color_space(doc, items.get(1));
                    format!("Indexed {}", base).trim_end().to_string()
                }
                "Separation" => {
                    let colorant = items
                        .get(1)
                        .and_then(|n| resolve(doc, n))
                        .and_then(name)
                        .unwrap_or_default();
                    format!("Separation {}", colorant).trim_end().to_string()
                }
                other => other.to_string(),
            }
        }
        _ => String::new(),
    }
}

fn read_image(doc: &Document, object_id: Option<ObjectId>, stream: &lopdf::Stream) -> ImageObject {
    let dict = &stream.dict;
    let dimension = |key: &[u8]| entry_number(doc, dict, key).map_or(0, |v| v.max(0.0) as u32);
    let filters = match entry(doc, dict, b"Filter") {
        Some(Object::Name(raw)) => vec![String::from_utf8_lossy(raw).into_owned()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| resolve(doc, item).and_then(name))
            .collect(),
        _ => Vec::new(),
    };
    let density = if filters.iter().any(|f| f == "DCTDecode" || f == "DCT") {
        jfif_density(&stream.content)
    } else {
        None
    };
    ImageObject {
        object_id,
        width: dimension(b"Width"),
        height: dimension(b"Height"),
        bits_per_component: dimension(b"BitsPerComponent"),
        color_space: describe_image_color_space(doc, dict.get(b"ColorSpace").ok()),
        filters,
        byte_size: stream.content.len(),
        soft_mask: dict.get(b"SMask").is_ok(),
        density,
    }
}

fn read_font(doc: &Document, dict: &Dictionary) -> FontObject {
    let base_font = entry_name(doc, dict, b"BaseFont")
        .or_else(|| entry_name(doc, dict, b"Name"))
        .unwrap_or_else(|| "Unnamed".into());
    let mut subtype = entry_name(doc, dict, b"Subtype").unwrap_or_default();
    let mut descriptor = entry_dict(doc, dict, b"FontDescriptor");

    if subtype == "Type0"
        && let Some(Object::Array(descendants)) = entry(doc, dict, b"DescendantFonts")
        && let Some(descendant) = descendants.first().and_then(|d| resolve_dict(doc, d))
    {
        subtype = entry_name(doc, descendant, b"Subtype").unwrap_or(subtype);
        descriptor = entry_dict(doc, descendant, b"FontDescriptor");
    }

    let has_program = descriptor.is_some_and(|descriptor| {
        FONT_PROGRAM_KEYS
            .iter()
            .any(|key| descriptor.get(key).is_ok())
    });
    if let Some(descriptor) = descriptor
        && let Some(program) = entry_dict(doc, descriptor, b"FontFile3")
        && entry_name(doc, program, b"Subtype").as_deref() == Some("OpenType")
    {
        subtype = "OpenType".into();
    }

    // Type3 glyphs are content-stream procedures stored in the font itself.
    let embedded = has_program || subtype == "Type3";

    FontObject {
        base_font,
        subtype,
        embedded,
    }
}

fn read_ext_gstate(doc: &Document, state: &Dictionary) -> ExtGState {
    let blend_mode = match entry(doc, state, b"BM") {
        Some(Object::Name(raw)) => Some(String::from_utf8_lossy(raw).into_owned()),
        Some(Object::Array(modes)) => modes.iter().find_map(|m| resolve(doc, m).and_then(name)),
        _ => None,
    };
    let soft_mask = matches!(entry(doc, state, b"SMask"), Some(Object::Dictionary(_)));
    ExtGState {
        blend_mode,
        soft_mask,
        stroke_alpha: entry_number(doc, state, b"CA"),
        fill_alpha: entry_number(doc, state, b"ca"),
    }
}

/// Read the pixel density from a JFIF APP0 segment.
fn jfif_density(data: &[u8]) -> Option<(f32, f32)> {
    if data.len() < 20 || data[0..2] != [0xFF, 0xD8] || data[2..4] != [0xFF, 0xE0] {
        return None;
    }
    let segment = &data[4..];
    let length = u16::from_be_bytes([segment[0], segment[1]]) as usize;
    if length < 14 || segment.len() < length || &segment[2..7] != b"JFIF\0" {
        return None;
    }
    let units = segment[9];
    let x = u16::from_be_bytes([segment[10], segment[11]]) as f32;
    let y = u16::from_be_bytes([segment[12], segment[13]]) as f32;
    // Densities of 1 (or unitless aspect ratios) carry no physical size.
    if x <= 1.0 || y <= 1.0 {
        return None;
    }
    match units {
        1 => Some((x, y)),
        2 => Some((x * 2.54, y * 2.54)),
        _ => None,
    }
}
