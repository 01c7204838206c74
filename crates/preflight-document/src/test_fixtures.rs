// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic PDFs for unit tests, built directly with lopdf.

use lopdf::{Dictionary, Document, Object, Stream, dictionary};

use crate::pdf::metadata::set_info_text;

#[derive(Debug, Clone)]
pub enum FixtureFont {
    /// Non-embedded Type1 base font.
    Standard(String),
    /// TrueType with a FontFile2 program.
    Embedded(String),
    Type3(String),
}

impl FixtureFont {
    pub fn standard(name: &str) -> Self {
        Self::Standard(name.into())
    }

    pub fn embedded(name: &str) -> Self {
        Self::Embedded(name.into())
    }

    fn to_object(&self, doc: &mut Document) -> Object {
        match self {
            Self::Standard(name) => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => Object::Name(name.as_bytes().to_vec()),
            }
            .into(),
            Self::Embedded(name) => {
                let program = doc.add_object(Stream::new(Dictionary::new(), vec![0u8; 64]));
                let descriptor = doc.add_object(dictionary! {
                    "Type" => "FontDescriptor",
                    "FontName" => Object::Name(name.as_bytes().to_vec()),
                    "FontFile2" => program,
                });
                dictionary! {
                    "Type" => "Font",
                    "Subtype" => "TrueType",
                    "BaseFont" => Object::Name(name.as_bytes().to_vec()),
                    "FontDescriptor" => descriptor,
                }
                .into()
            }
            Self::Type3(name) => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type3",
                "Name" => Object::Name(name.as_bytes().to_vec()),
                "CharProcs" => Dictionary::new(),
            }
            .into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FixtureImage {
    pub width: u32,
    pub height: u32,
    pub color_space: Object,
    pub components: usize,
    pub soft_mask: bool,
    pub filter: Option<(String, Vec<u8>)>,
}

impl FixtureImage {
    pub fn rgb(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color_space: Object::Name(b"DeviceRGB".to_vec()),
            components: 3,
            soft_mask: false,
            filter: None,
        }
    }

    pub fn gray(width: u32, height: u32) -> Self {
        Self {
            color_space: Object::Name(b"DeviceGray".to_vec()),
            components: 1,
            ..Self::rgb(width, height)
        }
    }

    pub fn cmyk(width: u32, height: u32) -> Self {
        Self {
            color_space: Object::Name(b"DeviceCMYK".to_vec()),
            components: 4,
            ..Self::rgb(width, height)
        }
    }

    pub fn with_color_space(mut self, color_space: Object) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn with_soft_mask(mut self) -> Self {
        self.soft_mask = true;
        self
    }

    /// Use pre-encoded data under the given filter instead of raw samples.
    pub fn encoded(mut self, filter: &str, data: Vec<u8>) -> Self {
        self.filter = Some((filter.into(), data));
        self
    }

    fn to_object(&self, doc: &mut Document) -> Object {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => self.width as i64,
            "Height" => self.height as i64,
            "BitsPerComponent" => Object::Integer(8),
            "ColorSpace" => self.color_space.clone(),
        };
        if self.soft_mask {
            let samples = vec![255u8; (self.width * self.height) as usize];
            let mask = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => self.width as i64,
                    "Height" => self.height as i64,
                    "BitsPerComponent" => Object::Integer(8),
                    "ColorSpace" => "DeviceGray",
                },
                samples,
            ));
            dict.set("SMask", mask);
        }
        let content = match &self.filter {
            Some((filter, data)) => {
                dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
                data.clone()
            }
            None => {
                // A gradient so resampling has something to chew on.
                let pixels = (self.width * self.height) as usize;
                (0..pixels * self.components).map(|i| (i % 251) as u8).collect()
            }
        };
        Stream::new(dict, content).into()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    pub width: f32,
    pub height: f32,
    pub bleed: Option<f32>,
    pub crop_inset: Option<f32>,
    pub inherit_media_box: bool,
    pub transparency_group: bool,
    pub content: String,
    pub raw_content: Option<(Vec<u8>, &'static str)>,
    pub fonts: Vec<FixtureFont>,
    pub images: Vec<FixtureImage>,
    pub forms: Vec<String>,
    pub ext_gstates: Vec<Dictionary>,
    pub color_spaces: Vec<(String, Object)>,
}

impl FixturePage {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// TrimBox at `[0 0 w h]` with BleedBox and MediaBox grown by `bleed`.
    pub fn with_trim_and_bleed(mut self, bleed: f32) -> Self {
        self.bleed = Some(bleed);
        self
    }

    pub fn with_crop_inset(mut self, inset: f32) -> Self {
        self.crop_inset = Some(inset);
        self
    }

    /// Put the MediaBox on the parent Pages node instead of the page.
    pub fn inheriting_media_box(mut self) -> Self {
        self.inherit_media_box = true;
        self
    }

    pub fn with_transparency_group(mut self) -> Self {
        self.transparency_group = true;
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = content.into();
        self
    }

    /// Content bytes stored verbatim under `filter`.
    pub fn with_raw_content(mut self, bytes: Vec<u8>, filter: &'static str) -> Self {
        self.raw_content = Some((bytes, filter));
        self
    }

    /// Fonts are named `/F0`, `/F1`, ... in resource order.
    pub fn with_font(mut self, font: FixtureFont) -> Self {
        self.fonts.push(font);
        self
    }

    /// Images are named `/Im0`, `/Im1`, ...
    pub fn with_image(mut self, image: FixtureImage) -> Self {
        self.images.push(image);
        self
    }

    /// Forms are named `/Fm0`, `/Fm1`, ... and share the page's resources.
    pub fn with_form(mut self, content: &str) -> Self {
        self.forms.push(content.into());
        self
    }

    /// Graphics states are named `/GS0`, `/GS1`, ...
    pub fn with_ext_gstate(mut self, state: Dictionary) -> Self {
        self.ext_gstates.push(state);
        self
    }

    pub fn with_color_space(mut self, name: &str, space: Object) -> Self {
        self.color_spaces.push((name.into(), space));
        self
    }
}

fn rect(llx: f32, lly: f32, urx: f32, ury: f32) -> Object {
    Object::Array(vec![llx.into(), lly.into(), urx.into(), ury.into()])
}

/// Build a document from page descriptions.
pub fn build_document(pages: &[FixturePage]) -> Document {
    let mut doc = Document::with_version("1.6");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for page in pages {
        let mut resources = Dictionary::new();

        let mut fonts = Dictionary::new();
        for (index, font) in page.fonts.iter().enumerate() {
            let object = font.to_object(&mut doc);
            let id = doc.add_object(object);
            fonts.set(format!("F{}", index), id);
        }
        if !fonts.is_empty() {
            resources.set("Font", fonts);
        }

        let mut states = Dictionary::new();
        for (index, state) in page.ext_gstates.iter().enumerate() {
            states.set(format!("GS{}", index), state.clone());
        }
        if !states.is_empty() {
            resources.set("ExtGState", states);
        }

        let mut spaces = Dictionary::new();
        for (name, space) in &page.color_spaces {
            spaces.set(name.as_str(), space.clone());
        }
        if !spaces.is_empty() {
            resources.set("ColorSpace", spaces);
        }

        let mut xobjects = Dictionary::new();
        for (index, image) in page.images.iter().enumerate() {
            let object = image.to_object(&mut doc);
            let id = doc.add_object(object);
            xobjects.set(format!("Im{}", index), id);
        }
        let resources_id = doc.new_object_id();
        for (index, form) in page.forms.iter().enumerate() {
            let id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => rect(0.0, 0.0, page.width, page.height),
                    "Resources" => resources_id,
                },
                form.as_bytes().to_vec(),
            ));
            xobjects.set(format!("Fm{}", index), id);
        }
        if !xobjects.is_empty() {
            resources.set("XObject", xobjects);
        }
        doc.objects.insert(resources_id, Object::Dictionary(resources));

        let content = match &page.raw_content {
            Some((bytes, filter)) => Stream::new(
                dictionary! { "Filter" => Object::Name(filter.as_bytes().to_vec()) },
                bytes.clone(),
            ),
            None => Stream::new(Dictionary::new(), page.content.as_bytes().to_vec()),
        };
        let content_id = doc.add_object(content);

        let mut dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => resources_id,
            "Contents" => content_id,
        };
        let (w, h) = (page.width, page.height);
        match page.bleed {
            Some(bleed) => {
                dict.set("MediaBox", rect(-bleed, -bleed, w + bleed, h + bleed));
                dict.set("TrimBox", rect(0.0, 0.0, w, h));
                dict.set("BleedBox", rect(-bleed, -bleed, w + bleed, h + bleed));
            }
            None if !page.inherit_media_box => dict.set("MediaBox", rect(0.0, 0.0, w, h)),
            None => {}
        }
        if let Some(inset) = page.crop_inset {
            dict.set("CropBox", rect(inset, inset, w - inset, h - inset));
        }
        if page.transparency_group {
            dict.set("Group", dictionary! { "S" => "Transparency" });
        }
        kids.push(Object::from(doc.add_object(dict)));
    }

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages.len() as i64,
    };
    if let Some(first) = pages.iter().find(|p| p.inherit_media_box) {
        tree.set("MediaBox", rect(0.0, 0.0, first.width, first.height));
    }
    doc.objects.insert(pages_id, Object::Dictionary(tree));
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog);
    doc
}

pub fn to_bytes(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture serializes");
    bytes
}

/// Build and serialize.
pub fn build_pdf(pages: &[FixturePage]) -> Vec<u8> {
    to_bytes(build_document(pages))
}

/// Build with an Info dictionary.
pub fn build_pdf_with_info(pages: &[FixturePage], info: &[(&str, &str)]) -> Vec<u8> {
    let mut doc = build_document(pages);
    for (key, value) in info {
        set_info_text(&mut doc, key, value).expect("info is writable");
    }
    to_bytes(doc)
}

/// A Letter page painted only in RGB with one non-embedded font.
pub fn rgb_letter_pdf() -> Vec<u8> {
    build_pdf(&[FixturePage::new(612.0, 792.0)
        .with_font(FixtureFont::standard("Helvetica"))
        .with_content("1 0 0 rg 0 0 100 100 re f 0 0 1 RG BT /F0 12 Tf 72 720 Td (Hello) Tj ET")])
}

/// A page already meeting PDF/X expectations.
pub fn print_ready_pdf() -> Vec<u8> {
    build_pdf(&[FixturePage::new(612.0, 792.0)
        .with_trim_and_bleed(9.0)
        .with_font(FixtureFont::embedded("ABCDEF+Minion"))
        .with_content("0 0 0 1 k 0 0 100 100 re f BT /F0 12 Tf 72 720 Td (Ready) Tj ET")])
}

/// Read a page's own box entry.
pub fn page_box(doc: &Document, page: u32, key: &[u8]) -> Option<[f32; 4]> {
    let id = *doc.get_pages().get(&page)?;
    crate::pdf::copy::page_rect(doc, id, key).map(|r| r.to_array())
}
