// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image resampling. Images placed below the target resolution are upsampled
// to it and images above twice the target are downsampled to it. Only 8-bit
// DeviceRGB and DeviceGray images stored raw, Flate or DCT are re-encoded;
// anything else is left alone with a note.

use std::collections::BTreeMap;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, ObjectId};
use preflight_core::error::{PreflightError, Result};
use preflight_core::{AnalysisConfig, FixToken};
use tracing::{debug, info, instrument};

use super::FixContext;
use crate::analysis::images::analyze_images;
use crate::pdf::objects::{compress_stream, entry, entry_name, entry_number, name, stream_bytes};
use crate::pdf::snapshot::DocumentSnapshot;

/// Largest side a resampled image may have, in pixels.
const MAX_DIMENSION: u32 = 20_000;

const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channels {
    Rgb,
    Gray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Raw,
    Flate,
    Jpeg,
}

enum Outcome {
    Resampled { from: (u32, u32), to: (u32, u32) },
    Skipped(String),
}

#[instrument(skip_all, fields(target_dpi = ctx.options.target_dpi))]
pub fn resample_images(mut doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let target = ctx.options.target_dpi;
    let snapshot = DocumentSnapshot::from_document(&doc, &[]);
    let config = AnalysisConfig {
        min_dpi: target,
        ..Default::default()
    };

    // An image placed more than once is judged by its lowest resolution.
    let mut lowest: BTreeMap<ObjectId, f32> = BTreeMap::new();
    for record in analyze_images(&snapshot, &config).into_value() {
        if let Some(id) = record.object_ref {
            let dpi = lowest.entry(id).or_insert(record.dpi);
            *dpi = dpi.min(record.dpi);
        }
    }

    let mut resampled = 0;
    for (id, dpi) in lowest {
        if dpi <= 0.0 || (target..=target * 2.0).contains(&dpi) {
            continue;
        }
        match resample_one(&mut doc, id, target / dpi)? {
            Outcome::Resampled { from, to } => {
                debug!(object = id.0, ?from, ?to, dpi, "Image resampled");
                resampled += 1;
            }
            Outcome::Skipped(reason) => {
                ctx.note(FixToken::Resample, format!("image {} {} R skipped: {}", id.0, id.1, reason));
            }
        }
    }
    info!(resampled, "Image resampling finished");
    Ok(doc)
}

fn resample_one(doc: &mut Document, id: ObjectId, scale: f32) -> Result<Outcome> {
    let Ok(Object::Stream(stream)) = doc.get_object(id) else {
        return Ok(Outcome::Skipped("not an image stream".into()));
    };
    let dict = &stream.dict;
    let width = entry_number(doc, dict, b"Width").unwrap_or(0.0) as u32;
    let height = entry_number(doc, dict, b"Height").unwrap_or(0.0) as u32;
    if width == 0 || height == 0 {
        return Ok(Outcome::Skipped("missing dimensions".into()));
    }
    if entry_number(doc, dict, b"BitsPerComponent") != Some(8.0) {
        return Ok(Outcome::Skipped("not 8 bits per component".into()));
    }
    let channels = match entry_name(doc, dict, b"ColorSpace").as_deref() {
        Some("DeviceRGB") => Channels::Rgb,
        Some("DeviceGray") => Channels::Gray,
        other => {
            return Ok(Outcome::Skipped(format!(
                "color space {} is not DeviceRGB or DeviceGray",
                other.unwrap_or("(array)")
            )));
        }
    };
    let filters: Vec<String> = match entry(doc, dict, b"Filter") {
        None => Vec::new(),
        Some(Object::Array(items)) => items.iter().filter_map(name).collect(),
        Some(other) => name(other).into_iter().collect(),
    };
    let encoding = match filters.as_slice() {
        [] => Encoding::Raw,
        [only] if only == "FlateDecode" && dict.get(b"DecodeParms").is_err() => Encoding::Flate,
        [only] if only == "DCTDecode" => Encoding::Jpeg,
        _ => {
            return Ok(Outcome::Skipped(format!("encoding {:?} is not supported", filters)));
        }
    };

    let new_width = (width as f32 * scale).round().max(1.0) as u32;
    let new_height = (height as f32 * scale).round().max(1.0) as u32;
    if new_width > MAX_DIMENSION || new_height > MAX_DIMENSION {
        return Ok(Outcome::Skipped(format!("{}x{} would exceed the size limit", new_width, new_height)));
    }

    let decoded = match encoding {
        Encoding::Jpeg => image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|err| err.to_string()),
        Encoding::Raw | Encoding::Flate => stream_bytes(stream)
            .ok_or_else(|| "samples cannot be decoded".to_string())
            .and_then(|samples| from_samples(samples, width, height, channels)),
    };
    let image = match decoded {
        Ok(image) => image,
        Err(reason) => return Ok(Outcome::Skipped(reason)),
    };
    let resized = match channels {
        Channels::Rgb => DynamicImage::ImageRgb8(image.to_rgb8()),
        Channels::Gray => DynamicImage::ImageLuma8(image.to_luma8()),
    }
    .resize_exact(new_width, new_height, FilterType::Lanczos3);

    let Ok(Object::Stream(stream)) = doc.get_object_mut(id) else {
        return Ok(Outcome::Skipped("not an image stream".into()));
    };
    match encoding {
        Encoding::Jpeg => {
            let mut buffer = Vec::new();
            resized
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY))
                .map_err(|err| PreflightError::ImageError(format!("JPEG encoding failed: {}", err)))?;
            stream.set_content(buffer);
            stream.dict.remove(b"DecodeParms");
        }
        Encoding::Raw | Encoding::Flate => {
            let samples = match channels {
                Channels::Rgb => resized.to_rgb8().into_raw(),
                Channels::Gray => resized.to_luma8().into_raw(),
            };
            stream.set_plain_content(samples);
            compress_stream(stream);
        }
    }
    stream.dict.set("Width", new_width as i64);
    stream.dict.set("Height", new_height as i64);
    Ok(Outcome::Resampled {
        from: (width, height),
        to: (new_width, new_height),
    })
}

fn from_samples(mut samples: Vec<u8>, width: u32, height: u32, channels: Channels) -> std::result::Result<DynamicImage, String> {
    let per_pixel = match channels {
        Channels::Rgb => 3,
        Channels::Gray => 1,
    };
    let expected = width as usize * height as usize * per_pixel;
    if samples.len() < expected {
        return Err(format!("{} sample bytes, expected {}", samples.len(), expected));
    }
    samples.truncate(expected);
    let image = match channels {
        Channels::Rgb => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        Channels::Gray => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
    };
    image.ok_or_else(|| "sample buffer does not match dimensions".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{FixtureImage, FixturePage, build_document, to_bytes};
    use image::ImageEncoder;
    use preflight_core::FixOptions;

    const PLACED_100PT: &str = "q 100 0 0 100 0 0 cm /Im0 Do Q";

    fn resample(image: FixtureImage) -> (Document, Vec<String>) {
        let doc = build_document(&[FixturePage::new(612.0, 792.0).with_image(image).with_content(PLACED_100PT)]);
        let options = FixOptions::default();
        let mut ctx = FixContext::new(&options, None);
        let doc = resample_images(doc, &mut ctx).unwrap();
        (doc, ctx.into_notes())
    }

    fn image_dict(doc: &Document) -> lopdf::Dictionary {
        let snapshot = DocumentSnapshot::from_document(doc, &[]);
        let id = snapshot.images[0].object_id.unwrap();
        doc.get_object(id).unwrap().as_stream().unwrap().dict.clone()
    }

    #[test]
    fn low_resolution_images_are_upsampled() {
        let (doc, notes) = resample(FixtureImage::rgb(10, 10));
        assert!(notes.is_empty(), "{:?}", notes);
        let dict = image_dict(&doc);
        assert!(matches!(dict.get(b"Width"), Ok(Object::Integer(417))));
        assert!(matches!(dict.get(b"Height"), Ok(Object::Integer(417))));

        let snapshot = DocumentSnapshot::from_bytes(&to_bytes(doc)).unwrap();
        let records = analyze_images(&snapshot, &AnalysisConfig::default()).into_value();
        assert!(records[0].meets_min_dpi);
    }

    #[test]
    fn oversampled_gray_images_are_downsampled_and_compressed() {
        let (doc, _) = resample(FixtureImage::gray(1000, 1000));
        let dict = image_dict(&doc);
        assert!(matches!(dict.get(b"Width"), Ok(Object::Integer(417))));
        assert_eq!(entry_name(&doc, &dict, b"Filter").as_deref(), Some("FlateDecode"));
    }

    #[test]
    fn images_within_range_are_untouched() {
        let (doc, _) = resample(FixtureImage::rgb(500, 500));
        let dict = image_dict(&doc);
        assert!(matches!(dict.get(b"Width"), Ok(Object::Integer(500))));
    }

    #[test]
    fn jpeg_images_stay_jpeg() {
        let pixels = RgbImage::from_fn(8, 8, |x, y| image::Rgb([(x * 30) as u8, (y * 30) as u8, 128]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 90)
            .write_image(pixels.as_raw(), 8, 8, image::ExtendedColorType::Rgb8)
            .unwrap();

        let (doc, notes) = resample(FixtureImage::rgb(8, 8).encoded("DCTDecode", jpeg));
        assert!(notes.is_empty(), "{:?}", notes);
        let dict = image_dict(&doc);
        assert_eq!(entry_name(&doc, &dict, b"Filter").as_deref(), Some("DCTDecode"));
        let id = DocumentSnapshot::from_document(&doc, &[]).images[0].object_id.unwrap();
        let content = &doc.get_object(id).unwrap().as_stream().unwrap().content;
        let decoded = image::load_from_memory_with_format(content, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (417, 417));
    }

    #[test]
    fn unsupported_images_are_noted() {
        let (doc, notes) = resample(FixtureImage::cmyk(10, 10));
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("resample: image "));
        assert!(notes[0].contains("DeviceCMYK"));
        let dict = image_dict(&doc);
        assert!(matches!(dict.get(b"Width"), Ok(Object::Integer(10))));
    }
}
