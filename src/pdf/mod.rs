// Certificate overlay rendering.
// Draws the recipient's name onto the fixed-layout template, centered on
// the pre-printed line, and returns the whole document as bytes.
mod metrics;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;
use tracing::warn;
use ttf_parser::Face;

pub const NAME_FONT_SIZE: f64 = 50.0;
// Baseline height tuned to the template's "OTORGADO A:" line.
const NAME_BASELINE_Y: f64 = 320.0;
const FONT_RESOURCE: &str = "FMov";
const EMBEDDED_FONT_NAME: &str = "MovilisScript";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid certificate template: {0}")]
    Template(String),

    #[error("certificate template contains no pages")]
    EmptyTemplate,

    #[error("could not compose the overlay: {0}")]
    Compose(String),

    #[error("could not serialize the document: {0}")]
    Serialize(String),
}

enum OverlayFont<'a> {
    Embedded(Face<'a>),
    Standard,
}

impl OverlayFont<'_> {
    /// Rendered width of `text` at `size`, using the same per-character
    /// substitution the drawing path applies.
    fn text_width(&self, text: &str, size: f64) -> f64 {
        let units: f64 = text
            .chars()
            .map(|c| {
                let c = if metrics::winansi_encode(c).is_some() {
                    c
                } else {
                    '?'
                };
                match self {
                    OverlayFont::Embedded(face) => face
                        .glyph_index(c)
                        .and_then(|gid| face.glyph_hor_advance(gid))
                        .map(|adv| f64::from(adv) * 1000.0 / f64::from(face.units_per_em()))
                        .unwrap_or(0.0),
                    OverlayFont::Standard => f64::from(metrics::helvetica_width_units(c)),
                }
            })
            .sum();
        units * size / 1000.0
    }
}

/// Horizontal position that centers a run of text on the page.
fn centered_x(page_width: f64, text_width: f64) -> f64 {
    page_width / 2.0 - text_width / 2.0
}

/// Overlays `nombre` onto the first page of the template and returns the
/// serialized document. A failing font never fails the render: the overlay
/// falls back to built-in Helvetica. Everything else is all-or-nothing:
/// the returned bytes are a complete document or the call errors.
pub fn render_certificate(
    template: &[u8],
    font_bytes: Option<&[u8]>,
    nombre: &str,
) -> Result<Vec<u8>, RenderError> {
    let mut doc =
        Document::load_mem(template).map_err(|e| RenderError::Template(e.to_string()))?;

    let pages = doc.get_pages();
    let page_id = *pages.get(&1).ok_or(RenderError::EmptyTemplate)?;
    let page_width = page_width(&doc, page_id);

    let font = match font_bytes {
        Some(bytes) => match Face::parse(bytes, 0) {
            Ok(face) => OverlayFont::Embedded(face),
            Err(err) => {
                warn!(%err, "script font unusable, falling back to Helvetica");
                OverlayFont::Standard
            }
        },
        None => {
            warn!("script font unavailable, falling back to Helvetica");
            OverlayFont::Standard
        }
    };

    let text_width = font.text_width(nombre, NAME_FONT_SIZE);
    let x = centered_x(page_width, text_width);

    let font_id = match &font {
        OverlayFont::Embedded(face) => {
            embed_truetype(&mut doc, font_bytes.expect("embedded implies bytes"), face)
        }
        OverlayFont::Standard => doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        }),
    };
    register_overlay_font(&mut doc, page_id, font_id)?;

    let content = overlay_content(nombre, x, NAME_BASELINE_Y)?;
    doc.add_page_contents(page_id, content)
        .map_err(|e| RenderError::Compose(e.to_string()))?;

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| RenderError::Serialize(e.to_string()))?;
    Ok(bytes)
}

/// Page width from the MediaBox, following `Parent` inheritance. Falls
/// back to US Letter when the template carries no usable box.
fn page_width(doc: &Document, page_id: ObjectId) -> f64 {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
            break;
        };
        if let Some(width) = media_box_width(doc, dict) {
            return width;
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    612.0
}

fn media_box_width(doc: &Document, dict: &Dictionary) -> Option<f64> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = number(&arr[0])?;
    let urx = number(&arr[2])?;
    Some(urx - llx)
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// Full TrueType embedding: font program, descriptor and WinAnsi widths,
/// so viewers shape the name exactly as it was measured.
fn embed_truetype(doc: &mut Document, bytes: &[u8], face: &Face) -> ObjectId {
    let scale = 1000.0 / f64::from(face.units_per_em());
    let to_units = |value: i16| Object::Integer((f64::from(value) * scale).round() as i64);

    let widths: Vec<Object> = (32u8..=255)
        .map(|code| {
            let advance = metrics::winansi_decode(code)
                .and_then(|c| face.glyph_index(c))
                .and_then(|gid| face.glyph_hor_advance(gid))
                .map(|adv| (f64::from(adv) * scale).round() as i64)
                .unwrap_or(0);
            Object::Integer(advance)
        })
        .collect();

    let font_file_id = doc.add_object(Stream::new(
        dictionary! { "Length1" => bytes.len() as i64 },
        bytes.to_vec(),
    ));

    let bbox = face.global_bounding_box();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => EMBEDDED_FONT_NAME,
        "Flags" => 32,
        "FontBBox" => vec![
            to_units(bbox.x_min),
            to_units(bbox.y_min),
            to_units(bbox.x_max),
            to_units(bbox.y_max),
        ],
        "ItalicAngle" => 0,
        "Ascent" => to_units(face.ascender()),
        "Descent" => to_units(face.descender()),
        "CapHeight" => to_units(face.capital_height().unwrap_or_else(|| face.ascender())),
        "StemV" => 80,
        "FontFile2" => font_file_id,
    });

    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => EMBEDDED_FONT_NAME,
        "FirstChar" => 32,
        "LastChar" => 255,
        "Widths" => widths,
        "Encoding" => "WinAnsiEncoding",
        "FontDescriptor" => descriptor_id,
    })
}

/// Makes the overlay font reachable from the page without disturbing the
/// resources the template's own content depends on.
fn register_overlay_font(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Result<(), RenderError> {
    let mut resources = resolved_resources(doc, page_id)?;

    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(existing)) => existing.clone(),
        Ok(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .map(Dictionary::clone)
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };
    fonts.set(FONT_RESOURCE, font_id);
    resources.set("Font", Object::Dictionary(fonts));

    doc.get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| RenderError::Compose(e.to_string()))?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Effective resources of the page, resolved through references and the
/// `Parent` chain, cloned so the page can own an inline copy.
fn resolved_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, RenderError> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc
            .get_object(id)
            .and_then(|o| o.as_dict())
            .map_err(|e| RenderError::Compose(e.to_string()))?;
        match dict.get(b"Resources") {
            Ok(Object::Dictionary(inline)) => return Ok(inline.clone()),
            Ok(Object::Reference(rid)) => {
                return doc
                    .get_dictionary(*rid)
                    .map(Dictionary::clone)
                    .map_err(|e| RenderError::Compose(e.to_string()));
            }
            _ => {}
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
    }
    Ok(Dictionary::new())
}

fn overlay_content(nombre: &str, x: f64, y: f64) -> Result<Vec<u8>, RenderError> {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(FONT_RESOURCE.into()),
                    Object::Real(NAME_FONT_SIZE as f32),
                ],
            ),
            Operation::new(
                "rg",
                vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            ),
            Operation::new("Td", vec![Object::Real(x as f32), Object::Real(y as f32)]),
            Operation::new(
                "Tj",
                vec![Object::String(
                    metrics::encode_text(nombre),
                    StringFormat::Literal,
                )],
            ),
            Operation::new("ET", vec![]),
        ],
    };
    content
        .encode()
        .map_err(|e| RenderError::Compose(e.to_string()))
}
