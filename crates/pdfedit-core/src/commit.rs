//! Commit engine: bakes overlay annotations into the document bytes.
//!
//! Each committable annotation becomes draw operations in a content stream
//! appended to its page, or a widget annotation for form fields. The page's
//! existing content is wrapped in a save/restore pair first so a dangling
//! transform in the original stream cannot displace the overlay drawing.
//! Within a page, kinds are drawn in a fixed order; later draws paint over
//! earlier ones.

use std::collections::{BTreeMap, BTreeSet};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::annotation::{
    Annotation, AnnotationKind, Background, FormFieldKind, FormFieldStyle, HighlightStyle,
    LineEnds, ShapeKind, ShapeStyle, TextAlign, TextStyle, WatermarkStyle,
};
use crate::error::EditError;
use crate::fonts::{self, StandardFont};
use crate::geometry::{arrow_head, rotate_point, Point, WrapperBox};
use crate::image;
use crate::pages::page_dimensions;

/// Arrowheads are redrawn at commit time in document coordinates, slightly
/// larger than the live overlay's.
const ARROW_HEAD_LEN: f64 = 15.0;
/// Wrapper text is inset from the wrapper's top-left corner.
const TEXT_INSET: f64 = 5.0;
/// Line spacing for multi-line text, as a multiple of the font size.
const LEADING_FACTOR: f64 = 1.2;
/// Unrotated text places its baseline this fraction of the font size below
/// the overlay's top edge.
const BASELINE_FACTOR: f64 = 0.8;
/// Cubic Bezier circle-quadrant constant.
const ELLIPSE_KAPPA: f64 = 0.552_284_749_830_793_4;

const REDACT_COLOR: (f32, f32, f32) = (1.0, 1.0, 1.0);
const EXTRACT_COLOR: (f32, f32, f32) = (1.0, 1.0, 0.0);
const EXTRACT_OPACITY: f64 = 0.4;
const SIGNATURE_FIELD_BG: (f32, f32, f32) = (0.9, 0.9, 0.9);

/// Writes every committable annotation into the document and returns the new
/// bytes. The input bytes are returned unchanged when there is nothing to
/// commit. Individual annotations that cannot be drawn are logged and
/// skipped rather than failing the whole commit.
pub fn commit_annotations(
    pdf_bytes: &[u8],
    annotations: &[Annotation],
) -> Result<Vec<u8>, EditError> {
    let committable: Vec<&Annotation> = annotations.iter().filter(|a| a.is_committable()).collect();
    if committable.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    tracing::debug!(count = committable.len(), "committing overlay annotations");

    let mut doc = Document::load_mem(pdf_bytes).map_err(|e| EditError::Parse(e.to_string()))?;
    let pages: BTreeMap<u32, ObjectId> = doc.get_pages();

    let mut by_page: BTreeMap<usize, Vec<&Annotation>> = BTreeMap::new();
    for annotation in committable {
        by_page
            .entry(annotation.page_index)
            .or_default()
            .push(annotation);
    }

    let mut field_ids = Vec::new();
    for (page_index, page_annotations) in &by_page {
        let page_num = u32::try_from(*page_index)
            .ok()
            .and_then(|n| n.checked_add(1));
        let Some(&page_id) = page_num.and_then(|n| pages.get(&n)) else {
            tracing::warn!(
                page_index = *page_index,
                "skipping annotations on page missing from document"
            );
            continue;
        };
        let widgets = commit_page(&mut doc, page_id, page_annotations)?;
        field_ids.extend(widgets);
    }

    ensure_acroform(&mut doc, &field_ids)?;

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| EditError::Save(e.to_string()))?;
    Ok(output)
}

/// Draws all annotations of one page and returns the widget ids of any form
/// fields it created.
fn commit_page(
    doc: &mut Document,
    page_id: ObjectId,
    annotations: &[&Annotation],
) -> Result<Vec<ObjectId>, EditError> {
    let (page_width, page_height) = page_dimensions(doc, page_id)?;
    let mut builder = ContentBuilder::new(page_width, page_height);

    // Pass order decides what paints over what: text runs, draft rectangles,
    // images, freehand paths, shapes, watermarks, rotated wrapper text.
    for annotation in annotations {
        if let AnnotationKind::Text {
            text,
            style,
            background,
        } = &annotation.kind
        {
            if annotation.rect.rotation == 0.0 {
                builder.plain_text(&annotation.rect, text, style, background);
            }
        }
    }

    for annotation in annotations {
        match &annotation.kind {
            AnnotationKind::Redact => {
                builder.fill_rect(&annotation.rect, REDACT_COLOR, 1.0);
            }
            AnnotationKind::Extract => {
                builder.fill_rect(&annotation.rect, EXTRACT_COLOR, EXTRACT_OPACITY);
            }
            _ => {}
        }
    }

    for annotation in annotations {
        let AnnotationKind::Image { bytes } = &annotation.kind else {
            continue;
        };
        let embedded = image::decode(bytes).and_then(|decoded| image::add_image_xobject(doc, &decoded));
        match embedded {
            Ok(xobject_id) => {
                let name = format!("Im{}", annotation.id);
                builder.image(&annotation.rect, &name);
                builder.images.push((name, xobject_id));
            }
            Err(e) => {
                tracing::warn!(id = annotation.id, error = %e, "skipping image annotation");
            }
        }
    }

    for annotation in annotations {
        if let AnnotationKind::Highlight { points, style } = &annotation.kind {
            builder.highlight(points, style);
        }
    }

    for annotation in annotations {
        if let AnnotationKind::Shape { shape, style, ends } = &annotation.kind {
            builder.shape(annotation.id, &annotation.rect, *shape, style, ends.as_ref());
        }
    }

    for annotation in annotations {
        if let AnnotationKind::Watermark { text, style } = &annotation.kind {
            builder.watermark(text, style);
        }
    }

    for annotation in annotations {
        if let AnnotationKind::Text {
            text,
            style,
            background,
        } = &annotation.kind
        {
            if annotation.rect.rotation != 0.0 {
                builder.wrapper_text(&annotation.rect, text, style, background);
            }
        }
    }

    if !builder.ops.is_empty() {
        write_page_resources(doc, page_id, &builder)?;
        append_page_content(doc, page_id, &builder.ops)?;
    }

    let mut field_ids = Vec::new();
    for annotation in annotations {
        if let AnnotationKind::FormField { field, style } = &annotation.kind {
            let widget_id = add_form_field(doc, page_id, page_height, annotation, *field, style)?;
            field_ids.push(widget_id);
        }
    }

    Ok(field_ids)
}

/// Accumulates content stream operations for one page, tracking which fonts,
/// graphics states, and image XObjects the page resources must provide.
struct ContentBuilder {
    page_width: f64,
    page_height: f64,
    ops: String,
    fonts: BTreeSet<StandardFont>,
    /// Alpha values in permille, each becoming one ExtGState entry.
    alphas: BTreeSet<u32>,
    images: Vec<(String, ObjectId)>,
}

impl ContentBuilder {
    fn new(page_width: f64, page_height: f64) -> Self {
        Self {
            page_width,
            page_height,
            ops: String::new(),
            fonts: BTreeSet::new(),
            alphas: BTreeSet::new(),
            images: Vec::new(),
        }
    }

    fn use_font(&mut self, font: StandardFont) -> &'static str {
        self.fonts.insert(font);
        font.resource_key()
    }

    /// Registers an alpha value and returns the `gs` op selecting it, or an
    /// empty string for fully opaque drawing.
    fn use_alpha(&mut self, alpha: f64) -> String {
        if alpha >= 1.0 {
            return String::new();
        }
        let permille = (alpha.clamp(0.0, 1.0) * 1000.0).round() as u32;
        self.alphas.insert(permille);
        format!("/{} gs\n", alpha_name(permille))
    }

    fn push(&mut self, ops: &str) {
        self.ops.push_str(ops);
    }

    fn plain_text(&mut self, rect: &WrapperBox, text: &str, style: &TextStyle, background: &Background) {
        if !background.transparent {
            self.fill_rect(rect, parse_css_color(&background.color), background.alpha);
        }

        let font = StandardFont::resolve(&style.font_family, style.bold, style.italic);
        let key = self.use_font(font);
        let (r, g, b) = parse_css_color(&style.color);
        let size = style.font_size;
        let baseline = self.page_height - rect.y - BASELINE_FACTOR * size;
        let leading = LEADING_FACTOR * size;

        let mut ops = format!(
            "q\nBT\n/{key} {} Tf\n{} {} {} rg\n{} {} Td\n",
            fmt(size),
            fmt32(r),
            fmt32(g),
            fmt32(b),
            fmt(rect.x),
            fmt(baseline),
        );
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                ops.push_str(&format!("0 {} Td\n", fmt(-leading)));
            }
            ops.push_str(&format!("({}) Tj\n", escape_pdf_string(line)));
        }
        ops.push_str("ET\nQ\n");
        self.push(&ops);
    }

    fn wrapper_text(&mut self, rect: &WrapperBox, text: &str, style: &TextStyle, background: &Background) {
        let font = StandardFont::resolve(&style.font_family, style.bold, style.italic);
        let key = self.use_font(font);
        let (r, g, b) = parse_css_color(&style.color);
        let size = style.font_size;
        let leading = LEADING_FACTOR * size;

        // Rotation pivots on the first baseline origin, inset from the
        // wrapper's top-left corner.
        let origin_x = rect.x + TEXT_INSET;
        let origin_y = self.page_height - rect.y - size - TEXT_INSET;
        let phi = -rect.rotation.to_radians();
        let (cos, sin) = (phi.cos(), phi.sin());

        if !background.transparent {
            let (br, bg, bb) = parse_css_color(&background.color);
            let gs = self.use_alpha(background.alpha);
            // The wrapper box, expressed in the frame rotated about the
            // text origin so fill and glyphs share one transform.
            let ops = format!(
                "q\n{gs}{} {} {} rg\n{} {} {} {} {} {} cm\n{} {} {} {} re\nf\nQ\n",
                fmt32(br),
                fmt32(bg),
                fmt32(bb),
                fmt(cos),
                fmt(sin),
                fmt(-sin),
                fmt(cos),
                fmt(origin_x),
                fmt(origin_y),
                fmt(-TEXT_INSET),
                fmt(size + TEXT_INSET - rect.height),
                fmt(rect.width),
                fmt(rect.height),
            );
            self.push(&ops);
        }

        let mut ops = format!(
            "q\nBT\n/{key} {} Tf\n{} {} {} rg\n{} {} {} {} {} {} Tm\n",
            fmt(size),
            fmt32(r),
            fmt32(g),
            fmt32(b),
            fmt(cos),
            fmt(sin),
            fmt(-sin),
            fmt(cos),
            fmt(origin_x),
            fmt(origin_y),
        );
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                ops.push_str(&format!("0 {} Td\n", fmt(-leading)));
            }
            ops.push_str(&format!("({}) Tj\n", escape_pdf_string(line)));
        }
        ops.push_str("ET\nQ\n");
        self.push(&ops);
    }

    fn fill_rect(&mut self, rect: &WrapperBox, color: (f32, f32, f32), alpha: f64) {
        let gs = self.use_alpha(alpha);
        let (r, g, b) = color;
        let ops = if rect.rotation == 0.0 {
            format!(
                "q\n{gs}{} {} {} rg\n{} {} {} {} re\nf\nQ\n",
                fmt32(r),
                fmt32(g),
                fmt32(b),
                fmt(rect.x),
                fmt(self.page_height - rect.y - rect.height),
                fmt(rect.width),
                fmt(rect.height),
            )
        } else {
            let (cm, hw, hh) = self.centered_transform(rect);
            format!(
                "q\n{gs}{} {} {} rg\n{cm}{} {} {} {} re\nf\nQ\n",
                fmt32(r),
                fmt32(g),
                fmt32(b),
                fmt(-hw),
                fmt(-hh),
                fmt(rect.width),
                fmt(rect.height),
            )
        };
        self.push(&ops);
    }

    fn image(&mut self, rect: &WrapperBox, name: &str) {
        let (w, h) = (rect.width, rect.height);
        let phi = -rect.rotation.to_radians();
        let (cos, sin) = (phi.cos(), phi.sin());

        // Place so the visual center is preserved under rotation: back the
        // draw origin out from the center by the rotated half extents.
        let cx = rect.x + w / 2.0;
        let cy = self.page_height - (rect.y + h / 2.0);
        let draw_x = cx - (w / 2.0 * cos - h / 2.0 * sin);
        let draw_y = cy - (w / 2.0 * sin + h / 2.0 * cos);

        let ops = format!(
            "q\n{} {} {} {} {} {} cm\n/{name} Do\nQ\n",
            fmt(w * cos),
            fmt(w * sin),
            fmt(-h * sin),
            fmt(h * cos),
            fmt(draw_x),
            fmt(draw_y),
        );
        self.push(&ops);
    }

    fn highlight(&mut self, points: &[Point], style: &HighlightStyle) {
        if points.len() < 2 {
            return;
        }
        let (r, g, b) = parse_css_color(&style.color);
        let gs = self.use_alpha(style.opacity);

        let mut ops = format!(
            "q\n{gs}{} {} {} RG\n{} w\n1 J\n",
            fmt32(r),
            fmt32(g),
            fmt32(b),
            fmt(style.width),
        );
        for (i, point) in points.iter().enumerate() {
            let op = if i == 0 { "m" } else { "l" };
            ops.push_str(&format!(
                "{} {} {op}\n",
                fmt(point.x),
                fmt(self.page_height - point.y)
            ));
        }
        ops.push_str("S\nQ\n");
        self.push(&ops);
    }

    fn shape(
        &mut self,
        id: u64,
        rect: &WrapperBox,
        shape: ShapeKind,
        style: &ShapeStyle,
        ends: Option<&LineEnds>,
    ) {
        let (r, g, b) = parse_css_color(&style.stroke_color);
        let stroke = format!(
            "{} {} {} RG\n{} w\n",
            fmt32(r),
            fmt32(g),
            fmt32(b),
            fmt(style.stroke_width)
        );

        match shape {
            ShapeKind::Rect => {
                let ops = if rect.rotation == 0.0 {
                    format!(
                        "q\n{stroke}{} {} {} {} re\nS\nQ\n",
                        fmt(rect.x),
                        fmt(self.page_height - rect.y - rect.height),
                        fmt(rect.width),
                        fmt(rect.height),
                    )
                } else {
                    let (cm, hw, hh) = self.centered_transform(rect);
                    format!(
                        "q\n{stroke}{cm}{} {} {} {} re\nS\nQ\n",
                        fmt(-hw),
                        fmt(-hh),
                        fmt(rect.width),
                        fmt(rect.height),
                    )
                };
                self.push(&ops);
            }
            ShapeKind::Ellipse => {
                let (cm, _, _) = self.centered_transform(rect);
                let rx = rect.width / 2.0;
                let ry = rect.height / 2.0;
                let kx = ELLIPSE_KAPPA * rx;
                let ky = ELLIPSE_KAPPA * ry;
                let ops = format!(
                    "q\n{stroke}{cm}{rx} 0 m\n\
                     {rx} {ky} {kx} {ry} 0 {ry} c\n\
                     -{kx} {ry} -{rx} {ky} -{rx} 0 c\n\
                     -{rx} -{ky} -{kx} -{ry} 0 -{ry} c\n\
                     {kx} -{ry} {rx} -{ky} {rx} 0 c\nS\nQ\n",
                    rx = fmt(rx),
                    ry = fmt(ry),
                    kx = fmt(kx),
                    ky = fmt(ky),
                );
                self.push(&ops);
            }
            ShapeKind::Line | ShapeKind::Arrow => {
                let Some(ends) = ends else {
                    tracing::warn!(id, "skipping line shape without endpoints");
                    return;
                };
                let angle = rect.rotation_rad();
                let center = rect.center();
                let start_page = rotate_point(
                    Point::new(rect.x + ends.start.x, rect.y + ends.start.y),
                    center,
                    angle,
                );
                let end_page = rotate_point(
                    Point::new(rect.x + ends.end.x, rect.y + ends.end.y),
                    center,
                    angle,
                );
                let p1 = Point::new(start_page.x, self.page_height - start_page.y);
                let p2 = Point::new(end_page.x, self.page_height - end_page.y);

                let mut ops = format!(
                    "q\n{stroke}{} {} m\n{} {} l\n",
                    fmt(p1.x),
                    fmt(p1.y),
                    fmt(p2.x),
                    fmt(p2.y),
                );
                if shape == ShapeKind::Arrow {
                    let (w1, w2) = arrow_head(p1, p2, ARROW_HEAD_LEN);
                    ops.push_str(&format!(
                        "{} {} m\n{} {} l\n{} {} m\n{} {} l\n",
                        fmt(p2.x),
                        fmt(p2.y),
                        fmt(w1.x),
                        fmt(w1.y),
                        fmt(p2.x),
                        fmt(p2.y),
                        fmt(w2.x),
                        fmt(w2.y),
                    ));
                }
                ops.push_str("S\nQ\n");
                self.push(&ops);
            }
        }
    }

    fn watermark(&mut self, text: &str, style: &WatermarkStyle) {
        let key = self.use_font(StandardFont::Helvetica);
        let (r, g, b) = parse_css_color(&style.color);
        let gs = self.use_alpha(style.opacity);
        let size = style.font_size;

        let text_width = fonts::helvetica_text_width(text, size);
        let text_height = fonts::helvetica_text_height(size);
        let x = (self.page_width - text_width) / 2.0;
        let y = (self.page_height - text_height) / 2.0;

        let phi = style.rotation.to_radians();
        let (cos, sin) = (phi.cos(), phi.sin());

        let ops = format!(
            "q\n{gs}BT\n/{key} {} Tf\n{} {} {} rg\n{} {} {} {} {} {} Tm\n({}) Tj\nET\nQ\n",
            fmt(size),
            fmt32(r),
            fmt32(g),
            fmt32(b),
            fmt(cos),
            fmt(sin),
            fmt(-sin),
            fmt(cos),
            fmt(x),
            fmt(y),
            escape_pdf_string(text),
        );
        self.push(&ops);
    }

    /// A `cm` op moving the origin to the rect center with the rect's
    /// rotation applied, plus the half extents for drawing around it.
    fn centered_transform(&self, rect: &WrapperBox) -> (String, f64, f64) {
        let phi = -rect.rotation.to_radians();
        let (cos, sin) = (phi.cos(), phi.sin());
        let cx = rect.x + rect.width / 2.0;
        let cy = self.page_height - rect.y - rect.height / 2.0;
        let cm = format!(
            "{} {} {} {} {} {} cm\n",
            fmt(cos),
            fmt(sin),
            fmt(-sin),
            fmt(cos),
            fmt(cx),
            fmt(cy),
        );
        (cm, rect.width / 2.0, rect.height / 2.0)
    }
}

fn alpha_name(permille: u32) -> String {
    format!("GSa{permille}")
}

/// Parse a CSS color ("#rrggbb" or "rgb(r, g, b)") to RGB floats (0-1
/// range). Unparseable input falls back to black.
fn parse_css_color(color: &str) -> (f32, f32, f32) {
    let trimmed = color.trim();
    if let Some(rest) = trimmed
        .strip_prefix("rgba(")
        .or_else(|| trimmed.strip_prefix("rgb("))
    {
        let inner = rest.trim_end_matches(')');
        let mut parts = inner.split(',').map(str::trim);
        let mut channel = |def: f32| {
            parts
                .next()
                .and_then(|v| v.parse::<f32>().ok())
                .map_or(def, |v| (v / 255.0).clamp(0.0, 1.0))
        };
        let r = channel(0.0);
        let g = channel(0.0);
        let b = channel(0.0);
        return (r, g, b);
    }

    let hex = trimmed.trim_start_matches('#');
    if hex.len() >= 6 {
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0) as f32 / 255.0;
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0) as f32 / 255.0;
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0) as f32 / 255.0;
        (r, g, b)
    } else {
        (0.0, 0.0, 0.0)
    }
}

fn escape_pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\\' => out.push_str("\\\\"),
            '\r' | '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

/// Compact decimal formatting for content streams.
fn fmt(value: f64) -> String {
    let mut s = format!("{value:.4}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn fmt32(value: f32) -> String {
    fmt(f64::from(value))
}

/// Adds the builder's font, graphics state, and XObject entries to the
/// page's resource dictionary, wherever that dictionary happens to live.
fn write_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    builder: &ContentBuilder,
) -> Result<(), EditError> {
    let fonts: Vec<(String, ObjectId)> = builder
        .fonts
        .iter()
        .map(|font| {
            let id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => font.base_font(),
            });
            (font.resource_key().to_string(), id)
        })
        .collect();
    let gstates: Vec<(String, ObjectId)> = builder
        .alphas
        .iter()
        .map(|permille| {
            let alpha = *permille as f32 / 1000.0;
            let id = doc.add_object(dictionary! {
                "Type" => "ExtGState",
                "ca" => alpha,
                "CA" => alpha,
            });
            (alpha_name(*permille), id)
        })
        .collect();

    let resources_ref = {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| EditError::Commit(e.to_string()))?;
        match page.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    let mut resources = match resources_ref {
        Some(id) => doc
            .get_object(id)
            .and_then(Object::as_dict)
            .map_err(|e| EditError::Commit(e.to_string()))?
            .clone(),
        None => {
            let page = doc
                .get_object(page_id)
                .and_then(Object::as_dict)
                .map_err(|e| EditError::Commit(e.to_string()))?;
            match page.get(b"Resources") {
                Ok(Object::Dictionary(dict)) => dict.clone(),
                _ => Dictionary::new(),
            }
        }
    };

    merge_resource_category(doc, &mut resources, "Font", &fonts)?;
    merge_resource_category(doc, &mut resources, "ExtGState", &gstates)?;
    merge_resource_category(doc, &mut resources, "XObject", &builder.images)?;

    match resources_ref {
        Some(id) => {
            let target = doc
                .get_object_mut(id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| EditError::Commit(e.to_string()))?;
            *target = resources;
        }
        None => {
            let page = doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| EditError::Commit(e.to_string()))?;
            page.set("Resources", Object::Dictionary(resources));
        }
    }
    Ok(())
}

fn merge_resource_category(
    doc: &mut Document,
    resources: &mut Dictionary,
    category: &str,
    entries: &[(String, ObjectId)],
) -> Result<(), EditError> {
    if entries.is_empty() {
        return Ok(());
    }
    if !matches!(
        resources.get(category.as_bytes()),
        Ok(Object::Dictionary(_)) | Ok(Object::Reference(_))
    ) {
        resources.set(category, Object::Dictionary(Dictionary::new()));
    }
    let target = resources
        .get_mut(category.as_bytes())
        .map_err(|e| EditError::Commit(e.to_string()))?;
    match target {
        Object::Dictionary(dict) => {
            for (name, id) in entries {
                dict.set(name.clone(), Object::Reference(*id));
            }
        }
        Object::Reference(rid) => {
            let rid = *rid;
            let dict = doc
                .get_object_mut(rid)
                .and_then(Object::as_dict_mut)
                .map_err(|e| EditError::Commit(e.to_string()))?;
            for (name, id) in entries {
                dict.set(name.clone(), Object::Reference(*id));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Appends the drawing ops as a new content stream, sandwiching the page's
/// existing content between a save and restore of the graphics state.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    ops: &str,
) -> Result<(), EditError> {
    let open_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        b"q\n".to_vec(),
    )));
    let close_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        format!("Q\n{ops}").into_bytes(),
    )));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| EditError::Commit(e.to_string()))?;
    let mut contents = match page.remove(b"Contents") {
        Some(Object::Array(items)) => items,
        Some(other) => vec![other],
        None => Vec::new(),
    };
    contents.insert(0, Object::Reference(open_id));
    contents.push(Object::Reference(close_id));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

fn field_name(field: FormFieldKind, id: u64) -> String {
    match field {
        FormFieldKind::TextField => format!("textfield_{id}"),
        FormFieldKind::Checkbox => format!("checkbox_{id}"),
        FormFieldKind::Radio => format!("radio_group_{id}"),
        FormFieldKind::Dropdown => format!("dropdown_{id}"),
        FormFieldKind::Signature => format!("sig_{id}"),
    }
}

/// Creates the widget annotation for one form field and registers it on the
/// page. The field is returned for the document's AcroForm Fields array.
fn add_form_field(
    doc: &mut Document,
    page_id: ObjectId,
    page_height: f64,
    annotation: &Annotation,
    field: FormFieldKind,
    style: &FormFieldStyle,
) -> Result<ObjectId, EditError> {
    let rect = &annotation.rect;
    let pdf_y = page_height - rect.y - rect.height;

    let mut widget = Dictionary::new();
    widget.set("Type", Object::Name(b"Annot".to_vec()));
    widget.set("Subtype", Object::Name(b"Widget".to_vec()));
    widget.set(
        "Rect",
        Object::Array(vec![
            Object::Real(rect.x as f32),
            Object::Real(pdf_y as f32),
            Object::Real((rect.x + rect.width) as f32),
            Object::Real((pdf_y + rect.height) as f32),
        ]),
    );
    // Flags: Print (bit 3)
    widget.set("F", Object::Integer(4));
    widget.set("P", Object::Reference(page_id));
    widget.set(
        "T",
        Object::String(
            field_name(field, annotation.id).into_bytes(),
            StringFormat::Literal,
        ),
    );

    let background = if field == FormFieldKind::Signature {
        SIGNATURE_FIELD_BG
    } else {
        parse_css_color(&style.background_color)
    };
    let border = parse_css_color(&style.border_color);
    let mut mk = Dictionary::new();
    mk.set(
        "BG",
        Object::Array(vec![
            Object::Real(background.0),
            Object::Real(background.1),
            Object::Real(background.2),
        ]),
    );
    mk.set(
        "BC",
        Object::Array(vec![
            Object::Real(border.0),
            Object::Real(border.1),
            Object::Real(border.2),
        ]),
    );
    widget.set("MK", Object::Dictionary(mk));

    let mut bs = Dictionary::new();
    bs.set("W", Object::Real(style.border_width as f32));
    widget.set("BS", Object::Dictionary(bs));

    let text_color = parse_css_color(&style.text_color);
    let da = format!(
        "/Helv {} Tf {} {} {} rg",
        fmt(style.font_size),
        fmt32(text_color.0),
        fmt32(text_color.1),
        fmt32(text_color.2)
    );

    match field {
        FormFieldKind::TextField => {
            widget.set("FT", Object::Name(b"Tx".to_vec()));
            widget.set("DA", Object::String(da.into_bytes(), StringFormat::Literal));
            widget.set("Q", Object::Integer(alignment_code(style.text_align)));
        }
        FormFieldKind::Checkbox => {
            widget.set("FT", Object::Name(b"Btn".to_vec()));
            widget.set("V", Object::Name(b"Off".to_vec()));
            widget.set("AS", Object::Name(b"Off".to_vec()));
        }
        FormFieldKind::Radio => {
            widget.set("FT", Object::Name(b"Btn".to_vec()));
            // Radio flag (bit 16)
            widget.set("Ff", Object::Integer(1 << 15));
            widget.set("V", Object::Name(b"Off".to_vec()));
            widget.set("AS", Object::Name(b"Off".to_vec()));
        }
        FormFieldKind::Dropdown => {
            widget.set("FT", Object::Name(b"Ch".to_vec()));
            // Combo flag (bit 18)
            widget.set("Ff", Object::Integer(1 << 17));
            widget.set(
                "Opt",
                Object::Array(
                    ["Option 1", "Option 2", "Option 3"]
                        .iter()
                        .map(|opt| {
                            Object::String(opt.as_bytes().to_vec(), StringFormat::Literal)
                        })
                        .collect(),
                ),
            );
            widget.set("DA", Object::String(da.into_bytes(), StringFormat::Literal));
        }
        FormFieldKind::Signature => {
            widget.set("FT", Object::Name(b"Sig".to_vec()));
        }
    }

    let widget_id = doc.add_object(Object::Dictionary(widget));
    push_page_annotation(doc, page_id, widget_id)?;
    Ok(widget_id)
}

fn alignment_code(align: TextAlign) -> i64 {
    match align {
        TextAlign::Left => 0,
        TextAlign::Center => 1,
        TextAlign::Right => 2,
    }
}

fn push_page_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<(), EditError> {
    // Annots may live behind a reference; resolve it before pushing.
    let annots_ref = {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| EditError::Commit(e.to_string()))?;
        page.get(b"Annots")
            .ok()
            .and_then(|obj| obj.as_reference().ok())
    };

    if let Some(annots_id) = annots_ref {
        let array = doc
            .get_object_mut(annots_id)
            .and_then(Object::as_array_mut)
            .map_err(|e| EditError::Commit(e.to_string()))?;
        array.push(Object::Reference(annot_id));
        return Ok(());
    }

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| EditError::Commit(e.to_string()))?;
    if let Ok(Object::Array(ref mut array)) = page.get_mut(b"Annots") {
        array.push(Object::Reference(annot_id));
    } else {
        page.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
    }
    Ok(())
}

/// Registers created form fields in the document catalog's AcroForm,
/// creating one when the document has none.
fn ensure_acroform(doc: &mut Document, field_ids: &[ObjectId]) -> Result<(), EditError> {
    if field_ids.is_empty() {
        return Ok(());
    }

    let helv_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    enum Slot {
        Missing,
        Inline,
        Ref(ObjectId),
    }
    let slot = {
        let catalog = doc
            .catalog()
            .map_err(|e| EditError::Commit(e.to_string()))?;
        match catalog.get(b"AcroForm") {
            Ok(Object::Reference(id)) => Slot::Ref(*id),
            Ok(Object::Dictionary(_)) => Slot::Inline,
            _ => Slot::Missing,
        }
    };

    match slot {
        Slot::Missing => {
            let form = dictionary! {
                "Fields" => Object::Array(field_ids.iter().map(|id| Object::Reference(*id)).collect()),
                "NeedAppearances" => true,
                "DA" => Object::String(b"/Helv 0 Tf 0 g".to_vec(), StringFormat::Literal),
                "DR" => dictionary! {
                    "Font" => dictionary! { "Helv" => helv_id },
                },
            };
            let form_id = doc.add_object(form);
            doc.catalog_mut()
                .map_err(|e| EditError::Commit(e.to_string()))?
                .set("AcroForm", Object::Reference(form_id));
        }
        Slot::Ref(form_id) => {
            let form = doc
                .get_object_mut(form_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| EditError::Commit(e.to_string()))?;
            extend_acroform(form, field_ids, helv_id);
        }
        Slot::Inline => {
            let catalog = doc
                .catalog_mut()
                .map_err(|e| EditError::Commit(e.to_string()))?;
            if let Ok(Object::Dictionary(ref mut form)) = catalog.get_mut(b"AcroForm") {
                extend_acroform(form, field_ids, helv_id);
            }
        }
    }
    Ok(())
}

fn extend_acroform(form: &mut Dictionary, field_ids: &[ObjectId], helv_id: ObjectId) {
    let mut fields = match form.get(b"Fields") {
        Ok(Object::Array(existing)) => existing.clone(),
        _ => Vec::new(),
    };
    fields.extend(field_ids.iter().map(|id| Object::Reference(*id)));
    form.set("Fields", Object::Array(fields));
    form.set("NeedAppearances", Object::Boolean(true));
    if form.get(b"DA").is_err() {
        form.set(
            "DA",
            Object::String(b"/Helv 0 Tf 0 g".to_vec(), StringFormat::Literal),
        );
    }
    if form.get(b"DR").is_err() {
        form.set(
            "DR",
            dictionary! { "Font" => dictionary! { "Helv" => helv_id } },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{AnnotationArena, NoteStyle};

    fn create_test_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            b"BT (Page 1) Tj ET\n".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn annotation(id: u64, rect: WrapperBox, kind: AnnotationKind) -> Annotation {
        Annotation {
            id,
            page_index: 0,
            rect,
            kind,
        }
    }

    #[test]
    fn notes_alone_leave_bytes_untouched() {
        let pdf = create_test_pdf();
        let note = annotation(
            1,
            WrapperBox::new(10.0, 10.0, 200.0, 150.0),
            AnnotationKind::Note {
                text: "reminder".to_string(),
                style: NoteStyle::default(),
                collapsed: false,
            },
        );
        let result = commit_annotations(&pdf, &[note]).unwrap();
        assert_eq!(result, pdf);
    }

    #[test]
    fn redact_draws_opaque_white_rectangle() {
        let pdf = create_test_pdf();
        let redact = annotation(
            1,
            WrapperBox::new(10.0, 20.0, 100.0, 50.0),
            AnnotationKind::Redact,
        );
        let result = commit_annotations(&pdf, &[redact]).unwrap();
        let text = String::from_utf8_lossy(&result);
        assert!(text.contains("1 1 1 rg"));
        // y flips to 792 - 20 - 50.
        assert!(text.contains("10 722 100 50 re"));
        assert!(!text.contains("GSa"));
    }

    #[test]
    fn extract_draws_translucent_yellow() {
        let pdf = create_test_pdf();
        let extract = annotation(
            1,
            WrapperBox::new(0.0, 0.0, 50.0, 50.0),
            AnnotationKind::Extract,
        );
        let result = commit_annotations(&pdf, &[extract]).unwrap();
        let text = String::from_utf8_lossy(&result);
        assert!(text.contains("1 1 0 rg"));
        assert!(text.contains("/GSa400 gs"));
        assert!(text.contains("/ExtGState"));
    }

    #[test]
    fn text_uses_resolved_standard_font() {
        let pdf = create_test_pdf();
        let text = annotation(
            1,
            WrapperBox::new(100.0, 100.0, 200.0, 40.0),
            AnnotationKind::Text {
                text: "Hello".to_string(),
                style: TextStyle::default(),
                background: Background::default(),
            },
        );
        let result = commit_annotations(&pdf, &[text]).unwrap();
        let out = String::from_utf8_lossy(&result);
        assert!(out.contains("/FHv 16 Tf"));
        assert!(out.contains("/Helvetica"));
        // Baseline at 792 - 100 - 0.8 * 16.
        assert!(out.contains("100 679.2 Td"));
        assert!(out.contains("(Hello) Tj"));
    }

    #[test]
    fn bold_italic_times_resolves_variant() {
        let pdf = create_test_pdf();
        let text = annotation(
            1,
            WrapperBox::new(0.0, 0.0, 100.0, 30.0),
            AnnotationKind::Text {
                text: "x".to_string(),
                style: TextStyle {
                    font_family: "Times New Roman".to_string(),
                    bold: true,
                    italic: true,
                    ..TextStyle::default()
                },
                background: Background::default(),
            },
        );
        let result = commit_annotations(&pdf, &[text]).unwrap();
        let out = String::from_utf8_lossy(&result);
        assert!(out.contains("/Times-BoldItalic"));
    }

    #[test]
    fn rotated_text_draws_rotated_background() {
        let pdf = create_test_pdf();
        let text = annotation(
            1,
            WrapperBox {
                x: 100.0,
                y: 100.0,
                width: 200.0,
                height: 50.0,
                rotation: 30.0,
            },
            AnnotationKind::Text {
                text: "tilted".to_string(),
                style: TextStyle::default(),
                background: Background {
                    color: "#ff0000".to_string(),
                    alpha: 1.0,
                    transparent: false,
                },
            },
        );
        let result = commit_annotations(&pdf, &[text]).unwrap();
        let out = String::from_utf8_lossy(&result);
        assert!(out.contains("1 0 0 rg"));
        // Wrapper box relative to the text origin: dx -5, dy 16 + 5 - 50.
        assert!(out.contains("-5 -29 200 50 re"));
        // cos(30 degrees) in both the background cm and the text matrix.
        assert!(out.contains("0.866 -0.5 0.5 0.866 105 671 cm"));
        assert!(out.contains("0.866 -0.5 0.5 0.866 105 671 Tm"));
    }

    #[test]
    fn image_is_embedded_and_drawn() {
        let pdf = create_test_pdf();
        let mut png = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png, 4, 4);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[128u8; 48]).unwrap();
        }
        let image = annotation(
            3,
            WrapperBox::new(50.0, 60.0, 100.0, 80.0),
            AnnotationKind::Image { bytes: png },
        );
        let result = commit_annotations(&pdf, &[image]).unwrap();
        let out = String::from_utf8_lossy(&result);
        assert!(out.contains("/Im3 Do"));
        // Unrotated placement: scale by size, origin at flipped bottom-left.
        assert!(out.contains("100 0 0 80 50 652 cm"));
        assert!(out.contains("/XObject"));
    }

    #[test]
    fn unreadable_image_is_skipped_not_fatal() {
        let pdf = create_test_pdf();
        let broken = annotation(
            1,
            WrapperBox::new(0.0, 0.0, 100.0, 80.0),
            AnnotationKind::Image {
                bytes: vec![1, 2, 3, 4],
            },
        );
        let redact = annotation(
            2,
            WrapperBox::new(10.0, 20.0, 100.0, 50.0),
            AnnotationKind::Redact,
        );
        let result = commit_annotations(&pdf, &[broken, redact]).unwrap();
        let out = String::from_utf8_lossy(&result);
        assert!(!out.contains(" Do"));
        assert!(out.contains("10 722 100 50 re"));
    }

    #[test]
    fn highlight_path_flips_every_point() {
        let pdf = create_test_pdf();
        let highlight = annotation(
            1,
            WrapperBox::new(0.0, 0.0, 0.0, 0.0),
            AnnotationKind::Highlight {
                points: vec![
                    Point::new(10.0, 100.0),
                    Point::new(60.0, 110.0),
                    Point::new(120.0, 100.0),
                ],
                style: HighlightStyle::default(),
            },
        );
        let result = commit_annotations(&pdf, &[highlight]).unwrap();
        let out = String::from_utf8_lossy(&result);
        assert!(out.contains("10 692 m"));
        assert!(out.contains("60 682 l"));
        assert!(out.contains("120 692 l"));
        assert!(out.contains("20 w"));
        assert!(out.contains("1 J"));
        assert!(out.contains("/GSa400 gs"));
    }

    #[test]
    fn arrow_head_is_rebuilt_in_document_space() {
        let pdf = create_test_pdf();
        let arrow = annotation(
            1,
            WrapperBox::new(0.0, 0.0, 100.0, 20.0),
            AnnotationKind::Shape {
                shape: ShapeKind::Arrow,
                style: ShapeStyle::default(),
                ends: Some(LineEnds {
                    start: Point::new(0.0, 10.0),
                    end: Point::new(100.0, 10.0),
                }),
            },
        );
        let result = commit_annotations(&pdf, &[arrow]).unwrap();
        let out = String::from_utf8_lossy(&result);
        assert!(out.contains("1 0 0 RG"));
        assert!(out.contains("0 782 m"));
        assert!(out.contains("100 782 l"));
        // Two 15pt wings at a 30 degree half-angle from the shaft.
        assert!(out.contains("87.0096 789.5 l"));
        assert!(out.contains("87.0096 774.5 l"));
    }

    #[test]
    fn ellipse_strokes_four_arcs_about_center() {
        let pdf = create_test_pdf();
        let ellipse = annotation(
            1,
            WrapperBox::new(100.0, 100.0, 80.0, 40.0),
            AnnotationKind::Shape {
                shape: ShapeKind::Ellipse,
                style: ShapeStyle::default(),
                ends: None,
            },
        );
        let result = commit_annotations(&pdf, &[ellipse]).unwrap();
        let out = String::from_utf8_lossy(&result);
        // Center at (140, 792 - 120).
        assert!(out.contains("1 0 0 1 140 672 cm"));
        assert!(out.contains("40 0 m"));
        assert_eq!(out.matches(" c\n").count(), 4);
    }

    #[test]
    fn watermark_is_centered_with_helvetica_metrics() {
        let pdf = create_test_pdf();
        let mark = annotation(
            1,
            WrapperBox::new(0.0, 0.0, 0.0, 0.0),
            AnnotationKind::Watermark {
                text: "DRAFT".to_string(),
                style: WatermarkStyle::default(),
            },
        );
        let result = commit_annotations(&pdf, &[mark]).unwrap();
        let out = String::from_utf8_lossy(&result);
        // Width of DRAFT at 48pt is 159.984; x = (612 - 159.984) / 2.
        assert!(out.contains("226.008 373.8 Tm"));
        assert!(out.contains("0.7071"));
        assert!(out.contains("/GSa300 gs"));
        assert!(out.contains("(DRAFT) Tj"));
    }

    #[test]
    fn form_field_materializes_widget_and_acroform() {
        let pdf = create_test_pdf();
        let field = annotation(
            1,
            WrapperBox::new(10.0, 20.0, 200.0, 30.0),
            AnnotationKind::FormField {
                field: FormFieldKind::TextField,
                style: FormFieldStyle::default(),
            },
        );
        let result = commit_annotations(&pdf, &[field]).unwrap();
        let doc = Document::load_mem(&result).unwrap();

        let catalog = doc.catalog().unwrap();
        let form_id = catalog.get(b"AcroForm").unwrap().as_reference().unwrap();
        let form = doc.get_object(form_id).unwrap().as_dict().unwrap();
        assert_eq!(
            form.get(b"NeedAppearances").unwrap().as_bool().unwrap(),
            true
        );
        let fields = form.get(b"Fields").unwrap().as_array().unwrap();
        assert_eq!(fields.len(), 1);

        let widget_id = fields[0].as_reference().unwrap();
        let widget = doc.get_object(widget_id).unwrap().as_dict().unwrap();
        assert_eq!(widget.get(b"FT").unwrap().as_name().unwrap(), b"Tx");
        assert_eq!(
            widget.get(b"T").unwrap().as_str().unwrap(),
            b"textfield_1"
        );
        let rect = widget.get(b"Rect").unwrap().as_array().unwrap();
        assert!(matches!(&rect[1], Object::Real(v) if *v == 742.0));

        let pages: Vec<_> = doc.get_pages().into_iter().collect();
        let page = doc.get_object(pages[0].1).unwrap().as_dict().unwrap();
        let annots = page.get(b"Annots").unwrap().as_array().unwrap();
        assert_eq!(annots[0].as_reference().unwrap(), widget_id);
    }

    #[test]
    fn dropdown_carries_fixed_options() {
        let pdf = create_test_pdf();
        let field = annotation(
            2,
            WrapperBox::new(10.0, 20.0, 150.0, 24.0),
            AnnotationKind::FormField {
                field: FormFieldKind::Dropdown,
                style: FormFieldStyle::default(),
            },
        );
        let result = commit_annotations(&pdf, &[field]).unwrap();
        let out = String::from_utf8_lossy(&result);
        assert!(out.contains("dropdown_2"));
        assert!(out.contains("Option 1"));
        assert!(out.contains("Option 3"));

        let doc = Document::load_mem(&result).unwrap();
        let catalog = doc.catalog().unwrap();
        let form_id = catalog.get(b"AcroForm").unwrap().as_reference().unwrap();
        let form = doc.get_object(form_id).unwrap().as_dict().unwrap();
        let fields = form.get(b"Fields").unwrap().as_array().unwrap();
        let widget_id = fields[0].as_reference().unwrap();
        let widget = doc.get_object(widget_id).unwrap().as_dict().unwrap();
        assert_eq!(widget.get(b"FT").unwrap().as_name().unwrap(), b"Ch");
        assert_eq!(widget.get(b"Ff").unwrap().as_i64().unwrap(), 1 << 17);
    }

    #[test]
    fn existing_content_is_wrapped_in_state_guard() {
        let mut doc = Document::with_version("1.7");
        let content_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            b"0.5 0 0 0.5 0 0 cm\n".to_vec(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut pdf = Vec::new();
        doc.save_to(&mut pdf).unwrap();

        let redact = annotation(
            1,
            WrapperBox::new(0.0, 0.0, 10.0, 10.0),
            AnnotationKind::Redact,
        );
        let result = commit_annotations(&pdf, &[redact]).unwrap();

        let out_doc = Document::load_mem(&result).unwrap();
        let pages: Vec<_> = out_doc.get_pages().into_iter().collect();
        let page = out_doc.get_object(pages[0].1).unwrap().as_dict().unwrap();
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 3);

        let first = out_doc
            .get_object(contents[0].as_reference().unwrap())
            .unwrap()
            .as_stream()
            .unwrap();
        assert_eq!(first.content, b"q\n");
        let last = out_doc
            .get_object(contents[2].as_reference().unwrap())
            .unwrap()
            .as_stream()
            .unwrap();
        assert!(last.content.starts_with(b"Q\n"));
    }

    #[test]
    fn page_without_contents_still_gains_overlay() {
        let mut doc = Document::with_version("1.7");
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut pdf = Vec::new();
        doc.save_to(&mut pdf).unwrap();

        let redact = annotation(
            1,
            WrapperBox::new(0.0, 0.0, 10.0, 10.0),
            AnnotationKind::Redact,
        );
        let result = commit_annotations(&pdf, &[redact]).unwrap();

        let out = String::from_utf8_lossy(&result);
        assert!(out.contains("1 1 1 rg"));
        assert!(Document::load_mem(&result).is_ok());
    }

    #[test]
    fn malformed_bytes_fail_with_parse_error() {
        let redact = annotation(
            1,
            WrapperBox::new(0.0, 0.0, 10.0, 10.0),
            AnnotationKind::Redact,
        );
        let result = commit_annotations(b"not a pdf", &[redact]);
        assert!(matches!(result, Err(EditError::Parse(_))));
    }

    #[test]
    fn commit_preserves_arena_note_exclusion_contract() {
        let pdf = create_test_pdf();
        let mut arena = AnnotationArena::new();
        arena.insert(
            0,
            WrapperBox::new(10.0, 20.0, 100.0, 50.0),
            AnnotationKind::Redact,
        );
        arena.insert(
            0,
            WrapperBox::new(30.0, 30.0, 200.0, 150.0),
            AnnotationKind::Note {
                text: "keep me".to_string(),
                style: NoteStyle::default(),
                collapsed: false,
            },
        );

        let result = commit_annotations(&pdf, &arena.capture()).unwrap();
        let out = String::from_utf8_lossy(&result);
        assert!(out.contains("10 722 100 50 re"));
        assert!(!out.contains("keep me"));
    }

    #[test]
    fn css_color_forms_parse_to_unit_floats() {
        assert_eq!(parse_css_color("#ff0000"), (1.0, 0.0, 0.0));
        assert_eq!(parse_css_color("rgb(255, 0, 0)"), (1.0, 0.0, 0.0));
        assert_eq!(parse_css_color("rgb(0,128,255)"), (0.0, 128.0 / 255.0, 1.0));
        assert_eq!(parse_css_color("bogus"), (0.0, 0.0, 0.0));
        assert_eq!(parse_css_color("#fff"), (0.0, 0.0, 0.0));
    }

    #[test]
    fn stream_numbers_are_trimmed() {
        assert_eq!(fmt(10.0), "10");
        assert_eq!(fmt(679.2), "679.2");
        assert_eq!(fmt(0.8660254), "0.866");
        assert_eq!(fmt(-0.00001), "0");
    }
}
