//! Reference reader that turns a PDF page region into a [`GeometryContext`].
//!
//! Only what boundary detection needs is interpreted: text placement, font
//! names and straight path segments. Glyph widths are estimated from the font
//! size rather than read from the embedded font programs.

use std::collections::BTreeMap;
use std::path::Path;

use encoding_rs::{BIG5, UTF_16BE};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::cell::{RegionText, RegionTextSource};
use crate::error::{MethodError, ReaderError};
use crate::geometry::{BBox, GeometryContext, LineSegment, StyledSpan, Word};

const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];
const MONOSPACE_EM: f64 = 0.6;
const PROPORTIONAL_EM: f64 = 0.5;
const WIDE_EM: f64 = 1.0;
const ASCENT: f64 = 0.8;
const DESCENT: f64 = 0.2;
/// Horizontal gap, in ems, that separates two words.
const WORD_GAP_EM: f64 = 0.2;
/// Horizontal gap, in ems, that ends a styled span.
const SPAN_GAP_EM: f64 = 1.0;
/// Filled rectangles thinner than this are drawn rules.
const THIN_RECT: f64 = 2.0;
const MAX_PARENT_DEPTH: usize = 32;

fn looks_decoding_broken(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    let replacement = text.matches('\u{FFFD}').count();
    let cjk_count = text
        .chars()
        .filter(|ch| {
            ('\u{4E00}'..='\u{9FFF}').contains(ch) || ('\u{3400}'..='\u{4DBF}').contains(ch)
        })
        .count();
    let ext_a_count = text
        .chars()
        .filter(|ch| ('\u{3400}'..='\u{4DBF}').contains(ch))
        .count();

    replacement * 8 > total || (cjk_count > 20 && ext_a_count * 4 > cjk_count)
}

/// Decode a PDF string operand, falling back to UTF-16BE and Big5 when the
/// font's declared encoding produces garbage.
fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    if bytes.starts_with(&[0xFE, 0xFF]) {
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(&bytes[2..]);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    if let Some(name) = encoding {
        let lower = name.to_ascii_lowercase();

        if lower.contains("utf16")
            || lower.contains("ucs2")
            || lower.contains("identity-h")
            || lower.contains("unicode")
        {
            let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
            if !had_errors && !utf16.is_empty() {
                return utf16.into_owned();
            }
        }

        if lower.contains("big5")
            || lower.contains("b5")
            || lower.contains("eten")
            || lower.contains("cns")
        {
            let (big5, _, had_errors) = BIG5.decode(bytes);
            if !had_errors && !big5.is_empty() {
                return big5.into_owned();
            }
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}

fn number(object: &Object) -> Option<f64> {
    match object {
        #[allow(clippy::cast_precision_loss)]
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f64> {
    operands.iter().filter_map(number).collect()
}

/// PDF affine matrix `[a b c d e f]` acting on row vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    e: f64,
    f: f64,
}

impl Matrix {
    const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        match numbers(operands).as_slice() {
            &[a, b, c, d, e, f] => Some(Self { a, b, c, d, e, f }),
            _ => None,
        }
    }

    /// `self` applied first, then `next`.
    fn then(self, next: Self) -> Self {
        Self {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    fn apply(self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn vertical_scale(self) -> f64 {
        self.c.hypot(self.d)
    }
}

#[derive(Debug, Clone)]
struct FontInfo<'a> {
    encoding: Option<&'a str>,
    base_font: String,
    bold: bool,
    italic: bool,
    em: f64,
}

impl<'a> FontInfo<'a> {
    fn from_dictionary(font: &'a Dictionary) -> Self {
        let raw = font
            .get(b"BaseFont")
            .and_then(Object::as_name)
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_default();
        let base_font = strip_subset_prefix(&raw).to_string();
        let lower = base_font.to_ascii_lowercase();

        Self {
            encoding: Some(font.get_font_encoding()),
            bold: ["bold", "black", "heavy", "demi"]
                .iter()
                .any(|marker| lower.contains(marker)),
            italic: lower.contains("italic") || lower.contains("oblique"),
            em: if lower.contains("courier") || lower.contains("mono") {
                MONOSPACE_EM
            } else {
                PROPORTIONAL_EM
            },
            base_font,
        }
    }

    fn fallback() -> Self {
        Self {
            encoding: None,
            base_font: String::new(),
            bold: false,
            italic: false,
            em: PROPORTIONAL_EM,
        }
    }

    fn advance(&self, ch: char) -> f64 {
        if ch >= '\u{2E80}' { WIDE_EM } else { self.em }
    }
}

/// Drops the `ABCDEF+` tag of subset-embedded fonts.
fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// One drawn character in page space, top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub ch: char,
    pub bbox: BBox,
    pub font: String,
    /// Rendered font size in page units.
    pub size: f64,
    pub bold: bool,
    pub italic: bool,
    /// Ordinal of the text-showing operator that drew it.
    pub run: u32,
}

impl Glyph {
    fn center(&self) -> (f64, f64) {
        (self.bbox.center_x(), self.bbox.center_y())
    }

    fn same_style(&self, other: &Self) -> bool {
        self.font == other.font
            && (self.size - other.size).abs() < 0.05
            && self.bold == other.bold
            && self.italic == other.italic
    }
}

/// Whether `next` continues the text of `prev` on the same line without a
/// gap wider than `max_gap_em`.
fn continues(prev: &Glyph, next: &Glyph, max_gap_em: f64) -> bool {
    let em = prev.size.max(next.size).max(f64::EPSILON);
    let gap = next.bbox.x0 - prev.bbox.x1;
    let same_line = (next.bbox.center_y() - prev.bbox.center_y()).abs() <= 0.5 * em;
    same_line && gap > -0.5 * em && gap < max_gap_em * em
}

fn join_glyphs(glyphs: &[&Glyph]) -> String {
    let mut text = String::new();
    for (index, glyph) in glyphs.iter().enumerate() {
        if index > 0 && !continues(glyphs[index - 1], glyph, WORD_GAP_EM) {
            text.push(' ');
        }
        text.push(glyph.ch);
    }
    text
}

fn union(glyphs: &[&Glyph]) -> Option<BBox> {
    let (first, rest) = glyphs.split_first()?;
    Some(
        rest.iter()
            .fold(first.bbox, |bbox, glyph| bbox.union(&glyph.bbox)),
    )
}

#[derive(Debug, Default)]
struct PathBuilder {
    start: Option<(f64, f64)>,
    current: Option<(f64, f64)>,
    segments: Vec<((f64, f64), (f64, f64))>,
}

impl PathBuilder {
    fn move_to(&mut self, point: (f64, f64)) {
        self.start = Some(point);
        self.current = Some(point);
    }

    fn line_to(&mut self, point: (f64, f64)) {
        if let Some(from) = self.current {
            self.segments.push((from, point));
        }
        self.current = Some(point);
    }

    fn close(&mut self) {
        if let (Some(start), Some(current)) = (self.start, self.current)
            && start != current
        {
            self.segments.push((current, start));
        }
        self.current = self.start;
    }

    fn take(&mut self) -> Vec<((f64, f64), (f64, f64))> {
        self.start = None;
        self.current = None;
        std::mem::take(&mut self.segments)
    }
}

#[derive(Debug, Clone)]
struct TextState {
    matrix: Matrix,
    line_matrix: Matrix,
    leading: f64,
    size: f64,
    font: Option<Vec<u8>>,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            leading: 0.0,
            size: 0.0,
            font: None,
        }
    }
}

struct PageInterpreter<'a> {
    fonts: BTreeMap<Vec<u8>, FontInfo<'a>>,
    /// `(left, top)` of the media box in PDF space.
    origin: (f64, f64),
    ctm: Matrix,
    saved: Vec<Matrix>,
    text: TextState,
    run: u32,
    path: PathBuilder,
    glyphs: Vec<Glyph>,
    lines: Vec<LineSegment>,
}

impl<'a> PageInterpreter<'a> {
    fn new(fonts: BTreeMap<Vec<u8>, FontInfo<'a>>, origin: (f64, f64)) -> Self {
        Self {
            fonts,
            origin,
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            text: TextState::default(),
            run: 0,
            path: PathBuilder::default(),
            glyphs: Vec::new(),
            lines: Vec::new(),
        }
    }

    fn to_page(&self, (x, y): (f64, f64)) -> (f64, f64) {
        (x - self.origin.0, self.origin.1 - y)
    }

    fn apply(&mut self, operation: &Operation) {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.ctm = matrix.then(self.ctm);
                }
            }
            "BT" => {
                self.text.matrix = Matrix::IDENTITY;
                self.text.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(name) = operands.first().and_then(|operand| operand.as_name().ok()) {
                    self.text.font = Some(name.to_vec());
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    self.text.size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    self.text.leading = leading;
                }
            }
            "Td" | "TD" => {
                if let &[tx, ty] = numbers(operands).as_slice() {
                    if operation.operator == "TD" {
                        self.text.leading = -ty;
                    }
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(matrix) = Matrix::from_operands(operands) {
                    self.text.matrix = matrix;
                    self.text.line_matrix = matrix;
                }
            }
            "T*" => self.move_line(0.0, -self.text.leading),
            "Tj" => {
                self.run += 1;
                self.show_operand(operands.first());
            }
            "'" => {
                self.move_line(0.0, -self.text.leading);
                self.run += 1;
                self.show_operand(operands.first());
            }
            "\"" => {
                self.move_line(0.0, -self.text.leading);
                self.run += 1;
                self.show_operand(operands.get(2));
            }
            "TJ" => {
                self.run += 1;
                if let Some(items) = operands.first().and_then(|operand| operand.as_array().ok()) {
                    for item in items {
                        if let Object::String(bytes, _) = item {
                            self.show_text(bytes);
                        } else if let Some(adjust) = number(item) {
                            let shift = -adjust / 1000.0 * self.text.size;
                            self.text.matrix = Matrix::translate(shift, 0.0).then(self.text.matrix);
                        }
                    }
                }
            }
            "m" => {
                if let &[x, y] = numbers(operands).as_slice() {
                    self.path.move_to(self.ctm.apply(x, y));
                }
            }
            "l" => {
                if let &[x, y] = numbers(operands).as_slice() {
                    self.path.line_to(self.ctm.apply(x, y));
                }
            }
            "h" => self.path.close(),
            "re" => {
                if let &[x, y, width, height] = numbers(operands).as_slice() {
                    self.rectangle(x, y, width, height);
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                if matches!(operation.operator.as_str(), "s" | "b" | "b*") {
                    self.path.close();
                }
                for (from, to) in self.path.take() {
                    let (x0, y0) = self.to_page(from);
                    let (x1, y1) = self.to_page(to);
                    self.lines.push(LineSegment::new(x0, y0, x1, y1));
                }
            }
            "n" => {
                self.path.take();
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.text.line_matrix = Matrix::translate(tx, ty).then(self.text.line_matrix);
        self.text.matrix = self.text.line_matrix;
    }

    fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64) {
        if width.abs() <= THIN_RECT || height.abs() <= THIN_RECT {
            let (from, to) = if width.abs() >= height.abs() {
                ((x, y + height / 2.0), (x + width, y + height / 2.0))
            } else {
                ((x + width / 2.0, y), (x + width / 2.0, y + height))
            };
            self.path.move_to(self.ctm.apply(from.0, from.1));
            self.path.line_to(self.ctm.apply(to.0, to.1));
        } else {
            self.path.move_to(self.ctm.apply(x, y));
            self.path.line_to(self.ctm.apply(x + width, y));
            self.path.line_to(self.ctm.apply(x + width, y + height));
            self.path.line_to(self.ctm.apply(x, y + height));
            self.path.close();
        }
        self.path.move_to(self.ctm.apply(x, y));
    }

    fn show_operand(&mut self, operand: Option<&Object>) {
        if let Some(Object::String(bytes, _)) = operand {
            self.show_text(bytes);
        }
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let font = self
            .text
            .font
            .as_ref()
            .and_then(|name| self.fonts.get(name))
            .cloned()
            .unwrap_or_else(FontInfo::fallback);
        let size = self.text.size;

        for ch in decode_pdf_bytes(font.encoding, bytes).chars() {
            let advance = font.advance(ch) * size;
            if !ch.is_whitespace() {
                let render = self.text.matrix.then(self.ctm);
                let (x_start, baseline) = render.apply(0.0, 0.0);
                let (x_end, _) = render.apply(advance, 0.0);
                let height = size * render.vertical_scale();
                let (left, top) = self.to_page((x_start.min(x_end), baseline + ASCENT * height));
                let (right, bottom) =
                    self.to_page((x_start.max(x_end), baseline - DESCENT * height));
                self.glyphs.push(Glyph {
                    ch,
                    bbox: BBox::new(left, top, right, bottom),
                    font: font.base_font.clone(),
                    size: height,
                    bold: font.bold,
                    italic: font.italic,
                    run: self.run,
                });
            }
            self.text.matrix = Matrix::translate(advance, 0.0).then(self.text.matrix);
        }
    }
}

/// The page's `MediaBox`, inherited from the page tree when the page has none.
fn media_box(document: &Document, page_id: ObjectId) -> [f64; 4] {
    let mut current = document.get_dictionary(page_id).ok();
    for _ in 0..MAX_PARENT_DEPTH {
        let Some(dictionary) = current else {
            break;
        };
        if let Ok(object) = dictionary.get(b"MediaBox") {
            let resolved = match object {
                Object::Reference(id) => document.get_object(*id).unwrap_or(object),
                other => other,
            };
            if let Ok(items) = resolved.as_array()
                && let &[x0, y0, x1, y1] = numbers(items).as_slice()
            {
                return [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)];
            }
            break;
        }
        current = dictionary
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|parent| document.get_dictionary(parent))
            .ok();
    }
    DEFAULT_MEDIA_BOX
}

/// Everything drawn on one page that boundary detection can use.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub page: u32,
    pub width: f64,
    pub height: f64,
    /// Glyphs in content-stream order.
    pub glyphs: Vec<Glyph>,
    pub lines: Vec<LineSegment>,
}

impl PageLayout {
    /// Glyphs grouped into words. `line` carries the text-showing operator
    /// ordinal and `word` the position within it.
    #[must_use]
    pub fn words(&self) -> Vec<Word> {
        let mut words = Vec::new();
        let mut last_run = None;
        let mut word_index = 0_u32;
        for group in self.groups(|prev, next| continues(prev, next, WORD_GAP_EM)) {
            let Some(bbox) = union(&group) else {
                continue;
            };
            let run = group[0].run;
            if last_run == Some(run) {
                word_index += 1;
            } else {
                word_index = 0;
                last_run = Some(run);
            }
            let text = group.iter().map(|glyph| glyph.ch).collect::<String>();
            words.push(
                Word::new(text, bbox.x0, bbox.y0, bbox.x1, bbox.y1).with_indices(0, run, word_index),
            );
        }
        words
    }

    /// Same-style glyph runs, split where the horizontal gap reaches a full em.
    #[must_use]
    pub fn spans(&self) -> Vec<StyledSpan> {
        self.groups(|prev, next| prev.same_style(next) && continues(prev, next, SPAN_GAP_EM))
            .into_iter()
            .filter_map(|group| {
                let bbox = union(&group)?;
                let first = group[0];
                let mut span = StyledSpan::new(join_glyphs(&group), bbox, &first.font, first.size);
                span.bold = first.bold;
                span.italic = first.italic;
                Some(span)
            })
            .collect()
    }

    fn groups(&self, joins: impl Fn(&Glyph, &Glyph) -> bool) -> Vec<Vec<&Glyph>> {
        let mut groups: Vec<Vec<&Glyph>> = Vec::new();
        for glyph in &self.glyphs {
            match groups.last_mut() {
                Some(group) if group.last().is_some_and(|prev| joins(*prev, glyph)) => {
                    group.push(glyph);
                }
                _ => groups.push(vec![glyph]),
            }
        }
        groups
    }

    /// Geometry of the words, spans and rules inside `region`. Words and
    /// spans belong to the region when their center does; rules when any
    /// part of them comes within a couple of units of it.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::InvalidRegion`] when `region` has no area.
    pub fn context(&self, region: BBox) -> Result<GeometryContext, ReaderError> {
        if !region.is_valid() {
            return Err(ReaderError::InvalidRegion(format!(
                "({}, {}, {}, {}) has no area",
                region.x0, region.y0, region.x1, region.y1
            )));
        }

        let inside = |bbox: &BBox| region.contains_point(bbox.center_x(), bbox.center_y());
        let words = self
            .words()
            .into_iter()
            .filter(|word| inside(&word.bbox))
            .collect::<Vec<_>>();
        let spans = self
            .spans()
            .into_iter()
            .filter(|span| inside(&span.bbox))
            .collect::<Vec<_>>();
        let lines = self
            .lines
            .iter()
            .filter(|segment| touches(region, segment))
            .copied()
            .collect::<Vec<_>>();

        debug!(
            page = self.page,
            words = words.len(),
            spans = spans.len(),
            lines = lines.len(),
            "built geometry context"
        );
        Ok(GeometryContext::new(region, words, lines, spans).with_page(
            self.page,
            self.width,
            self.height,
        ))
    }

    /// A region text source over this page's glyphs.
    #[must_use]
    pub fn region_source(&self) -> PdfRegionSource {
        PdfRegionSource::new(self.glyphs.clone())
    }
}

fn touches(region: BBox, segment: &LineSegment) -> bool {
    segment.x0.max(segment.x1) >= region.x0 - THIN_RECT
        && segment.x0.min(segment.x1) <= region.x1 + THIN_RECT
        && segment.y0.max(segment.y1) >= region.y0 - THIN_RECT
        && segment.y0.min(segment.y1) <= region.y1 + THIN_RECT
}

/// Loaded PDF document that hands out per-page layouts.
#[derive(Debug)]
pub struct PdfPageReader {
    document: Document,
}

impl PdfPageReader {
    /// # Errors
    ///
    /// Returns [`ReaderError::PdfLoad`] when the file is not a readable PDF.
    pub fn open(path: &Path) -> Result<Self, ReaderError> {
        Ok(Self {
            document: Document::load(path)?,
        })
    }

    /// # Errors
    ///
    /// Returns [`ReaderError::PdfLoad`] when the bytes are not a readable PDF.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReaderError> {
        Ok(Self {
            document: Document::load_mem(bytes)?,
        })
    }

    /// One-based page numbers in document order.
    #[must_use]
    pub fn page_numbers(&self) -> Vec<u32> {
        self.document.get_pages().into_keys().collect()
    }

    /// Interpret one page's content stream.
    ///
    /// # Errors
    ///
    /// Returns [`ReaderError::UnknownPage`] for a page the document does not
    /// have, or [`ReaderError::PdfLoad`] when its content cannot be decoded.
    pub fn layout(&self, page: u32) -> Result<PageLayout, ReaderError> {
        let page_id = *self
            .document
            .get_pages()
            .get(&page)
            .ok_or(ReaderError::UnknownPage(page))?;
        let [left, bottom, right, top] = media_box(&self.document, page_id);

        let fonts = self
            .document
            .get_page_fonts(page_id)
            .into_iter()
            .map(|(name, font)| (name, FontInfo::from_dictionary(font)))
            .collect::<BTreeMap<_, _>>();
        let content = Content::decode(&self.document.get_page_content(page_id)?)?;

        let mut interpreter = PageInterpreter::new(fonts, (left, top));
        for operation in &content.operations {
            interpreter.apply(operation);
        }
        debug!(
            page,
            glyphs = interpreter.glyphs.len(),
            lines = interpreter.lines.len(),
            "interpreted page content"
        );

        Ok(PageLayout {
            page,
            width: right - left,
            height: top - bottom,
            glyphs: interpreter.glyphs,
            lines: interpreter.lines,
        })
    }

    /// Geometry for one table region of one page.
    ///
    /// # Errors
    ///
    /// See [`PdfPageReader::layout`] and [`PageLayout::context`].
    pub fn context(&self, page: u32, region: BBox) -> Result<GeometryContext, ReaderError> {
        self.layout(page)?.context(region)
    }
}

/// Re-extracts cell text glyph by glyph from a parsed PDF page. A glyph
/// belongs to the cell containing its center, so words straddling a
/// boundary are split between cells.
#[derive(Debug, Clone, Default)]
pub struct PdfRegionSource {
    glyphs: Vec<Glyph>,
}

impl PdfRegionSource {
    #[must_use]
    pub fn new(glyphs: Vec<Glyph>) -> Self {
        Self { glyphs }
    }
}

struct PdfRegionText<'a> {
    glyphs: Vec<&'a Glyph>,
}

impl RegionText for PdfRegionText<'_> {
    fn text_in(&self, rect: BBox) -> Option<String> {
        let inside = self
            .glyphs
            .iter()
            .copied()
            .filter(|glyph| {
                let (x, y) = glyph.center();
                rect.contains_point(x, y)
            })
            .collect::<Vec<_>>();
        if inside.is_empty() {
            None
        } else {
            Some(join_glyphs(&inside))
        }
    }
}

impl RegionTextSource for PdfRegionSource {
    fn name(&self) -> &str {
        "pdf_region"
    }

    fn open<'a>(
        &'a self,
        ctx: &'a GeometryContext,
    ) -> Result<Box<dyn RegionText + 'a>, MethodError> {
        let region = ctx.region();
        let glyphs = self
            .glyphs
            .iter()
            .filter(|glyph| {
                let (x, y) = glyph.center();
                region.contains_point(x, y)
            })
            .collect();
        Ok(Box::new(PdfRegionText { glyphs }))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Glyph, Matrix, PageLayout, PdfRegionSource, decode_pdf_bytes, strip_subset_prefix,
    };
    use crate::cell::RegionTextSource;
    use crate::geometry::{BBox, GeometryContext};

    fn glyph(ch: char, x0: f64, y0: f64, run: u32) -> Glyph {
        Glyph {
            ch,
            bbox: BBox::new(x0, y0, x0 + 6.0, y0 + 10.0),
            font: "Helvetica".to_string(),
            size: 10.0,
            bold: false,
            italic: false,
            run,
        }
    }

    fn layout(glyphs: Vec<Glyph>) -> PageLayout {
        PageLayout {
            page: 1,
            width: 200.0,
            height: 200.0,
            glyphs,
            lines: Vec::new(),
        }
    }

    #[test]
    fn decodes_big5_when_encoding_hint_is_present() {
        let (bytes, _, had_errors) = encoding_rs::BIG5.encode("測試");
        assert!(!had_errors);
        let decoded = decode_pdf_bytes(Some("ETen-B5-H"), &bytes);
        assert_eq!(decoded, "測試");
    }

    #[test]
    fn composes_matrices_in_application_order() {
        let scale = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        };
        let moved = Matrix::translate(10.0, 5.0).then(scale);
        assert_eq!(moved.apply(1.0, 1.0), (22.0, 12.0));
        assert!((moved.vertical_scale() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn strips_subset_tags_only() {
        assert_eq!(strip_subset_prefix("ABCDEF+Times-Bold"), "Times-Bold");
        assert_eq!(strip_subset_prefix("Foo+Bar"), "Foo+Bar");
    }

    #[test]
    fn groups_glyphs_into_words_on_gaps() {
        let page = layout(vec![
            glyph('A', 0.0, 0.0, 1),
            glyph('b', 6.0, 0.0, 1),
            glyph('c', 20.0, 0.0, 1),
            glyph('d', 0.0, 30.0, 2),
        ]);

        let words = page.words();
        let texts = words.iter().map(|word| word.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["Ab", "c", "d"]);
        assert_eq!(words[0].bbox, BBox::new(0.0, 0.0, 12.0, 10.0));
        assert_eq!((words[1].line, words[1].word), (1, 1));
        assert_eq!((words[2].line, words[2].word), (2, 0));
    }

    #[test]
    fn spans_keep_single_spaces_but_split_wide_gaps() {
        let page = layout(vec![
            glyph('a', 0.0, 0.0, 1),
            glyph('b', 11.0, 0.0, 1),
            glyph('c', 40.0, 0.0, 1),
        ]);
        let spans = page.spans();
        let texts = spans.iter().map(|span| span.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["a b", "c"]);
    }

    #[test]
    fn region_source_splits_words_at_cell_edges() {
        let page = layout(vec![
            glyph('x', 0.0, 0.0, 1),
            glyph('y', 6.0, 0.0, 1),
            glyph('z', 100.0, 100.0, 1),
        ]);
        let source = PdfRegionSource::new(page.glyphs.clone());
        let ctx = GeometryContext::new(BBox::new(0.0, 0.0, 50.0, 50.0), vec![], vec![], vec![]);
        let text = source.open(&ctx).expect("source should open");

        assert_eq!(text.text_in(BBox::new(0.0, 0.0, 50.0, 50.0)).as_deref(), Some("xy"));
        assert_eq!(text.text_in(BBox::new(0.0, 0.0, 5.0, 50.0)).as_deref(), Some("x"));
        assert_eq!(text.text_in(BBox::new(90.0, 90.0, 120.0, 120.0)), None);
    }

    #[test]
    fn rejects_regions_without_area() {
        let page = layout(Vec::new());
        assert!(page.context(BBox::new(10.0, 10.0, 5.0, 20.0)).is_err());
    }
}
