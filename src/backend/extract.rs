//! Positioned word extraction from PDF content streams.
//!
//! Glyph widths are approximated as half the font size, so word boxes are
//! estimates. They are precise enough for highlighting and line grouping but
//! should not be used for layout reconstruction.

use std::collections::BTreeMap;

use lopdf::{Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::model::PageWord;

/// A `TJ` adjustment larger than this (in thousandths of text space) ends the
/// current word.
pub const WORD_BREAK_ADJUSTMENT: f32 = 200.0;

/// Approximate glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;
/// Word box extent above and below the baseline, as fractions of the size.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

/// A word in PDF user space: bottom-left origin, `baseline` on the y axis.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PdfWord {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub baseline: f32,
    pub size: f32,
}

impl PdfWord {
    /// Convert to a top-left origin page word. `origin` is the lower-left
    /// corner of the media box and `top` its upper edge.
    pub fn to_page_word(&self, origin: (f32, f32), top: f32) -> PageWord {
        let (llx, _) = origin;
        PageWord::new(
            self.x0 - llx,
            top - (self.baseline + ASCENT * self.size),
            self.x1 - llx,
            top - (self.baseline - DESCENT * self.size),
            self.text.clone(),
        )
    }
}

/// Extract the words of a page in content-stream order.
pub(crate) fn extract_page_words(doc: &Document, page_id: ObjectId) -> Result<Vec<PdfWord>> {
    let fonts = doc
        .get_page_fonts(page_id)
        .map_err(|e| Error::PdfParse(e.to_string()))?;
    let encodings: BTreeMap<_, _> = fonts
        .iter()
        .filter_map(|(name, font)| {
            font.get_font_encoding(doc)
                .ok()
                .map(|enc| (name.clone(), enc))
        })
        .collect();

    let content = page_content(doc, page_id)?;
    content_words(&content, |font, bytes| match encodings.get(font) {
        Some(enc) => {
            Document::decode_text(enc, bytes).unwrap_or_else(|_| decode_text_simple(bytes))
        }
        None => decode_text_simple(bytes),
    })
}

/// Concatenated, decompressed content streams of a page.
fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::PdfParse(e.to_string()))?;

    let contents = match page.get(b"Contents") {
        Ok(contents) => contents,
        // A page without content has no words.
        Err(_) => return Ok(Vec::new()),
    };

    let stream_data = |id: ObjectId| -> Result<Vec<u8>> {
        match doc.get_object(id) {
            // Unfiltered streams have nothing to decompress.
            Ok(Object::Stream(s)) => Ok(s
                .decompressed_content()
                .unwrap_or_else(|_| s.content.clone())),
            _ => Err(Error::PdfParse("invalid content stream".to_string())),
        }
    };

    match contents {
        Object::Reference(id) => stream_data(*id),
        Object::Array(parts) => {
            let mut content = Vec::new();
            for part in parts {
                if let Object::Reference(id) = part {
                    content.extend_from_slice(&stream_data(*id)?);
                    content.push(b' ');
                }
            }
            Ok(content)
        }
        Object::Stream(s) => Ok(s
            .decompressed_content()
            .unwrap_or_else(|_| s.content.clone())),
        _ => Err(Error::PdfParse("invalid content stream".to_string())),
    }
}

/// Walk a content stream and collect the words it shows.
///
/// `decode` turns a string operand into text given the current font resource
/// name.
pub(crate) fn content_words<F>(content: &[u8], decode: F) -> Result<Vec<PdfWord>>
where
    F: Fn(&[u8], &[u8]) -> String,
{
    let content =
        lopdf::content::Content::decode(content).map_err(|e| Error::PdfParse(e.to_string()))?;

    let mut state = TextState::default();
    let mut sink = WordSink::default();
    let mut in_text = false;

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => {
                in_text = true;
                state.matrix = TextMatrix::default();
            }
            "ET" => {
                in_text = false;
                sink.flush();
            }
            "Tf" => {
                if let (Some(Object::Name(name)), Some(size)) =
                    (operands.first(), operands.get(1).and_then(number))
                {
                    state.font = name.clone();
                    state.size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    sink.flush();
                    state.matrix.next_line_offset(tx, ty);
                }
            }
            "Tm" => {
                let values: Vec<f32> = operands.iter().filter_map(number).collect();
                if let &[a, b, c, d, e, f] = values.as_slice() {
                    sink.flush();
                    state.matrix.set([a, b, c, d, e, f]);
                }
            }
            "T*" => {
                sink.flush();
                state.next_line();
            }
            "Tj" if in_text => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = decode(&state.font, bytes);
                    state.show(&text, &mut sink);
                }
            }
            "TJ" if in_text => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => {
                                let text = decode(&state.font, bytes);
                                state.show(&text, &mut sink);
                            }
                            other => {
                                if let Some(adjustment) = number(other) {
                                    if -adjustment > WORD_BREAK_ADJUSTMENT {
                                        sink.flush();
                                    }
                                    state.matrix.advance(-adjustment / 1000.0 * state.size);
                                }
                            }
                        }
                    }
                }
            }
            "'" | "\"" => {
                sink.flush();
                state.next_line();
                let index = if op.operator == "\"" { 2 } else { 0 };
                if in_text {
                    if let Some(Object::String(bytes, _)) = operands.get(index) {
                        let text = decode(&state.font, bytes);
                        state.show(&text, &mut sink);
                    }
                }
            }
            _ => {}
        }
    }

    sink.flush();
    Ok(sink.words)
}

struct TextState {
    matrix: TextMatrix,
    font: Vec<u8>,
    size: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: TextMatrix::default(),
            font: Vec::new(),
            size: 12.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn next_line(&mut self) {
        let leading = if self.leading != 0.0 {
            self.leading
        } else {
            self.size * 1.2
        };
        self.matrix.next_line_offset(0.0, -leading);
    }

    /// Show a decoded string, feeding its glyphs into `sink`.
    fn show(&mut self, text: &str, sink: &mut WordSink) {
        let advance = self.size * GLYPH_WIDTH;
        let scale = self.matrix.scale();
        for c in text.chars() {
            let (x, y) = self.matrix.position();
            if c.is_whitespace() || c == '\u{00A0}' {
                sink.flush();
            } else {
                sink.push(c, x, advance * scale, y, self.size * scale);
            }
            self.matrix.advance(advance);
        }
    }
}

/// Collects glyphs into words.
#[derive(Default)]
struct WordSink {
    words: Vec<PdfWord>,
    current: Option<PdfWord>,
}

impl WordSink {
    fn push(&mut self, c: char, x: f32, width: f32, baseline: f32, size: f32) {
        let word = self.current.get_or_insert_with(|| PdfWord {
            text: String::new(),
            x0: x,
            x1: x,
            baseline,
            size,
        });
        word.text.push(c);
        word.x0 = word.x0.min(x);
        word.x1 = word.x1.max(x + width);
    }

    fn flush(&mut self) {
        if let Some(word) = self.current.take() {
            self.words.push(word);
        }
    }
}

/// Text matrix and text line matrix, stored as `[a b c d e f]`.
#[derive(Debug, Clone, Copy)]
struct TextMatrix {
    current: [f32; 6],
    line: [f32; 6],
}

impl Default for TextMatrix {
    fn default() -> Self {
        let identity = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        Self {
            current: identity,
            line: identity,
        }
    }
}

impl TextMatrix {
    fn set(&mut self, m: [f32; 6]) {
        self.current = m;
        self.line = m;
    }

    /// Start a new line offset from the start of the current one.
    fn next_line_offset(&mut self, tx: f32, ty: f32) {
        let [a, b, c, d, e, f] = self.line;
        self.line = [a, b, c, d, e + tx * a + ty * c, f + tx * b + ty * d];
        self.current = self.line;
    }

    /// Move along the baseline by `tx` text space units.
    fn advance(&mut self, tx: f32) {
        let [a, b, ..] = self.current;
        self.current[4] += tx * a;
        self.current[5] += tx * b;
    }

    fn position(&self) -> (f32, f32) {
        (self.current[4], self.current[5])
    }

    fn scale(&self) -> f32 {
        let [a, b, ..] = self.current;
        (a * a + b * b).sqrt()
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decoding fallback for fonts without a usable encoding.
pub(crate) fn decode_text_simple(bytes: &[u8]) -> String {
    if let [0xFE, 0xFF, rest @ ..] = bytes {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

/// Order words for reading: lines top to bottom, words left to right.
///
/// Words belong to the same line when their vertical centers are within 30%
/// of the line's first word height.
pub fn group_words_into_lines(mut words: Vec<PageWord>) -> Vec<Vec<PageWord>> {
    words.sort_by(|a, b| {
        a.bbox
            .center_y()
            .total_cmp(&b.bbox.center_y())
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut lines: Vec<Vec<PageWord>> = Vec::new();
    let mut anchor: Option<(f32, f32)> = None;

    for word in words {
        let center = word.bbox.center_y();
        match anchor {
            Some((y, height)) if (center - y).abs() <= height * 0.3 => {
                if let Some(line) = lines.last_mut() {
                    line.push(word);
                }
            }
            _ => {
                anchor = Some((center, word.bbox.height()));
                lines.push(vec![word]);
            }
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
    }
    lines
}
