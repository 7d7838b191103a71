//! Positional text recovery from PDF content streams.
//!
//! Best-effort: glyph widths are estimated from the font size and string
//! bytes are decoded as UTF-16BE (with BOM) or Latin-1, which covers
//! simple-encoded fonts. Composite fonts yield no usable spans.

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::trace;

use crate::models::document::TextSpan;

/// Default page height (US Letter) when no MediaBox is found.
const DEFAULT_PAGE_HEIGHT: f32 = 792.0;
/// Average glyph width as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f32 = 0.5;
/// TJ adjustment (thousandths of an em) treated as a word gap.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

#[derive(Debug, Clone, Copy)]
struct TextState {
    x: f32,
    y: f32,
    line_x: f32,
    line_y: f32,
    font_size: f32,
    scale: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            line_x: 0.0,
            line_y: 0.0,
            font_size: 12.0,
            scale: 1.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn begin_text(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.line_x = 0.0;
        self.line_y = 0.0;
        self.scale = 1.0;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_x += tx;
        self.line_y += ty;
        self.x = self.line_x;
        self.y = self.line_y;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn effective_size(&self) -> f32 {
        (self.font_size * self.scale).abs().max(1.0)
    }
}

/// Extract positioned text spans for every page of `doc`.
pub(crate) fn extract_spans(doc: &Document) -> Vec<TextSpan> {
    let mut spans = Vec::new();

    for (page_num, page_id) in doc.get_pages() {
        let page_height = page_height(doc, page_id);
        let data = match doc.get_page_content(page_id) {
            Ok(data) => data,
            Err(e) => {
                trace!("No content stream on page {}: {}", page_num, e);
                continue;
            }
        };
        let content = match Content::decode(&data) {
            Ok(content) => content,
            Err(e) => {
                trace!("Cannot decode content of page {}: {}", page_num, e);
                continue;
            }
        };

        let mut state = TextState::default();
        for op in &content.operations {
            let operands = &op.operands;
            match op.operator.as_str() {
                "BT" => state.begin_text(),
                "Tf" => {
                    if let Some(size) = operands.get(1).and_then(number) {
                        state.font_size = size;
                    }
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        state.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    let tx = operands.first().and_then(number).unwrap_or(0.0);
                    let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.move_line(tx, ty);
                }
                "Tm" => {
                    if operands.len() >= 6 {
                        let d = number(&operands[3]).unwrap_or(1.0);
                        state.scale = if d == 0.0 { 1.0 } else { d };
                        state.line_x = number(&operands[4]).unwrap_or(0.0);
                        state.line_y = number(&operands[5]).unwrap_or(0.0);
                        state.x = state.line_x;
                        state.y = state.line_y;
                    }
                }
                "T*" => state.next_line(),
                "Tj" => {
                    if let Some(text) = operands.first().and_then(decode_string) {
                        push_span(&mut spans, &mut state, page_num, page_height, &text);
                    }
                }
                "'" => {
                    state.next_line();
                    if let Some(text) = operands.first().and_then(decode_string) {
                        push_span(&mut spans, &mut state, page_num, page_height, &text);
                    }
                }
                "\"" => {
                    state.next_line();
                    if let Some(text) = operands.get(2).and_then(decode_string) {
                        push_span(&mut spans, &mut state, page_num, page_height, &text);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let text = decode_tj_array(items);
                        push_span(&mut spans, &mut state, page_num, page_height, &text);
                    }
                }
                _ => {}
            }
        }
    }

    spans
}

fn push_span(
    spans: &mut Vec<TextSpan>,
    state: &mut TextState,
    page: u32,
    page_height: f32,
    text: &str,
) {
    let cleaned: String = text.chars().filter(|c| !c.is_control()).collect();
    let size = state.effective_size();
    let width = cleaned.chars().count() as f32 * size * GLYPH_WIDTH_RATIO;

    if !cleaned.trim().is_empty() {
        spans.push(TextSpan {
            page,
            x: state.x,
            // PDF user space has a bottom-left origin and y is the baseline.
            y: page_height - state.y - size,
            width,
            height: size,
            text: cleaned.trim().to_string(),
        });
    }
    state.x += width;
}

fn decode_tj_array(items: &[Object]) -> String {
    let mut text = String::new();
    for item in items {
        match item {
            Object::String(..) => {
                if let Some(part) = decode_string(item) {
                    text.push_str(&part);
                }
            }
            other => {
                if number(other).is_some_and(|adj| -adj > TJ_SPACE_THRESHOLD) {
                    text.push(' ');
                }
            }
        }
    }
    text
}

fn decode_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Height of a page from its (possibly inherited) MediaBox.
fn page_height(doc: &Document, page_id: ObjectId) -> f32 {
    let mut node = doc.get_dictionary(page_id).ok();
    // Bounded walk up the page tree.
    for _ in 0..32 {
        let Some(dict) = node else { break };
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let resolved = match media_box {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
            if let Some(Object::Array(values)) = resolved {
                if values.len() == 4 {
                    let y0 = number(&values[1]).unwrap_or(0.0);
                    let y1 = number(&values[3]).unwrap_or(DEFAULT_PAGE_HEIGHT);
                    return (y1 - y0).abs();
                }
            }
        }
        node = match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => doc.get_dictionary(*parent).ok(),
            _ => None,
        };
    }
    DEFAULT_PAGE_HEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    #[test]
    fn test_decode_tj_array_inserts_gaps() {
        let items = vec![
            Object::String(b"Incident".to_vec(), StringFormat::Literal),
            Object::Integer(-250),
            Object::String(b"ID".to_vec(), StringFormat::Literal),
            Object::Integer(-20),
            Object::String(b":".to_vec(), StringFormat::Literal),
        ];
        assert_eq!(decode_tj_array(&items), "Incident ID:");
    }

    #[test]
    fn test_decode_utf16_string() {
        let obj = Object::String(vec![0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42], StringFormat::Hexadecimal);
        assert_eq!(decode_string(&obj).as_deref(), Some("AB"));
    }

    #[test]
    fn test_push_span_flips_y() {
        let mut spans = Vec::new();
        let mut state = TextState { font_size: 10.0, ..Default::default() };
        state.move_line(72.0, 700.0);
        push_span(&mut spans, &mut state, 1, 792.0, "Hello");

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].x, 72.0);
        assert_eq!(spans[0].y, 82.0);
        assert_eq!(spans[0].width, 25.0);
        assert_eq!(state.x, 97.0);
    }
}
