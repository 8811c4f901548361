//! Positioned word extraction from PDF using lopdf
//!
//! This module walks page content streams, tracks the text and graphics
//! matrices, and turns shown strings into words with page coordinates
//! measured from the top of the page, which is what column recovery works on.

use crate::Error;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;

/// A4 portrait, used when a page tree carries no MediaBox at all
const DEFAULT_MEDIA_BOX: BBox = BBox {
    x0: 0.0,
    y0: 0.0,
    x1: 595.0,
    y1: 842.0,
};

/// Average glyph advance as a fraction of the font size.
/// Content streams don't give widths without font metrics, so word
/// extents are estimated from character counts.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Page bounding box in PDF user space (origin bottom-left)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// A single word on a page.
///
/// `top` and `bottom` are distances from the top edge of the page,
/// so they grow downwards like reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Word {
    /// Horizontal midpoint, used to assign the word to a column
    pub fn x_mid(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }
}

/// One page worth of words
#[derive(Debug, Clone)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,
    pub bbox: BBox,
    pub words: Vec<Word>,
}

impl Page {
    pub fn new(number: u32, bbox: BBox, words: Vec<Word>) -> Self {
        Self {
            number,
            bbox,
            words,
        }
    }
}

/// A shown string with position information, before word splitting
#[derive(Debug, Clone)]
struct TextItem {
    text: String,
    /// Baseline X position on page
    x: f32,
    /// Baseline Y position on page (PDF coordinates, origin at bottom-left)
    y: f32,
    font_size: f32,
}

/// Extract the words of every page of a PDF file
pub fn extract_pages<P: AsRef<Path>>(path: P) -> Result<Vec<Page>, Error> {
    let doc = Document::load(path)?;
    extract_pages_from_doc(&doc)
}

/// Extract the words of every page from a memory buffer
pub fn extract_pages_mem(buffer: &[u8]) -> Result<Vec<Page>, Error> {
    let doc = Document::load_mem(buffer)?;
    extract_pages_from_doc(&doc)
}

fn extract_pages_from_doc(doc: &Document) -> Result<Vec<Page>, Error> {
    if doc.is_encrypted() {
        return Err(Error::Encrypted);
    }

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(Error::InvalidStructure);
    }

    let mut out = Vec::with_capacity(pages.len());
    for (&page_num, &page_id) in pages.iter() {
        let bbox = page_media_box(doc, page_id);
        let items = extract_page_text_items(doc, page_id)?;
        let words: Vec<Word> = items
            .iter()
            .flat_map(|item| split_words(item, bbox.y1))
            .collect();
        log::debug!("page {}: {} text items, {} words", page_num, items.len(), words.len());
        out.push(Page::new(page_num, bbox, words));
    }

    Ok(out)
}

/// Resolve the page MediaBox, following `/Parent` for inherited values
fn page_media_box(doc: &Document, page_id: ObjectId) -> BBox {
    let mut current = doc.get_dictionary(page_id).ok();
    while let Some(dict) = current {
        if let Some(bbox) = dict.get(b"MediaBox").ok().and_then(|obj| as_bbox(doc, obj)) {
            return bbox;
        }
        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .ok()
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    DEFAULT_MEDIA_BOX
}

fn as_bbox(doc: &Document, obj: &Object) -> Option<BBox> {
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let values: Vec<f32> = obj.as_array().ok()?.iter().filter_map(get_number).collect();
    if values.len() != 4 {
        return None;
    }
    // Normalize in case the rectangle corners are given in reverse
    Some(BBox::new(
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ))
}

/// Split a shown string into words, estimating each word's horizontal extent
fn split_words(item: &TextItem, page_top: f32) -> Vec<Word> {
    let advance = item.font_size * AVG_GLYPH_WIDTH;
    let bottom = page_top - item.y;
    let top = bottom - item.font_size;

    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    let chars: Vec<char> = item.text.chars().collect();

    for i in 0..=chars.len() {
        let is_space = chars.get(i).map_or(true, |c| c.is_whitespace());
        match (start, is_space) {
            (None, false) => start = Some(i),
            (Some(s), true) => {
                words.push(Word {
                    text: chars[s..i].iter().collect(),
                    x0: item.x + s as f32 * advance,
                    x1: item.x + i as f32 * advance,
                    top,
                    bottom,
                });
                start = None;
            }
            _ => {}
        }
    }

    words
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Text and graphics state while walking a content stream
struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: String,
    font_size: f32,
    leading: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            leading: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_block: false,
        }
    }
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

impl TextState {
    fn next_line(&mut self) {
        // Without an explicit TL, approximate the line height
        let leading = if self.leading > 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.line_matrix[5] -= leading;
        self.text_matrix = self.line_matrix;
    }

    fn item(&self, text: String) -> TextItem {
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        TextItem {
            text,
            x: combined[4],
            y: combined[5],
            font_size: effective_font_size(self.font_size, &combined),
        }
    }
}

/// Extract text items from a single page
fn extract_page_text_items(doc: &Document, page_id: ObjectId) -> Result<Vec<TextItem>, Error> {
    use lopdf::content::Content;

    let mut items = Vec::new();

    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();

    let content_data = doc
        .get_page_content(page_id)
        .map_err(|e| Error::Parse(e.to_string()))?;

    let content = Content::decode(&content_data).map_err(|e| Error::Parse(e.to_string()))?;

    let mut state = TextState::default();

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let new_matrix = [
                        get_number(&op.operands[0]).unwrap_or(1.0),
                        get_number(&op.operands[1]).unwrap_or(0.0),
                        get_number(&op.operands[2]).unwrap_or(0.0),
                        get_number(&op.operands[3]).unwrap_or(1.0),
                        get_number(&op.operands[4]).unwrap_or(0.0),
                        get_number(&op.operands[5]).unwrap_or(0.0),
                    ];
                    state.ctm = multiply_matrices(&new_matrix, &state.ctm);
                }
            }
            "BT" => {
                state.in_text_block = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "ET" => state.in_text_block = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        state.font = String::from_utf8_lossy(name).to_string();
                    }
                    if let Some(size) = get_number(&op.operands[1]) {
                        state.font_size = size;
                    }
                }
            }
            "TL" => {
                if let Some(leading) = op.operands.first().and_then(get_number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    // Offsets are in text space, scaled by the line matrix
                    let translate = [1.0, 0.0, 0.0, 1.0, tx, ty];
                    state.line_matrix = multiply_matrices(&translate, &state.line_matrix);
                    state.text_matrix = state.line_matrix;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        state.text_matrix[i] =
                            get_number(operand).unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    state.line_matrix = state.text_matrix;
                }
            }
            "T*" => state.next_line(),
            "Tj" | "'" | "\"" => {
                if op.operator != "Tj" {
                    state.next_line();
                }
                // `"` carries word and char spacing before the string
                if let Some(operand) = op.operands.last() {
                    if state.in_text_block {
                        if let Some(text) =
                            extract_text_from_operand(operand, doc, &fonts, &state.font)
                        {
                            if !text.trim().is_empty() {
                                items.push(state.item(text));
                            }
                        }
                    }
                }
            }
            "TJ" => {
                if state.in_text_block && !op.operands.is_empty() {
                    if let Ok(array) = op.operands[0].as_array() {
                        let mut combined_text = String::new();
                        for item in array {
                            match item {
                                // Large negative kerning is how many producers space words
                                Object::Integer(_) | Object::Real(_) => {
                                    if get_number(item).unwrap_or(0.0) < -200.0 {
                                        combined_text.push(' ');
                                    }
                                }
                                _ => {
                                    if let Some(text) =
                                        extract_text_from_operand(item, doc, &fonts, &state.font)
                                    {
                                        combined_text.push_str(&text);
                                    }
                                }
                            }
                        }
                        if !combined_text.trim().is_empty() {
                            items.push(state.item(combined_text));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(items)
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Compute the rendered font size from the base size and the combined
/// text-to-page matrix [a, b, c, d, tx, ty]
fn effective_font_size(base_size: f32, matrix: &[f32; 6]) -> f32 {
    let scale_x = (matrix[0].powi(2) + matrix[1].powi(2)).sqrt();
    let scale_y = (matrix[2].powi(2) + matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Extract text from a text operand, handling encoding
fn extract_text_from_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    current_font: &str,
) -> Option<String> {
    if let Object::String(bytes, _) = obj {
        if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
            if let Ok(encoding) = font_dict.get_font_encoding(doc) {
                if let Ok(text) = Document::decode_text(&encoding, bytes) {
                    return Some(text);
                }
            }
        }

        // Fallback: try UTF-16BE then Latin-1
        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let utf16: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                .collect();
            return Some(String::from_utf16_lossy(&utf16));
        }

        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}
