//! Text extraction from PDF using lopdf
//!
//! Walks each page's content stream, records every shown string with its
//! position, and groups the pieces into lines. [`PdfReport`] keeps the
//! positioned items of every page and serves both page text and table grids
//! from them.

use crate::source::{PageTableSource, PageTextSource, TableGrid};
use crate::tables::{detect_tables, TableSettings};
use crate::{ExtractionOptions, ReportError};
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;

/// A text item with position information
#[derive(Debug, Clone)]
pub struct TextItem {
    /// The text content
    pub text: String,
    /// X position on page
    pub x: f32,
    /// Y position on page (PDF coordinates, origin at bottom-left)
    pub y: f32,
    /// Page number (1-indexed)
    pub page: u32,
}

/// A line of text (grouped text items)
#[derive(Debug, Clone)]
pub struct TextLine {
    pub items: Vec<TextItem>,
    pub y: f32,
    pub page: u32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.items
            .iter()
            .map(|i| i.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Options for grouping text items into lines
#[derive(Debug, Clone)]
pub struct LineOptions {
    /// Items whose baselines differ by less than this share a line
    pub y_tolerance: f32,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self { y_tolerance: 3.0 }
    }
}

/// A loaded report: positioned text items for every page
#[derive(Debug, Clone)]
pub struct PdfReport {
    pages: Vec<Vec<TextItem>>,
    lines: LineOptions,
    table: TableSettings,
}

impl PdfReport {
    /// Load and extract a report from a PDF file
    pub fn open<P: AsRef<Path>>(path: P, options: &ExtractionOptions) -> Result<Self, ReportError> {
        let doc = Document::load(path)?;
        Ok(Self::from_document(&doc, options))
    }

    /// Load and extract a report from a memory buffer
    pub fn from_mem(buffer: &[u8], options: &ExtractionOptions) -> Result<Self, ReportError> {
        let doc = Document::load_mem(buffer)?;
        Ok(Self::from_document(&doc, options))
    }

    fn from_document(doc: &Document, options: &ExtractionOptions) -> Self {
        let pages = doc
            .get_pages()
            .into_iter()
            .map(|(page_num, page_id)| {
                extract_page_text_items(doc, page_id, page_num).unwrap_or_else(|e| {
                    log::warn!("page {}: text extraction failed: {}", page_num, e);
                    Vec::new()
                })
            })
            .collect();

        Self {
            pages,
            lines: options.lines.clone(),
            table: options.table.clone(),
        }
    }

    /// Positioned items of one page (0-indexed)
    pub fn page_items(&self, page_index: usize) -> Result<&[TextItem], ReportError> {
        self.pages
            .get(page_index)
            .map(Vec::as_slice)
            .ok_or_else(|| ReportError::Parse(format!("page {} out of range", page_index)))
    }
}

impl PageTextSource for PdfReport {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page_index: usize) -> Result<String, ReportError> {
        let items = self.page_items(page_index)?.to_vec();
        let lines = group_into_lines(items, &self.lines);
        Ok(lines
            .iter()
            .map(TextLine::text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl PageTableSource for PdfReport {
    fn page_tables(&self, page_index: usize) -> Result<Vec<TableGrid>, ReportError> {
        let tables = detect_tables(self.page_items(page_index)?, &self.table);
        if tables.is_empty() {
            return Err(ReportError::NoTableFound { page: page_index });
        }
        Ok(tables)
    }
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

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Text and graphics state while walking one content stream
struct PageWalker<'a> {
    doc: &'a Document,
    fonts: BTreeMap<Vec<u8>, &'a lopdf::Dictionary>,
    page: u32,
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: String,
    font_size: f32,
    /// Set by `TL` or `TD`
    leading: Option<f32>,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
    items: Vec<TextItem>,
}

impl<'a> PageWalker<'a> {
    fn new(doc: &'a Document, page_id: ObjectId, page: u32) -> Self {
        Self {
            doc,
            fonts: doc.get_page_fonts(page_id).unwrap_or_default(),
            page,
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            leading: None,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_block: false,
            items: Vec::new(),
        }
    }

    /// Offsets are in text space, so they scale with the line matrix
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = multiply_matrices(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        // Approximate leading when the stream never set one
        let leading = self.leading.unwrap_or(self.font_size * 1.2);
        self.move_line(0.0, -leading);
    }

    fn show(&mut self, text: String) {
        if !self.in_text_block || text.trim().is_empty() {
            return;
        }
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        self.items.push(TextItem {
            text,
            x: combined[4],
            y: combined[5],
            page: self.page,
        });
    }

    fn decode(&self, obj: &Object) -> Option<String> {
        extract_text_from_operand(obj, self.doc, &self.fonts, &self.font)
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(saved) = self.ctm_stack.pop() {
                    self.ctm = saved;
                }
            }
            "cm" if operands.len() >= 6 => {
                let m = read_matrix(operands);
                self.ctm = multiply_matrices(&m, &self.ctm);
            }
            "BT" => {
                self.in_text_block = true;
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "ET" => self.in_text_block = false,
            "Tf" if operands.len() >= 2 => {
                if let Ok(name) = operands[0].as_name() {
                    self.font = String::from_utf8_lossy(name).to_string();
                }
                if let Some(size) = get_number(&operands[1]) {
                    self.font_size = size;
                }
            }
            "Td" | "TD" if operands.len() >= 2 => {
                let tx = get_number(&operands[0]).unwrap_or(0.0);
                let ty = get_number(&operands[1]).unwrap_or(0.0);
                if operator == "TD" {
                    self.leading = Some(-ty);
                }
                self.move_line(tx, ty);
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(get_number) {
                    self.leading = Some(leading);
                }
            }
            "Tm" if operands.len() >= 6 => {
                self.text_matrix = read_matrix(operands);
                self.line_matrix = self.text_matrix;
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(text) = operands.first().and_then(|o| self.decode(o)) {
                    self.show(text);
                }
            }
            "TJ" => {
                if let Some(Ok(array)) = operands.first().map(|o| o.as_array()) {
                    let text: String = array.iter().filter_map(|o| self.decode(o)).collect();
                    self.show(text);
                }
            }
            "'" => {
                self.next_line();
                if let Some(text) = operands.first().and_then(|o| self.decode(o)) {
                    self.show(text);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(text) = operands.get(2).and_then(|o| self.decode(o)) {
                    self.show(text);
                }
            }
            _ => {}
        }
    }
}

/// Extract text items from a single page
fn extract_page_text_items(
    doc: &Document,
    page_id: ObjectId,
    page_num: u32,
) -> Result<Vec<TextItem>, ReportError> {
    use lopdf::content::Content;

    let content_data = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_data)?;

    let mut walker = PageWalker::new(doc, page_id, page_num);
    for op in &content.operations {
        walker.apply(op.operator.as_str(), &op.operands);
    }

    log::debug!("page {}: {} text items", page_num, walker.items.len());
    Ok(walker.items)
}

fn read_matrix(operands: &[Object]) -> [f32; 6] {
    let mut m = IDENTITY;
    for (i, operand) in operands.iter().take(6).enumerate() {
        if let Some(value) = get_number(operand) {
            m[i] = value;
        }
    }
    m
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Extract text from a text operand, handling encoding
fn extract_text_from_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    current_font: &str,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    // Fallback: UTF-16BE with BOM, then Latin-1
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }

    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Group text items into lines, top of the page first.
///
/// Form layouts interleave columns in stream order, so items are sorted by
/// page, then baseline (descending), then X before grouping.
pub fn group_into_lines(mut items: Vec<TextItem>, options: &LineOptions) -> Vec<TextLine> {
    use std::cmp::Ordering;

    items.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(b.y.partial_cmp(&a.y).unwrap_or(Ordering::Equal))
            .then(a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal))
    });

    let mut lines: Vec<TextLine> = Vec::new();
    for item in items {
        match lines.last_mut() {
            Some(line)
                if line.page == item.page && (line.y - item.y).abs() < options.y_tolerance =>
            {
                line.items.push(item);
            }
            _ => lines.push(TextLine {
                y: item.y,
                page: item.page,
                items: vec![item],
            }),
        }
    }

    // Sort items within each line by X position (left to right)
    for line in &mut lines {
        line.items
            .sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
    }

    lines
}
