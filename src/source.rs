//! Page sources consumed by the item parser
//!
//! The parser only needs two primitives from a PDF backend: the raw text of
//! a page and the cell grids of the tables found on it. [`crate::PdfReport`]
//! implements both on top of lopdf; [`MemoryReport`] serves pre-extracted
//! pages, mostly for tests.

use crate::ReportError;

/// Rows of nullable cells for one detected table
pub type TableGrid = Vec<Vec<Option<String>>>;

/// Yields the raw text of a page (0-indexed)
pub trait PageTextSource {
    fn page_count(&self) -> usize;

    fn page_text(&self, page_index: usize) -> Result<String, ReportError>;
}

/// Yields the tables detected on a page (0-indexed).
///
/// A page without any table returns [`ReportError::NoTableFound`].
pub trait PageTableSource {
    fn page_tables(&self, page_index: usize) -> Result<Vec<TableGrid>, ReportError>;
}

/// One pre-extracted page
#[derive(Debug, Clone, Default)]
pub struct MemoryPage {
    pub text: String,
    pub tables: Vec<TableGrid>,
}

/// A report whose pages are already extracted
#[derive(Debug, Clone, Default)]
pub struct MemoryReport {
    pub pages: Vec<MemoryPage>,
}

impl MemoryReport {
    /// Build a report from page texts with no tables
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: texts
                .into_iter()
                .map(|text| MemoryPage {
                    text: text.into(),
                    tables: Vec::new(),
                })
                .collect(),
        }
    }

    fn page(&self, page_index: usize) -> Result<&MemoryPage, ReportError> {
        self.pages
            .get(page_index)
            .ok_or_else(|| ReportError::Parse(format!("page {} out of range", page_index)))
    }
}

impl PageTextSource for MemoryReport {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page_index: usize) -> Result<String, ReportError> {
        Ok(self.page(page_index)?.text.clone())
    }
}

impl PageTableSource for MemoryReport {
    fn page_tables(&self, page_index: usize) -> Result<Vec<TableGrid>, ReportError> {
        let page = self.page(page_index)?;
        if page.tables.is_empty() {
            return Err(ReportError::NoTableFound { page: page_index });
        }
        Ok(page.tables.clone())
    }
}
