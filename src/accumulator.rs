//! Inspection item accumulation
//!
//! The text pass walks classified lines through a two-state machine (no item
//! open / item open) and commits each finished item into an ordered
//! collection keyed by item number. A second pass over table grids then
//! recovers items whose text lines were lost to layout quirks.
//!
//! Item numbers are unique in the output. Re-detecting a committed number
//! appends to the existing entry instead of creating a second one, and the
//! merge is reported as a data-quality signal.

use std::collections::HashMap;

use crate::classifier::{classify_line, is_item_number, LineClass};
use crate::source::TableGrid;
use crate::status::{collapse_whitespace, extract_status, parse_item_text, Status};
use crate::FORM_MARKER;

/// One numbered checklist entry of the inspection form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionItem {
    /// Dotted identifier, e.g. `1.01`
    pub item_number: String,
    pub description: String,
    pub comment: Option<String>,
    pub status: Status,
}

impl InspectionItem {
    pub fn new(
        item_number: impl Into<String>,
        description: impl Into<String>,
        comment: Option<String>,
        status: Status,
    ) -> Self {
        Self {
            item_number: item_number.into(),
            description: description.into(),
            comment,
            status,
        }
    }

    /// Integer prefix of the item number (`"3"` for `3.07`)
    pub fn section(&self) -> &str {
        self.item_number
            .split_once('.')
            .map_or(self.item_number.as_str(), |(section, _)| section)
    }

    /// Continuation text goes to the comment once one is open
    fn append_text(&mut self, text: &str) {
        match self.comment.as_mut() {
            Some(comment) => push_text(comment, text),
            None => push_text(&mut self.description, text),
        }
    }

    fn append_comment(&mut self, text: &str) {
        match self.comment.as_mut() {
            Some(comment) => push_text(comment, text),
            None if !text.is_empty() => self.comment = Some(text.to_string()),
            None => {}
        }
    }

    /// A later detection replaces an earlier one
    fn record_status(&mut self, status: Option<Status>) {
        if let Some(status) = status {
            self.status = status;
        }
    }
}

fn push_text(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

/// Items in first-seen order with a lookup index by item number
#[derive(Debug, Clone, Default)]
pub struct ItemCollection {
    items: Vec<InspectionItem>,
    index: HashMap<String, usize>,
}

impl ItemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, item_number: &str) -> bool {
        self.index.contains_key(item_number)
    }

    pub fn get(&self, item_number: &str) -> Option<&InspectionItem> {
        self.index.get(item_number).map(|&idx| &self.items[idx])
    }

    fn get_mut(&mut self, item_number: &str) -> Option<&mut InspectionItem> {
        match self.index.get(item_number) {
            Some(&idx) => self.items.get_mut(idx),
            None => None,
        }
    }

    /// Append `item` unless its number is already present.
    /// Returns whether the item was inserted.
    pub fn insert(&mut self, item: InspectionItem) -> bool {
        if self.contains(&item.item_number) {
            return false;
        }
        self.index
            .insert(item.item_number.clone(), self.items.len());
        self.items.push(item);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InspectionItem> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<InspectionItem> {
        self.items
    }
}

/// Item currently being built by the text pass
#[derive(Debug, Clone, PartialEq, Eq)]
enum Draft {
    /// Not committed yet; text accumulates here until the next flush
    Pending(InspectionItem),
    /// Re-detection of a committed item; text goes straight to that entry
    Merging(String),
}

/// Transient per-document state of the text pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    draft: Option<Draft>,
}

impl ParserState {
    /// State with a fresh, empty draft for `item_number`
    pub fn pending(item_number: &str) -> Self {
        Self {
            draft: Some(Draft::Pending(InspectionItem::new(
                item_number,
                String::new(),
                None,
                Status::Unset,
            ))),
        }
    }

    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    pub fn current_item_number(&self) -> Option<&str> {
        match self.draft.as_ref()? {
            Draft::Pending(item) => Some(&item.item_number),
            Draft::Merging(item_number) => Some(item_number),
        }
    }
}

/// Final result of both passes over one document
#[derive(Debug, Clone, Default)]
pub struct Accumulated {
    /// Items in first-seen order, text pass before table pass
    pub items: Vec<InspectionItem>,
    /// Item numbers that were detected more than once by the text pass
    pub merged_duplicates: Vec<String>,
    /// Items that only the table pass found
    pub recovered_from_tables: usize,
}

/// Builds the item list of one document from its text lines and table rows
#[derive(Debug)]
pub struct InspectionItemAccumulator {
    items: ItemCollection,
    state: ParserState,
    form_marker: String,
    merged_duplicates: Vec<String>,
    recovered_from_tables: usize,
}

impl Default for InspectionItemAccumulator {
    fn default() -> Self {
        Self::with_form_marker(FORM_MARKER)
    }
}

impl InspectionItemAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat lines holding `form_marker` as page headers
    pub fn with_form_marker(form_marker: impl Into<String>) -> Self {
        Self {
            items: ItemCollection::new(),
            state: ParserState::default(),
            form_marker: form_marker.into(),
            merged_duplicates: Vec::new(),
            recovered_from_tables: 0,
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn items(&self) -> &ItemCollection {
        &self.items
    }

    /// Feed every line of one page's text
    pub fn feed_text(&mut self, text: &str) {
        for line in text.lines() {
            self.feed_line(line);
        }
    }

    pub fn feed_line(&mut self, line: &str) {
        let class = classify_line(line, &self.state, &self.form_marker);
        let state = std::mem::take(&mut self.state);
        self.state = self.advance(state, class);
    }

    fn advance(&mut self, state: ParserState, class: LineClass) -> ParserState {
        match class {
            LineClass::Noise => state,
            LineClass::StartsNewItem {
                item_number,
                description,
                comment,
                status,
            } => {
                self.flush(state);
                self.start_item(item_number, description, comment, status)
            }
            LineClass::ContinuesCurrentItem { text, status } => {
                self.continue_item(state, &text, status)
            }
        }
    }

    fn start_item(
        &mut self,
        item_number: String,
        description: String,
        comment: Option<String>,
        status: Option<Status>,
    ) -> ParserState {
        let Some(existing) = self.items.get_mut(&item_number) else {
            let item = InspectionItem::new(
                item_number,
                description,
                comment,
                status.unwrap_or_default(),
            );
            return ParserState {
                draft: Some(Draft::Pending(item)),
            };
        };

        log::warn!(
            "item {} detected again, merging into the existing entry",
            item_number
        );
        push_text(&mut existing.description, &description);
        if let Some(comment) = comment {
            existing.append_comment(&comment);
        }
        existing.record_status(status);

        if !self.merged_duplicates.contains(&item_number) {
            self.merged_duplicates.push(item_number.clone());
        }

        ParserState {
            draft: Some(Draft::Merging(item_number)),
        }
    }

    fn continue_item(
        &mut self,
        mut state: ParserState,
        text: &str,
        status: Option<Status>,
    ) -> ParserState {
        match state.draft.as_mut() {
            Some(Draft::Pending(item)) => {
                item.append_text(text);
                item.record_status(status);
            }
            Some(Draft::Merging(item_number)) => {
                if let Some(item) = self.items.get_mut(item_number) {
                    item.append_text(text);
                    item.record_status(status);
                }
            }
            None => {}
        }
        state
    }

    /// Commit the pending draft, if any
    fn flush(&mut self, state: ParserState) {
        if let Some(Draft::Pending(item)) = state.draft {
            let item_number = item.item_number.clone();
            if !self.items.insert(item) {
                log::debug!("draft {} already committed, dropped", item_number);
            }
        }
    }

    /// End of the text pass: commit whatever is still open
    pub fn finish_text_pass(&mut self) {
        let state = std::mem::take(&mut self.state);
        self.flush(state);
    }

    /// Second pass: add table rows whose item number the text pass never saw.
    ///
    /// Rows for numbers already present are ignored. Returns the number of
    /// recovered items.
    pub fn reconcile_tables(&mut self, tables: &[TableGrid]) -> usize {
        self.finish_text_pass();

        let mut recovered = 0;
        for row in tables.iter().flatten() {
            let Some(item) = item_from_row(row) else {
                continue;
            };
            if self.items.contains(&item.item_number) {
                continue;
            }
            log::debug!("recovered item {} from table row", item.item_number);
            self.items.insert(item);
            recovered += 1;
        }

        self.recovered_from_tables += recovered;
        recovered
    }

    pub fn finish(mut self) -> Accumulated {
        self.finish_text_pass();
        Accumulated {
            items: self.items.into_vec(),
            merged_duplicates: self.merged_duplicates,
            recovered_from_tables: self.recovered_from_tables,
        }
    }
}

/// Build an item from a table row: number in the first cell, description
/// in the second, status at the end of the description or in a later cell
fn item_from_row(row: &[Option<String>]) -> Option<InspectionItem> {
    if row.len() < 2 {
        return None;
    }

    let item_number = row[0].as_deref()?.trim();
    if !is_item_number(item_number) {
        return None;
    }

    let cell = row[1].as_deref().map(collapse_whitespace).unwrap_or_default();
    let mut parsed = parse_item_text(&cell);

    if parsed.status.is_none() {
        for later in row[2..].iter().flatten() {
            let (rest, status) = extract_status(&collapse_whitespace(later));
            if status.is_some() {
                parsed.status = status;
                if parsed.comment.is_none() && !rest.is_empty() {
                    parsed.comment = Some(rest);
                }
                break;
            }
        }
    }

    Some(InspectionItem::new(
        item_number,
        parsed.description,
        parsed.comment,
        parsed.status.unwrap_or_default(),
    ))
}
