//! Line classification for the text pass
//!
//! Decides, for one line of page text, whether it opens a new inspection
//! item, continues the item currently being built, or carries nothing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::accumulator::ParserState;
use crate::status::{collapse_whitespace, extract_status, parse_item_text, Status};

/// Document-management header repeated on every form page
pub const DMS_MARKER: &str = "0. DMS:";

static ITEM_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+").unwrap());
static ITEM_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+\.\d+)\s+(.+)$").unwrap());
static ITEM_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+$").unwrap());

/// Outcome of classifying one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// `<digits>.<digits> description [status]`
    StartsNewItem {
        item_number: String,
        description: String,
        comment: Option<String>,
        status: Option<Status>,
    },
    /// Extra text for the open item, with its trailing status stripped
    ContinuesCurrentItem {
        text: String,
        status: Option<Status>,
    },
    Noise,
}

/// True if `text` is exactly a dotted item number such as `1.01`
pub fn is_item_number(text: &str) -> bool {
    ITEM_NUMBER_RE.is_match(text)
}

fn is_page_furniture(line: &str, form_marker: &str) -> bool {
    line.contains(DMS_MARKER) || (!form_marker.is_empty() && line.contains(form_marker))
}

/// Classify `line` given the current parser state.
///
/// Lines holding `form_marker` or the DMS header are page furniture. Never
/// fails: anything unrecognised is `Noise`, or continuation text when an
/// item is open. A line that starts with an item number but carries no
/// description is noise rather than continuation.
pub fn classify_line(line: &str, state: &ParserState, form_marker: &str) -> LineClass {
    let line = collapse_whitespace(line);

    if line.is_empty() || is_page_furniture(&line, form_marker) {
        return LineClass::Noise;
    }

    if let Some(caps) = ITEM_LINE_RE.captures(&line) {
        let parsed = parse_item_text(&caps[2]);
        return LineClass::StartsNewItem {
            item_number: caps[1].to_string(),
            description: parsed.description,
            comment: parsed.comment,
            status: parsed.status,
        };
    }

    if state.is_open() && !ITEM_PREFIX_RE.is_match(&line) {
        let (text, status) = extract_status(&line);
        return LineClass::ContinuesCurrentItem { text, status };
    }

    LineClass::Noise
}
