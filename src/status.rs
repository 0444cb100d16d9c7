//! Status token extraction
//!
//! Inspection rows end with a status token (`OK`, `NOT OK`, `NOK`, `N/A` or
//! `Not Applicable`). This module strips that token from a text fragment and
//! splits `description: comment` text into its two parts.

use std::fmt;

/// Status classification of an inspection item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    Ok,
    NotOk,
    Nok,
    NotApplicable,
    /// No status token was ever found for the item (section headers, etc.)
    #[default]
    Unset,
}

impl Status {
    /// Canonical spelling written to the report; empty for `Unset`
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotOk => "NOT OK",
            Status::Nok => "NOK",
            Status::NotApplicable => "N/A",
            Status::Unset => "",
        }
    }

    pub fn is_set(&self) -> bool {
        *self != Status::Unset
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct StatusToken {
    text: &'static str,
    status: Status,
    ignore_case: bool,
}

/// Recognised tokens, longest first so `NOT OK` wins over `OK`
const STATUS_TOKENS: [StatusToken; 5] = [
    StatusToken {
        text: "Not Applicable",
        status: Status::NotApplicable,
        ignore_case: false,
    },
    StatusToken {
        text: "NOT OK",
        status: Status::NotOk,
        ignore_case: true,
    },
    StatusToken {
        text: "NOK",
        status: Status::Nok,
        ignore_case: true,
    },
    StatusToken {
        text: "N/A",
        status: Status::NotApplicable,
        ignore_case: false,
    },
    StatusToken {
        text: "OK",
        status: Status::Ok,
        ignore_case: true,
    },
];

/// Strip trailing status tokens from `fragment`.
///
/// Returns the remaining text (trimmed) and the outermost status, if one was
/// found. Repeated tokens (`OK OK`) are all stripped, so running this again
/// on the remaining text finds nothing. The token must stand on its own:
/// `BOOK` does not end in `OK`.
pub fn extract_status(fragment: &str) -> (String, Option<Status>) {
    let mut rest = fragment.trim();
    let mut status = None;

    while let Some((head, found)) = strip_any_token(rest) {
        status = status.or(Some(found));
        rest = head.trim_end();
    }

    (rest.to_string(), status)
}

fn strip_any_token(text: &str) -> Option<(&str, Status)> {
    STATUS_TOKENS
        .iter()
        .find_map(|token| strip_token(text, token).map(|head| (head, token.status)))
}

fn strip_token<'a>(text: &'a str, token: &StatusToken) -> Option<&'a str> {
    let len = token.text.len();
    if text.len() < len || !text.is_char_boundary(text.len() - len) {
        return None;
    }

    let (head, tail) = text.split_at(text.len() - len);
    let matched = if token.ignore_case {
        tail.eq_ignore_ascii_case(token.text)
    } else {
        tail == token.text
    };
    if !matched {
        return None;
    }

    if head.chars().next_back().is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }

    Some(head)
}

/// Description, comment and status parsed out of one item's text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemText {
    pub description: String,
    pub comment: Option<String>,
    pub status: Option<Status>,
}

/// Parse the text that follows an item number.
///
/// The trailing status token is stripped first. If the rest contains a
/// colon, text before the first colon is the description and text after it
/// the comment; a comment ending in a status token supplies the status when
/// none was found yet.
pub fn parse_item_text(text: &str) -> ItemText {
    let (remaining, mut status) = extract_status(text);

    let (description, comment) = match remaining.split_once(':') {
        Some((description, rest)) => {
            let rest = rest.trim();
            let comment = if status.is_none() {
                let (comment, found) = extract_status(rest);
                status = found;
                comment
            } else {
                rest.to_string()
            };
            (
                description.trim().to_string(),
                (!comment.is_empty()).then_some(comment),
            )
        }
        None => (remaining, None),
    };

    ItemText {
        description,
        comment,
        status,
    }
}

/// Collapse runs of whitespace (including newlines inside table cells)
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
