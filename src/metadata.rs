//! Report header metadata
//!
//! Header fields sit on the first pages as `Label: value` pairs. One regex
//! per field, all driven through [`extract_metadata`].

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::status::collapse_whitespace;

/// Header fields, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    TurbineNumber,
    ServiceOrder,
    PadNo,
    TurbineType,
    StartDate,
    EndDate,
    DateAndTimeOfReceipt,
    ReasonForCallOut,
    CustomerAddress,
}

impl MetadataField {
    pub const ALL: [MetadataField; 9] = [
        MetadataField::TurbineNumber,
        MetadataField::ServiceOrder,
        MetadataField::PadNo,
        MetadataField::TurbineType,
        MetadataField::StartDate,
        MetadataField::EndDate,
        MetadataField::DateAndTimeOfReceipt,
        MetadataField::ReasonForCallOut,
        MetadataField::CustomerAddress,
    ];

    /// Key written to the report
    pub fn key(&self) -> &'static str {
        match self {
            MetadataField::TurbineNumber => "turbine_number",
            MetadataField::ServiceOrder => "service_order",
            MetadataField::PadNo => "pad_no",
            MetadataField::TurbineType => "turbine_type",
            MetadataField::StartDate => "start_date",
            MetadataField::EndDate => "end_date",
            MetadataField::DateAndTimeOfReceipt => "date_and_time_of_receipt",
            MetadataField::ReasonForCallOut => "reason_for_call_out",
            MetadataField::CustomerAddress => "customer_address",
        }
    }

    fn pattern(&self) -> &'static str {
        match self {
            MetadataField::TurbineNumber => r"Turbine No\./Id:?\s*(\d+)",
            MetadataField::ServiceOrder => r"Service Order:?\s*(\d+)",
            MetadataField::PadNo => r"PAD No\.\s*([^\n]+)",
            MetadataField::TurbineType => r"Turbine Type:\s*(\w+)",
            MetadataField::StartDate => r"Start Date:\s*([\d.]+)",
            MetadataField::EndDate => r"End Date:\s*([\d.]+)",
            MetadataField::DateAndTimeOfReceipt => r"Date & Time of Receipt\s*([\d.\s:]+)",
            MetadataField::ReasonForCallOut => r"Reason for Call Out:\s*([^\n]+)",
            MetadataField::CustomerAddress => r"(?s)Customer's Address:\s*(.*?)Site's Address:",
        }
    }

    /// Multi-line fields keep one entry per non-empty line
    fn is_list(&self) -> bool {
        matches!(self, MetadataField::CustomerAddress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(text) => f.write_str(text),
            MetadataValue::List(lines) => f.write_str(&lines.join("; ")),
        }
    }
}

/// Header metadata of one report; fields not found are absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    values: HashMap<MetadataField, MetadataValue>,
}

impl Metadata {
    pub fn get(&self, field: MetadataField) -> Option<&MetadataValue> {
        self.values.get(&field)
    }

    /// Every field in report order, found or not
    pub fn iter(&self) -> impl Iterator<Item = (MetadataField, Option<&MetadataValue>)> + '_ {
        MetadataField::ALL
            .into_iter()
            .map(move |field| (field, self.values.get(&field)))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

static FIELD_PATTERNS: Lazy<Vec<(MetadataField, Regex)>> = Lazy::new(|| {
    MetadataField::ALL
        .into_iter()
        .map(|field| (field, Regex::new(field.pattern()).unwrap()))
        .collect()
});

/// Extract every header field from the text of the first report pages
pub fn extract_metadata(text: &str) -> Metadata {
    let mut values = HashMap::new();

    for (field, re) in FIELD_PATTERNS.iter() {
        let Some(captured) = re.captures(text).and_then(|caps| caps.get(1)) else {
            continue;
        };
        let raw = captured.as_str();

        let value = if field.is_list() {
            let lines: Vec<String> = raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect();
            MetadataValue::List(lines)
        } else {
            let text = collapse_whitespace(raw);
            if text.is_empty() {
                continue;
            }
            MetadataValue::Text(text)
        };

        values.insert(*field, value);
    }

    log::debug!("extracted {} of {} metadata fields", values.len(), MetadataField::ALL.len());
    Metadata { values }
}
