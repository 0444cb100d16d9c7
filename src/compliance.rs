//! Compliance ratio over the final item list

use crate::accumulator::InspectionItem;
use crate::status::Status;

/// Share of status-bearing items marked OK
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Compliance {
    pub ok_count: usize,
    /// Items with any status; section headers without one are not counted
    pub total_with_status: usize,
    /// `100 * ok_count / total_with_status`, or 0 when nothing has a status
    pub ratio_percent: f64,
}

impl Compliance {
    pub fn from_items(items: &[InspectionItem]) -> Self {
        let total_with_status = items.iter().filter(|i| i.status.is_set()).count();
        let ok_count = items.iter().filter(|i| i.status == Status::Ok).count();

        let ratio_percent = if total_with_status == 0 {
            0.0
        } else {
            100.0 * ok_count as f64 / total_with_status as f64
        };

        Self {
            ok_count,
            total_with_status,
            ratio_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(number: &str, status: Status) -> InspectionItem {
        InspectionItem::new(number, "x", None, status)
    }

    #[test]
    fn test_ratio_ignores_unset() {
        let items = vec![
            item("1.00", Status::Unset),
            item("1.01", Status::Ok),
            item("1.02", Status::Nok),
            item("1.03", Status::Ok),
            item("1.04", Status::NotApplicable),
        ];
        let compliance = Compliance::from_items(&items);
        assert_eq!(compliance.ok_count, 2);
        assert_eq!(compliance.total_with_status, 4);
        assert!((compliance.ratio_percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_status_items_is_zero() {
        let compliance = Compliance::from_items(&[item("1.00", Status::Unset)]);
        assert_eq!(compliance.total_with_status, 0);
        assert_eq!(compliance.ratio_percent, 0.0);
        assert_eq!(Compliance::from_items(&[]), Compliance::default());
    }
}
