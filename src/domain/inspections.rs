//! Remark/violation item states and the container aggregation rule.

use serde::{Deserialize, Serialize};

/// Which inspection workflow a container belongs to. Both share the
/// same tables and state machine; only presence policy and routes
/// differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionKind {
    Remark,
    Violation,
}

impl InspectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remark => "remark",
            Self::Violation => "violation",
        }
    }
}

/// State of a single remark/violation item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    NotFixed,
    Review,
    Fixed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFixed => "NOT_FIXED",
            Self::Review => "REVIEW",
            Self::Fixed => "FIXED",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "REVIEW" => Self::Review,
            "FIXED" => Self::Fixed,
            _ => Self::NotFixed,
        }
    }
}

/// Inspector decision on an answered item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewAction {
    Accept,
    Deny,
}

/// Container status derived from all sibling items by fixed priority:
/// everything fixed wins, any item under review comes next, any open
/// item last. `None` (no items) leaves the container untouched.
pub fn container_status(item_statuses: &[ItemStatus]) -> Option<ItemStatus> {
    if item_statuses.is_empty() {
        return None;
    }
    if item_statuses.iter().all(|s| *s == ItemStatus::Fixed) {
        return Some(ItemStatus::Fixed);
    }
    if item_statuses.iter().any(|s| *s == ItemStatus::Review) {
        return Some(ItemStatus::Review);
    }
    Some(ItemStatus::NotFixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::*;

    #[test]
    fn all_fixed_wins() {
        assert_eq!(container_status(&[Fixed, Fixed, Fixed]), Some(Fixed));
    }

    #[test]
    fn any_review_takes_priority_over_open_items() {
        assert_eq!(container_status(&[Fixed, Review, NotFixed]), Some(Review));
        assert_eq!(container_status(&[NotFixed, Review]), Some(Review));
    }

    #[test]
    fn open_items_without_review_stay_not_fixed() {
        assert_eq!(container_status(&[Fixed, NotFixed]), Some(NotFixed));
        assert_eq!(container_status(&[NotFixed]), Some(NotFixed));
    }

    #[test]
    fn empty_container_is_left_unchanged() {
        assert_eq!(container_status(&[]), None);
    }

    #[test]
    fn recompute_is_order_independent() {
        let a = [Fixed, Review, NotFixed];
        let b = [NotFixed, Fixed, Review];
        let c = [Review, NotFixed, Fixed];
        assert_eq!(container_status(&a), container_status(&b));
        assert_eq!(container_status(&b), container_status(&c));
    }
}
