//! Work progress statuses and aggregation math.
//!
//! Percent values are fractions in [0, 1] stored with four decimal
//! places. All rounding is half-up so recomputing an aggregate is
//! deterministic across runs.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Verification state of a single submitted work item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemStatus {
    AwaitingVerification,
    Passed,
    VerificationRejected,
}

impl WorkItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingVerification => "AWAITING_VERIFICATION",
            Self::Passed => "PASSED",
            Self::VerificationRejected => "VERIFICATION_REJECTED",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "PASSED" => Self::Passed,
            "VERIFICATION_REJECTED" => Self::VerificationRejected,
            _ => Self::AwaitingVerification,
        }
    }
}

/// Main progress axis of a stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageMainStatus {
    NotStarted,
    Work,
    Passed,
}

impl StageMainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Work => "WORK",
            Self::Passed => "PASSED",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "WORK" => Self::Work,
            "PASSED" => Self::Passed,
            _ => Self::NotStarted,
        }
    }
}

/// Orthogonal review flag of a stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageReviewStatus {
    None,
    AwaitingVerification,
    VerificationRejected,
}

impl StageReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::AwaitingVerification => "AWAITING_VERIFICATION",
            Self::VerificationRejected => "VERIFICATION_REJECTED",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "AWAITING_VERIFICATION" => Self::AwaitingVerification,
            "VERIFICATION_REJECTED" => Self::VerificationRejected,
            _ => Self::None,
        }
    }
}

/// Reviewer decision on a submitted work item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkDecision {
    Accept,
    Deny,
}

/// Stage completion fraction. The denominator floors at 1 so a stage
/// with no target volume yet still computes; [0, 1] clamp guards
/// over-delivery.
pub fn stage_percent(passed_volume: i64, target_volume: i64) -> Decimal {
    let denominator = Decimal::from(target_volume.max(1));
    let ratio = Decimal::from(passed_volume) / denominator;
    ratio
        .clamp(Decimal::ZERO, Decimal::ONE)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Main status once at least one decision has been recorded.
pub fn main_status_after_decision(passed_volume: i64, target_volume: i64) -> StageMainStatus {
    if passed_volume >= target_volume {
        StageMainStatus::Passed
    } else {
        StageMainStatus::Work
    }
}

/// Review flag written by an explicit accept/deny on a work item.
pub fn review_status_after_decision(decision: WorkDecision) -> StageReviewStatus {
    match decision {
        WorkDecision::Accept => StageReviewStatus::None,
        WorkDecision::Deny => StageReviewStatus::VerificationRejected,
    }
}

/// Review flag recomputed without an explicit decision, from the
/// current statuses of every sibling work item.
pub fn review_status_recompute(item_statuses: &[WorkItemStatus]) -> StageReviewStatus {
    if item_statuses
        .iter()
        .any(|s| *s == WorkItemStatus::AwaitingVerification)
    {
        StageReviewStatus::AwaitingVerification
    } else {
        StageReviewStatus::None
    }
}

/// Unweighted mean of stage percents, four decimal places.
pub fn record_percent(stage_percents: &[Decimal]) -> Decimal {
    if stage_percents.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = stage_percents.iter().sum();
    (sum / Decimal::from(stage_percents.len() as i64))
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
}

/// Unweighted mean of record percents, the object-wide figure.
pub fn object_percent(record_percents: &[Decimal]) -> Decimal {
    record_percent(record_percents)
}

/// Completed volume in target units: target x percent, rounded half-up
/// to two decimals and then truncated to a whole number.
pub fn volume_percent(target_volume: i64, percent: Decimal) -> i64 {
    (Decimal::from(target_volume) * percent)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .trunc()
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(mantissa: i64, scale: u32) -> Decimal {
        Decimal::new(mantissa, scale)
    }

    #[test]
    fn percent_rounds_half_up_at_four_decimals() {
        // 6667 / 20000 = 0.33335 exactly
        assert_eq!(stage_percent(6667, 20000), dec(3334, 4));
        assert_eq!(stage_percent(1, 3), dec(3333, 4));
        assert_eq!(stage_percent(2, 3), dec(6667, 4));
    }

    #[test]
    fn percent_clamps_to_unit_interval() {
        assert_eq!(stage_percent(150, 100), Decimal::ONE);
        assert_eq!(stage_percent(0, 100), Decimal::ZERO);
    }

    #[test]
    fn zero_target_floors_denominator() {
        assert_eq!(stage_percent(0, 0), Decimal::ZERO);
        assert_eq!(stage_percent(5, 0), Decimal::ONE);
    }

    #[test]
    fn scenario_three_deliveries_to_completion() {
        // target 100, volumes 40 / 35 / 25 accepted in turn
        let after_two = stage_percent(75, 100);
        assert_eq!(after_two, dec(7500, 4));
        assert_eq!(main_status_after_decision(75, 100), StageMainStatus::Work);

        let after_three = stage_percent(100, 100);
        assert_eq!(after_three, Decimal::ONE);
        assert_eq!(main_status_after_decision(100, 100), StageMainStatus::Passed);
    }

    #[test]
    fn decision_sets_review_flag() {
        assert_eq!(
            review_status_after_decision(WorkDecision::Accept),
            StageReviewStatus::None
        );
        assert_eq!(
            review_status_after_decision(WorkDecision::Deny),
            StageReviewStatus::VerificationRejected
        );
    }

    #[test]
    fn recompute_review_flag_tracks_awaiting_siblings() {
        assert_eq!(
            review_status_recompute(&[WorkItemStatus::Passed, WorkItemStatus::AwaitingVerification]),
            StageReviewStatus::AwaitingVerification
        );
        assert_eq!(
            review_status_recompute(&[WorkItemStatus::Passed, WorkItemStatus::VerificationRejected]),
            StageReviewStatus::None
        );
        assert_eq!(review_status_recompute(&[]), StageReviewStatus::None);
    }

    #[test]
    fn record_percent_is_unweighted_mean() {
        assert_eq!(record_percent(&[dec(7500, 4), dec(5000, 4)]), dec(6250, 4));
        assert_eq!(record_percent(&[]), Decimal::ZERO);
        // 0.3333 + 0.3333 + 0.3334 = 1.0000; mean rounds to 0.3333
        assert_eq!(
            record_percent(&[dec(3333, 4), dec(3333, 4), dec(3334, 4)]),
            dec(3333, 4)
        );
    }

    #[test]
    fn volume_percent_rounds_then_truncates() {
        assert_eq!(volume_percent(100, dec(7500, 4)), 75);
        // 7 * 0.3334 = 2.3338 -> 2.33 -> 2
        assert_eq!(volume_percent(7, dec(3334, 4)), 2);
        // 3 * 0.999 = 2.997 -> 3.00 -> 3
        assert_eq!(volume_percent(3, dec(999, 3)), 3);
        assert_eq!(volume_percent(0, Decimal::ONE), 0);
    }
}
