//! Construction object lifecycle.
//!
//! An object's `status` and `object_type` always move together as one
//! pair; no operation writes one without the other.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectStatus {
    Known,
    Plan,
    Act,
    Delay,
    Lead,
}

impl ObjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Known => "KNOWN",
            Self::Plan => "PLAN",
            Self::Act => "ACT",
            Self::Delay => "DELAY",
            Self::Lead => "LEAD",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "PLAN" => Self::Plan,
            "ACT" => Self::Act,
            "DELAY" => Self::Delay,
            "LEAD" => Self::Lead,
            _ => Self::Known,
        }
    }
}

/// Classification axis used by list filters, orthogonal to `ObjectStatus`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Active,
    NotActive,
    Agreement,
    ActOpening,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::NotActive => "NOT_ACTIVE",
            Self::Agreement => "AGREEMENT",
            Self::ActOpening => "ACT_OPENING",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "ACTIVE" => Self::Active,
            "AGREEMENT" => Self::Agreement,
            "ACT_OPENING" => Self::ActOpening,
            _ => Self::NotActive,
        }
    }
}

/// Object list filter: every classification or all of them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectTypeFilter {
    #[default]
    All,
    Active,
    NotActive,
    Agreement,
    ActOpening,
}

impl ObjectTypeFilter {
    /// The concrete type to filter by, or `None` for no filtering.
    pub fn as_object_type(&self) -> Option<ObjectType> {
        match self {
            Self::All => None,
            Self::Active => Some(ObjectType::Active),
            Self::NotActive => Some(ObjectType::NotActive),
            Self::Agreement => Some(ObjectType::Agreement),
            Self::ActOpening => Some(ObjectType::ActOpening),
        }
    }
}

/// Status of an activation document (act or checklist)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationDocStatus {
    Required,
    Awaiting,
    Rejected,
    Accept,
}

impl ActivationDocStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "REQUIRED",
            Self::Awaiting => "AWAITING",
            Self::Rejected => "REJECTED",
            Self::Accept => "ACCEPT",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "AWAITING" => Self::Awaiting,
            "REJECTED" => Self::Rejected,
            "ACCEPT" => Self::Accept,
            _ => Self::Required,
        }
    }
}

/// Completion mark on one checklist line
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChecklistItemStatus {
    Yes,
    No,
    NotRequired,
}

impl ChecklistItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
            Self::NotRequired => "NOT_REQUIRED",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "YES" => Self::Yes,
            "NOT_REQUIRED" => Self::NotRequired,
            _ => Self::No,
        }
    }
}

/// Reviewer decision on an activation checklist
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationAction {
    Accept,
    Deny,
}

/// Short registry code for a new object, e.g. "OBJ-4F9C21". Uniqueness
/// is enforced by the objects table, not here.
pub fn generate_using_id() -> String {
    let bytes: [u8; 3] = rand::random();
    format!("OBJ-{:02X}{:02X}{:02X}", bytes[0], bytes[1], bytes[2])
}

/// State of a freshly registered object.
pub const NEW_OBJECT_STATE: (ObjectStatus, ObjectType) =
    (ObjectStatus::Known, ObjectType::NotActive);

/// State after an activation checklist has been requested.
pub const CHECKLIST_REQUESTED_STATE: (ObjectStatus, ObjectType) =
    (ObjectStatus::Known, ObjectType::Agreement);

/// State after the signed act file has been uploaded.
pub const ACT_UPLOADED_STATE: (ObjectStatus, ObjectType) =
    (ObjectStatus::Plan, ObjectType::Active);

/// Paired state after a checklist review. Accept opens the act stage;
/// deny returns the object to its initial state so activation can be
/// requested again.
pub fn checklist_review_transition(action: ActivationAction) -> (ObjectStatus, ObjectType) {
    match action {
        ActivationAction::Accept => (ObjectStatus::Act, ObjectType::ActOpening),
        ActivationAction::Deny => NEW_OBJECT_STATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_pairs_are_fixed() {
        assert_eq!(NEW_OBJECT_STATE, (ObjectStatus::Known, ObjectType::NotActive));
        assert_eq!(
            CHECKLIST_REQUESTED_STATE,
            (ObjectStatus::Known, ObjectType::Agreement)
        );
        assert_eq!(ACT_UPLOADED_STATE, (ObjectStatus::Plan, ObjectType::Active));
    }

    #[test]
    fn checklist_accept_opens_the_act_stage() {
        assert_eq!(
            checklist_review_transition(ActivationAction::Accept),
            (ObjectStatus::Act, ObjectType::ActOpening)
        );
    }

    #[test]
    fn checklist_deny_resets_to_initial_state() {
        assert_eq!(
            checklist_review_transition(ActivationAction::Deny),
            NEW_OBJECT_STATE
        );
    }

    #[test]
    fn filter_maps_to_concrete_types() {
        assert_eq!(ObjectTypeFilter::All.as_object_type(), None);
        assert_eq!(
            ObjectTypeFilter::ActOpening.as_object_type(),
            Some(ObjectType::ActOpening)
        );
    }

    #[test]
    fn using_id_has_registry_shape() {
        let id = generate_using_id();
        assert_eq!(id.len(), 10);
        assert!(id.starts_with("OBJ-"));
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn db_text_round_trip() {
        for status in [
            ObjectStatus::Known,
            ObjectStatus::Plan,
            ObjectStatus::Act,
            ObjectStatus::Delay,
            ObjectStatus::Lead,
        ] {
            assert_eq!(ObjectStatus::from_db(status.as_str()), status);
        }
        for ty in [
            ObjectType::Active,
            ObjectType::NotActive,
            ObjectType::Agreement,
            ObjectType::ActOpening,
        ] {
            assert_eq!(ObjectType::from_db(ty.as_str()), ty);
        }
    }
}
