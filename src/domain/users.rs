//! User roles and role-based visibility rules.

use serde::{Deserialize, Serialize};

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Client-side construction control staff
    ConstructionControl,
    /// Contractor company staff
    Contractor,
    /// State inspection staff, sees every object
    Inspection,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConstructionControl => "construction_control",
            Self::Contractor => "contractor",
            Self::Inspection => "inspection",
        }
    }

    /// Parse the database representation, defaulting unknown values
    /// to the least privileged role.
    pub fn from_db(s: &str) -> Self {
        match s {
            "construction_control" => Self::ConstructionControl,
            "inspection" => Self::Inspection,
            _ => Self::Contractor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_db_text() {
        for role in [
            UserRole::ConstructionControl,
            UserRole::Contractor,
            UserRole::Inspection,
        ] {
            assert_eq!(UserRole::from_db(role.as_str()), role);
        }
    }

    #[test]
    fn unknown_role_text_defaults_to_contractor() {
        assert_eq!(UserRole::from_db("supervisor"), UserRole::Contractor);
    }
}
