//! Domain types and pure domain logic.
//!
//! Everything in this module is side-effect free and unit-tested
//! without a database. Services and routes orchestrate these rules
//! against storage.

pub mod geofence;
pub mod inspections;
pub mod nfc;
pub mod objects;
pub mod progress;
pub mod users;

pub use users::UserRole;
