//! Service layer: external collaborators and transactional operations.
//!
//! Storage and recognition wrap outside systems; presence, progress
//! and inspections orchestrate multi-statement mutations the route
//! handlers run inside a single transaction.

pub mod inspections;
pub mod presence;
pub mod progress;
pub mod recognition;
pub mod storage;

pub use recognition::RecognitionClient;
pub use storage::Storage;
