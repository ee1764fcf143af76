//! API response envelopes shared by all route handlers.

pub mod response;

pub use response::{Created, DataResponse, MessageResponse, NoContent};
