//! Request and Response models for the demo API
//!
//! DTOs serialized to and from the HTTP bodies of `api`.

pub mod requests;
pub mod responses;

pub use requests::CreateThing;
pub use responses::{ErrorResponse, HealthResponse, StatsResponse, Thing};
