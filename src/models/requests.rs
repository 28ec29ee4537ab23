//! Request DTOs for the demo API

use serde::Deserialize;

const MAX_NAME_LENGTH: usize = 256;

/// Request body for `POST /things`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateThing {
    pub name: String,
}

impl CreateThing {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.name.trim().is_empty() {
            return Some("Name cannot be empty".to_string());
        }
        if self.name.len() > MAX_NAME_LENGTH {
            return Some(format!(
                "Name exceeds maximum length of {} characters",
                MAX_NAME_LENGTH
            ));
        }
        None
    }
}
