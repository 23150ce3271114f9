//! Shared API response types

use serde::{Deserialize, Serialize};

/// Plain confirmation body, e.g. `{"message":"Tag deleted"}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
