use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message the catalog returns with a 404 when a filtered query matches nothing.
pub const NOTHING_HERE: &str = "There is nothing here";

/// Error body returned by the catalog API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }

    pub fn is_nothing_here(&self) -> bool {
        self.error.trim() == NOTHING_HERE
    }
}
