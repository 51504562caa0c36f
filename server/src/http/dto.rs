use serde::{Deserialize, Serialize};

/// Entry endpoints take the key through the `v` query parameter so that
/// slashes never need path-segment escaping.
#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub v: String,
}

#[derive(Debug, Serialize)]
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
