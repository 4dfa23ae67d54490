//! Rule violations the route layer reports before touching the gateway:
//! requests naming an entity that is not in the catalog, or payloads the
//! catalog would never accept.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("no {entity} with that id")]
    NotFound { entity: &'static str },
    #[error("{message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
