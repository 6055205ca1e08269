use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub instance_id: Uuid,
}

impl ServiceInfo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            instance_id: Uuid::new_v4(),
        }
    }
}

/// A reported value that may be missing because the upstream field was never populated.
///
/// Keeps "zero observed" apart from "data unavailable" in report payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Observed<T> {
    Observed { value: T },
    Unavailable { reason: String },
}

impl<T> Observed<T> {
    pub fn value(value: T) -> Self {
        Self::Observed { value }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Observed { value } => Some(value),
            Self::Unavailable { .. } => None,
        }
    }
}
