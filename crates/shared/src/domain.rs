use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// One displayable image: where the browser fetches it and what to call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub path: String,
    pub title: String,
}

impl GalleryItem {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
        }
    }

    /// An item labelled with its own public path.
    pub fn untitled(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            title: path.clone(),
            path,
        }
    }
}

/// What a single failed classification does to the rest of the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Label the failed item with its path and keep going.
    #[default]
    Fallback,
    /// Fail the whole listing.
    Abort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fallback => f.write_str("fallback"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(Self::Fallback),
            "abort" => Ok(Self::Abort),
            other => Err(format!("unknown failure policy '{other}'")),
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
