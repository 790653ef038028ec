//! Model identifier normalisation
//!
//! The daemon treats `llama3` and `llama3:latest` as the same model. The tag is
//! whatever follows the last `:` of the final path segment, so registry hosts
//! with ports (`registry.local:5000/team/model`) are not mistaken for tags.

use crate::{error::RegistryError, Result};

pub const DEFAULT_TAG: &str = "latest";

/// Canonical `name:tag` form of `identifier`
pub fn normalize_identifier(identifier: &str) -> Result<String> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(RegistryError::InvalidParameter(
            "model identifier cannot be empty".to_string(),
        ));
    }

    if identifier.chars().any(char::is_whitespace) {
        return Err(RegistryError::InvalidParameter(format!(
            "model identifier '{}' contains whitespace",
            identifier
        )));
    }

    match split_tag(identifier) {
        (name, Some(tag)) => {
            if name.is_empty() || name.ends_with('/') {
                return Err(RegistryError::InvalidParameter(format!(
                    "model identifier '{}' has no name",
                    identifier
                )));
            }
            if tag.is_empty() {
                return Err(RegistryError::InvalidParameter(format!(
                    "model identifier '{}' has an empty tag",
                    identifier
                )));
            }
            Ok(identifier.to_string())
        }
        (name, None) => {
            if name.ends_with('/') {
                return Err(RegistryError::InvalidParameter(format!(
                    "model identifier '{}' has no name",
                    identifier
                )));
            }
            Ok(format!("{}:{}", name, DEFAULT_TAG))
        }
    }
}

/// Split `identifier` into name and tag
pub fn split_tag(identifier: &str) -> (&str, Option<&str>) {
    let segment_start = identifier.rfind('/').map(|i| i + 1).unwrap_or(0);
    match identifier[segment_start..].rfind(':') {
        Some(pos) => {
            let colon = segment_start + pos;
            (&identifier[..colon], Some(&identifier[colon + 1..]))
        }
        None => (identifier, None),
    }
}

/// True when both identifiers name the same model
pub fn same_model(a: &str, b: &str) -> bool {
    match (normalize_identifier(a), normalize_identifier(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
