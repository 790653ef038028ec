//! Search and sort over the registry snapshot

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::RegistryError, models::ModelRecord};

/// Column to sort model lists by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    /// Numeric parameter count
    Params,
    Family,
    Modified,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Name,
        SortKey::Size,
        SortKey::Params,
        SortKey::Family,
        SortKey::Modified,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Size => "size",
            SortKey::Params => "params",
            SortKey::Family => "family",
            SortKey::Modified => "modified",
        }
    }

    fn compare(self, a: &ModelRecord, b: &ModelRecord) -> Ordering {
        match self {
            SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::Params => a
                .parameter_count()
                .partial_cmp(&b.parameter_count())
                .unwrap_or(Ordering::Equal),
            SortKey::Family => a.family.to_lowercase().cmp(&b.family.to_lowercase()),
            SortKey::Modified => a.modified_at.cmp(&b.modified_at),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortKey {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "size" => Ok(SortKey::Size),
            "params" | "parameters" | "parameter_size" => Ok(SortKey::Params),
            "family" => Ok(SortKey::Family),
            "modified" | "modified_at" | "date" => Ok(SortKey::Modified),
            other => Err(RegistryError::InvalidParameter(format!(
                "unknown sort key '{}', expected one of: name, size, params, family, modified",
                other
            ))),
        }
    }
}

/// Filter and ordering for [`crate::ModelRegistry::query`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelQuery {
    /// Case-insensitive substring of name, family or parameter size
    pub search: Option<String>,
    pub sort: SortKey,
    pub descending: bool,
}

impl ModelQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort = key;
        self
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn matches(&self, record: &ModelRecord) -> bool {
        let needle = match &self.search {
            Some(needle) => needle.trim().to_lowercase(),
            None => return true,
        };

        [&record.name, &record.family, &record.parameter_size]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Matching records in the requested order; ties are broken by name
    pub fn apply(&self, records: &[ModelRecord]) -> Vec<ModelRecord> {
        let mut matched: Vec<ModelRecord> = records
            .iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ordering = self
                .sort
                .compare(a, b)
                .then_with(|| a.name.cmp(&b.name));
            if self.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        matched
    }
}
