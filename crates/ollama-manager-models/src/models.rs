//! Data models for installed models

use chrono::{DateTime, Utc};
use ollama_manager_client::{ModelTag, ShowResponse};
use serde::{Deserialize, Serialize};

use crate::identifier::{normalize_identifier, split_tag};

/// Metadata snapshot of one installed model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Model name including tag (e.g., "llama3:8b")
    pub name: String,

    /// Size on disk in bytes
    pub size: u64,

    pub modified_at: DateTime<Utc>,

    pub digest: String,

    /// Model format (e.g., "gguf")
    pub format: String,

    /// Model family (e.g., "llama")
    pub family: String,

    #[serde(default)]
    pub families: Vec<String>,

    /// Parameter size as reported by the daemon (e.g., "8.0B")
    pub parameter_size: String,

    /// Quantization level (e.g., "Q4_0")
    pub quantization_level: String,

    #[serde(default)]
    pub parent_model: String,
}

impl ModelRecord {
    /// Part of the name before the tag
    pub fn base_name(&self) -> &str {
        split_tag(&self.name).0
    }

    /// Tag of the model, `latest` when the daemon reported none
    pub fn tag(&self) -> &str {
        split_tag(&self.name).1.unwrap_or(crate::identifier::DEFAULT_TAG)
    }

    /// True when `identifier` names this model
    pub fn matches(&self, identifier: &str) -> bool {
        match (normalize_identifier(&self.name), normalize_identifier(identifier)) {
            (Ok(own), Ok(other)) => own == other,
            _ => false,
        }
    }

    /// Parameter count parsed from `parameter_size`, 0 when unknown
    pub fn parameter_count(&self) -> f64 {
        parse_parameter_size(&self.parameter_size)
    }
}

impl From<ModelTag> for ModelRecord {
    fn from(tag: ModelTag) -> Self {
        let name = if tag.name.is_empty() { tag.model } else { tag.name };
        Self {
            name,
            size: tag.size,
            modified_at: tag.modified_at,
            digest: tag.digest,
            format: tag.details.format,
            family: tag.details.family,
            families: tag.details.families.unwrap_or_default(),
            parameter_size: tag.details.parameter_size,
            quantization_level: tag.details.quantization_level,
            parent_model: tag.details.parent_model,
        }
    }
}

/// Parse sizes such as `8.0B`, `137M` or `500K`
pub fn parse_parameter_size(size: &str) -> f64 {
    let size = size.trim();
    let (number, scale) = match size.chars().last().map(|c| c.to_ascii_uppercase()) {
        Some('B') => (&size[..size.len() - 1], 1e9),
        Some('M') => (&size[..size.len() - 1], 1e6),
        Some('K') => (&size[..size.len() - 1], 1e3),
        _ => (size, 1.0),
    };
    number
        .trim()
        .parse::<f64>()
        .map(|n| n * scale)
        .unwrap_or(0.0)
}

/// A model record plus the daemon's extended metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDetails {
    pub record: ModelRecord,
    pub license: String,
    pub modelfile: String,
    pub parameters: String,
    pub template: String,
    pub system: String,
    /// Raw architecture metadata (context length, embedding size, ...)
    pub model_info: serde_json::Map<String, serde_json::Value>,
}

impl ModelDetails {
    pub(crate) fn new(mut record: ModelRecord, show: ShowResponse) -> Self {
        // Show answers carry fresher family data than the list when present
        if !show.details.family.is_empty() {
            record.family = show.details.family;
        }
        if !show.details.parameter_size.is_empty() {
            record.parameter_size = show.details.parameter_size;
        }
        if !show.details.quantization_level.is_empty() {
            record.quantization_level = show.details.quantization_level;
        }

        Self {
            record,
            license: show.license,
            modelfile: show.modelfile,
            parameters: show.parameters,
            template: show.template,
            system: show.system,
            model_info: show.model_info.unwrap_or_default(),
        }
    }

    /// Context length advertised in `model_info`, if any
    pub fn context_length(&self) -> Option<u64> {
        self.model_info
            .iter()
            .find(|(key, _)| key.ends_with(".context_length"))
            .and_then(|(_, value)| value.as_u64())
    }
}

/// Result of the last successful list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<ModelRecord>,
    /// None until the first successful list
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(records: Vec<ModelRecord>) -> Self {
        Self {
            records,
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn find(&self, identifier: &str) -> Option<&ModelRecord> {
        self.records.iter().find(|r| r.matches(identifier))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.find(identifier).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy of this snapshot without `identifier`
    pub(crate) fn without(&self, identifier: &str) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| !r.matches(identifier))
                .cloned()
                .collect(),
            fetched_at: self.fetched_at,
        }
    }

    pub fn disk_usage(&self) -> DiskUsage {
        DiskUsage {
            total_bytes: self.records.iter().map(|r| r.size).sum(),
            model_count: self.records.len(),
            largest: self.records.iter().max_by_key(|r| r.size).cloned(),
        }
    }
}

/// Disk usage of installed models
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub model_count: usize,
    pub largest: Option<ModelRecord>,
}
