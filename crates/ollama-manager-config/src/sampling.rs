//! Sampling parameters sent with each chat request
//!
//! The ranges below are the ones exposed to users; anything outside them is
//! rejected before it can reach the daemon.

use std::{fmt, ops::RangeInclusive, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, Result};

pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const TOP_P_RANGE: RangeInclusive<f32> = 0.0..=1.0;
pub const TOP_K_RANGE: RangeInclusive<u32> = 0..=500;
pub const MIROSTAT_TAU_RANGE: RangeInclusive<f32> = 0.0..=10.0;
pub const CONTEXT_WINDOW_RANGE: RangeInclusive<u32> = 512..=8192;

/// Generation-control parameters for a chat session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Randomness of token selection
    pub temperature: f32,
    /// Nucleus-sampling cutoff
    pub top_p: f32,
    /// Candidate-count cutoff
    pub top_k: u32,
    /// Mirostat target perplexity
    pub mirostat_tau: f32,
    /// Maximum number of tokens of history the daemon keeps (`num_ctx`)
    pub context_window: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            mirostat_tau: 5.0,
            context_window: 4096,
        }
    }
}

impl SamplingConfig {
    /// Check every field against its documented range
    pub fn validate(&self) -> Result<()> {
        check_float(SamplingField::Temperature, self.temperature, &TEMPERATURE_RANGE)?;
        check_float(SamplingField::TopP, self.top_p, &TOP_P_RANGE)?;
        check_int(SamplingField::TopK, self.top_k, &TOP_K_RANGE)?;
        check_float(SamplingField::MirostatTau, self.mirostat_tau, &MIROSTAT_TAU_RANGE)?;
        check_int(
            SamplingField::ContextWindow,
            self.context_window,
            &CONTEXT_WINDOW_RANGE,
        )?;
        Ok(())
    }

    /// Produce a new configuration with `update` applied.
    ///
    /// Either every supplied field is valid and all of them are applied, or the
    /// first invalid field is reported and `self` is left as it was.
    pub fn apply(&self, update: &SamplingUpdate) -> Result<SamplingConfig> {
        update.validate()?;

        let mut next = *self;
        if let Some(v) = update.temperature {
            next.temperature = v;
        }
        if let Some(v) = update.top_p {
            next.top_p = v;
        }
        if let Some(v) = update.top_k {
            next.top_k = v;
        }
        if let Some(v) = update.mirostat_tau {
            next.mirostat_tau = v;
        }
        if let Some(v) = update.context_window {
            next.context_window = v;
        }
        Ok(next)
    }
}

/// A partial sampling configuration; `None` fields are left untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingUpdate {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub mirostat_tau: Option<f32>,
    pub context_window: Option<u32>,
}

impl SamplingUpdate {
    pub fn temperature(mut self, value: f32) -> Self {
        self.temperature = Some(value);
        self
    }

    pub fn top_p(mut self, value: f32) -> Self {
        self.top_p = Some(value);
        self
    }

    pub fn top_k(mut self, value: u32) -> Self {
        self.top_k = Some(value);
        self
    }

    pub fn mirostat_tau(mut self, value: f32) -> Self {
        self.mirostat_tau = Some(value);
        self
    }

    pub fn context_window(mut self, value: u32) -> Self {
        self.context_window = Some(value);
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate every supplied field
    pub fn validate(&self) -> Result<()> {
        if let Some(v) = self.temperature {
            check_float(SamplingField::Temperature, v, &TEMPERATURE_RANGE)?;
        }
        if let Some(v) = self.top_p {
            check_float(SamplingField::TopP, v, &TOP_P_RANGE)?;
        }
        if let Some(v) = self.top_k {
            check_int(SamplingField::TopK, v, &TOP_K_RANGE)?;
        }
        if let Some(v) = self.mirostat_tau {
            check_float(SamplingField::MirostatTau, v, &MIROSTAT_TAU_RANGE)?;
        }
        if let Some(v) = self.context_window {
            check_int(SamplingField::ContextWindow, v, &CONTEXT_WINDOW_RANGE)?;
        }
        Ok(())
    }

    /// Build a single-field update from user text, e.g. `("top_k", "64")`
    pub fn parse_field(field: &str, value: &str) -> Result<Self> {
        let field: SamplingField = field.parse()?;
        let value = value.trim();
        let update = Self::default();

        let invalid = || ConfigError::InvalidValue {
            field: field.name(),
            value: value.to_string(),
        };

        Ok(match field {
            SamplingField::Temperature => update.temperature(value.parse().map_err(|_| invalid())?),
            SamplingField::TopP => update.top_p(value.parse().map_err(|_| invalid())?),
            SamplingField::TopK => update.top_k(value.parse().map_err(|_| invalid())?),
            SamplingField::MirostatTau => {
                update.mirostat_tau(value.parse().map_err(|_| invalid())?)
            }
            SamplingField::ContextWindow => {
                update.context_window(value.parse().map_err(|_| invalid())?)
            }
        })
    }
}

/// Names of the recognised sampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplingField {
    Temperature,
    TopP,
    TopK,
    MirostatTau,
    ContextWindow,
}

impl SamplingField {
    pub const ALL: [SamplingField; 5] = [
        SamplingField::Temperature,
        SamplingField::TopP,
        SamplingField::TopK,
        SamplingField::MirostatTau,
        SamplingField::ContextWindow,
    ];

    /// Canonical name of the field
    pub fn name(&self) -> &'static str {
        match self {
            SamplingField::Temperature => "temperature",
            SamplingField::TopP => "top_p",
            SamplingField::TopK => "top_k",
            SamplingField::MirostatTau => "mirostat_tau",
            SamplingField::ContextWindow => "context_window",
        }
    }

    /// Documented range rendered for help text
    pub fn range_label(&self) -> String {
        match self {
            SamplingField::Temperature => label(&TEMPERATURE_RANGE),
            SamplingField::TopP => label(&TOP_P_RANGE),
            SamplingField::TopK => label(&TOP_K_RANGE),
            SamplingField::MirostatTau => label(&MIROSTAT_TAU_RANGE),
            SamplingField::ContextWindow => label(&CONTEXT_WINDOW_RANGE),
        }
    }
}

impl fmt::Display for SamplingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SamplingField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "temperature" | "temp" => Ok(SamplingField::Temperature),
            "top_p" => Ok(SamplingField::TopP),
            "top_k" => Ok(SamplingField::TopK),
            "mirostat_tau" | "tau" => Ok(SamplingField::MirostatTau),
            "context_window" | "num_ctx" | "ctx" => Ok(SamplingField::ContextWindow),
            other => Err(ConfigError::UnknownField(other.to_string())),
        }
    }
}

fn label<T: fmt::Display>(range: &RangeInclusive<T>) -> String {
    format!("{}..={}", range.start(), range.end())
}

fn check_float(field: SamplingField, value: f32, range: &RangeInclusive<f32>) -> Result<()> {
    // NaN is never contained in a range
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.name(),
            value: value as f64,
            min: *range.start() as f64,
            max: *range.end() as f64,
        })
    }
}

fn check_int(field: SamplingField, value: u32, range: &RangeInclusive<u32>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.name(),
            value: value as f64,
            min: *range.start() as f64,
            max: *range.end() as f64,
        })
    }
}
