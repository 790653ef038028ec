//! Tests for sampling parameter validation

use ollama_manager_config::{ConfigError, SamplingConfig, SamplingField, SamplingUpdate};
use proptest::prelude::*;

#[test]
fn test_default_sampling_is_valid() {
    let config = SamplingConfig::default();
    assert_eq!(config.temperature, 0.7);
    assert_eq!(config.top_p, 0.9);
    assert_eq!(config.top_k, 40);
    assert_eq!(config.mirostat_tau, 5.0);
    assert_eq!(config.context_window, 4096);
    assert!(config.validate().is_ok());
}

#[test]
fn test_apply_valid_update() {
    let config = SamplingConfig::default();
    let next = config
        .apply(&SamplingUpdate::default().temperature(0.1).top_k(100))
        .unwrap();

    assert_eq!(next.temperature, 0.1);
    assert_eq!(next.top_k, 100);
    assert_eq!(next.top_p, config.top_p);
}

#[test]
fn test_apply_is_all_or_nothing() {
    let config = SamplingConfig::default();
    let update = SamplingUpdate::default()
        .temperature(0.3)
        .context_window(100_000);

    let err = config.apply(&update).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::OutOfRange {
            field: "context_window",
            ..
        }
    ));
    // The original is untouched
    assert_eq!(config, SamplingConfig::default());
}

#[test]
fn test_nan_is_rejected() {
    let update = SamplingUpdate::default().top_p(f32::NAN);
    assert!(update.validate().is_err());
}

#[test]
fn test_range_boundaries_are_inclusive() {
    let update = SamplingUpdate::default()
        .temperature(1.0)
        .top_p(0.0)
        .top_k(500)
        .mirostat_tau(10.0)
        .context_window(512);
    assert!(update.validate().is_ok());
}

#[test]
fn test_field_aliases() {
    assert_eq!("num_ctx".parse::<SamplingField>().unwrap(), SamplingField::ContextWindow);
    assert_eq!("top-p".parse::<SamplingField>().unwrap(), SamplingField::TopP);
    assert_eq!("Temperature".parse::<SamplingField>().unwrap(), SamplingField::Temperature);
    assert!(matches!(
        "seed".parse::<SamplingField>(),
        Err(ConfigError::UnknownField(_))
    ));
}

#[test]
fn test_parse_field() {
    let update = SamplingUpdate::parse_field("top_k", " 64 ").unwrap();
    assert_eq!(update.top_k, Some(64));
    assert!(update.temperature.is_none());

    assert!(matches!(
        SamplingUpdate::parse_field("top_k", "many"),
        Err(ConfigError::InvalidValue { field: "top_k", .. })
    ));
}

#[test]
fn test_empty_update() {
    assert!(SamplingUpdate::default().is_empty());
    assert!(!SamplingUpdate::default().top_k(1).is_empty());
}

proptest! {
    #[test]
    fn prop_in_range_temperature_applies(t in 0.0f32..=1.0) {
        let next = SamplingConfig::default()
            .apply(&SamplingUpdate::default().temperature(t))
            .unwrap();
        prop_assert_eq!(next.temperature, t);
    }

    #[test]
    fn prop_out_of_range_field_applies_nothing(
        t in 0.0f32..=1.0,
        k in 501u32..100_000,
    ) {
        let config = SamplingConfig::default();
        let result = config.apply(&SamplingUpdate::default().temperature(t).top_k(k));
        prop_assert!(result.is_err());
        prop_assert_eq!(config, SamplingConfig::default());
    }

    #[test]
    fn prop_context_window_below_minimum_rejected(ctx in 0u32..512) {
        let result = SamplingUpdate::default().context_window(ctx).validate();
        prop_assert!(
            matches!(result, Err(ConfigError::OutOfRange { field: "context_window", .. })),
            "expected context_window to be out of range"
        );
    }
}
