//! Subscriber installation, in its own test binary so nothing else owns the global default

use softphone_core::{init_logging, CallError, LoggingConfig, PhoneConfig};

#[test]
fn test_init_logging_installs_once() {
    let config = PhoneConfig::default()
        .with_logging(LoggingConfig::default().with_level("debug").with_directive("softphone_core::keepalive=trace"));
    config.validate().unwrap();

    init_logging(&config).unwrap();
    assert!(tracing::enabled!(target: "softphone_core::keepalive", tracing::Level::TRACE));

    let again = init_logging(&config).unwrap_err();
    assert!(matches!(again, CallError::InvalidConfiguration { ref field, .. } if field == "logging"));
}

#[test]
fn test_bad_level_is_rejected_before_installing() {
    let config = PhoneConfig::default().with_logging(LoggingConfig::default().with_level("verbose"));
    assert!(matches!(
        init_logging(&config),
        Err(CallError::InvalidConfiguration { ref field, .. }) if field == "logging.level"
    ));
}
