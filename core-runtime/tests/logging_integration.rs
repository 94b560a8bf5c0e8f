//! Integration tests for the logging bootstrap.

use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

#[test]
fn initialization_is_once_per_process() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_filter("core_session=debug,info");

    init_logging(config.clone()).expect("first initialization succeeds");

    // the global subscriber is already installed; a second call must fail
    // instead of silently replacing it
    let result = init_logging(config);
    assert!(result.is_err());

    // events flow through the installed subscriber without panicking
    tracing::info!(component = "logging-test", "subscriber installed");
}
