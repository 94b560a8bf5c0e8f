//! Demonstrates logging bootstrap and event bus usage together.
//!
//! Run with: `cargo run --example logging_demo -p core-runtime`

use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Pretty)
            .with_filter("debug"),
    )
    .expect("logging initialization");

    let bus = EventBus::default();
    let mut subscriber = bus.subscribe();

    tokio::spawn(async move {
        while let Ok(event) = subscriber.recv().await {
            tracing::info!(
                severity = ?event.severity(),
                description = event.description(),
                "notification"
            );
        }
    });

    bus.emit(CoreEvent::Session(SessionEvent::Reconnecting {
        attempt: 1,
        max_retries: 3,
        delay_ms: 3250,
    }))
    .ok();
    bus.emit(CoreEvent::Session(SessionEvent::ReconnectFailed)).ok();

    tokio::task::yield_now().await;
}
