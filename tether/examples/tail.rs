//! Tail a server-sent events stream.
//!
//! ```bash
//! RUST_LOG=tether=debug cargo run --example tail -- https://example.com/events [last-event-id]
//! ```

use anyhow::{bail, Context};
use tether::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tether=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        bail!("usage: tail <url> [last-event-id]");
    };

    let mut builder = EventSourceConfig::builder(&url);
    if let Some(id) = args.next() {
        builder = builder.last_event_id(id);
    }
    if let Ok(token) = std::env::var("TETHER_TOKEN") {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let config = builder.build().context("invalid configuration")?;

    let (source, mut notifications) = EventSource::with_channel(config);
    source.open()?;

    loop {
        tokio::select! {
            notification = notifications.recv() => match notification {
                Some(Notification::Event(event)) => {
                    println!("[{}] {} (id: {})", event.event_type, event.data, event.last_event_id);
                }
                Some(Notification::StateChange { old, new }) => {
                    eprintln!("{old} -> {new}");
                }
                Some(Notification::Error(failure)) => {
                    bail!("server refused the stream with status {}", failure.status);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                source.close()?;
                break;
            }
        }
    }

    Ok(())
}
