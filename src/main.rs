//! Form Engine - command line driver
//!
//! Replays a scripted form session (declarations, value injection, user
//! edits, focus events, late registrations) and prints the derived form
//! state after every step.

mod script;

use anyhow::{Context, Result};
use form_engine::{EngineConfig, FormStore};
use script::Script;
use serde_json::json;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "form_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let path: PathBuf = std::env::args()
        .nth(1)
        .context("usage: form-engine <script.json>")?
        .into();
    let script = Script::load(&path)?;
    let config = EngineConfig::load()?;

    let mut store = script.build_store(&config);
    store.settle().await;
    print_step(0, "initial", &store)?;

    for (index, event) in script.events.iter().enumerate() {
        script.apply(event, &mut store)?;
        store.settle().await;
        print_step(index + 1, event.label(), &store)?;
    }

    tracing::info!(
        "Replayed {} events, form is {}",
        script.events.len(),
        if store.is_valid() { "valid" } else { "invalid" }
    );
    Ok(())
}

fn print_step(step: usize, event: &str, store: &FormStore) -> Result<()> {
    let output = json!({
        "step": step,
        "event": event,
        "state": store.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
