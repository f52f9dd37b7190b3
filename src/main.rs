//! keytap: replay a keyboard event trace through the listener pipeline
//!
//! Reads JSON-lines `KeyboardEvent`s from stdin (or the file named by the
//! first argument), feeds them to a loopback keyboard as physical input with
//! the configured block and remap rules applied, and writes every event that
//! got through to stdout as JSON lines.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use keytap::{get_typed_strings, Config, KeyboardEvent, Listener, LoopbackKeyboard};

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays a clean event stream
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "keytap starting");

    let config = Config::load()?;
    info!(
        blocked = config.blocked_keys.len(),
        remaps = config.remaps.len(),
        "configuration loaded"
    );

    let keyboard = Arc::new(LoopbackKeyboard::us_layout());
    let listener = Listener::new(keyboard.clone(), &config)?;

    for key in &config.blocked_keys {
        listener
            .block_key(key)
            .with_context(|| format!("cannot block {key:?}"))?;
    }
    for (source, target) in &config.remaps {
        listener
            .remap_key(source, target)
            .with_context(|| format!("cannot remap {source:?} to {target:?}"))?;
    }

    let input: Box<dyn BufRead> = match std::env::args().nth(1) {
        Some(path) => Box::new(BufReader::new(
            File::open(&path).with_context(|| format!("cannot open {path}"))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    listener.start_recording()?;
    let mut injected = 0usize;
    for (number, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match KeyboardEvent::from_json(&line) {
            Ok(event) => {
                debug!(%event, "injecting event");
                keyboard.inject(event);
                injected += 1;
            }
            Err(e) => warn!(line = number + 1, error = %e, "skipping malformed event"),
        }
    }
    let accepted = listener.stop_recording()?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for event in &accepted {
        writeln!(out, "{}", event.to_json()?)?;
    }
    out.flush()?;

    for text in get_typed_strings(&accepted).filter(|text| !text.is_empty()) {
        info!(%text, "typed");
    }
    info!(injected, accepted = accepted.len(), "keytap finished");

    Ok(())
}
