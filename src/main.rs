//! CTRL Macro Pad - desktop runner
//!
//! Drives the pipeline from the host keyboard, renders the feedback panel on
//! stderr and speaks the host protocol over stdin/stdout.

use anyhow::{Context, Result};
use std::io::{stderr, stdin, stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ctrl_macropad::{
    config::{Config, TelemetryConfig},
    dispatch::LoggingHidSink,
    feedback::{HostLink, SerialHostLink, TerminalDisplay},
    keyboard::HostKeyboardScanSource,
    Keypad,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load().context("failed to load configuration")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("failed to install shutdown handler")?;
    }

    let mut keypad = Keypad::new(
        &config,
        Box::new(HostKeyboardScanSource::new(&config.device)),
        Some(Box::new(TerminalDisplay::new(stderr()))),
        host_link(&config.telemetry),
        Some(Box::new(LoggingHidSink)),
    )
    .context("configuration rejected")?;

    keypad.run(&shutdown);

    let report = keypad.report();
    match report.to_json() {
        Ok(json) => log::info!("session report:\n{}", json),
        Err(e) => log::warn!("could not encode session report: {}", e),
    }

    Ok(())
}

/// Configured serial port, else stdin/stdout
fn host_link(telemetry: &TelemetryConfig) -> Option<Box<dyn HostLink>> {
    let Some(port) = telemetry.port.as_deref() else {
        return Some(Box::new(SerialHostLink::with_reader(stdout(), stdin())));
    };
    match SerialHostLink::open(port, telemetry.baud_rate) {
        Ok(link) => Some(Box::new(link)),
        Err(e) => {
            log::warn!("host link unavailable, running without it: {}", e);
            None
        }
    }
}
