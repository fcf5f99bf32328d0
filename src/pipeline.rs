//! The tick loop
//!
//! One fixed-rate tick drives everything, strictly in order: host poll,
//! scan, normalize, resolve, dispatch, notify. Nothing inside a tick waits
//! on a sink, and per-tick problems end up as diagnostics in the session
//! statistics instead of stopping the loop.

use crate::config::{Config, ConfigError};
use crate::dispatch::{Dispatcher, HidSink};
use crate::error::Diagnostic;
use crate::feedback::{DisplaySink, FeedbackNotifier, HostLink};
use crate::keyboard::{InputEvent, Keymap, Normalizer, ScanSource};
use crate::layers::LayerStateMachine;
use crate::stats::{SessionReport, SessionStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A fully wired macro pad
pub struct Keypad {
    scanner: Box<dyn ScanSource>,
    normalizer: Normalizer,
    layers: LayerStateMachine,
    dispatcher: Dispatcher,
    notifier: FeedbackNotifier,
    keymap: Arc<Keymap>,
    scan_interval: Duration,
    tick: u64,
    started: Instant,
    stats: SessionStats,
    /// Diagnostics raised during the most recent tick
    last_diagnostics: Vec<Diagnostic>,
}

impl Keypad {
    /// Validate `config` and connect the stages
    ///
    /// Fails only on invalid configuration; absent sinks are normal.
    pub fn new(
        config: &Config,
        scanner: Box<dyn ScanSource>,
        display: Option<Box<dyn DisplaySink>>,
        host: Option<Box<dyn HostLink>>,
        hid: Option<Box<dyn HidSink>>,
    ) -> Result<Self, ConfigError> {
        config.device.validate()?;
        let keymap = Arc::new(Keymap::from_config(&config.device, &config.keymap)?);

        let mut notifier =
            FeedbackNotifier::new(Arc::clone(&keymap), config.telemetry.clone(), display, host);
        let mut layers = LayerStateMachine::new(Arc::clone(&keymap), config.device.num_layers);
        layers.subscribe(notifier.sender());
        let mut dispatcher = Dispatcher::new(hid);
        dispatcher.subscribe(notifier.sender());

        notifier.show_layer(layers.active_layer());

        log::info!(
            "keypad ready: {}x{} matrix, {} layer(s), scanning every {} ms",
            config.device.rows,
            config.device.cols,
            keymap.layer_count(),
            config.device.scan_interval_ms
        );

        Ok(Self {
            scanner,
            normalizer: Normalizer::new(&config.device),
            layers,
            dispatcher,
            notifier,
            keymap,
            scan_interval: config.device.scan_interval(),
            tick: 0,
            started: Instant::now(),
            stats: SessionStats::default(),
            last_diagnostics: Vec::new(),
        })
    }

    /// Run one complete tick
    pub fn tick(&mut self) {
        self.notifier.poll_host();

        let snapshot = self.scanner.poll();
        self.normalizer.ingest(self.tick, &snapshot);

        while let Some(event) = self.normalizer.next_event() {
            match event {
                InputEvent::Key(key_event) => {
                    self.stats.key_events += 1;
                    match self.layers.handle_key(&key_event) {
                        Some(resolved) => self.dispatcher.dispatch_key(&resolved),
                        None => self.stats.unresolved_keys += 1,
                    }
                }
                InputEvent::Encoder(pulse) => {
                    self.stats.encoder_pulses += 1;
                    match self.layers.resolve_encoder() {
                        Some(action) => self.dispatcher.dispatch_encoder(&action, pulse.direction),
                        None => log::debug!(
                            "layer {} has no encoder binding",
                            self.layers.active_layer()
                        ),
                    }
                }
            }
        }

        self.stats.feedback_events += self.notifier.process_pending() as u64;

        self.last_diagnostics.clear();
        self.last_diagnostics.extend(self.normalizer.take_diagnostics());
        self.last_diagnostics.extend(self.layers.take_diagnostics());
        self.last_diagnostics.extend(self.dispatcher.take_diagnostics());
        self.last_diagnostics.extend(self.notifier.take_diagnostics());
        for diagnostic in &self.last_diagnostics {
            self.stats.record(diagnostic);
        }

        self.tick += 1;
        self.stats.ticks += 1;
    }

    /// Run `count` ticks back to back, without sleeping
    pub fn run_ticks(&mut self, count: usize) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Tick at the scan interval until `shutdown` is set
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.tick();
            let elapsed = started.elapsed();
            match self.scan_interval.checked_sub(elapsed) {
                Some(rest) => thread::sleep(rest),
                None => log::debug!(
                    "tick {} took {:?}, longer than the scan interval",
                    self.tick,
                    elapsed
                ),
            }
        }
        log::info!("shutdown after {} ticks", self.tick);
    }

    pub fn active_layer(&self) -> usize {
        self.layers.active_layer()
    }

    pub fn layer_stack(&self) -> &[usize] {
        self.layers.stack().as_slice()
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn context(&self) -> Option<&str> {
        self.notifier.context()
    }

    /// Events waiting in the normalizer queue
    pub fn queued_events(&self) -> usize {
        self.normalizer.queued()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn last_diagnostics(&self) -> &[Diagnostic] {
        &self.last_diagnostics
    }

    /// Snapshot of the session for export
    pub fn report(&self) -> SessionReport {
        SessionReport::new(
            self.started,
            &self.stats,
            self.layers.active_layer(),
            self.notifier.context(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::DiodeDirection;
    use crate::test_helpers::{RecordingDisplay, RecordingHid, ScriptedScanSource};

    fn keypad(config: &Config) -> (Keypad, ScriptedScanSource, RecordingHid) {
        let scan =
            ScriptedScanSource::new(config.device.rows, config.device.cols, DiodeDirection::Col2Row);
        let hid = RecordingHid::new();
        let keypad = Keypad::new(
            config,
            Box::new(scan.clone()),
            Some(Box::new(RecordingDisplay::new())),
            None,
            Some(Box::new(hid.clone())),
        )
        .unwrap();
        (keypad, scan, hid)
    }

    #[test]
    fn invalid_config_fails_fast() {
        let mut config = Config::default();
        config.keymap.layers[1].index = 4;
        let scan = ScriptedScanSource::new(2, 3, DiodeDirection::Col2Row);
        let result = Keypad::new(&config, Box::new(scan), None, None, None);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn startup_paints_base_layer() {
        let display = RecordingDisplay::new();
        let config = Config::default();
        let scan = ScriptedScanSource::new(2, 3, DiodeDirection::Col2Row);
        let _keypad =
            Keypad::new(&config, Box::new(scan), Some(Box::new(display.clone())), None, None)
                .unwrap();
        assert_eq!(display.calls().len(), 1);
    }

    #[test]
    fn idle_ticks_do_nothing() {
        let (mut keypad, _scan, hid) = keypad(&Config::default());
        keypad.run_ticks(10);
        assert_eq!(keypad.stats().ticks, 10);
        assert_eq!(keypad.stats().key_events, 0);
        assert!(hid.outputs().is_empty());
    }

    #[test]
    fn tap_goes_through_every_stage() {
        let (mut keypad, scan, hid) = keypad(&Config::default());
        scan.hold(&[(0, 1)], 3);
        scan.idle(3);
        keypad.run_ticks(6);

        assert_eq!(keypad.stats().key_events, 2);
        assert_eq!(hid.outputs().len(), 4); // LCTL, V down then up
        assert_eq!(keypad.stats().feedback_events, 2);
        assert_eq!(keypad.stats().issues(), 0);
    }

    #[test]
    fn run_stops_on_shutdown() {
        let mut config = Config::default();
        config.device.scan_interval_ms = 1;
        let (mut keypad, _scan, _hid) = keypad(&config);
        let shutdown = AtomicBool::new(true);
        keypad.run(&shutdown);
        assert_eq!(keypad.stats().ticks, 0);
    }

    #[test]
    fn report_reflects_state() {
        let (mut keypad, scan, _hid) = keypad(&Config::default());
        scan.hold(&[(1, 2)], 3);
        keypad.run_ticks(3);
        let report = keypad.report();
        assert_eq!(report.active_layer, 1);
        assert_eq!(report.summary.ticks, 3);
    }
}
