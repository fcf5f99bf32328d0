//! Integration tests for the macro pad pipeline
//!
//! These drive a fully wired `Keypad` tick by tick through a scripted scan
//! source and inspect what reached the HID, display and host sinks.

use ctrl_macropad::config::Config;
use ctrl_macropad::dispatch::HidOutput;
use ctrl_macropad::error::Diagnostic;
use ctrl_macropad::keyboard::{
    DiodeDirection, EncoderDirection, EncoderEvent, InputEvent, KeyCode, KeyCombo, Keymap,
    Normalizer, QuadraturePhase, ScanSnapshot, Transition,
};
use ctrl_macropad::test_helpers::{
    DisplayCall, FailingDisplay, RecordingDisplay, RecordingHid, RecordingHostLink,
    ScriptedScanSource,
};
use ctrl_macropad::Keypad;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SW1: (u8, u8) = (0, 0);
const SW2: (u8, u8) = (0, 1);
const SW6: (u8, u8) = (1, 2);

const LCTL: KeyCode = KeyCode(0xE0);

/// A keypad plus handles on every sink
struct Harness {
    keypad: Keypad,
    scan: ScriptedScanSource,
    display: RecordingDisplay,
    host: RecordingHostLink,
    hid: RecordingHid,
    held: Vec<(u8, u8)>,
}

impl Harness {
    fn new(config: &Config) -> Self {
        let scan = ScriptedScanSource::new(
            config.device.rows,
            config.device.cols,
            config.device.diode_direction,
        );
        let display = RecordingDisplay::new();
        let host = RecordingHostLink::new();
        let hid = RecordingHid::new();
        let keypad = Keypad::new(
            config,
            Box::new(scan.clone()),
            Some(Box::new(display.clone())),
            Some(Box::new(host.clone())),
            Some(Box::new(hid.clone())),
        )
        .expect("valid config");
        display.clear();
        Self {
            keypad,
            scan,
            display,
            host,
            hid,
            held: Vec::new(),
        }
    }

    fn stock() -> Self {
        Self::new(&Config::default())
    }

    /// Close a switch long enough for the debouncer to commit it
    fn down(&mut self, key: (u8, u8)) {
        self.held.push(key);
        self.scan.hold(&self.held, 2);
        self.keypad.run_ticks(2);
    }

    /// Open a switch long enough for the debouncer to commit it
    fn up(&mut self, key: (u8, u8)) {
        self.held.retain(|k| *k != key);
        self.scan.hold(&self.held, 2);
        self.keypad.run_ticks(2);
    }

    fn tap(&mut self, key: (u8, u8)) {
        self.down(key);
        self.up(key);
    }

    /// Telemetry lines parsed as JSON
    fn telemetry(&self) -> Vec<Value> {
        self.host
            .sent()
            .iter()
            .map(|line| serde_json::from_str(line).expect("telemetry is JSON"))
            .collect()
    }

    fn layer_changes(&self) -> Vec<u64> {
        self.telemetry()
            .iter()
            .filter(|msg| msg["type"] == "layer_change")
            .map(|msg| msg["data"]["layer"].as_u64().unwrap())
            .collect()
    }
}

fn combo(text: &str) -> KeyCombo {
    text.parse().unwrap()
}

fn key(name: &str) -> KeyCode {
    name.parse().unwrap()
}

fn config_3x3() -> Config {
    let mut config = Config::default();
    config.device.rows = 3;
    config.device.cols = 3;
    for layer in &mut config.keymap.layers {
        layer.keys.extend(["F1", "F2", "F3"].map(String::from));
    }
    config
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_press_emits_combo_and_key_action() {
    let mut h = Harness::stock();
    h.down(SW1);

    assert_eq!(
        h.hid.outputs(),
        vec![HidOutput::Press(LCTL), HidOutput::Press(key("C"))]
    );
    let telemetry = h.telemetry();
    assert_eq!(telemetry.len(), 1);
    assert_eq!(telemetry[0]["type"], "key_action");
    assert_eq!(telemetry[0]["data"], serde_json::json!({"key": "SW1"}));
    assert!(telemetry[0]["timestamp"].is_f64());
    assert_eq!(h.display.calls(), vec![DisplayCall::Action("SW1".into())]);
}

#[test]
fn scenario_b_momentary_layer_hold() {
    let mut h = Harness::stock();

    h.down(SW6);
    assert_eq!(h.layer_changes(), vec![1]);
    assert_eq!(h.keypad.active_layer(), 1);

    // Intervening presses resolve against MEDIA
    h.tap(SW1);
    h.tap(SW2);
    assert_eq!(
        h.hid.outputs(),
        vec![
            HidOutput::Press(key("MPLY")),
            HidOutput::Release(key("MPLY")),
            HidOutput::Press(key("MNXT")),
            HidOutput::Release(key("MNXT")),
        ]
    );
    assert_eq!(h.layer_changes(), vec![1]);

    h.up(SW6);
    assert_eq!(h.layer_changes(), vec![1, 0]);
    assert_eq!(h.keypad.layer_stack(), &[0]);
}

#[test]
fn scenario_b_display_shows_layer_name_and_colour() {
    let mut h = Harness::stock();
    h.down(SW6);
    let layers: Vec<_> = h
        .display
        .calls()
        .into_iter()
        .filter(|c| matches!(c, DisplayCall::Layer(..)))
        .collect();
    assert_eq!(
        layers,
        vec![DisplayCall::Layer(1, "MEDIA".into(), "#FF00FF".parse().unwrap())]
    );
}

#[test]
fn scenario_c_host_context_reaches_display_next_tick() {
    let mut h = Harness::stock();
    h.keypad.run_ticks(1);
    h.host.push_inbound("debugging");
    assert!(h.display.calls().is_empty());

    h.keypad.run_ticks(1);
    assert_eq!(h.display.calls(), vec![DisplayCall::Context("debugging".into())]);
    assert_eq!(h.keypad.context(), Some("debugging"));

    // Last write wins
    h.host.push_inbound("reviewing");
    h.keypad.run_ticks(1);
    assert_eq!(h.keypad.context(), Some("reviewing"));
}

#[test]
fn scenario_d_overrun_defers_seventh_transition() {
    let config = config_3x3();
    let mut normalizer = Normalizer::new(&config.device);

    // 58 encoder pulses leave room for exactly six events
    let clockwise: [u8; 4] = [0b01, 0b11, 0b10, 0b00];
    let phase = |bits: u8| ScanSnapshot::open(3, 3).encoder(QuadraturePhase::from_bits(bits));
    normalizer.ingest(0, &phase(0));
    for _ in 0..58 {
        for bits in clockwise {
            normalizer.ingest(0, &phase(bits));
        }
    }
    assert_eq!(normalizer.queued(), 58);
    assert!(normalizer.take_diagnostics().is_empty());

    let closed = [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2), (2, 0)];
    let snapshot = ScanSnapshot::with_keys(3, 3, DiodeDirection::Col2Row, &closed);
    normalizer.ingest(1, &snapshot);
    normalizer.ingest(2, &snapshot);

    assert_eq!(normalizer.queued(), 64);
    assert_eq!(
        normalizer.take_diagnostics(),
        vec![Diagnostic::ScanOverrun { deferred: 1 }]
    );

    let accepted: Vec<_> = std::iter::from_fn(|| normalizer.next_event())
        .filter_map(|event| match event {
            InputEvent::Key(k) => Some(k),
            InputEvent::Encoder(_) => None,
        })
        .collect();
    assert_eq!(accepted.len(), 6);
    assert!(accepted.iter().all(|k| k.timestamp == 2));

    // The seventh shows up on the following re-scan
    normalizer.ingest(3, &snapshot);
    let late: Vec<_> = std::iter::from_fn(|| normalizer.next_event()).collect();
    assert_eq!(late.len(), 1);
    let InputEvent::Key(seventh) = late[0] else {
        panic!("expected a key event");
    };
    assert_eq!((seventh.key.row, seventh.key.col), (2, 0));
    assert_eq!(seventh.transition, Transition::Press);
}

// ---------------------------------------------------------------------------
// Testable properties
// ---------------------------------------------------------------------------

#[test]
fn bounce_shorter_than_window_never_emits() {
    let mut h = Harness::stock();
    for _ in 0..25 {
        h.scan.hold(&[SW1, SW6], 1);
        h.scan.idle(1);
    }
    h.keypad.run_ticks(50);

    assert_eq!(h.keypad.stats().key_events, 0);
    assert!(h.hid.outputs().is_empty());
    assert!(h.host.sent().is_empty());
}

#[test]
fn every_key_resolves_on_every_layer() {
    for config in [Config::default(), config_3x3()] {
        let keymap = Keymap::from_config(&config.device, &config.keymap).unwrap();
        for layer in 0..keymap.layer_count() {
            for key in keymap.keys() {
                assert!(keymap.resolve(layer, key).is_some());
            }
            assert!(keymap.encoder_action(layer).is_some());
        }
    }
}

#[test]
fn momentary_push_pop_is_balanced() {
    let mut config = Config::default();
    config.keymap.layers[1].keys[0] = "MO(2)".to_string();
    let mut h = Harness::new(&config);

    for _ in 0..3 {
        let before = h.keypad.layer_stack().to_vec();
        h.down(SW6);
        h.down(SW1);
        assert_eq!(h.keypad.layer_stack(), &[0, 1, 2]);
        h.up(SW1);
        h.up(SW6);
        assert_eq!(h.keypad.layer_stack(), before.as_slice());
    }
    assert_eq!(h.layer_changes(), vec![1u64, 2, 1, 0].repeat(3));
    assert_eq!(h.keypad.stats().issues(), 0);
}

#[test]
fn release_order_reverses_press_order() {
    let mut config = Config::default();
    config.keymap.layers[0].keys[0] = "LCTL+LSFT+LALT+P".to_string();
    let mut h = Harness::new(&config);
    h.tap(SW1);

    let outputs = h.hid.outputs();
    let presses: Vec<KeyCode> = outputs
        .iter()
        .filter_map(|o| match o {
            HidOutput::Press(code) => Some(*code),
            _ => None,
        })
        .collect();
    let mut releases: Vec<KeyCode> = outputs
        .iter()
        .filter_map(|o| match o {
            HidOutput::Release(code) => Some(*code),
            _ => None,
        })
        .collect();

    let declared: Vec<KeyCode> = combo("LCTL+LSFT+LALT+P").press_order().collect();
    assert_eq!(presses, declared);
    releases.reverse();
    assert_eq!(releases, declared);
}

#[test]
fn queue_never_exceeds_capacity_and_drops_oldest() {
    let mut config = Config::default();
    config.device.max_events = 4;
    let mut normalizer = Normalizer::new(&config.device);

    let clockwise: [u8; 4] = [0b01, 0b11, 0b10, 0b00];
    let phase = |bits: u8| ScanSnapshot::open(2, 3).encoder(QuadraturePhase::from_bits(bits));
    normalizer.ingest(0, &phase(0));
    for tick in 1..=10u64 {
        for bits in clockwise {
            normalizer.ingest(tick, &phase(bits));
            assert!(normalizer.queued() <= 4);
        }
    }

    // One report for the whole episode
    assert_eq!(
        normalizer.take_diagnostics(),
        vec![Diagnostic::QueueOverflow { capacity: 4 }]
    );

    // Newest survive
    let kept: Vec<u64> = std::iter::from_fn(|| normalizer.next_event())
        .map(|event| match event {
            InputEvent::Encoder(EncoderEvent { timestamp, .. }) => timestamp,
            InputEvent::Key(k) => k.timestamp,
        })
        .collect();
    assert_eq!(kept, vec![7, 8, 9, 10]);

    // Draining ends the episode; the next overflow is reported again
    for tick in 11..=15u64 {
        for bits in clockwise {
            normalizer.ingest(tick, &phase(bits));
        }
    }
    assert_eq!(normalizer.take_diagnostics().len(), 1);
}

#[test]
fn release_with_pulse_on_tight_queue_leaves_nothing_held() {
    let mut config = Config::default();
    config.device.max_events = 6;
    let mut h = Harness::new(&config);

    let all = [SW1, SW2, (0, 2), (1, 0), (1, 1), SW6];
    let sample = |closed: &[(u8, u8)], bits: u8| {
        ScanSnapshot::with_keys(2, 3, DiodeDirection::Col2Row, closed)
            .encoder(QuadraturePhase::from_bits(bits))
    };
    h.scan.push(sample(&all, 0b00));
    h.scan.push(sample(&all, 0b01));
    h.scan.push(sample(&all, 0b11));
    h.scan.push(sample(&[], 0b10));
    // Every release commits on the sample that completes the detent
    h.scan.push(sample(&[], 0b00));
    h.keypad.run_ticks(6);

    let outputs = h.hid.outputs();
    for output in &outputs {
        if let HidOutput::Press(code) = output {
            let presses = outputs.iter().filter(|o| **o == HidOutput::Press(*code)).count();
            let releases = outputs.iter().filter(|o| **o == HidOutput::Release(*code)).count();
            assert_eq!(presses, releases, "{:?} left held", code);
        }
    }
    assert!(outputs.contains(&HidOutput::Pulse(combo("RIGHT"))));
    assert_eq!(h.keypad.layer_stack(), &[0]);
    assert_eq!(h.keypad.stats().queue_overflows, 0);
    assert_eq!(h.keypad.stats().scan_overruns, 1);
}

// ---------------------------------------------------------------------------
// Encoder, sinks and configuration
// ---------------------------------------------------------------------------

#[test]
fn encoder_follows_active_layer() {
    let mut h = Harness::stock();
    // First sample only seeds the decoder
    h.keypad.run_ticks(1);
    h.scan.turn(EncoderDirection::Clockwise, 2);
    h.keypad.run_ticks(8);
    assert_eq!(
        h.hid.outputs(),
        vec![
            HidOutput::Pulse(combo("VOLU")),
            HidOutput::Pulse(combo("VOLU"))
        ]
    );

    h.hid.clear();
    h.down(SW6);
    h.scan.turn(EncoderDirection::CounterClockwise, 1);
    h.keypad.run_ticks(4);
    assert_eq!(h.hid.outputs(), vec![HidOutput::Pulse(combo("LEFT"))]);

    let keys: Vec<_> = h
        .telemetry()
        .iter()
        .filter(|m| m["type"] == "key_action")
        .map(|m| m["data"]["key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["ENC_CW", "ENC_CW", "SW6", "ENC_CCW"]);
}

#[test]
fn return_to_base_from_developer_layer() {
    let mut config = Config::default();
    config.keymap.layers[0].keys[4] = "DF(2)".to_string();
    let mut h = Harness::new(&config);

    h.tap((1, 1));
    assert_eq!(h.keypad.active_layer(), 2);
    h.tap(SW1);
    assert_eq!(
        h.hid.outputs()[..2],
        [HidOutput::Press(LCTL), HidOutput::Press(key("T"))]
    );
    h.tap(SW6);
    assert_eq!(h.keypad.active_layer(), 0);
    assert_eq!(h.layer_changes(), vec![2, 0]);
}

#[test]
fn broken_display_degrades_silently() {
    let config = Config::default();
    let scan = ScriptedScanSource::new(2, 3, DiodeDirection::Col2Row);
    let hid = RecordingHid::new();
    let mut keypad = Keypad::new(
        &config,
        Box::new(scan.clone()),
        Some(Box::new(FailingDisplay)),
        None,
        Some(Box::new(hid.clone())),
    )
    .unwrap();

    scan.hold(&[SW2], 2);
    scan.idle(2);
    keypad.run_ticks(4);

    assert_eq!(hid.outputs().len(), 4);
    // Reported once, when the startup paint disabled the panel
    assert_eq!(keypad.stats().sink_failures, 1);
    assert_eq!(keypad.stats().issues(), 1);
    assert_eq!(keypad.stats().key_events, 2);
}

#[test]
fn missing_hid_is_reported_once() {
    let config = Config::default();
    let scan = ScriptedScanSource::new(2, 3, DiodeDirection::Col2Row);
    let hid = RecordingHid::new();
    hid.fail_with_unavailable();
    let mut keypad = Keypad::new(&config, Box::new(scan.clone()), None, None, Some(Box::new(hid)))
        .unwrap();

    scan.hold(&[SW1], 2);
    scan.idle(2);
    keypad.run_ticks(4);

    assert_eq!(keypad.stats().sink_failures, 1);
    assert_eq!(keypad.stats().key_events, 2);
}

#[test]
fn row2col_matrix_end_to_end() {
    let mut config = Config::default();
    config.device.diode_direction = DiodeDirection::Row2Col;
    let mut h = Harness::new(&config);
    h.down((1, 0));
    assert_eq!(
        h.hid.outputs(),
        vec![HidOutput::Press(LCTL), HidOutput::Press(key("Z"))]
    );
    assert_eq!(h.telemetry()[0]["data"]["key"], "SW4");
}

#[test]
fn labels_follow_configured_columns() {
    let mut h = Harness::new(&config_3x3());
    h.down((2, 1));
    assert_eq!(h.telemetry()[0]["data"]["key"], "SW8");
    assert_eq!(h.hid.outputs(), vec![HidOutput::Press(key("F2"))]);
}

#[test]
fn telemetry_can_be_turned_off() {
    let mut config = Config::default();
    config.telemetry.enabled = false;
    let mut h = Harness::new(&config);
    h.tap(SW6);
    h.tap(SW1);
    assert!(h.host.sent().is_empty());
}

#[test]
fn session_report_counts_everything() {
    let mut h = Harness::stock();
    h.tap(SW1);
    h.scan.turn(EncoderDirection::Clockwise, 1);
    h.keypad.run_ticks(4);

    let report = h.keypad.report();
    assert_eq!(report.summary.key_events, 2);
    assert_eq!(report.summary.encoder_pulses, 1);
    assert_eq!(report.summary.ticks, 8);
    let json = report.to_json().unwrap();
    assert!(json.contains("generated_at"));
}

#[test]
fn config_file_round_trip_drives_keypad() {
    let path = std::env::temp_dir().join(format!(
        "ctrl-macropad-integration-{}.toml",
        std::process::id()
    ));
    let mut config = Config::default();
    config.keymap.layers[0].keys[0] = "LSFT+A".to_string();
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    loaded.validate().unwrap();

    let mut h = Harness::new(&loaded);
    h.down(SW1);
    assert_eq!(
        h.hid.outputs(),
        vec![HidOutput::Press(key("LSFT")), HidOutput::Press(key("A"))]
    );
}
