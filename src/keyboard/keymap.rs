//! Layered keymap: what every switch and the encoder do on each layer

use super::event::{EncoderDirection, PhysicalKey};
use super::keycode::{ComboParseError, KeyCombo};
use crate::config::{ConfigError, DeviceConfig};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 24-bit display colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_u32(value: u32) -> Self {
        Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    pub fn to_u32(&self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Error parsing a `#RRGGBB` colour
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid colour '{0}', expected #RRGGBB")]
pub struct RgbParseError(pub String);

impl FromStr for Rgb {
    type Err = RgbParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(RgbParseError(s.to_string()));
        }
        u32::from_str_radix(hex, 16)
            .map(Self::from_u32)
            .map_err(|_| RgbParseError(s.to_string()))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Combos sent for each encoder direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderBinding {
    pub clockwise: KeyCombo,
    pub counterclockwise: KeyCombo,
}

impl EncoderBinding {
    pub fn combo(&self, direction: EncoderDirection) -> &KeyCombo {
        match direction {
            EncoderDirection::Clockwise => &self.clockwise,
            EncoderDirection::CounterClockwise => &self.counterclockwise,
        }
    }
}

/// What a switch or the encoder does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicalAction {
    /// Hold modifiers then the base key; release in reverse
    EmitCombo(KeyCombo),
    /// Make a layer the active one until changed again
    ActivateLayer(usize),
    /// Layer active only while the switch is held
    MomentaryLayer(usize),
    /// Jump back to a layer, dropping everything above the base
    ReturnToLayer(usize),
    /// Per-layer encoder behaviour
    EncoderAction(EncoderBinding),
}

impl LogicalAction {
    /// Target layer of layer-changing actions
    pub fn layer_target(&self) -> Option<usize> {
        match self {
            LogicalAction::ActivateLayer(n)
            | LogicalAction::MomentaryLayer(n)
            | LogicalAction::ReturnToLayer(n) => Some(*n),
            LogicalAction::EmitCombo(_) | LogicalAction::EncoderAction(_) => None,
        }
    }
}

impl fmt::Display for LogicalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalAction::EmitCombo(combo) => write!(f, "{}", combo),
            LogicalAction::ActivateLayer(n) => write!(f, "DF({})", n),
            LogicalAction::MomentaryLayer(n) => write!(f, "MO({})", n),
            LogicalAction::ReturnToLayer(n) => write!(f, "TO({})", n),
            LogicalAction::EncoderAction(binding) => {
                write!(f, "ENC({}, {})", binding.clockwise, binding.counterclockwise)
            }
        }
    }
}

/// Error parsing an action string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionParseError {
    #[error("bad layer reference '{0}'")]
    BadLayer(String),
    #[error(transparent)]
    Combo(#[from] ComboParseError),
}

impl FromStr for LogicalAction {
    type Err = ActionParseError;

    /// `MO(n)`, `DF(n)`, `TO(n)` or a combo such as `LCTL+C`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let upper = s.to_ascii_uppercase();

        let layer_arg = |prefix: &str| -> Option<Result<usize, ActionParseError>> {
            let inner = upper.strip_prefix(prefix)?.strip_suffix(')')?;
            Some(
                inner
                    .trim()
                    .parse()
                    .map_err(|_| ActionParseError::BadLayer(s.to_string())),
            )
        };

        if let Some(n) = layer_arg("MO(") {
            return Ok(LogicalAction::MomentaryLayer(n?));
        }
        if let Some(n) = layer_arg("DF(") {
            return Ok(LogicalAction::ActivateLayer(n?));
        }
        if let Some(n) = layer_arg("TO(") {
            return Ok(LogicalAction::ReturnToLayer(n?));
        }
        Ok(LogicalAction::EmitCombo(s.parse()?))
    }
}

/// Encoder section of a layer in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub clockwise: String,
    pub counterclockwise: String,
}

/// One `[[keymap.layers]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub index: usize,
    pub name: String,
    pub color: Rgb,
    /// Row-major actions, one per switch
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder: Option<EncoderConfig>,
}

/// Keymap section of the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeymapConfig {
    pub layers: Vec<LayerConfig>,
}

/// A validated layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub color: Rgb,
    actions: Vec<LogicalAction>,
    encoder: Option<EncoderBinding>,
}

/// Validated, immutable keymap
///
/// Every switch has an action on every layer, and layer indices run
/// contiguously from 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    rows: u8,
    cols: u8,
    layers: Vec<Layer>,
}

impl Keymap {
    /// Validate `config` against the device geometry
    pub fn from_config(device: &DeviceConfig, config: &KeymapConfig) -> Result<Self, ConfigError> {
        if config.layers.is_empty() {
            return Err(ConfigError::invalid("keymap defines no layers"));
        }
        if config.layers.len() > device.num_layers {
            return Err(ConfigError::invalid(format!(
                "keymap defines {} layers but num_layers is {}",
                config.layers.len(),
                device.num_layers
            )));
        }

        let mut ordered: Vec<&LayerConfig> = config.layers.iter().collect();
        ordered.sort_by_key(|layer| layer.index);
        for (expected, layer) in ordered.iter().enumerate() {
            if layer.index != expected {
                return Err(ConfigError::invalid(format!(
                    "layer indices must run 0..{} without gaps, found {}",
                    config.layers.len(),
                    layer.index
                )));
            }
        }

        let layer_count = ordered.len();
        let key_count = device.key_count();
        let mut layers = Vec::with_capacity(layer_count);

        for layer in ordered {
            if layer.keys.len() != key_count {
                return Err(ConfigError::invalid(format!(
                    "layer {} defines {} keys, the {}x{} matrix has {}",
                    layer.index,
                    layer.keys.len(),
                    device.rows,
                    device.cols,
                    key_count
                )));
            }

            let mut actions = Vec::with_capacity(key_count);
            for (slot, text) in layer.keys.iter().enumerate() {
                let action: LogicalAction = text.parse().map_err(|e| {
                    ConfigError::invalid(format!(
                        "layer {} key {}: '{}': {}",
                        layer.index,
                        PhysicalKey::from_index(slot, device.cols).label(device.cols),
                        text,
                        e
                    ))
                })?;
                if let Some(target) = action.layer_target() {
                    if target >= layer_count {
                        return Err(ConfigError::invalid(format!(
                            "layer {} references layer {} but only {} are defined",
                            layer.index, target, layer_count
                        )));
                    }
                }
                actions.push(action);
            }

            let encoder = match &layer.encoder {
                Some(enc) => {
                    let parse = |text: &str| {
                        text.parse::<KeyCombo>().map_err(|e| {
                            ConfigError::invalid(format!(
                                "layer {} encoder '{}': {}",
                                layer.index, text, e
                            ))
                        })
                    };
                    Some(EncoderBinding {
                        clockwise: parse(&enc.clockwise)?,
                        counterclockwise: parse(&enc.counterclockwise)?,
                    })
                }
                None => None,
            };

            layers.push(Layer {
                name: layer.name.clone(),
                color: layer.color,
                actions,
                encoder,
            });
        }

        Ok(Self {
            rows: device.rows,
            cols: device.cols,
            layers,
        })
    }

    /// Action for `key` on `layer`, `None` when either is out of range
    pub fn resolve(&self, layer: usize, key: PhysicalKey) -> Option<&LogicalAction> {
        if key.row >= self.rows || key.col >= self.cols {
            return None;
        }
        self.layers.get(layer)?.actions.get(key.index(self.cols))
    }

    /// Encoder behaviour on `layer`, if the layer binds the encoder
    pub fn encoder_action(&self, layer: usize) -> Option<LogicalAction> {
        self.layers
            .get(layer)?
            .encoder
            .clone()
            .map(LogicalAction::EncoderAction)
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    /// Every switch position, row-major
    pub fn keys(&self) -> impl Iterator<Item = PhysicalKey> + '_ {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| PhysicalKey::new(row, col)))
    }
}
