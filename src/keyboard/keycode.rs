//! Key code definitions and the named keycode table

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Flag bit marking a consumer-page usage (media keys)
const CONSUMER_FLAG: u16 = 0x8000;

/// A logical HID key: keyboard-page usage, or consumer-page usage with the
/// high bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const fn new(usage: u16) -> Self {
        Self(usage)
    }

    pub const fn consumer(usage: u16) -> Self {
        Self(usage | CONSUMER_FLAG)
    }

    /// Keyboard-page modifier usages 0xE0..=0xE7
    pub fn is_modifier(&self) -> bool {
        (0xE0..=0xE7).contains(&self.0)
    }

    pub fn is_consumer(&self) -> bool {
        self.0 & CONSUMER_FLAG != 0
    }

    /// Usage id without the page flag
    pub fn usage(&self) -> u16 {
        self.0 & !CONSUMER_FLAG
    }

    /// Short panel label from the keycode table
    pub fn label(&self) -> &'static str {
        get_key_info(*self).label
    }
}

impl From<u16> for KeyCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match KEYCODES.get(self) {
            Some(info) => f.write_str(info.name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

/// Error returned when a key name is not in the table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key name '{0}'")]
pub struct UnknownKey(pub String);

impl FromStr for KeyCode {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        KEYCODES_BY_NAME
            .get(upper.as_str())
            .copied()
            .ok_or_else(|| UnknownKey(s.trim().to_string()))
    }
}

/// Information about a key
#[derive(Debug, Clone)]
pub struct KeyInfo {
    /// Canonical name, as written in keymap files
    pub name: &'static str,
    /// Short label for display panels
    pub label: &'static str,
}

impl KeyInfo {
    const fn new(name: &'static str, label: &'static str) -> Self {
        Self { name, label }
    }
}

/// Named keycodes, canonical spelling first
pub static KEYCODES: LazyLock<HashMap<KeyCode, KeyInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Letters A-Z are contiguous from 0x04
    const LETTERS: [&str; 26] = [
        "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
        "S", "T", "U", "V", "W", "X", "Y", "Z",
    ];
    for (i, name) in LETTERS.into_iter().enumerate() {
        map.insert(KeyCode(0x04 + i as u16), KeyInfo::new(name, name));
    }

    // Number row 1..9, 0
    const DIGITS: [&str; 10] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"];
    for (i, name) in DIGITS.into_iter().enumerate() {
        map.insert(KeyCode(0x1E + i as u16), KeyInfo::new(name, name));
    }

    map.insert(KeyCode(0x28), KeyInfo::new("ENTER", "Enter"));
    map.insert(KeyCode(0x29), KeyInfo::new("ESC", "Esc"));
    map.insert(KeyCode(0x2A), KeyInfo::new("BSPC", "Bksp"));
    map.insert(KeyCode(0x2B), KeyInfo::new("TAB", "Tab"));
    map.insert(KeyCode(0x2C), KeyInfo::new("SPACE", "Space"));
    map.insert(KeyCode(0x2D), KeyInfo::new("MINUS", "-"));
    map.insert(KeyCode(0x2E), KeyInfo::new("EQUAL", "="));
    map.insert(KeyCode(0x2F), KeyInfo::new("LBRC", "["));
    map.insert(KeyCode(0x30), KeyInfo::new("RBRC", "]"));
    map.insert(KeyCode(0x31), KeyInfo::new("BACKSLASH", "\\"));
    map.insert(KeyCode(0x33), KeyInfo::new("SCLN", ";"));
    map.insert(KeyCode(0x34), KeyInfo::new("QUOT", "'"));
    map.insert(KeyCode(0x35), KeyInfo::new("GRAVE", "`"));
    map.insert(KeyCode(0x36), KeyInfo::new("COMMA", ","));
    map.insert(KeyCode(0x37), KeyInfo::new("DOT", "."));
    map.insert(KeyCode(0x38), KeyInfo::new("SLASH", "/"));

    const FKEYS: [&str; 12] = [
        "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
    ];
    for (i, name) in FKEYS.into_iter().enumerate() {
        map.insert(KeyCode(0x3A + i as u16), KeyInfo::new(name, name));
    }

    // Navigation cluster
    map.insert(KeyCode(0x49), KeyInfo::new("INS", "Ins"));
    map.insert(KeyCode(0x4A), KeyInfo::new("HOME", "Home"));
    map.insert(KeyCode(0x4B), KeyInfo::new("PGUP", "PgUp"));
    map.insert(KeyCode(0x4C), KeyInfo::new("DEL", "Del"));
    map.insert(KeyCode(0x4D), KeyInfo::new("END", "End"));
    map.insert(KeyCode(0x4E), KeyInfo::new("PGDN", "PgDn"));
    map.insert(KeyCode(0x4F), KeyInfo::new("RIGHT", "→"));
    map.insert(KeyCode(0x50), KeyInfo::new("LEFT", "←"));
    map.insert(KeyCode(0x51), KeyInfo::new("DOWN", "↓"));
    map.insert(KeyCode(0x52), KeyInfo::new("UP", "↑"));

    // Modifiers
    map.insert(KeyCode(0xE0), KeyInfo::new("LCTL", "Ctrl"));
    map.insert(KeyCode(0xE1), KeyInfo::new("LSFT", "Shift"));
    map.insert(KeyCode(0xE2), KeyInfo::new("LALT", "Alt"));
    map.insert(KeyCode(0xE3), KeyInfo::new("LGUI", "Gui"));
    map.insert(KeyCode(0xE4), KeyInfo::new("RCTL", "Ctrl"));
    map.insert(KeyCode(0xE5), KeyInfo::new("RSFT", "Shift"));
    map.insert(KeyCode(0xE6), KeyInfo::new("RALT", "Alt"));
    map.insert(KeyCode(0xE7), KeyInfo::new("RGUI", "Gui"));

    // Consumer page (media keys)
    map.insert(KeyCode::consumer(0xB5), KeyInfo::new("MNXT", "Next"));
    map.insert(KeyCode::consumer(0xB6), KeyInfo::new("MPRV", "Prev"));
    map.insert(KeyCode::consumer(0xB7), KeyInfo::new("MSTP", "Stop"));
    map.insert(KeyCode::consumer(0xCD), KeyInfo::new("MPLY", "Play"));
    map.insert(KeyCode::consumer(0xE2), KeyInfo::new("MUTE", "Mute"));
    map.insert(KeyCode::consumer(0xE9), KeyInfo::new("VOLU", "Vol+"));
    map.insert(KeyCode::consumer(0xEA), KeyInfo::new("VOLD", "Vol-"));

    map
});

/// Name lookup including common aliases
static KEYCODES_BY_NAME: LazyLock<HashMap<&'static str, KeyCode>> = LazyLock::new(|| {
    let mut by_name: HashMap<&'static str, KeyCode> =
        KEYCODES.iter().map(|(code, info)| (info.name, *code)).collect();

    const ALIASES: [(&str, &str); 14] = [
        ("ENT", "ENTER"),
        ("ESCAPE", "ESC"),
        ("SPC", "SPACE"),
        ("MINS", "MINUS"),
        ("EQL", "EQUAL"),
        ("BSLS", "BACKSLASH"),
        ("SLSH", "SLASH"),
        ("GRV", "GRAVE"),
        ("LCTRL", "LCTL"),
        ("LSHIFT", "LSFT"),
        ("RCTRL", "RCTL"),
        ("RSHIFT", "RSFT"),
        ("LCMD", "LGUI"),
        ("DELETE", "DEL"),
    ];
    for (alias, canonical) in ALIASES {
        if let Some(code) = by_name.get(canonical).copied() {
            by_name.insert(alias, code);
        }
    }
    by_name
});

/// Get key info by code, returns a default if not found
pub fn get_key_info(code: KeyCode) -> KeyInfo {
    KEYCODES
        .get(&code)
        .cloned()
        .unwrap_or_else(|| KeyInfo::new("UNKNOWN", "?"))
}

/// Zero or more modifiers followed by one base key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    /// Modifiers in declared order
    pub modifiers: Vec<KeyCode>,
    pub key: KeyCode,
}

impl KeyCombo {
    pub fn new(modifiers: Vec<KeyCode>, key: KeyCode) -> Self {
        Self { modifiers, key }
    }

    /// Keys in press order: modifiers as declared, then the base key
    pub fn press_order(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.modifiers.iter().copied().chain(std::iter::once(self.key))
    }

    /// Keys in release order, the exact reverse of [`KeyCombo::press_order`]
    pub fn release_order(&self) -> impl Iterator<Item = KeyCode> + '_ {
        std::iter::once(self.key).chain(self.modifiers.iter().rev().copied())
    }

    /// Human-readable form such as `Ctrl+Shift+P`
    pub fn label(&self) -> String {
        self.press_order()
            .map(|code| code.label())
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier)?;
        }
        write!(f, "{}", self.key)
    }
}

/// Error parsing a combo such as `LCTL+LSFT+T`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComboParseError {
    #[error("empty key combo")]
    Empty,
    #[error(transparent)]
    UnknownKey(#[from] UnknownKey),
    #[error("'{0}' is not a modifier and cannot lead a combo")]
    NotAModifier(String),
}

impl FromStr for KeyCombo {
    type Err = ComboParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((last, leading)) = parts.split_last() else {
            return Err(ComboParseError::Empty);
        };
        if last.is_empty() {
            return Err(ComboParseError::Empty);
        }

        let mut modifiers = Vec::with_capacity(leading.len());
        for part in leading {
            let code: KeyCode = part.parse()?;
            if !code.is_modifier() {
                return Err(ComboParseError::NotAModifier(part.to_string()));
            }
            modifiers.push(code);
        }

        Ok(Self::new(modifiers, last.parse()?))
    }
}
