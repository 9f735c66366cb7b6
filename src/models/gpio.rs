// GPIO pin table as reported by `raspi-gpio get`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of low pins surfaced as `onoff.gpioN` capabilities.
pub const EXPOSED_PIN_COUNT: u8 = 16;
/// Highest pin number on the BCM2711 header.
pub const MAX_PIN: u8 = 53;

/// Pull resistor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pull {
    Up,
    Down,
    None,
}

impl Pull {
    /// Parse the `pull=` token (e.g. "UP"); unknown tokens yield `None` (absent).
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "UP" => Some(Pull::Up),
            "DOWN" => Some(Pull::Down),
            "NONE" => Some(Pull::None),
            _ => None,
        }
    }
}

/// State of one pin. `fsel` and `alt` stay `None` when the line omits them;
/// `Some(0)` means the tool reported 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpioPin {
    pub level: bool,
    pub func: String,
    pub alt: Option<u8>,
    pub fsel: Option<u8>,
    pub pull: Option<Pull>,
}

/// Pin number to pin state.
pub type GpioState = BTreeMap<u8, GpioPin>;
