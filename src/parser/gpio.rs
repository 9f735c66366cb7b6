// `raspi-gpio get` parsing

use regex::Regex;
use std::sync::LazyLock;

use super::non_empty;
use crate::models::{GpioPin, GpioState, Pull};

static GPIO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"GPIO (\d+): level=(\d)(?: fsel=(\d+))?(?: alt=(\d+))? func=(\w+)(?: pull=(\w+))?",
    )
    .expect("static regex is valid")
});

/// `GPIO 28: level=1 alt=5 func=RGMII_MDIO pull=UP`
///
/// Optional groups that are absent stay `None`; they are never defaulted to 0.
pub fn parse_gpio_states(raw: &str) -> GpioState {
    let mut states = GpioState::new();
    let Some(text) = non_empty(Some(raw)) else {
        return states;
    };
    for caps in GPIO_RE.captures_iter(text) {
        let Some(pin) = caps.get(1).and_then(|m| m.as_str().parse::<u8>().ok()) else {
            continue;
        };
        let Some(func) = caps.get(5) else {
            continue;
        };
        states.insert(
            pin,
            GpioPin {
                level: caps.get(2).is_some_and(|m| m.as_str() == "1"),
                func: func.as_str().to_string(),
                alt: caps.get(4).and_then(|m| m.as_str().parse().ok()),
                fsel: caps.get(3).and_then(|m| m.as_str().parse().ok()),
                pull: caps.get(6).and_then(|m| Pull::from_token(m.as_str())),
            },
        );
    }
    states
}
