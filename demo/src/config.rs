use eyre::{WrapErr, eyre};
use liquidcrystal_gpio::PinId;
use liquidcrystal_gpio::lcd::hd44780::driver::{BusWidth, FontSize};
use std::env::var;
use std::str::FromStr;

/// Pin number meaning "not connected", kept for wiring files written for the Arduino library.
const UNWIRED_PIN: PinId = 255;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LcdConfig {
    pub chip: String,
    pub pin_rs: PinId,
    pub pin_rw: Option<PinId>,
    pub pin_e: PinId,
    pub data_pins: Vec<PinId>,
    pub bus_width: BusWidth,
    pub cols: u8,
    pub lines: u8,
    pub font: FontSize,
    pub text: String,
}

impl LcdConfig {
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|key| var(key).ok())
    }

    /// Builds the config from any key-value source, `LCD_*` variables in practice.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let required = |key: &str| lookup(key).ok_or_else(|| eyre!("{} is not set", key));

        let data_pins = parse_pin_bus(&required("LCD_PINS_DATA")?).wrap_err("LCD_PINS_DATA")?;
        let bus_width = match data_pins.len() {
            4 => BusWidth::FourBit,
            8 => BusWidth::EightBit,
            n => return Err(eyre!("LCD_PINS_DATA needs 4 or 8 pins, got {}", n)),
        };

        let pin_rw = match lookup("LCD_PIN_RW") {
            Some(value) => {
                Some(parse_var::<PinId>("LCD_PIN_RW", &value)?).filter(|&pin| pin != UNWIRED_PIN)
            }
            None => None,
        };

        Ok(LcdConfig {
            chip: lookup("LCD_GPIO_CHIP").unwrap_or_else(|| "/dev/gpiochip0".to_string()),
            pin_rs: parse_var("LCD_PIN_RS", &required("LCD_PIN_RS")?)?,
            pin_rw,
            pin_e: parse_var("LCD_PIN_E", &required("LCD_PIN_E")?)?,
            data_pins,
            bus_width,
            cols: lookup("LCD_COLS")
                .map(|v| parse_var("LCD_COLS", &v))
                .transpose()?
                .unwrap_or(16),
            lines: lookup("LCD_LINES")
                .map(|v| parse_var("LCD_LINES", &v))
                .transpose()?
                .unwrap_or(2),
            font: lookup("LCD_FONT")
                .map(|v| parse_font(&v))
                .transpose()?
                .unwrap_or(FontSize::Dots5x8),
            text: lookup("LCD_TEXT").unwrap_or_else(|| "Hello, world!".to_string()),
        })
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> eyre::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().wrap_err_with(|| format!("invalid {}: {:?}", key, value))
}

fn parse_font(value: &str) -> eyre::Result<FontSize> {
    match value.trim() {
        "5x8" => Ok(FontSize::Dots5x8),
        "5x10" => Ok(FontSize::Dots5x10),
        other => Err(eyre!("invalid LCD_FONT: {:?}, expected 5x8 or 5x10", other)),
    }
}

fn parse_pin_bus(pin_str: &str) -> eyre::Result<Vec<PinId>> {
    Ok(pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<PinId>())
        .collect::<Result<Vec<_>, _>>()?)
}
