mod config;

use crate::config::LcdConfig;
use dotenv::dotenv;
use liquidcrystal_gpio::gpiod::GpiodBackend;
use liquidcrystal_gpio::lcd::hd44780::LiquidCrystal;
use log::{debug, info};

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    let config = LcdConfig::from_env()?;

    info!(
        "LCD @ {} RS: {}, RW: {:?}, E: {}, Data: {:?}",
        config.chip, config.pin_rs, config.pin_rw, config.pin_e, config.data_pins
    );

    debug!("Initializing GPIO backend...");
    let gpio = GpiodBackend::open(&config.chip)?;
    debug!("{:?} initialized.", gpio);

    let mut lcd = LiquidCrystal::from_pins(
        gpio,
        config.pin_rs,
        config.pin_rw,
        config.pin_e,
        &config.data_pins,
        config.bus_width,
    )?;

    lcd.begin(config.cols, config.lines, config.font)?;
    debug!("{:?} initialized.", lcd);

    lcd.clear()?;
    lcd.print(&config.text)?;

    info!("Printed {:?}", config.text);

    Ok(())
}
