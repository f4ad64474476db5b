//! HD44780 LCD module.
//!
//! [driver] holds the command set and the bus-level [HD44780Driver](driver::HD44780Driver)
//! implementations, while [LiquidCrystal] keeps the controller state and offers the usual
//! character LCD operations on top of them.
pub mod driver;
mod liquid_crystal;

pub use liquid_crystal::*;
