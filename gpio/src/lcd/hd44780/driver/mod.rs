//! HD44780 command set and bus drivers.
//!
//! See [HD44780Driver] for the interface every bus implementation provides, and
//! [GpioHD44780Driver] for the parallel GPIO one. The trait only frames bytes; keeping track of
//! what the controller is configured to lives in [LiquidCrystal](super::LiquidCrystal).
//!
//! # Sources
//!
//! - Hitachi, [“HD44780U (LCD-II) Dot Matrix Liquid Crystal Display Controller/Driver,”](https://www.sparkfun.com/datasheets/LCD/HD44780.pdf)
//!   ADE-207-272(Z), '99.9, Rev. 0.0.
mod gpio;

use crate::{GpioError, GpioResult};
use bitflags::bitflags;
use std::fmt::Debug;
pub use gpio::*;

/// Instruction opcodes. The low bits of each opcode carry its flags.
pub mod command {
    pub const CLEAR_DISPLAY: u8 = 0b00000001;
    pub const RETURN_HOME: u8 = 0b00000010;
    pub const ENTRY_MODE_SET: u8 = 0b00000100;
    pub const DISPLAY_CONTROL: u8 = 0b00001000;
    pub const CURSOR_SHIFT: u8 = 0b00010000;
    pub const FUNCTION_SET: u8 = 0b00100000;
    pub const SET_CGRAM_ADDR: u8 = 0b01000000;
    pub const SET_DDRAM_ADDR: u8 = 0b10000000;

    // Cursor shift flags
    pub const DISPLAY_MOVE: u8 = 0b00001000;
    pub const CURSOR_MOVE: u8 = 0b00000000;
    pub const MOVE_RIGHT: u8 = 0b00000100;
    pub const MOVE_LEFT: u8 = 0b00000000;
}

/// Minimum delays from the datasheet, in microseconds.
///
/// Every value is a floor. Backends are allowed to sleep longer, never shorter.
pub mod timing {
    /// More than 40 ms after Vcc rises to 2.7 V (p. 45-46). Supplies may still be ramping past
    /// that point, hence 50 ms.
    pub const POWER_ON_US: u32 = 50_000;
    /// Wait after the first and second synchronization attempts, more than 4.1 ms (fig. 23, 24).
    pub const SYNC_LONG_US: u32 = 4_500;
    /// Wait after the last synchronization attempt, more than 100 µs (fig. 23, 24).
    pub const SYNC_SHORT_US: u32 = 150;
    /// Enable held low before the rising edge.
    pub const ENABLE_SETUP_US: u32 = 1;
    /// Enable pulse width, PW_EH is at least 450 ns.
    pub const ENABLE_PULSE_US: u32 = 1;
    /// Most instructions take 37 µs. The margin covers coarse backend timers.
    pub const COMMAND_SETTLE_US: u32 = 100;
    /// Clear display and return home take 1.52 ms.
    pub const CLEAR_HOME_US: u32 = 2_000;
}

/// Width of the data bus between the host and the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusWidth {
    FourBit,
    EightBit,
}

impl BusWidth {
    /// Number of data lines used in this mode.
    pub fn pin_count(self) -> usize {
        match self {
            BusWidth::FourBit => 4,
            BusWidth::EightBit => 8,
        }
    }
}

/// Character font height.
///
/// 5x10 is only available on single-line displays, the controller needs the second line's
/// memory for the extra rows.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FontSize {
    Dots5x8,
    Dots5x10,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}

bitflags! {
    /// Flags of the function set instruction, `001DNF??`.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct FunctionSet: u8 {
        const EIGHT_BIT = 0b00010000;
        const FOUR_BIT = 0b00000000;
        const TWO_LINE = 0b00001000;
        const ONE_LINE = 0b00000000;
        const DOTS_5X10 = 0b00000100;
        const DOTS_5X8 = 0b00000000;
    }
}

bitflags! {
    /// Flags of the display on/off control instruction, `00001DCB`.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct DisplayControl: u8 {
        const DISPLAY_ON = 0b00000100;
        const DISPLAY_OFF = 0b00000000;
        const CURSOR_ON = 0b00000010;
        const CURSOR_OFF = 0b00000000;
        const BLINK_ON = 0b00000001;
        const BLINK_OFF = 0b00000000;
    }
}

bitflags! {
    /// Flags of the entry mode set instruction, `000001IS`.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct EntryMode: u8 {
        /// Text flows left to right (cursor increments).
        const ENTRY_LEFT = 0b00000010;
        const ENTRY_RIGHT = 0b00000000;
        /// The display shifts on every write.
        const ENTRY_SHIFT_INCREMENT = 0b00000001;
        const ENTRY_SHIFT_DECREMENT = 0b00000000;
    }
}

/// The `HD44780Driver` trait frames bytes for an HD44780 controller over some bus.
///
/// Implementations only need to provide the low-level methods. The instruction helpers are
/// provided on top of [HD44780Driver::send_command], so each one sends exactly one instruction
/// byte. The driver is write-only: the busy flag is never polled, and every instruction is
/// followed by a fixed delay instead (see [timing]).
pub trait HD44780Driver: Debug {
    /// Gets the data bus width this driver was built for.
    fn bus_width(&self) -> BusWidth;

    /// Configures every connected line as an output.
    fn configure_outputs(&mut self) -> GpioResult<()>;

    /// Pulls RS, E and (if connected) R/W low, putting the bus into a known idle state.
    fn idle_bus(&mut self) -> GpioResult<()>;

    /// Latches a single raw nibble, regardless of the register select line.
    ///
    /// Only meaningful during the 4-bit synchronization sequence, when the controller hasn't
    /// agreed on a bus width yet.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` on an 8-bit bus.
    fn write_init_nibble(&mut self, nibble: u8) -> GpioResult<()>;

    /// Blocks for at least `us` microseconds.
    fn delay_us(&mut self, us: u32) -> GpioResult<()>;

    /// Sends an instruction. Sets the RS pin to 0.
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends data to the DDRAM or CGRAM, whichever was addressed last. Sets the RS pin to 1.
    fn send_data(&mut self, data: u8) -> GpioResult<()>;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(command::CLEAR_DISPLAY)?;
        self.delay_us(timing::CLEAR_HOME_US)
    }

    /// Sets the cursor to the home position and undoes any display shift.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(command::RETURN_HOME)?;
        self.delay_us(timing::CLEAR_HOME_US)
    }

    fn set_entry_mode(&mut self, flags: EntryMode) -> GpioResult<()> {
        self.send_command(command::ENTRY_MODE_SET | flags.bits())
    }

    fn set_display_control(&mut self, flags: DisplayControl) -> GpioResult<()> {
        self.send_command(command::DISPLAY_CONTROL | flags.bits())
    }

    /// Moves the cursor or shifts the whole display, without touching the DDRAM.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut value = command::CURSOR_SHIFT;
        value |= if display_shift { command::DISPLAY_MOVE } else { command::CURSOR_MOVE };
        value |= match direction {
            CursorDirection::Left => command::MOVE_LEFT,
            CursorDirection::Right => command::MOVE_RIGHT,
        };
        self.send_command(value)
    }

    fn function_set(&mut self, flags: FunctionSet) -> GpioResult<()> {
        self.send_command(command::FUNCTION_SET | flags.bits())
    }

    /// Sets the CGRAM address.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the address doesn't fit in 6 bits.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(command::SET_CGRAM_ADDR | address)
    }

    /// Sets the DDRAM address.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the address doesn't fit in 7 bits.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(command::SET_DDRAM_ADDR | address)
    }
}
