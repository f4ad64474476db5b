use crate::lcd::hd44780::driver::{
    BusWidth, CursorDirection, DisplayControl, EntryMode, FontSize, FunctionSet, GpioHD44780Driver,
    HD44780Driver, timing,
};
use crate::{GpioBackend, GpioError, GpioResult, PinId};
use log::{debug, warn};
use std::fmt;

/// Longest line the DDRAM can hold.
pub const MAX_COLUMNS: u8 = 40;
/// Number of canonical row start addresses.
pub const MAX_LINES: u8 = 4;

/// Lifecycle of a [LiquidCrystal]. There is no way back to `Uninitialized` once `Ready`, other
/// than a failed [LiquidCrystal::begin].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LcdState {
    Uninitialized,
    Initializing,
    Ready,
}

/// A character LCD driven by an HD44780 controller.
///
/// The controller can't be read back, so the function set, display control and entry mode
/// registers are mirrored here. Every mutator sends the updated register straight away, and the
/// mirror only changes once the command went out.
///
/// The display has to be initialized with [LiquidCrystal::begin] before anything else; until then
/// every operation fails with [GpioError::NotInitialized].
#[derive(Debug)]
pub struct LiquidCrystal<D: HD44780Driver> {
    driver: D,
    state: LcdState,
    function_flags: FunctionSet,
    display_control: DisplayControl,
    entry_mode: EntryMode,
    row_offsets: [u8; MAX_LINES as usize],
    lines: u8,
}

impl<B: GpioBackend> LiquidCrystal<GpioHD44780Driver<B>> {
    /// Creates a display on a parallel GPIO bus.
    ///
    /// # Errors
    /// - `GpioError::DataPinCount` if `data_pins` doesn't match `width`.
    pub fn from_pins(
        backend: B,
        pin_rs: PinId,
        pin_rw: Option<PinId>,
        pin_e: PinId,
        data_pins: &[PinId],
        width: BusWidth,
    ) -> GpioResult<Self> {
        let driver = GpioHD44780Driver::new(backend, pin_e, pin_rw, pin_rs, data_pins, width)?;
        Ok(Self::new(driver))
    }
}

impl<D: HD44780Driver> LiquidCrystal<D> {
    pub fn new(driver: D) -> Self {
        let function_flags =
            Self::bus_flags(driver.bus_width()) | FunctionSet::ONE_LINE | FunctionSet::DOTS_5X8;
        LiquidCrystal {
            driver,
            state: LcdState::Uninitialized,
            function_flags,
            display_control: DisplayControl::empty(),
            entry_mode: EntryMode::empty(),
            row_offsets: [0; MAX_LINES as usize],
            lines: 1,
        }
    }

    fn bus_flags(width: BusWidth) -> FunctionSet {
        match width {
            BusWidth::FourBit => FunctionSet::FOUR_BIT,
            BusWidth::EightBit => FunctionSet::EIGHT_BIT,
        }
    }

    pub fn state(&self) -> LcdState {
        self.state
    }

    pub fn function_flags(&self) -> FunctionSet {
        self.function_flags
    }

    pub fn display_control_flags(&self) -> DisplayControl {
        self.display_control
    }

    pub fn entry_mode_flags(&self) -> EntryMode {
        self.entry_mode
    }

    pub fn row_offsets(&self) -> [u8; MAX_LINES as usize] {
        self.row_offsets
    }

    pub fn line_count(&self) -> u8 {
        self.lines
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn ensure_initialized(&self) -> GpioResult<()> {
        match self.state {
            LcdState::Uninitialized => Err(GpioError::NotInitialized),
            LcdState::Initializing | LcdState::Ready => Ok(()),
        }
    }

    /// Initializes the display, following the power-on sequence from the HD44780 datasheet
    /// (figures 23 and 24, pages 45-46).
    ///
    /// The sequence:
    /// - configures all the pins as outputs and waits for the supply to settle,
    /// - pulls RS, E and R/W low,
    /// - synchronizes the bus width: three raw `0011` nibbles and a `0010` one in 4-bit mode, three
    ///   function sets in 8-bit mode,
    /// - sends the final function set with the line count and font,
    /// - turns the display on with no cursor and no blinking,
    /// - clears the display,
    /// - sets left-to-right entry without autoscroll.
    ///
    /// The 5x10 font is only used for single-line displays and silently ignored otherwise.
    /// Calling it again redoes the whole sequence.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `cols` is not in `1..=40` or `lines` is not in `1..=4`.
    /// - Any backend error. A display that was never initialized stays uninitialized, one that
    ///   was already ready stays usable.
    pub fn begin(&mut self, cols: u8, lines: u8, font: FontSize) -> GpioResult<()> {
        if !(1..=MAX_COLUMNS).contains(&cols) || !(1..=MAX_LINES).contains(&lines) {
            return Err(GpioError::InvalidArgument);
        }

        let previous = self.state;
        self.state = LcdState::Initializing;
        let result = self.init_sequence(cols, lines, font);
        self.state = match (&result, previous) {
            (Ok(()), _) | (Err(_), LcdState::Ready) => LcdState::Ready,
            (Err(_), _) => LcdState::Uninitialized,
        };
        result
    }

    fn init_sequence(&mut self, cols: u8, lines: u8, font: FontSize) -> GpioResult<()> {
        let mut function_flags = Self::bus_flags(self.driver.bus_width())
            | FunctionSet::ONE_LINE
            | FunctionSet::DOTS_5X8;
        if lines > 1 {
            function_flags.insert(FunctionSet::TWO_LINE);
        }
        if font == FontSize::Dots5x10 && lines == 1 {
            function_flags.insert(FunctionSet::DOTS_5X10);
        }
        self.function_flags = function_flags;
        self.lines = lines;
        self.set_row_offsets(0x00, 0x40, cols, 0x40 + cols);

        debug!(
            "Initializing {}x{} display, function set {:08b}",
            cols,
            lines,
            function_flags.bits()
        );

        self.driver.configure_outputs()?;
        self.driver.delay_us(timing::POWER_ON_US)?;
        self.driver.idle_bus()?;

        match self.driver.bus_width() {
            BusWidth::FourBit => {
                // The controller may be in 8-bit mode or halfway through a 4-bit transfer.
                // Three 0011 nibbles get it into 8-bit mode either way.
                self.driver.write_init_nibble(0b0011)?;
                self.driver.delay_us(timing::SYNC_LONG_US)?;
                self.driver.write_init_nibble(0b0011)?;
                self.driver.delay_us(timing::SYNC_LONG_US)?;
                self.driver.write_init_nibble(0b0011)?;
                self.driver.delay_us(timing::SYNC_SHORT_US)?;
                // Switch to 4-bit
                self.driver.write_init_nibble(0b0010)?;
            }
            BusWidth::EightBit => {
                self.driver.function_set(function_flags)?;
                self.driver.delay_us(timing::SYNC_LONG_US)?;
                self.driver.function_set(function_flags)?;
                self.driver.delay_us(timing::SYNC_SHORT_US)?;
                self.driver.function_set(function_flags)?;
            }
        }

        // Lines and font only take effect from here
        self.driver.function_set(function_flags)?;

        let display_control =
            DisplayControl::DISPLAY_ON | DisplayControl::CURSOR_OFF | DisplayControl::BLINK_OFF;
        self.driver.set_display_control(display_control)?;
        self.display_control = display_control;

        self.driver.clear_display()?;

        let entry_mode = EntryMode::ENTRY_LEFT | EntryMode::ENTRY_SHIFT_DECREMENT;
        self.driver.set_entry_mode(entry_mode)?;
        self.entry_mode = entry_mode;

        debug!("Display initialized");
        Ok(())
    }

    /// Sets the DDRAM start address of each row, used by [LiquidCrystal::set_cursor].
    ///
    /// [LiquidCrystal::begin] sets them to `0x00, 0x40, cols, 0x40 + cols`, which fits most
    /// 1-, 2- and 4-line modules. Call this afterward for displays wired differently.
    pub fn set_row_offsets(&mut self, row0: u8, row1: u8, row2: u8, row3: u8) {
        self.row_offsets = [row0, row1, row2, row3];
    }

    /// Clears the display and moves the cursor home.
    pub fn clear(&mut self) -> GpioResult<()> {
        self.ensure_initialized()?;
        self.driver.clear_display()
    }

    /// Moves the cursor home and undoes any scrolling.
    pub fn home(&mut self) -> GpioResult<()> {
        self.ensure_initialized()?;
        self.driver.return_home()
    }

    /// Moves the cursor to the given column and row, both counted from 0.
    ///
    /// Rows past the last line are clamped to the last line.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the resulting DDRAM address doesn't fit in 7 bits.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> GpioResult<()> {
        self.ensure_initialized()?;

        let max_row = self.row_offsets.len().min(self.lines as usize) - 1;
        let row = (row as usize).min(max_row);
        let address = usize::from(col) + usize::from(self.row_offsets[row]);
        let address = u8::try_from(address).map_err(|_| GpioError::InvalidArgument)?;
        self.driver.set_ddram_address(address)
    }

    fn update_display_control(
        &mut self,
        update: impl FnOnce(&mut DisplayControl),
    ) -> GpioResult<()> {
        self.ensure_initialized()?;
        let mut flags = self.display_control;
        update(&mut flags);
        self.driver.set_display_control(flags)?;
        self.display_control = flags;
        Ok(())
    }

    fn update_entry_mode(&mut self, update: impl FnOnce(&mut EntryMode)) -> GpioResult<()> {
        self.ensure_initialized()?;
        let mut flags = self.entry_mode;
        update(&mut flags);
        self.driver.set_entry_mode(flags)?;
        self.entry_mode = flags;
        Ok(())
    }

    /// Turns the display off, keeping the DDRAM contents.
    pub fn no_display(&mut self) -> GpioResult<()> {
        self.update_display_control(|flags| flags.remove(DisplayControl::DISPLAY_ON))
    }

    pub fn display(&mut self) -> GpioResult<()> {
        self.update_display_control(|flags| flags.insert(DisplayControl::DISPLAY_ON))
    }

    /// Hides the underline cursor.
    pub fn no_cursor(&mut self) -> GpioResult<()> {
        self.update_display_control(|flags| flags.remove(DisplayControl::CURSOR_ON))
    }

    /// Shows the underline cursor.
    pub fn cursor(&mut self) -> GpioResult<()> {
        self.update_display_control(|flags| flags.insert(DisplayControl::CURSOR_ON))
    }

    pub fn no_blink(&mut self) -> GpioResult<()> {
        self.update_display_control(|flags| flags.remove(DisplayControl::BLINK_ON))
    }

    /// Blinks the character block at the cursor.
    pub fn blink(&mut self) -> GpioResult<()> {
        self.update_display_control(|flags| flags.insert(DisplayControl::BLINK_ON))
    }

    /// Shifts the visible window one column, without changing the DDRAM.
    pub fn scroll_display_left(&mut self) -> GpioResult<()> {
        self.ensure_initialized()?;
        self.driver.cursor_shift(true, CursorDirection::Left)
    }

    pub fn scroll_display_right(&mut self) -> GpioResult<()> {
        self.ensure_initialized()?;
        self.driver.cursor_shift(true, CursorDirection::Right)
    }

    /// Text flows left to right from the cursor.
    pub fn left_to_right(&mut self) -> GpioResult<()> {
        self.update_entry_mode(|flags| flags.insert(EntryMode::ENTRY_LEFT))
    }

    /// Text flows right to left from the cursor.
    pub fn right_to_left(&mut self) -> GpioResult<()> {
        self.update_entry_mode(|flags| flags.remove(EntryMode::ENTRY_LEFT))
    }

    /// Shifts the display on every write, "right justifying" text at the cursor.
    pub fn autoscroll(&mut self) -> GpioResult<()> {
        self.update_entry_mode(|flags| flags.insert(EntryMode::ENTRY_SHIFT_INCREMENT))
    }

    pub fn no_autoscroll(&mut self) -> GpioResult<()> {
        self.update_entry_mode(|flags| flags.remove(EntryMode::ENTRY_SHIFT_INCREMENT))
    }

    /// Programs one of the 8 custom characters. Only the low 3 bits of `location` are used.
    ///
    /// Each row holds 5 pixels in its low bits, top row first. The address counter is left in the
    /// CGRAM afterward, so call [LiquidCrystal::set_cursor] or [LiquidCrystal::clear] before
    /// writing text again.
    pub fn create_char(&mut self, location: u8, charmap: &[u8; 8]) -> GpioResult<()> {
        self.ensure_initialized()?;
        let location = location & 0x7;
        self.driver.set_cgram_address(location << 3)?;
        for &row in charmap {
            self.driver.send_data(row)?;
        }
        Ok(())
    }

    /// Sends a raw instruction byte.
    pub fn command(&mut self, value: u8) -> GpioResult<()> {
        self.ensure_initialized()?;
        self.driver.send_command(value)
    }

    /// Writes a single character code at the cursor.
    pub fn write(&mut self, value: u8) -> GpioResult<()> {
        self.ensure_initialized()?;
        self.driver.send_data(value)
    }

    /// Writes ASCII text at the cursor. Other characters are replaced with `?`.
    pub fn print(&mut self, s: &str) -> GpioResult<()> {
        for c in s.chars() {
            if c.is_ascii() {
                self.write(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.write(b'?')?;
            }
        }
        Ok(())
    }
}

impl<D: HD44780Driver> fmt::Write for LiquidCrystal<D> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s).map_err(|_| fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::driver::command;
    use crate::sim::{Latch, SimEvent, SimGpioBackend};
    use crate::{PinLevel, PinMode};
    use std::fmt::Write;

    const RS: PinId = 1;
    const E: PinId = 7;
    const DATA_4: [PinId; 4] = [8, 9, 10, 11];
    const DATA_8: [PinId; 8] = [8, 9, 10, 11, 12, 13, 14, 15];

    type SimLcd = LiquidCrystal<GpioHD44780Driver<SimGpioBackend>>;

    fn lcd_4bit() -> SimLcd {
        LiquidCrystal::from_pins(SimGpioBackend::new(), RS, None, E, &DATA_4, BusWidth::FourBit)
            .unwrap()
    }

    fn lcd_8bit() -> SimLcd {
        LiquidCrystal::from_pins(SimGpioBackend::new(), RS, None, E, &DATA_8, BusWidth::EightBit)
            .unwrap()
    }

    fn ready_4bit(cols: u8, lines: u8) -> SimLcd {
        let mut lcd = lcd_4bit();
        lcd.begin(cols, lines, FontSize::Dots5x8).unwrap();
        lcd.driver.backend_mut().clear_events();
        lcd
    }

    fn sim(lcd: &SimLcd) -> &SimGpioBackend {
        lcd.driver().backend()
    }

    /// Reassembles the bytes sent over a 4-bit bus, skipping `skip` leading raw nibbles.
    fn bytes_4bit(latches: &[Latch], skip: usize) -> Vec<(bool, u8)> {
        latches[skip..]
            .chunks(2)
            .map(|pair| (pair[0].rs, pair[0].value << 4 | pair[1].value))
            .collect()
    }

    fn sent_bytes(lcd: &SimLcd) -> Vec<(bool, u8)> {
        bytes_4bit(&sim(lcd).latches(E, RS, &DATA_4), 0)
    }

    #[test]
    fn begin_4bit_two_lines() {
        let mut lcd = lcd_4bit();
        lcd.begin(16, 2, FontSize::Dots5x8).unwrap();

        assert_eq!(lcd.state(), LcdState::Ready);
        assert_eq!(
            lcd.function_flags(),
            FunctionSet::FOUR_BIT | FunctionSet::TWO_LINE | FunctionSet::DOTS_5X8
        );
        assert_eq!(lcd.row_offsets(), [0, 64, 16, 80]);
        assert_eq!(lcd.line_count(), 2);

        let latches = sim(&lcd).latches(E, RS, &DATA_4);
        let nibbles: Vec<u8> = latches[..4].iter().map(|latch| latch.value).collect();
        assert_eq!(nibbles, vec![0x03, 0x03, 0x03, 0x02]);

        assert_eq!(
            bytes_4bit(&latches, 4),
            vec![
                (false, command::FUNCTION_SET | 0b1000),
                (false, command::DISPLAY_CONTROL | 0b100),
                (false, command::CLEAR_DISPLAY),
                (false, command::ENTRY_MODE_SET | 0b10),
            ]
        );
        assert_eq!(
            lcd.entry_mode_flags(),
            EntryMode::ENTRY_LEFT | EntryMode::ENTRY_SHIFT_DECREMENT
        );
    }

    #[test]
    fn begin_4bit_timing() {
        let mut lcd = lcd_4bit();
        lcd.begin(16, 2, FontSize::Dots5x8).unwrap();

        let events = sim(&lcd).events();
        let sleeps: Vec<u32> = events
            .iter()
            .filter_map(|event| match event {
                SimEvent::Sleep(us) if *us > timing::COMMAND_SETTLE_US => Some(*us),
                _ => None,
            })
            .collect();
        assert_eq!(
            sleeps,
            vec![
                timing::POWER_ON_US,
                timing::SYNC_LONG_US,
                timing::SYNC_LONG_US,
                timing::SYNC_SHORT_US,
                timing::CLEAR_HOME_US,
            ]
        );

        // Nothing is latched before the supply had time to settle
        let latches = sim(&lcd).latches(E, RS, &DATA_4);
        assert!(latches[0].at_us >= u64::from(timing::POWER_ON_US));
        // The first sync nibble gets 4.1 ms before the next one
        assert!(latches[1].at_us - latches[0].at_us >= 4_100);
    }

    #[test]
    fn begin_configures_then_idles_bus() {
        let backend = SimGpioBackend::new();
        let mut lcd =
            LiquidCrystal::from_pins(backend, RS, Some(2), E, &DATA_4, BusWidth::FourBit).unwrap();
        lcd.begin(16, 1, FontSize::Dots5x8).unwrap();

        let events = sim(&lcd).events();
        let configured: Vec<PinId> = events
            .iter()
            .take_while(|event| matches!(event, SimEvent::Configure { .. }))
            .map(|event| match event {
                SimEvent::Configure { pin, mode } => {
                    assert_eq!(*mode, PinMode::Output);
                    *pin
                }
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(configured, vec![RS, 2, E, 8, 9, 10, 11]);
        assert_eq!(events[7], SimEvent::Sleep(timing::POWER_ON_US));
        assert_eq!(
            &events[8..11],
            &[
                SimEvent::Write { pin: RS, level: PinLevel::Low },
                SimEvent::Write { pin: E, level: PinLevel::Low },
                SimEvent::Write { pin: 2, level: PinLevel::Low },
            ]
        );
    }

    #[test]
    fn begin_8bit() {
        let mut lcd = lcd_8bit();
        lcd.begin(20, 4, FontSize::Dots5x8).unwrap();

        let function_set = command::FUNCTION_SET | 0b11000;
        let latches = sim(&lcd).latches(E, RS, &DATA_8);
        let bytes: Vec<u8> = latches.iter().map(|latch| latch.value).collect();
        assert_eq!(
            bytes,
            vec![
                function_set,
                function_set,
                function_set,
                function_set,
                command::DISPLAY_CONTROL | 0b100,
                command::CLEAR_DISPLAY,
                command::ENTRY_MODE_SET | 0b10,
            ]
        );
        assert!(latches[1].at_us - latches[0].at_us >= u64::from(timing::SYNC_LONG_US));
        assert!(latches[2].at_us - latches[1].at_us >= u64::from(timing::SYNC_SHORT_US));
        assert_eq!(lcd.row_offsets(), [0x00, 0x40, 20, 0x54]);
    }

    #[test]
    fn tall_font_only_on_single_line() {
        let mut lcd = lcd_4bit();
        lcd.begin(16, 1, FontSize::Dots5x10).unwrap();
        assert!(lcd.function_flags().contains(FunctionSet::DOTS_5X10));
        assert!(!lcd.function_flags().contains(FunctionSet::TWO_LINE));

        let mut lcd = lcd_4bit();
        lcd.begin(16, 2, FontSize::Dots5x10).unwrap();
        assert!(!lcd.function_flags().contains(FunctionSet::DOTS_5X10));
    }

    #[test]
    fn begin_twice_is_identical() {
        let mut lcd = lcd_4bit();
        lcd.begin(16, 2, FontSize::Dots5x8).unwrap();
        let first = sim(&lcd).events().to_vec();

        lcd.driver.backend_mut().clear_events();
        lcd.begin(16, 2, FontSize::Dots5x8).unwrap();
        assert_eq!(sim(&lcd).events(), first.as_slice());
    }

    #[test]
    fn begin_rejects_bad_geometry() {
        let mut lcd = lcd_4bit();
        assert_eq!(lcd.begin(16, 0, FontSize::Dots5x8), Err(GpioError::InvalidArgument));
        assert_eq!(lcd.begin(16, 5, FontSize::Dots5x8), Err(GpioError::InvalidArgument));
        assert_eq!(lcd.begin(0, 2, FontSize::Dots5x8), Err(GpioError::InvalidArgument));
        assert_eq!(lcd.begin(41, 2, FontSize::Dots5x8), Err(GpioError::InvalidArgument));
        assert_eq!(lcd.state(), LcdState::Uninitialized);
        assert!(sim(&lcd).events().is_empty());
    }

    #[test]
    fn failed_begin_leaves_display_uninitialized() {
        let mut lcd = lcd_4bit();
        lcd.driver.backend_mut().fail_writes_after(10);

        assert!(matches!(lcd.begin(16, 2, FontSize::Dots5x8), Err(GpioError::Io(_))));
        assert_eq!(lcd.state(), LcdState::Uninitialized);
        assert_eq!(lcd.clear(), Err(GpioError::NotInitialized));
    }

    #[test]
    fn failed_repeat_begin_keeps_display_ready() {
        let mut lcd = ready_4bit(16, 2);
        lcd.driver.backend_mut().fail_writes_after(5);

        assert!(matches!(lcd.begin(20, 4, FontSize::Dots5x8), Err(GpioError::Io(_))));
        assert_eq!(lcd.state(), LcdState::Ready);

        lcd.driver.backend_mut().fail_writes_after(usize::MAX);
        lcd.driver.backend_mut().clear_events();
        lcd.clear().unwrap();
        assert_eq!(sent_bytes(&lcd), vec![(false, command::CLEAR_DISPLAY)]);
    }

    #[test]
    fn operations_require_begin() {
        let mut lcd = lcd_4bit();
        assert_eq!(lcd.clear(), Err(GpioError::NotInitialized));
        assert_eq!(lcd.set_cursor(0, 0), Err(GpioError::NotInitialized));
        assert_eq!(lcd.cursor(), Err(GpioError::NotInitialized));
        assert_eq!(lcd.write(b'A'), Err(GpioError::NotInitialized));
        assert_eq!(lcd.create_char(0, &[0; 8]), Err(GpioError::NotInitialized));
        assert_eq!(lcd.display_control_flags(), DisplayControl::empty());
        assert!(sim(&lcd).events().is_empty());
    }

    #[test]
    fn clear_and_home_wait() {
        let mut lcd = ready_4bit(16, 2);
        lcd.clear().unwrap();
        assert_eq!(sim(&lcd).events().last(), Some(&SimEvent::Sleep(timing::CLEAR_HOME_US)));

        lcd.driver.backend_mut().clear_events();
        lcd.home().unwrap();
        assert_eq!(sim(&lcd).events().last(), Some(&SimEvent::Sleep(timing::CLEAR_HOME_US)));
        assert_eq!(sent_bytes(&lcd), vec![(false, command::RETURN_HOME)]);
        assert!(timing::CLEAR_HOME_US >= 2_000);
    }

    #[test]
    fn set_cursor_clamps_row() {
        let mut lcd = ready_4bit(16, 2);
        lcd.set_cursor(3, 5).unwrap();
        lcd.set_cursor(3, 1).unwrap();
        lcd.set_cursor(0, 0).unwrap();
        assert_eq!(
            sent_bytes(&lcd),
            vec![
                (false, command::SET_DDRAM_ADDR | (3 + 0x40)),
                (false, command::SET_DDRAM_ADDR | (3 + 0x40)),
                (false, command::SET_DDRAM_ADDR),
            ]
        );
    }

    #[test]
    fn set_cursor_four_lines() {
        let mut lcd = ready_4bit(20, 4);
        lcd.set_cursor(1, 2).unwrap();
        lcd.set_cursor(1, 3).unwrap();
        lcd.set_cursor(1, 9).unwrap();
        assert_eq!(
            sent_bytes(&lcd),
            vec![
                (false, command::SET_DDRAM_ADDR | 21),
                (false, command::SET_DDRAM_ADDR | 0x55),
                (false, command::SET_DDRAM_ADDR | 0x55),
            ]
        );
    }

    #[test]
    fn set_cursor_rejects_address_overflow() {
        let mut lcd = ready_4bit(16, 2);
        assert_eq!(lcd.set_cursor(0x40, 1), Err(GpioError::InvalidArgument));
        assert_eq!(lcd.set_cursor(200, 1), Err(GpioError::InvalidArgument));
        assert!(sim(&lcd).events().is_empty());
    }

    #[test]
    fn custom_row_offsets() {
        let mut lcd = ready_4bit(16, 4);
        lcd.set_row_offsets(0x00, 0x40, 0x10, 0x50);
        lcd.set_cursor(2, 3).unwrap();
        assert_eq!(sent_bytes(&lcd), vec![(false, command::SET_DDRAM_ADDR | 0x52)]);
    }

    #[test]
    fn cursor_toggle_restores_flags() {
        let mut lcd = ready_4bit(16, 2);
        let before = lcd.display_control_flags();

        lcd.cursor().unwrap();
        assert!(lcd.display_control_flags().contains(DisplayControl::CURSOR_ON));
        lcd.no_cursor().unwrap();
        assert_eq!(lcd.display_control_flags(), before);

        let sent = sent_bytes(&lcd);
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1 & 0xF8, command::DISPLAY_CONTROL);
        assert_eq!(sent[1].1 & 0xF8, command::DISPLAY_CONTROL);
        assert_eq!(sent[0].1 ^ sent[1].1, DisplayControl::CURSOR_ON.bits());
    }

    #[test]
    fn display_control_mirrors_commands() {
        let mut lcd = ready_4bit(16, 2);
        lcd.blink().unwrap();
        lcd.no_display().unwrap();
        lcd.display().unwrap();
        lcd.no_blink().unwrap();

        let sent: Vec<u8> = sent_bytes(&lcd).into_iter().map(|(_, byte)| byte).collect();
        assert_eq!(sent, vec![0x0D, 0x09, 0x0D, 0x0C]);
        assert_eq!(
            command::DISPLAY_CONTROL | lcd.display_control_flags().bits(),
            *sent.last().unwrap()
        );
    }

    #[test]
    fn entry_mode_mirrors_commands() {
        let mut lcd = ready_4bit(16, 2);
        lcd.right_to_left().unwrap();
        lcd.autoscroll().unwrap();
        lcd.left_to_right().unwrap();
        lcd.no_autoscroll().unwrap();

        let sent: Vec<u8> = sent_bytes(&lcd).into_iter().map(|(_, byte)| byte).collect();
        assert_eq!(sent, vec![0x04, 0x05, 0x07, 0x06]);
        assert_eq!(
            lcd.entry_mode_flags(),
            EntryMode::ENTRY_LEFT | EntryMode::ENTRY_SHIFT_DECREMENT
        );
    }

    #[test]
    fn scrolling_shifts_display() {
        let mut lcd = ready_4bit(16, 2);
        lcd.scroll_display_left().unwrap();
        lcd.scroll_display_right().unwrap();
        assert_eq!(sent_bytes(&lcd), vec![(false, 0x18), (false, 0x1C)]);
    }

    #[test]
    fn create_char_programs_cgram() {
        let glyph = [0b00000, 0b01010, 0b11111, 0b11111, 0b01110, 0b00100, 0b00000, 0b00000];
        let mut lcd = ready_4bit(16, 2);
        lcd.create_char(2, &glyph).unwrap();

        let sent = sent_bytes(&lcd);
        assert_eq!(sent[0], (false, command::SET_CGRAM_ADDR | 16));
        let rows: Vec<(bool, u8)> = glyph.iter().map(|&row| (true, row)).collect();
        assert_eq!(&sent[1..], rows.as_slice());
    }

    #[test]
    fn create_char_wraps_location() {
        let mut lcd = ready_4bit(16, 2);
        lcd.create_char(10, &[0; 8]).unwrap();
        assert_eq!(sent_bytes(&lcd)[0], (false, command::SET_CGRAM_ADDR | (2 << 3)));
    }

    #[test]
    fn text_goes_to_data_register() {
        let mut lcd = ready_4bit(16, 2);
        lcd.write(50).unwrap();
        lcd.print("Hé").unwrap();
        write!(lcd, "{}", 7).unwrap();

        assert_eq!(
            sent_bytes(&lcd),
            vec![(true, 50), (true, b'H'), (true, b'?'), (true, b'7')]
        );
    }

    #[test]
    fn raw_command() {
        let mut lcd = ready_4bit(16, 2);
        lcd.command(command::CURSOR_SHIFT | command::MOVE_RIGHT).unwrap();
        assert_eq!(sent_bytes(&lcd), vec![(false, 0x14)]);
    }

    #[test]
    fn failed_command_keeps_mirror() {
        let mut lcd = ready_4bit(16, 2);
        let before = lcd.display_control_flags();
        lcd.driver.backend_mut().fail_writes_after(0);

        assert!(lcd.cursor().is_err());
        assert_eq!(lcd.display_control_flags(), before);
    }

    #[test]
    fn end_to_end_8bit_text() {
        let mut lcd = lcd_8bit();
        lcd.begin(16, 2, FontSize::Dots5x8).unwrap();
        lcd.driver.backend_mut().clear_events();

        lcd.set_cursor(0, 1).unwrap();
        lcd.print("Hi").unwrap();

        let latches = sim(&lcd).latches(E, RS, &DATA_8);
        let sent: Vec<(bool, u8)> = latches.iter().map(|latch| (latch.rs, latch.value)).collect();
        assert_eq!(sent, vec![(false, 0xC0), (true, b'H'), (true, b'i')]);
    }
}
