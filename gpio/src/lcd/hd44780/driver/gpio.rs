use crate::lcd::hd44780::driver::{BusWidth, HD44780Driver, timing};
use crate::{GpioBackend, GpioError, GpioResult, PinId, PinLevel, PinMode};
use log::trace;

/// Data lines of the parallel bus, LSb first.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GpioHD44780Bus {
    Bus8Bit([PinId; 8]),
    Bus4Bit([PinId; 4]),
}

impl GpioHD44780Bus {
    /// Builds a bus out of a pin list, checking it matches the requested width.
    ///
    /// # Errors
    /// - `GpioError::DataPinCount` if there are not exactly 4 or 8 pins for the width.
    pub fn from_pins(pins: &[PinId], width: BusWidth) -> GpioResult<Self> {
        let mismatch = || GpioError::DataPinCount {
            expected: width.pin_count(),
            actual: pins.len(),
        };
        match width {
            BusWidth::FourBit => {
                Ok(GpioHD44780Bus::Bus4Bit(pins.try_into().map_err(|_| mismatch())?))
            }
            BusWidth::EightBit => {
                Ok(GpioHD44780Bus::Bus8Bit(pins.try_into().map_err(|_| mismatch())?))
            }
        }
    }

    pub fn width(&self) -> BusWidth {
        match self {
            GpioHD44780Bus::Bus8Bit(_) => BusWidth::EightBit,
            GpioHD44780Bus::Bus4Bit(_) => BusWidth::FourBit,
        }
    }

    pub fn pins(&self) -> &[PinId] {
        match self {
            GpioHD44780Bus::Bus8Bit(pins) => pins.as_slice(),
            GpioHD44780Bus::Bus4Bit(pins) => pins.as_slice(),
        }
    }
}

/// GpioHD44780Driver drives an HD44780 controller over a 4-bit or 8-bit parallel bus.
///
/// Every transfer ends with an E pulse followed by [timing::COMMAND_SETTLE_US], which is enough
/// for every instruction except clear display and return home; those get their extra delay from
/// [HD44780Driver::clear_display] and [HD44780Driver::return_home].
#[derive(Debug)]
pub struct GpioHD44780Driver<B: GpioBackend> {
    backend: B,
    pin_e: PinId,
    pin_rw: Option<PinId>,
    pin_rs: PinId,
    data_bus: GpioHD44780Bus,
}

impl<B: GpioBackend> GpioHD44780Driver<B> {
    /// Creates a new driver using a 4-bit data bus, connected to D4-D7 of the display.
    ///
    /// # Parameters
    ///
    /// - `backend`: The GPIO backend owning all the pins below.
    /// - `pin_e`: Enable output pin.
    /// - `pin_rw`: Optional read/write output pin. If not provided, the R/W pin of the display must
    ///   be connected to GND, signifying write mode. The driver never reads either way.
    /// - `pin_rs`: Register select output pin.
    /// - `data_pins`: Data pins, LSb first.
    pub fn new_4bit(
        backend: B,
        pin_e: PinId,
        pin_rw: Option<PinId>,
        pin_rs: PinId,
        data_pins: [PinId; 4],
    ) -> Self {
        Self::with_bus(backend, pin_e, pin_rw, pin_rs, GpioHD44780Bus::Bus4Bit(data_pins))
    }

    /// Creates a new driver using the full 8-bit data bus. See [GpioHD44780Driver::new_4bit].
    pub fn new_8bit(
        backend: B,
        pin_e: PinId,
        pin_rw: Option<PinId>,
        pin_rs: PinId,
        data_pins: [PinId; 8],
    ) -> Self {
        Self::with_bus(backend, pin_e, pin_rw, pin_rs, GpioHD44780Bus::Bus8Bit(data_pins))
    }

    /// Creates a new driver from a pin list whose length is only known at runtime.
    ///
    /// # Errors
    /// - `GpioError::DataPinCount` if `data_pins` doesn't hold exactly as many pins as `width`
    ///   needs.
    pub fn new(
        backend: B,
        pin_e: PinId,
        pin_rw: Option<PinId>,
        pin_rs: PinId,
        data_pins: &[PinId],
        width: BusWidth,
    ) -> GpioResult<Self> {
        let data_bus = GpioHD44780Bus::from_pins(data_pins, width)?;
        Ok(Self::with_bus(backend, pin_e, pin_rw, pin_rs, data_bus))
    }

    fn with_bus(
        backend: B,
        pin_e: PinId,
        pin_rw: Option<PinId>,
        pin_rs: PinId,
        data_bus: GpioHD44780Bus,
    ) -> Self {
        GpioHD44780Driver {
            backend,
            pin_e,
            pin_rw,
            pin_rs,
            data_bus,
        }
    }

    pub fn data_bus(&self) -> &GpioHD44780Bus {
        &self.data_bus
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Latches whatever is on the data bus: E low, E high, E low, each phase followed by its
    /// minimum delay.
    fn pulse_e(&mut self) -> GpioResult<()> {
        self.backend.write_digital(self.pin_e, PinLevel::Low)?;
        self.backend.sleep_micros(timing::ENABLE_SETUP_US)?;
        self.backend.write_digital(self.pin_e, PinLevel::High)?;
        self.backend.sleep_micros(timing::ENABLE_PULSE_US)?;
        self.backend.write_digital(self.pin_e, PinLevel::Low)?;
        self.backend.sleep_micros(timing::COMMAND_SETTLE_US)?;
        Ok(())
    }

    /// Puts the low `pins.len()` bits of `value` on the given pins and latches them.
    fn write_bits(&mut self, pins: &[PinId], value: u8) -> GpioResult<()> {
        for (i, &pin) in pins.iter().enumerate() {
            self.backend.write_digital(pin, ((value >> i) & 1 == 1).into())?;
        }
        self.pulse_e()
    }

    fn write_nibble(&mut self, nibble: u8) -> GpioResult<()> {
        let GpioHD44780Bus::Bus4Bit(pins) = self.data_bus else {
            return Err(GpioError::NotSupported);
        };
        self.write_bits(&pins, nibble & 0x0F)
    }

    fn write_byte(&mut self, byte: u8) -> GpioResult<()> {
        let GpioHD44780Bus::Bus8Bit(pins) = self.data_bus else {
            return Err(GpioError::NotSupported);
        };
        self.write_bits(&pins, byte)
    }

    fn send(&mut self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, rs);

        // Set RS pin
        self.backend.write_digital(self.pin_rs, rs.into())?;

        // Set RW pin to write
        if let Some(rw) = self.pin_rw {
            self.backend.write_digital(rw, PinLevel::Low)?;
        }

        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(_) => self.write_byte(data)?,
            GpioHD44780Bus::Bus4Bit(_) => {
                let high_nibble = (data >> 4) & 0x0F;
                let low_nibble = data & 0x0F;
                trace!("Writing HN: {:04b}", high_nibble);
                self.write_nibble(high_nibble)?;
                trace!("Writing LN: {:04b}", low_nibble);
                self.write_nibble(low_nibble)?;
            }
        }

        Ok(())
    }
}

impl<B: GpioBackend> HD44780Driver for GpioHD44780Driver<B> {
    fn bus_width(&self) -> BusWidth {
        self.data_bus.width()
    }

    fn configure_outputs(&mut self) -> GpioResult<()> {
        self.backend.configure_pin(self.pin_rs, PinMode::Output)?;
        if let Some(rw) = self.pin_rw {
            self.backend.configure_pin(rw, PinMode::Output)?;
        }
        self.backend.configure_pin(self.pin_e, PinMode::Output)?;
        for &pin in self.data_bus.pins() {
            self.backend.configure_pin(pin, PinMode::Output)?;
        }
        Ok(())
    }

    fn idle_bus(&mut self) -> GpioResult<()> {
        self.backend.write_digital(self.pin_rs, PinLevel::Low)?;
        self.backend.write_digital(self.pin_e, PinLevel::Low)?;
        if let Some(rw) = self.pin_rw {
            self.backend.write_digital(rw, PinLevel::Low)?;
        }
        Ok(())
    }

    fn write_init_nibble(&mut self, nibble: u8) -> GpioResult<()> {
        trace!("Writing init nibble: {:04b}", nibble & 0x0F);
        self.write_nibble(nibble)
    }

    fn delay_us(&mut self, us: u32) -> GpioResult<()> {
        self.backend.sleep_micros(us)
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, true)
    }
}
