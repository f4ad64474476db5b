//! [GpioBackend] implementation on top of the Linux GPIO character device, using the gpiod library.
use crate::{GpioBackend, GpioError, GpioResult, PinId, PinLevel, PinMode};
use log::trace;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

enum GpiodLine {
    Input(gpiod::Lines<gpiod::Input>),
    Output(gpiod::Lines<gpiod::Output>),
}

/// GpiodBackend drives single GPIO lines of one chip, requesting each line when it's configured.
pub struct GpiodBackend {
    chip: gpiod::Chip,
    lines: HashMap<PinId, GpiodLine>,
}

impl GpiodBackend {
    pub fn new(chip: gpiod::Chip) -> Self {
        Self {
            chip,
            lines: HashMap::new(),
        }
    }

    /// Opens the chip at the given path, like `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path.as_ref())?))
    }

    pub fn count(&self) -> usize {
        self.chip.num_lines() as usize
    }
}

impl Debug for GpiodBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodBackend({})", self.chip.name())
    }
}

impl GpioBackend for GpiodBackend {
    fn configure_pin(&mut self, pin: PinId, mode: PinMode) -> GpioResult<()> {
        if pin as usize >= self.count() {
            return Err(GpioError::InvalidArgument);
        }

        // Release the previous request first, the kernel refuses to hand out a busy line
        self.lines.remove(&pin);

        let line = match mode {
            PinMode::Input => GpiodLine::Input(self.chip.request_lines(
                gpiod::Options::input([pin]).consumer(env!("CARGO_PKG_NAME")),
            )?),
            PinMode::Output => GpiodLine::Output(self.chip.request_lines(
                gpiod::Options::output([pin]).consumer(env!("CARGO_PKG_NAME")),
            )?),
        };
        trace!("{:?}[{}] configured as {:?}", self, pin, mode);
        self.lines.insert(pin, line);
        Ok(())
    }

    fn write_digital(&mut self, pin: PinId, level: PinLevel) -> GpioResult<()> {
        match self.lines.get(&pin) {
            Some(GpiodLine::Output(line)) => {
                line.set_values([level.is_high()])?;
                Ok(())
            }
            Some(GpiodLine::Input(_)) => Err(GpioError::NotSupported),
            None => Err(GpioError::InvalidArgument),
        }
    }

    fn read_digital(&mut self, pin: PinId) -> GpioResult<PinLevel> {
        match self.lines.get(&pin) {
            Some(GpiodLine::Input(line)) => {
                let values = line.get_values([false])?;
                Ok(values[0].into())
            }
            Some(GpiodLine::Output(_)) => Err(GpioError::NotSupported),
            None => Err(GpioError::InvalidArgument),
        }
    }

    fn sleep_micros(&mut self, us: u32) -> GpioResult<()> {
        sleep(Duration::from_micros(u64::from(us)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_chip_is_an_io_error() {
        let result = GpiodBackend::open("/dev/liquidcrystal-no-such-gpiochip");
        assert!(matches!(result, Err(GpioError::Io(_))));
    }
}
