//! Simulated GPIO backend.
//!
//! Records every call it receives and keeps a virtual clock instead of sleeping, so the exact bus
//! traffic of a driver can be inspected afterward.
use crate::{GpioBackend, GpioError, GpioResult, PinId, PinLevel, PinMode};
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// A single call received by [SimGpioBackend].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimEvent {
    Configure { pin: PinId, mode: PinMode },
    Write { pin: PinId, level: PinLevel },
    Read { pin: PinId, level: PinLevel },
    Sleep(u32),
}

/// A value latched into the controller by a falling edge of the enable line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Latch {
    /// Level of the register select line, `true` for the data register.
    pub rs: bool,
    /// Data lines sampled LSb first.
    pub value: u8,
    /// Virtual time of the falling edge, in microseconds since the backend was created.
    pub at_us: u64,
}

#[derive(Default)]
pub struct SimGpioBackend {
    events: Vec<SimEvent>,
    levels: BTreeMap<PinId, PinLevel>,
    modes: BTreeMap<PinId, PinMode>,
    elapsed_us: u64,
    writes_left: Option<usize>,
}

impl SimGpioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets `writes` more pin writes succeed, then fails every following one with an IO error.
    pub fn fail_writes_after(&mut self, writes: usize) {
        self.writes_left = Some(writes);
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Total virtual time spent sleeping.
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    pub fn level(&self, pin: PinId) -> PinLevel {
        self.levels.get(&pin).copied().unwrap_or_default()
    }

    pub fn mode(&self, pin: PinId) -> Option<PinMode> {
        self.modes.get(&pin).copied()
    }

    /// Replays the recorded events and returns everything latched by `enable`.
    ///
    /// Only the recorded events are considered, so levels set before the last
    /// [SimGpioBackend::clear_events] start out low.
    pub fn latches(&self, enable: PinId, rs: PinId, data: &[PinId]) -> Vec<Latch> {
        let mut levels: BTreeMap<PinId, PinLevel> = BTreeMap::new();
        let mut now = 0u64;
        let mut latches = Vec::new();

        for event in &self.events {
            match *event {
                SimEvent::Sleep(us) => now += u64::from(us),
                SimEvent::Write { pin, level } => {
                    let previous = levels.insert(pin, level).unwrap_or_default();
                    if pin == enable && previous.is_high() && !level.is_high() {
                        let value = data
                            .iter()
                            .enumerate()
                            .filter(|(_, pin)| {
                                levels.get(*pin).copied().unwrap_or_default().is_high()
                            })
                            .fold(0u8, |acc, (i, _)| acc | (1 << i));
                        latches.push(Latch {
                            rs: levels.get(&rs).copied().unwrap_or_default().is_high(),
                            value,
                            at_us: now,
                        });
                    }
                }
                SimEvent::Configure { .. } | SimEvent::Read { .. } => {}
            }
        }

        latches
    }
}

impl Debug for SimGpioBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimGpioBackend({} events, {} us)", self.events.len(), self.elapsed_us)
    }
}

impl GpioBackend for SimGpioBackend {
    fn configure_pin(&mut self, pin: PinId, mode: PinMode) -> GpioResult<()> {
        self.modes.insert(pin, mode);
        self.events.push(SimEvent::Configure { pin, mode });
        Ok(())
    }

    fn write_digital(&mut self, pin: PinId, level: PinLevel) -> GpioResult<()> {
        if let Some(left) = self.writes_left.as_mut() {
            if *left == 0 {
                return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe));
            }
            *left -= 1;
        }

        if self.mode(pin) != Some(PinMode::Output) {
            return Err(GpioError::InvalidArgument);
        }

        self.levels.insert(pin, level);
        self.events.push(SimEvent::Write { pin, level });
        Ok(())
    }

    fn read_digital(&mut self, pin: PinId) -> GpioResult<PinLevel> {
        if self.mode(pin).is_none() {
            return Err(GpioError::InvalidArgument);
        }

        let level = self.level(pin);
        self.events.push(SimEvent::Read { pin, level });
        Ok(level)
    }

    fn sleep_micros(&mut self, us: u32) -> GpioResult<()> {
        self.elapsed_us += u64::from(us);
        self.events.push(SimEvent::Sleep(us));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_require_output_mode() {
        let mut sim = SimGpioBackend::new();
        assert_eq!(sim.write_digital(3, PinLevel::High), Err(GpioError::InvalidArgument));

        sim.configure_pin(3, PinMode::Output).unwrap();
        sim.write_digital(3, PinLevel::High).unwrap();
        assert_eq!(sim.level(3), PinLevel::High);
        assert_eq!(sim.read_digital(3), Ok(PinLevel::High));
    }

    #[test]
    fn sleeping_advances_virtual_clock() {
        let mut sim = SimGpioBackend::new();
        sim.sleep_micros(100).unwrap();
        sim.sleep_micros(2000).unwrap();
        assert_eq!(sim.elapsed_us(), 2100);
        assert_eq!(sim.events(), &[SimEvent::Sleep(100), SimEvent::Sleep(2000)]);
    }

    #[test]
    fn latches_sample_on_falling_edge() {
        let mut sim = SimGpioBackend::new();
        for pin in [0, 1, 4, 5] {
            sim.configure_pin(pin, PinMode::Output).unwrap();
        }

        // RS = 0, E = 1, D = 4/5
        sim.write_digital(0, PinLevel::High).unwrap();
        sim.write_digital(4, PinLevel::High).unwrap();
        sim.write_digital(1, PinLevel::High).unwrap();
        sim.sleep_micros(1).unwrap();
        sim.write_digital(1, PinLevel::Low).unwrap();
        // Low to low is not an edge
        sim.write_digital(1, PinLevel::Low).unwrap();

        let latches = sim.latches(1, 0, &[4, 5]);
        assert_eq!(latches, vec![Latch { rs: true, value: 0b01, at_us: 1 }]);
    }

    #[test]
    fn injected_failures_stick() {
        let mut sim = SimGpioBackend::new();
        sim.configure_pin(0, PinMode::Output).unwrap();
        sim.fail_writes_after(1);

        assert!(sim.write_digital(0, PinLevel::High).is_ok());
        assert_eq!(
            sim.write_digital(0, PinLevel::Low),
            Err(GpioError::Io(std::io::ErrorKind::BrokenPipe))
        );
        assert!(sim.write_digital(0, PinLevel::Low).is_err());
    }
}
