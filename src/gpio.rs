//! Drive the A/B lines through the sysfs GPIO interface.
//!
//! Synchronous writes to `/sys/class/gpio`. At a 10 ms quarter period this
//! is fast enough, but the edges will carry the jitter of the host loop.
use anyhow::{Context, Result};
use log::{debug, info};
use quadsim::Pins;
use std::{
    fs::{self, File},
    io::{self, Write},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pin {
    pin_num: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    High,
    Low,
}

impl Pin {
    pub fn new(pin_num: u64) -> Pin {
        Pin { pin_num }
    }

    /// Export the GPIO
    ///
    /// This is equivalent to `echo N > /sys/class/gpio/export` with
    /// the exception that the case where the GPIO is already exported
    /// is not an error.
    pub fn export(&self) -> Result<&Pin> {
        if fs::metadata(&format!("/sys/class/gpio/gpio{}", self.pin_num)).is_err() {
            let mut export_file = File::create("/sys/class/gpio/export")?;
            export_file.write_all(format!("{}", self.pin_num).as_bytes())?;
        }
        Ok(self)
    }

    /// Configure the pin as an output with an initial level.
    ///
    /// `High` and `Low` set direction and level in one write, so the line
    /// never glitches to the other level on start-up.
    pub fn set_direction(&self, dir: Direction) -> Result<&Pin> {
        self.write_to_device_file(
            "direction",
            match dir {
                Direction::High => "high",
                Direction::Low => "low",
            },
        )?;
        Ok(self)
    }

    /// A 0 value sets the pin low, anything else sets it high.
    pub fn set_value(&self, value: u8) -> Result<&Pin> {
        self.write_to_device_file(
            "value",
            match value {
                0 => "0",
                _ => "1",
            },
        )?;

        Ok(self)
    }

    fn write_to_device_file(&self, dev_file_name: &str, value: &str) -> io::Result<()> {
        let gpio_path = format!("/sys/class/gpio/gpio{}/{}", self.pin_num, dev_file_name);
        let mut dev_file = File::create(&gpio_path)?;
        dev_file.write_all(value.as_bytes())?;
        Ok(())
    }
}

/// Destination of the simulated encoder lines.
pub trait SignalOutput: Send {
    fn emit(&mut self, pins: Pins) -> Result<()>;
}

/// Pins A and B on real hardware. Only lines that changed are written.
pub struct SysfsOutput {
    a: Pin,
    b: Pin,
    last: Pins,
}

impl SysfsOutput {
    pub fn open(pin_a: u64, pin_b: u64, initial: Pins) -> Result<SysfsOutput> {
        let a = Pin::new(pin_a);
        let b = Pin::new(pin_b);
        for (pin, level) in [(&a, initial.a), (&b, initial.b)].iter() {
            pin.export()
                .with_context(|| format!("could not export pin {}", pin.pin_num))?
                .set_direction(if *level == 0 { Direction::Low } else { Direction::High })
                .with_context(|| format!("could not set direction for pin {}", pin.pin_num))?;
        }
        info!("Driving encoder A on GPIO {} and B on GPIO {}", pin_a, pin_b);
        Ok(SysfsOutput {
            a,
            b,
            last: initial,
        })
    }
}

impl SignalOutput for SysfsOutput {
    fn emit(&mut self, pins: Pins) -> Result<()> {
        if pins.a != self.last.a {
            self.a.set_value(pins.a)?;
        }
        if pins.b != self.last.b {
            self.b.set_value(pins.b)?;
        }
        self.last = pins;
        Ok(())
    }
}

/// Used when no GPIO is available, e.g. on a development machine.
pub struct NullOutput;

impl SignalOutput for NullOutput {
    fn emit(&mut self, pins: Pins) -> Result<()> {
        debug!("A={} B={}", pins.a, pins.b);
        Ok(())
    }
}
