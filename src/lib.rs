//! Scd41 CO2, temperature and humidity sensor driver
//!
//! Copyright 2019 Ryan Kurte
//!
//! The driver is generic over an embedded-hal blocking I2C connection and a millisecond
//! delay provider, and tracks the sensor operating mode so commands that the sensor
//! would reject (or silently misbehave on) in its current mode are refused up front.
//!
//! ```no_run
//! use linux_embedded_hal::{I2cdev, Delay};
//! use sensor_scd41::Scd41;
//!
//! let i2c = I2cdev::new("/dev/i2c-1").unwrap();
//! let mut sensor = Scd41::new(i2c, Delay);
//!
//! sensor.stop_periodic_measurement().unwrap();
//! let m = sensor.measure_single_shot().unwrap();
//! println!("CO2: {} ppm, Temperature: {:.2} C, Humidity: {:.2} %", m.co2_ppm, m.temperature_c, m.humidity_rh);
//! ```

#![cfg_attr(not(test), no_std)]

use core::fmt::Debug;
use core::marker::PhantomData;

#[macro_use] extern crate log;

extern crate embedded_hal;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

pub mod base;
pub mod device;
pub mod measurement;

use base::{Base, Interface, decode_words};
pub use device::{Command, CommandSpec, DEFAULT_ADDRESS};
use device::{DATA_READY_MASK, FRC_FAILED, FRC_OFFSET};
pub use measurement::Measurement;
use measurement::{temperature_offset_from_raw, temperature_offset_to_raw};

/// Scd41 operating mode as tracked by the driver
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum SensorState {
    /// Sensor is powered down, only `wakeup` is accepted
    Sleeping,
    /// Sensor is awake and not measuring, configuration commands are accepted
    Idle,
    /// Periodic (or low power periodic) measurement is running
    PeriodicMeasuring,
    /// A single shot measurement has been triggered and not yet collected
    SingleShotPending,
}

/// Scd41 error object
#[derive(Debug)]
pub enum Error<ConnErr> {
    /// Writing a command to the bus failed
    Write(ConnErr),
    /// Reading a response from the bus failed
    Read(ConnErr),
    /// A response word failed CRC validation (computed, received)
    Crc(u8, u8),
    /// Waking the sensor ahead of a single shot read failed
    Wakeup(ConnErr),
    /// Command is not valid in the current operating mode
    InvalidState{ state: SensorState, command: Command },
    /// Argument cannot be represented on the wire
    InvalidArgument,
    /// Sensor reported forced recalibration failure
    RecalibrationFailed,
}

/// Scd41 sensor object
/// This is generic over an I2C connector, a delay provider and associated error type
pub struct Scd41<Conn, Delay, Err> {
    iface: Interface<Conn, Delay>,
    state: SensorState,
    _err: PhantomData<Err>,
}

impl <Conn, Delay, Err> Scd41 <Conn, Delay, Err> where
    Conn: i2c::Read<Error=Err> + i2c::Write<Error=Err>,
    Delay: DelayMs<u32>,
    Err: Debug,
{
    /// Create a new Scd41 sensor instance using the default address
    ///
    /// The sensor is assumed to be idle (its power-up state), if this is not known
    /// call `stop_periodic_measurement` before issuing other commands.
    pub fn new(conn: Conn, delay: Delay) -> Self {
        Self::with_address(conn, delay, DEFAULT_ADDRESS)
    }

    /// Create a new Scd41 sensor instance at the provided address
    pub fn with_address(conn: Conn, delay: Delay, address: u8) -> Self {
        Scd41{ iface: Interface::new(conn, delay, address), state: SensorState::Idle, _err: PhantomData }
    }

    /// Fetch the operating mode tracked by the driver
    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Release the underlying connection and delay
    pub fn release(self) -> (Conn, Delay) {
        self.iface.release()
    }

    /// Reinitialise the sensor, reloading settings from EEPROM
    pub fn reinit(&mut self) -> Result<(), Error<Err>> {
        self.require(Command::Reinit, &[SensorState::Idle])?;
        self.iface.write_command(Command::Reinit, None)
    }

    /// Wake the sensor, valid from any state
    ///
    /// The sensor does not acknowledge this command, so the driver returns to idle
    /// whether or not the write succeeded. Any write error is still returned.
    pub fn wakeup(&mut self) -> Result<(), Error<Err>> {
        let r = self.iface.write_command(Command::WakeUp, None);
        self.transition(SensorState::Idle);
        r
    }

    /// Put the sensor to sleep, `wakeup` must be called before any further commands
    pub fn power_down(&mut self) -> Result<(), Error<Err>> {
        self.require(Command::PowerDown, &[SensorState::Idle])?;
        self.iface.write_command(Command::PowerDown, None)?;
        self.transition(SensorState::Sleeping);
        Ok(())
    }

    /// Read the 48-bit sensor serial number
    pub fn serial_number(&mut self) -> Result<u64, Error<Err>> {
        self.require(Command::GetSerialNumber, &[SensorState::Idle])?;

        let mut buff = [0u8; 9];
        self.iface.read_command(Command::GetSerialNumber, &mut buff)?;

        let [w0, w1, w2] = decode_words::<3>(&buff)?;

        Ok((w0 as u64) << 32 | (w1 as u64) << 16 | (w2 as u64))
    }

    /// Start periodic measurement mode, producing a sample every 5s
    pub fn start_periodic_measurement(&mut self) -> Result<(), Error<Err>> {
        self.start(Command::StartPeriodicMeasurement)
    }

    /// Start low power periodic measurement mode, producing a sample every ~30s
    pub fn start_low_power_periodic_measurement(&mut self) -> Result<(), Error<Err>> {
        self.start(Command::StartLowPowerPeriodicMeasurement)
    }

    /// Stop periodic measurement mode
    ///
    /// This is also accepted when idle, so it can be used to bring a sensor
    /// in an unknown mode back to idle.
    pub fn stop_periodic_measurement(&mut self) -> Result<(), Error<Err>> {
        self.require(Command::StopPeriodicMeasurement, &[SensorState::Idle, SensorState::PeriodicMeasuring])?;
        self.iface.write_command(Command::StopPeriodicMeasurement, None)?;
        self.transition(SensorState::Idle);
        Ok(())
    }

    /// Check whether measurement data is available in the buffer
    pub fn data_ready(&mut self) -> Result<bool, Error<Err>> {
        self.require(Command::GetDataReadyStatus, &[SensorState::PeriodicMeasuring])?;

        let status = self.iface.read_word(Command::GetDataReadyStatus)?;

        Ok(status & DATA_READY_MASK != 0)
    }

    /// Read measurement data from the buffer
    pub fn read_measurement(&mut self) -> Result<Measurement, Error<Err>> {
        self.require(Command::ReadMeasurement, &[SensorState::Idle, SensorState::PeriodicMeasuring])?;

        let mut buff = [0u8; 9];
        self.iface.read_command(Command::ReadMeasurement, &mut buff)?;

        let words = decode_words::<3>(&buff)?;

        Ok(Measurement::from_raw(words))
    }

    /// Perform a single shot measurement of CO2, temperature and humidity
    /// This blocks for the 5s measurement duration
    pub fn measure_single_shot(&mut self) -> Result<Measurement, Error<Err>> {
        self.single_shot(Command::MeasureSingleShot)
    }

    /// Perform a single shot measurement of temperature and humidity only
    /// The returned CO2 value is not meaningful
    pub fn measure_single_shot_rht_only(&mut self) -> Result<Measurement, Error<Err>> {
        self.single_shot(Command::MeasureSingleShotRhtOnly)
    }

    /// Set Altitude Compensation
    /// Allows compensation for CO2 measurement using altitude over sea level in meters
    pub fn set_altitude(&mut self, altitude_m: u16) -> Result<(), Error<Err>> {
        self.require(Command::SetSensorAltitude, &[SensorState::Idle])?;
        self.iface.write_command(Command::SetSensorAltitude, Some(altitude_m))
    }

    /// Fetch the altitude compensation value in meters
    pub fn altitude(&mut self) -> Result<u16, Error<Err>> {
        self.require(Command::GetSensorAltitude, &[SensorState::Idle])?;
        self.iface.read_word(Command::GetSensorAltitude)
    }

    /// Set Ambient Pressure Compensation in Pascals
    ///
    /// The sensor works in hPa so the value is truncated to a multiple of 100 Pa.
    /// Unlike other settings this may be updated during periodic measurement.
    pub fn set_ambient_pressure(&mut self, pressure_pa: u32) -> Result<(), Error<Err>> {
        self.require(Command::SetAmbientPressure, &[SensorState::Idle, SensorState::PeriodicMeasuring])?;

        let hpa = u16::try_from(pressure_pa / 100)
            .map_err(|_| Error::InvalidArgument)?;

        self.iface.write_command(Command::SetAmbientPressure, Some(hpa))
    }

    /// Fetch the ambient pressure compensation value in Pascals
    pub fn ambient_pressure(&mut self) -> Result<u32, Error<Err>> {
        self.require(Command::GetAmbientPressure, &[SensorState::Idle, SensorState::PeriodicMeasuring])?;

        let hpa = self.iface.read_word(Command::GetAmbientPressure)?;

        Ok(hpa as u32 * 100)
    }

    /// Store the current configuration in EEPROM
    pub fn persist_settings(&mut self) -> Result<(), Error<Err>> {
        self.require(Command::PersistSettings, &[SensorState::Idle])?;
        self.iface.write_command(Command::PersistSettings, None)
    }

    /// Enable or disable Automatic Self-Calibration
    pub fn set_asc_enabled(&mut self, enabled: bool) -> Result<(), Error<Err>> {
        self.require(Command::SetAutomaticSelfCalibrationEnabled, &[SensorState::Idle])?;

        let v = match enabled {
            true => 1,
            false => 0,
        };

        self.iface.write_command(Command::SetAutomaticSelfCalibrationEnabled, Some(v))
    }

    /// Check whether Automatic Self-Calibration is enabled
    pub fn asc_enabled(&mut self) -> Result<bool, Error<Err>> {
        self.require(Command::GetAutomaticSelfCalibrationEnabled, &[SensorState::Idle])?;

        let v = self.iface.read_word(Command::GetAutomaticSelfCalibrationEnabled)?;

        Ok(v != 0)
    }

    /// Set the Automatic Self-Calibration baseline in ppm
    pub fn set_asc_target(&mut self, target_ppm: u16) -> Result<(), Error<Err>> {
        self.require(Command::SetAutomaticSelfCalibrationTarget, &[SensorState::Idle])?;
        self.iface.write_command(Command::SetAutomaticSelfCalibrationTarget, Some(target_ppm))
    }

    /// Fetch the Automatic Self-Calibration baseline in ppm
    pub fn asc_target(&mut self) -> Result<u16, Error<Err>> {
        self.require(Command::GetAutomaticSelfCalibrationTarget, &[SensorState::Idle])?;
        self.iface.read_word(Command::GetAutomaticSelfCalibrationTarget)
    }

    /// Set Temperature Compensation
    /// Offset is in degrees celsius and must be within 0 - 175 C
    pub fn set_temperature_offset(&mut self, offset_c: f32) -> Result<(), Error<Err>> {
        self.require(Command::SetTemperatureOffset, &[SensorState::Idle])?;

        let raw = temperature_offset_to_raw(offset_c)
            .ok_or(Error::InvalidArgument)?;

        self.iface.write_command(Command::SetTemperatureOffset, Some(raw))
    }

    /// Fetch the temperature offset in degrees celsius
    pub fn temperature_offset(&mut self) -> Result<f32, Error<Err>> {
        self.require(Command::GetTemperatureOffset, &[SensorState::Idle])?;

        let raw = self.iface.read_word(Command::GetTemperatureOffset)?;

        Ok(temperature_offset_from_raw(raw))
    }

    /// Perform Forced Recalibration against a reference CO2 concentration in ppm
    /// Returns the correction applied by the sensor in ppm
    ///
    /// The sensor should have been measuring in the reference atmosphere for
    /// at least 3 minutes before periodic measurement was stopped.
    pub fn forced_recalibration(&mut self, target_ppm: u16) -> Result<i16, Error<Err>> {
        self.require(Command::PerformForcedRecalibration, &[SensorState::Idle])?;

        let v = self.iface.write_read_word(Command::PerformForcedRecalibration, target_ppm)?;
        if v == FRC_FAILED {
            return Err(Error::RecalibrationFailed);
        }

        Ok(v.wrapping_sub(FRC_OFFSET) as i16)
    }

    /// Run the on-chip self test, returns true if no malfunction was detected
    /// This blocks for 10s
    pub fn self_test(&mut self) -> Result<bool, Error<Err>> {
        self.require(Command::PerformSelfTest, &[SensorState::Idle])?;

        let v = self.iface.read_word(Command::PerformSelfTest)?;

        Ok(v == 0)
    }

    /// Reset configuration and calibration history to factory defaults
    pub fn factory_reset(&mut self) -> Result<(), Error<Err>> {
        self.require(Command::PerformFactoryReset, &[SensorState::Idle])?;
        self.iface.write_command(Command::PerformFactoryReset, None)
    }

    fn start(&mut self, command: Command) -> Result<(), Error<Err>> {
        self.require(command, &[SensorState::Idle])?;
        self.iface.write_command(command, None)?;
        self.transition(SensorState::PeriodicMeasuring);
        Ok(())
    }

    fn single_shot(&mut self, trigger: Command) -> Result<Measurement, Error<Err>> {
        self.require(trigger, &[SensorState::Idle])?;

        self.iface.write_command(trigger, None)?;
        self.transition(SensorState::SingleShotPending);

        // The sensor may have gone back to sleep, wake it before reading
        self.iface.write_command(Command::WakeUp, None)
            .map_err(|e| match e {
                Error::Write(e) => Error::Wakeup(e),
                e => e,
            })?;
        self.transition(SensorState::Idle);

        self.read_measurement()
    }

    fn require(&self, command: Command, allowed: &[SensorState]) -> Result<(), Error<Err>> {
        if allowed.contains(&self.state) {
            return Ok(())
        }

        debug!("Rejecting command {:?} in state {:?}", command, self.state);

        Err(Error::InvalidState{ state: self.state, command })
    }

    fn transition(&mut self, state: SensorState) {
        if self.state != state {
            debug!("Sensor state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
    }
}
