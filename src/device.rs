//! Scd41 device definitions
//!
//! Copyright 2019 Ryan Kurte


/// Scd41 default I2C address
/// (note this is shifted left 1 bit on the wire)
pub const DEFAULT_ADDRESS: u8 = 0x62;

pub const CRC_POLY: u8 = 0x31;
pub const CRC_INIT: u8 = 0xff;
pub const CRC_XOR: u8 = 0x00;

/// Mask applied to the data ready status word, any set bit means a sample is waiting
pub const DATA_READY_MASK: u16 = 0x07FF;

/// Forced recalibration response indicating the recalibration failed
pub const FRC_FAILED: u16 = 0xFFFF;

/// Offset applied to the forced recalibration correction word
pub const FRC_OFFSET: u16 = 0x8000;

/// Static description of a single command exchange
#[derive(PartialEq, Clone, Copy, Debug)]
pub struct CommandSpec {
    /// Opcode written (big endian) to start the exchange
    pub opcode: u16,
    /// Number of 3-byte (MSB, LSB, CRC) words returned by the sensor
    pub response_words: usize,
    /// Time the sensor requires after the command is written, in milliseconds
    pub delay_ms: u32,
}

impl CommandSpec {
    /// Length of the response in bytes on the wire
    pub fn response_len(&self) -> usize {
        self.response_words * 3
    }
}

/// Scd41 I2C Command
/// Command and data are big endian 16-bit unsigned integers, all Command with data are followed by a CRC-8 checksum
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Command {
    /// Re-initialise the sensor, reloading user settings from EEPROM
    Reinit,

    /// Wake the sensor from sleep mode
    /// The sensor does not acknowledge this command
    WakeUp,

    /// Read the 48-bit serial number as three words
    GetSerialNumber,

    /// Read a measurement from the buffer
    /// Returns CO2 (ppm), temperature and humidity words
    ReadMeasurement,

    /// Start periodic measurement mode, one sample every 5s
    StartPeriodicMeasurement,

    /// Start low power periodic measurement mode, one sample every ~30s
    StartLowPowerPeriodicMeasurement,

    /// Stop periodic measurement mode
    /// The sensor accepts no other command for 500ms afterwards
    StopPeriodicMeasurement,

    /// Fetch data ready status, the lower 11 bits are non-zero when data is available
    GetDataReadyStatus,

    /// Trigger a single shot measurement of CO2, temperature and humidity
    MeasureSingleShot,

    /// Trigger a single shot measurement of temperature and humidity only
    MeasureSingleShotRhtOnly,

    /// Set altitude compensation
    /// Data is uint16 in meters above sea level
    SetSensorAltitude,

    GetSensorAltitude,

    /// Set ambient pressure compensation
    /// Data is uint16 in hPa, shares an opcode with `GetAmbientPressure`
    SetAmbientPressure,

    GetAmbientPressure,

    /// Store the current configuration in EEPROM
    PersistSettings,

    /// Enable or Disable Automatic Self Calibration (ASC)
    /// Data is a u16, 1 enables ASC and 0 disables ASC
    SetAutomaticSelfCalibrationEnabled,

    GetAutomaticSelfCalibrationEnabled,

    /// Set the CO2 baseline ASC calibrates towards
    /// Data is a u16 CO2 concentration in ppm
    SetAutomaticSelfCalibrationTarget,

    GetAutomaticSelfCalibrationTarget,

    /// Set temperature offset
    /// Data is a uint16 in ticks of 175 / 65535 degrees celsius
    SetTemperatureOffset,

    GetTemperatureOffset,

    /// Perform Forced Recalibration (FRC) against a reference CO2 concentration
    /// Data is a u16 CO2 concentration in ppm, response is the correction + 0x8000
    PerformForcedRecalibration,

    /// Run the on-chip self test, a zero response word means no malfunction
    PerformSelfTest,

    /// Reset all configuration and calibration history to factory defaults
    PerformFactoryReset,

    /// Enter sleep mode
    PowerDown,
}

impl Command {
    /// Fetch the opcode, response shape and post-command delay for a command
    /// Values are from the SCD4x datasheet
    pub fn spec(&self) -> CommandSpec {
        use Command::*;

        let (opcode, response_words, delay_ms) = match self {
            Reinit => (0x3646, 0, 30),
            WakeUp => (0x36F6, 0, 30),
            GetSerialNumber => (0x3682, 3, 1),
            ReadMeasurement => (0xEC05, 3, 1),
            StartPeriodicMeasurement => (0x21B1, 0, 5),
            StartLowPowerPeriodicMeasurement => (0x21AC, 0, 0),
            StopPeriodicMeasurement => (0x3F86, 0, 500),
            GetDataReadyStatus => (0xE4B8, 1, 1),
            MeasureSingleShot => (0x219D, 0, 5000),
            MeasureSingleShotRhtOnly => (0x2196, 0, 50),
            SetSensorAltitude => (0x2427, 0, 1),
            GetSensorAltitude => (0x2322, 1, 1),
            // Set and get share 0xE000, the sensor uses the presence of an argument to pick
            SetAmbientPressure => (0xE000, 0, 1),
            GetAmbientPressure => (0xE000, 1, 1),
            PersistSettings => (0x3615, 0, 800),
            SetAutomaticSelfCalibrationEnabled => (0x2416, 0, 1),
            GetAutomaticSelfCalibrationEnabled => (0x2313, 1, 1),
            SetAutomaticSelfCalibrationTarget => (0x243A, 0, 1),
            GetAutomaticSelfCalibrationTarget => (0x233F, 1, 1),
            SetTemperatureOffset => (0x241D, 0, 1),
            GetTemperatureOffset => (0x2318, 1, 1),
            PerformForcedRecalibration => (0x362F, 1, 400),
            PerformSelfTest => (0x3639, 1, 10_000),
            PerformFactoryReset => (0x3632, 0, 1200),
            PowerDown => (0x36E0, 0, 1),
        };

        CommandSpec{ opcode, response_words, delay_ms }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_catalog() {
        let tests = &[
            (Command::Reinit, 0x3646, 0, 30),
            (Command::WakeUp, 0x36F6, 0, 30),
            (Command::GetSerialNumber, 0x3682, 3, 1),
            (Command::ReadMeasurement, 0xEC05, 3, 1),
            (Command::StartPeriodicMeasurement, 0x21B1, 0, 5),
            (Command::StopPeriodicMeasurement, 0x3F86, 0, 500),
            (Command::GetDataReadyStatus, 0xE4B8, 1, 1),
            (Command::MeasureSingleShot, 0x219D, 0, 5000),
            (Command::SetSensorAltitude, 0x2427, 0, 1),
            (Command::GetSensorAltitude, 0x2322, 1, 1),
            (Command::PersistSettings, 0x3615, 0, 800),
            (Command::SetAutomaticSelfCalibrationEnabled, 0x2416, 0, 1),
            (Command::GetAutomaticSelfCalibrationEnabled, 0x2313, 1, 1),
            (Command::SetAutomaticSelfCalibrationTarget, 0x243A, 0, 1),
            (Command::GetAutomaticSelfCalibrationTarget, 0x233F, 1, 1),
        ];

        for t in tests {
            let s = t.0.spec();
            assert_eq!(s, CommandSpec{ opcode: t.1, response_words: t.2, delay_ms: t.3 }, "{:?}", t.0);
        }
    }

    #[test]
    fn test_pressure_opcode_alias() {
        let set = Command::SetAmbientPressure.spec();
        let get = Command::GetAmbientPressure.spec();

        assert_eq!(set.opcode, 0xE000);
        assert_eq!(get.opcode, 0xE000);
        assert_eq!(set.response_len(), 0);
        assert_eq!(get.response_len(), 3);
    }
}
