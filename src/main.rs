//! Scd41 command-line utility
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

extern crate embedded_hal;
extern crate linux_embedded_hal;
use linux_embedded_hal::{I2cdev, Delay};

extern crate structopt;
use structopt::StructOpt;

extern crate humantime;
use humantime::{Duration as HumanDuration};

#[macro_use] extern crate log;
extern crate simplelog;
use simplelog::{TermLogger, LevelFilter};

extern crate sensor_scd41;
use sensor_scd41::{Scd41, DEFAULT_ADDRESS};

#[derive(StructOpt)]
#[structopt(name = "scd41-util")]
/// A Command Line Interface (CLI) for interacting with a local Scd41 CO2 sensor over I2C
pub struct Options {

    /// Specify the i2c interface to use to connect to the scd41 device
    #[structopt(short="d", long = "i2c", default_value = "/dev/i2c-1", env = "SCD41_I2C")]
    i2c: String,

    /// Specify the I2C address of the scd41 device (decimal or 0x prefixed hex)
    #[structopt(long = "address", parse(try_from_str = "parse_address"))]
    address: Option<u8>,

    #[structopt(subcommand)]
    operation: Operation,

    /// Enable verbose logging
    #[structopt(long = "log-level", default_value = "info")]
    level: LevelFilter,
}

#[derive(StructOpt)]
pub enum Operation {
    #[structopt(name = "serial")]
    /// Read the sensor serial number
    Serial,

    #[structopt(name = "measure")]
    /// Take measurements using periodic measurement mode
    Measure {
        /// Specify period for taking measurements
        #[structopt(short = "p", long = "sample-period", default_value="10s")]
        period: HumanDuration,

        /// Delay between sensor poll operations
        #[structopt(long = "poll-delay", default_value="100ms")]
        poll_delay: HumanDuration,

        /// Number of allowed I2C errors (per measurement attempt) prior to exiting
        #[structopt(long = "allowed-errors", default_value="3")]
        allowed_errors: usize,

        /// Number of measurements to take before exiting (runs forever if unset)
        #[structopt(short = "n", long = "count")]
        count: Option<usize>,

        /// Use low power periodic measurement (one sample every ~30s)
        #[structopt(long = "low-power")]
        low_power: bool,
    },

    #[structopt(name = "single-shot")]
    /// Take a single measurement on demand
    SingleShot {
        /// Measure temperature and humidity only
        #[structopt(long = "rht-only")]
        rht_only: bool,
    },

    #[structopt(name = "altitude")]
    /// Fetch or set altitude compensation (meters above sea level)
    Altitude {
        #[structopt(long = "set")]
        set: Option<u16>,
    },

    #[structopt(name = "pressure")]
    /// Fetch or set ambient pressure compensation (Pascals)
    Pressure {
        #[structopt(long = "set")]
        set: Option<u32>,
    },

    #[structopt(name = "asc")]
    /// Fetch or configure Automatic Self-Calibration
    Asc {
        /// Enable ASC
        #[structopt(long = "enable")]
        enable: bool,

        /// Disable ASC
        #[structopt(long = "disable")]
        disable: bool,

        /// Set the ASC baseline (ppm)
        #[structopt(long = "target")]
        target: Option<u16>,
    },

    #[structopt(name = "temperature-offset")]
    /// Fetch or set the temperature offset (degrees celsius)
    TemperatureOffset {
        #[structopt(long = "set")]
        set: Option<f32>,
    },

    #[structopt(name = "persist")]
    /// Store the current configuration in EEPROM
    Persist,

    #[structopt(name = "reinit")]
    /// Reload configuration from EEPROM
    Reinit,

    #[structopt(name = "self-test")]
    /// Run the sensor self test (takes 10s)
    SelfTest,

    #[structopt(name = "factory-reset")]
    /// Reset configuration and calibration to factory defaults
    FactoryReset,

    #[structopt(name = "recalibrate")]
    /// Perform forced recalibration against a reference CO2 concentration (ppm)
    Recalibrate {
        target: u16,
    },
}

fn parse_address(s: &str) -> Result<u8, std::num::ParseIntError> {
    match s.strip_prefix("0x") {
        Some(h) => u8::from_str_radix(h, 16),
        None => s.parse(),
    }
}

/// Unwrap a sensor result or log the failure and exit
fn check<T, E: Debug>(r: Result<T, E>, what: &str, code: i32) -> T {
    match r {
        Ok(v) => v,
        Err(e) => {
            error!("Error {}: {:?}", what, e);
            std::process::exit(code);
        }
    }
}

fn main() {
    // Load options
    let opts = Options::from_args();

    // Setup logging
    TermLogger::init(opts.level, simplelog::Config::default()).unwrap();

    debug!("Connecting to I2C device");
    let i2c = match I2cdev::new(&opts.i2c) {
        Ok(v) => v,
        Err(e) => {
            error!("Error opening I2C device '{}': {:?}", &opts.i2c, e);
            std::process::exit(-1);
        }
    };

    debug!("Connecting to SCD41");
    let mut sensor = Scd41::with_address(i2c, Delay, opts.address.unwrap_or(DEFAULT_ADDRESS));

    // The sensor does not acknowledge wake up, so failures here are expected
    if let Err(e) = sensor.wakeup() {
        debug!("Wake up not acknowledged: {:?}", e);
    }

    // A previous run may have left the sensor measuring
    check(sensor.stop_periodic_measurement(), "stopping periodic measurement", -2);

    match opts.operation {
        Operation::Serial => {
            let serial = check(sensor.serial_number(), "reading serial number", -3);
            info!("Serial number: 0x{:012x}", serial);
        },
        Operation::Measure{ period, poll_delay, allowed_errors, count, low_power } => {
            debug!("Starting sensor polling");
            let r = match low_power {
                true => sensor.start_low_power_periodic_measurement(),
                false => sensor.start_periodic_measurement(),
            };
            check(r, "starting periodic measurement", -3);

            debug!("Waiting for sensor to initialise");
            std::thread::sleep(*period);

            let mut taken = 0;

            while count.map(|c| taken < c).unwrap_or(true) {
                debug!("Starting sensor read cycle");

                let mut ready = false;
                let mut errors = 0;

                // Poll for sensor ready
                for _i in 0..100 {
                    match sensor.data_ready() {
                        Ok(true) => {
                            ready = true;
                            break;
                        },
                        Ok(false) => {
                            std::thread::sleep(*poll_delay);
                        },
                        Err(e) => {
                            warn!("Error polling for sensor ready: {:?}", e);
                            errors += 1;
                        }
                    };

                    if errors > allowed_errors {
                        error!("Exceeded maximum allowed I2C errors");
                        std::process::exit(-4);
                    }
                }

                debug!("Sensor data ready state: {:?}", ready);

                if !ready {
                    warn!("Sensor data ready timed-out");
                    std::thread::sleep(*period);
                    continue;
                }

                // If we're ready, attempt to read the data
                for _i in 0..10 {
                    match sensor.read_measurement() {
                        Ok(m) => {
                            info!("CO2: {} ppm, Temperature: {:.2} C, Humidity: {:.2} %", m.co2_ppm, m.temperature_c, m.humidity_rh);
                            taken += 1;
                            break;
                        },
                        Err(e) => {
                            warn!("Error reading sensor data: {:?}", e);
                            errors += 1;
                        },
                    }

                    if errors > allowed_errors {
                        error!("Exceeded maximum allowed I2C errors");
                        std::process::exit(-5);
                    }
                }

                // Wait for enough time for another sensor reading
                std::thread::sleep(*period);
            }

            check(sensor.stop_periodic_measurement(), "stopping periodic measurement", -3);
        },
        Operation::SingleShot{ rht_only } => {
            let r = match rht_only {
                true => sensor.measure_single_shot_rht_only(),
                false => sensor.measure_single_shot(),
            };
            let m = check(r, "taking single shot measurement", -3);

            match rht_only {
                true => info!("Temperature: {:.2} C, Humidity: {:.2} %", m.temperature_c, m.humidity_rh),
                false => info!("CO2: {} ppm, Temperature: {:.2} C, Humidity: {:.2} %", m.co2_ppm, m.temperature_c, m.humidity_rh),
            }
        },
        Operation::Altitude{ set } => {
            if let Some(a) = set {
                check(sensor.set_altitude(a), "setting altitude", -3);
            }
            let a = check(sensor.altitude(), "reading altitude", -3);
            info!("Altitude: {} m", a);
        },
        Operation::Pressure{ set } => {
            if let Some(p) = set {
                check(sensor.set_ambient_pressure(p), "setting ambient pressure", -3);
            }
            let p = check(sensor.ambient_pressure(), "reading ambient pressure", -3);
            info!("Ambient pressure: {} Pa", p);
        },
        Operation::Asc{ enable, disable, target } => {
            if enable && disable {
                error!("Only one of --enable and --disable may be specified");
                std::process::exit(-3);
            }
            if enable || disable {
                check(sensor.set_asc_enabled(enable), "configuring ASC", -3);
            }
            if let Some(t) = target {
                check(sensor.set_asc_target(t), "setting ASC target", -3);
            }

            let enabled = check(sensor.asc_enabled(), "reading ASC state", -3);
            let target = check(sensor.asc_target(), "reading ASC target", -3);
            info!("ASC enabled: {}, target: {} ppm", enabled, target);
        },
        Operation::TemperatureOffset{ set } => {
            if let Some(o) = set {
                check(sensor.set_temperature_offset(o), "setting temperature offset", -3);
            }
            let o = check(sensor.temperature_offset(), "reading temperature offset", -3);
            info!("Temperature offset: {:.2} C", o);
        },
        Operation::Persist => {
            check(sensor.persist_settings(), "persisting settings", -3);
            info!("Settings persisted");
        },
        Operation::Reinit => {
            check(sensor.reinit(), "reinitialising sensor", -3);
            info!("Sensor reinitialised");
        },
        Operation::SelfTest => {
            let ok = check(sensor.self_test(), "running self test", -3);
            match ok {
                true => info!("Self test passed"),
                false => {
                    error!("Self test detected a malfunction");
                    std::process::exit(-6);
                },
            }
        },
        Operation::FactoryReset => {
            check(sensor.factory_reset(), "performing factory reset", -3);
            info!("Factory reset complete");
        },
        Operation::Recalibrate{ target } => {
            let correction = check(sensor.forced_recalibration(target), "performing forced recalibration", -3);
            info!("Forced recalibration applied correction of {} ppm", correction);
        },
    }
}
